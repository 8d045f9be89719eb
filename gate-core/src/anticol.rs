//! Anticollision configurator: turns a peer's card identity into the local
//! emulation profile.

use tracing::{info, warn};

use crate::host::{EmulationProfile, HardwareError, ReaderHandle};
use crate::protocol::Anticol;

/// Identity applied to the emulated card. Built complete before it is handed to
/// the profile, so a configure never sees a partial identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnticolProfile {
    pub atqa: u8,
    pub sak: u8,
    pub historical: u8,
    pub uid: Vec<u8>,
}

impl From<&Anticol> for AnticolProfile {
    fn from(msg: &Anticol) -> Self {
        Self {
            atqa: msg.atqa.last().copied().unwrap_or(0),
            sak: msg.sak.first().copied().unwrap_or(0),
            historical: msg.historical.first().copied().unwrap_or(0),
            uid: msg.uid.clone(),
        }
    }
}

/// Configure then enable. Emulation stays disabled when configure fails.
pub fn apply(
    profile: &mut dyn EmulationProfile,
    msg: &Anticol,
) -> Result<AnticolProfile, HardwareError> {
    let identity = AnticolProfile::from(msg);
    info!(
        atqa = identity.atqa,
        sak = identity.sak,
        hist = identity.historical,
        uid = %hex::encode(&identity.uid),
        "applying remote card identity"
    );
    if let Err(e) = profile.configure(&identity) {
        warn!("emulation profile rejected identity: {}", e);
        return Err(e);
    }
    if let Err(e) = profile.enable() {
        warn!("emulation profile failed to enable: {}", e);
        return Err(e);
    }
    Ok(identity)
}

/// Anticollision values of the tag currently on the local reader.
pub fn read_identity(reader: &dyn ReaderHandle) -> Anticol {
    Anticol {
        atqa: reader.atqa(),
        historical: reader.historical_bytes(),
        sak: reader.sak(),
        uid: reader.uid(),
    }
}
