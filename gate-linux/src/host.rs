//! Host callbacks for the daemon. Linux has no card emulation, so the
//! emulation profile only records and logs what the peer's card looks like.

use gate_core::host::{EmulationProfile, HardwareError, HostEvents};
use gate_core::{AnticolProfile, Diagnostic, SessionEvent};
use tracing::{info, warn};

/// Reports diagnostics and session events through tracing.
pub struct LogHost;

impl HostEvents for LogHost {
    fn notify(&mut self, diagnostic: Diagnostic) {
        warn!("gate: {:?}", diagnostic);
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        info!("session: {:?}", event);
    }
}

#[derive(Debug, Default)]
pub struct LoggedProfile {
    current: Option<AnticolProfile>,
    enabled: bool,
}

#[cfg(test)]
impl LoggedProfile {
    pub fn current(&self) -> Option<&AnticolProfile> {
        self.current.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl EmulationProfile for LoggedProfile {
    fn configure(&mut self, profile: &AnticolProfile) -> Result<(), HardwareError> {
        info!(
            uid = %hex::encode(&profile.uid),
            atqa = profile.atqa,
            sak = profile.sak,
            hist = profile.historical,
            "peer card identity"
        );
        self.current = Some(profile.clone());
        self.enabled = false;
        Ok(())
    }

    fn enable(&mut self) -> Result<(), HardwareError> {
        self.enabled = true;
        Ok(())
    }
}
