//! PC/SC reader: the local tag side of the relay.

use std::ffi::CString;
use std::time::Duration;

use gate_core::host::{HardwareError, ReaderHandle};
use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode};
use tracing::{debug, info, warn};

use crate::atr;
use crate::transport::SharedCore;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// PC/SC pseudo-APDU: GET DATA (UID).
const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

pub struct PcscReader {
    card: Option<Card>,
    uid: Vec<u8>,
    historical: Vec<u8>,
}

impl PcscReader {
    /// Connect to a card on the first reader. `Ok(None)` when no card is present.
    pub fn connect(ctx: &Context) -> Result<Option<Self>, pcsc::Error> {
        let readers: Vec<CString> = ctx.list_readers_owned()?;
        let name = match readers.first() {
            Some(n) => n,
            None => return Ok(None),
        };
        let card = match ctx.connect(name, ShareMode::Shared, Protocols::ANY) {
            Ok(card) => card,
            Err(pcsc::Error::NoSmartcard) | Err(pcsc::Error::RemovedCard) => return Ok(None),
            Err(e) => return Err(e),
        };
        let historical = card
            .status2_owned()
            .map(|s| atr::historical_bytes(s.atr()))
            .unwrap_or_default();
        let mut reader = Self {
            card: Some(card),
            uid: Vec::new(),
            historical,
        };
        reader.uid = match reader.transceive(&GET_UID) {
            Ok(reply) => strip_status_word(reply).unwrap_or_default(),
            Err(e) => {
                warn!("reading UID: {}", e);
                Vec::new()
            }
        };
        info!(reader = ?name, uid = %hex::encode(&reader.uid), "card present");
        Ok(Some(reader))
    }
}

/// Response data of a successful APDU (SW1 SW2 = 90 00).
fn strip_status_word(mut reply: Vec<u8>) -> Option<Vec<u8>> {
    if reply.len() < 2 || reply[reply.len() - 2..] != [0x90, 0x00] {
        return None;
    }
    reply.truncate(reply.len() - 2);
    Some(reply)
}

fn hardware_error(e: pcsc::Error) -> HardwareError {
    match e {
        pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => HardwareError::NotConnected,
        pcsc::Error::Timeout => HardwareError::Timeout,
        other => HardwareError::Io(other.to_string()),
    }
}

impl ReaderHandle for PcscReader {
    fn is_connected(&self) -> bool {
        self.card.as_ref().is_some_and(|c| c.status2_owned().is_ok())
    }

    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, HardwareError> {
        let card = self.card.as_ref().ok_or(HardwareError::NotConnected)?;
        let mut buf = [0u8; pcsc::MAX_BUFFER_SIZE];
        let reply = card.transmit(command, &mut buf).map_err(hardware_error)?;
        Ok(reply.to_vec())
    }

    fn uid(&self) -> Vec<u8> {
        self.uid.clone()
    }

    // Not exposed through PC/SC.
    fn atqa(&self) -> Vec<u8> {
        Vec::new()
    }

    fn sak(&self) -> Vec<u8> {
        Vec::new()
    }

    fn historical_bytes(&self) -> Vec<u8> {
        self.historical.clone()
    }

    fn close(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                debug!("disconnect: {}", e);
            }
        }
    }
}

/// Poll the first PC/SC reader; attach a handle when a card shows up and detach
/// it when the card goes away.
pub async fn run_reader_watch(core: SharedCore) -> Result<(), pcsc::Error> {
    let ctx = Context::establish(Scope::User)?;
    let mut attached = false;
    loop {
        if attached {
            let mut c = core.lock().await;
            let connected = tokio::task::block_in_place(|| c.reader_connected());
            if !connected {
                c.detach_reader();
                info!("card removed");
                attached = false;
            }
        } else {
            match tokio::task::block_in_place(|| PcscReader::connect(&ctx)) {
                Ok(Some(reader)) => {
                    core.lock().await.attach_reader(Box::new(reader));
                    attached = true;
                }
                Ok(None) => {}
                Err(e) => debug!("pcsc: {}", e),
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
