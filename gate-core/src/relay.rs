//! Relay forwarding: NFC payload goes to the local role opposite its source.

use tracing::{debug, warn};

use crate::host::{ApduResponder, HardwareError, ReaderHandle};
use crate::protocol::NfcSource;

/// Where a payload must go locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Reader-sourced payload: transceive with the tag on our reader.
    Card,
    /// Card-sourced payload: answer the reader talking to our emulated card.
    Reader,
}

impl From<NfcSource> for Destination {
    fn from(source: NfcSource) -> Self {
        match source {
            NfcSource::Reader => Destination::Card,
            NfcSource::Card | NfcSource::Other(_) => Destination::Reader,
        }
    }
}

/// Owner of the single reader handle. Replacing the handle closes the old one first.
#[derive(Default)]
pub struct ReaderSlot {
    current: Option<Box<dyn ReaderHandle>>,
}

impl ReaderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the current handle (if any), then install `handle`.
    pub fn install(&mut self, handle: Box<dyn ReaderHandle>) {
        self.release();
        self.current = Some(handle);
    }

    /// Close and drop the current handle. Returns whether there was one.
    pub fn release(&mut self) -> bool {
        match self.current.take() {
            Some(mut handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    pub fn get(&self) -> Option<&dyn ReaderHandle> {
        self.current.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.current.as_ref().is_some_and(|h| h.is_connected())
    }

    /// Transceive with the tag. No hardware call when nothing is connected.
    pub fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, RelayError> {
        let handle = match self.current.as_mut() {
            Some(h) if h.is_connected() => h,
            _ => return Err(RelayError::NotConnected),
        };
        debug!("TX: {}", hex::encode(command));
        let reply = handle.transceive(command)?;
        debug!("RX: {}", hex::encode(&reply));
        Ok(reply)
    }
}

impl Drop for ReaderSlot {
    fn drop(&mut self) {
        self.release();
    }
}

/// Local card-emulation channel, present while a remote reader talks to our emulated card.
#[derive(Default)]
pub struct ResponderSlot {
    current: Option<Box<dyn ApduResponder>>,
}

impl ResponderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, responder: Box<dyn ApduResponder>) {
        self.current = Some(responder);
    }

    pub fn release(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Deliver a card's answer to the reader in front of our emulated card.
    pub fn respond(&mut self, payload: &[u8]) -> Result<(), RelayError> {
        let responder = self.current.as_mut().ok_or(RelayError::NotConnected)?;
        debug!("to reader: {}", hex::encode(payload));
        responder.send_response(payload)?;
        Ok(())
    }
}

/// Why a payload could not be delivered locally. The frame is dropped either way.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("no local NFC channel")]
    NotConnected,
    #[error("hardware: {0}")]
    Hardware(#[from] HardwareError),
}

impl RelayError {
    pub(crate) fn log(&self, destination: Destination) {
        warn!("dropping payload for {:?}: {}", destination, self);
    }
}
