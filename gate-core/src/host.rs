//! Collaborator interfaces the core drives: network transport, NFC hardware,
//! card emulation and the host application's notification sink.
//!
//! All traits are `Send` so the host can keep the core behind one mutex shared
//! between its network and hardware-event contexts.

use crate::anticol::AnticolProfile;
use crate::protocol::{SessionErrorCode, StatusCode};

/// Outbound path to the relay server. Fire-and-forget: the transport frames,
/// buffers or drops as it sees fit.
pub trait Transport: Send {
    /// Send one encoded envelope.
    fn send(&mut self, envelope: Vec<u8>);
}

/// A tag presented to the local reader. At most one is owned by the core.
pub trait ReaderHandle: Send {
    fn is_connected(&self) -> bool;

    /// Send a command to the tag and wait for its reply. Blocking; the timeout
    /// belongs to the implementation.
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, HardwareError>;

    fn uid(&self) -> Vec<u8>;
    fn atqa(&self) -> Vec<u8>;
    fn sak(&self) -> Vec<u8>;
    fn historical_bytes(&self) -> Vec<u8>;

    /// Release the underlying connection. Called exactly once before the
    /// handle is dropped or replaced.
    fn close(&mut self);
}

/// Active card-emulation channel facing a remote reader.
pub trait ApduResponder: Send {
    fn send_response(&mut self, apdu: &[u8]) -> Result<(), HardwareError>;
}

/// Local emulation profile (the identity the emulated card answers anticollision with).
pub trait EmulationProfile: Send {
    /// Replace the whole identity in one step.
    fn configure(&mut self, profile: &AnticolProfile) -> Result<(), HardwareError>;
    fn enable(&mut self) -> Result<(), HardwareError>;
}

/// Host application callbacks.
pub trait HostEvents: Send {
    fn notify(&mut self, diagnostic: Diagnostic);
    fn on_session_event(&mut self, event: SessionEvent);
}

/// Failure reported by a hardware collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    #[error("not connected")]
    NotConnected,
    #[error("timed out")]
    Timeout,
    #[error("transceive failed: {0}")]
    Io(String),
}

/// Fixed diagnostic vocabulary surfaced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Diagnostic {
    InvalidFormat,
    UnknownMessageType,
    NfcNotConnected,
    NotImplemented,
    BrokenPipe,
}

impl Diagnostic {
    /// Status code reporting this condition to the peer, if any.
    pub fn peer_status(self) -> Option<StatusCode> {
        match self {
            Diagnostic::InvalidFormat => Some(StatusCode::InvalidMsgFmt),
            Diagnostic::UnknownMessageType => Some(StatusCode::UnknownMessage),
            Diagnostic::NfcNotConnected => Some(StatusCode::NfcNoConn),
            Diagnostic::NotImplemented => Some(StatusCode::NotImplemented),
            Diagnostic::BrokenPipe => None,
        }
    }
}

/// Session lifecycle and peer-state changes delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Created(String),
    CreateFailed(SessionErrorCode),
    Joined,
    JoinFailed(SessionErrorCode),
    Left,
    LeaveFailed(SessionErrorCode),
    PeerJoined,
    PeerLeft,
    PeerReaderOn,
    PeerReaderOff,
    PeerCardOn,
    PeerCardOff,
    PeerNfcLost,
}
