//! Peer status signals: keepalive and the partner's reader/card presence.

use tracing::{error, info};

use crate::host::SessionEvent;
use crate::protocol::StatusCode;

/// What the partner device last told us about its NFC side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStatus {
    /// Partner faces a reader (it emulates a card).
    pub reader: bool,
    /// Partner holds a card on its reader.
    pub card: bool,
    pub nfc_connected: bool,
}

/// The single action a status code yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Send this status back to the peer.
    Reply(StatusCode),
    /// Nothing beyond the log line.
    Logged,
    /// Peer flags changed; tell the host.
    PeerChanged(PeerEventKind),
    /// Code outside the known table.
    NotImplemented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEventKind {
    ReaderOn,
    ReaderOff,
    CardOn,
    CardOff,
    NfcLost,
}

impl From<PeerEventKind> for SessionEvent {
    fn from(kind: PeerEventKind) -> Self {
        match kind {
            PeerEventKind::ReaderOn => SessionEvent::PeerReaderOn,
            PeerEventKind::ReaderOff => SessionEvent::PeerReaderOff,
            PeerEventKind::CardOn => SessionEvent::PeerCardOn,
            PeerEventKind::CardOff => SessionEvent::PeerCardOff,
            PeerEventKind::NfcLost => SessionEvent::PeerNfcLost,
        }
    }
}

impl PeerStatus {
    /// Apply one status code from the peer.
    pub fn handle(&mut self, code: StatusCode) -> StatusAction {
        match code {
            StatusCode::KeepaliveReq => {
                info!("keepalive request, replying");
                StatusAction::Reply(StatusCode::KeepaliveRep)
            }
            StatusCode::KeepaliveRep => {
                info!("keepalive reply");
                StatusAction::Logged
            }
            StatusCode::NotImplemented
            | StatusCode::UnknownError
            | StatusCode::UnknownMessage
            | StatusCode::InvalidMsgFmt => {
                error!("peer reported {:?}", code);
                StatusAction::Logged
            }
            StatusCode::ReaderFound => {
                self.reader = true;
                self.nfc_connected = true;
                StatusAction::PeerChanged(PeerEventKind::ReaderOn)
            }
            StatusCode::ReaderRemoved => {
                self.reader = false;
                StatusAction::PeerChanged(PeerEventKind::ReaderOff)
            }
            StatusCode::CardFound => {
                self.card = true;
                self.nfc_connected = true;
                StatusAction::PeerChanged(PeerEventKind::CardOn)
            }
            StatusCode::CardRemoved => {
                self.card = false;
                StatusAction::PeerChanged(PeerEventKind::CardOff)
            }
            StatusCode::NfcNoConn => {
                self.nfc_connected = false;
                StatusAction::PeerChanged(PeerEventKind::NfcLost)
            }
            StatusCode::Other(v) => {
                error!("status code {} not implemented", v);
                StatusAction::NotImplemented
            }
        }
    }
}
