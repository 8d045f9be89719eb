//! NFC Gate wire protocol: envelope variants and their code tables.

use serde::{Deserialize, Serialize};

/// Top-level wire message. Exactly one variant per frame; the codec writes the
/// discriminant explicitly (see codec module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Server-level data: a tunneled envelope or a server error code.
    Data(Data),
    /// Raw NFC payload tagged with the role that produced it.
    NfcData(NfcData),
    /// Session lifecycle request or reply.
    Session(Session),
    /// Peer status signal (keepalive, reader/card presence, error echo).
    Status(Status),
    /// Card identity used during anticollision.
    Anticol(Anticol),
}

/// Either an opaque tunneled envelope or an error code reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Data {
    Blob(Vec<u8>),
    Error(DataErrorCode),
}

/// Server-side forwarding result carried in [`Data::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum DataErrorCode {
    NoError,
    NoSession,
    TransmissionFailed,
    Unknown,
    Other(u32),
}

impl From<u32> for DataErrorCode {
    fn from(v: u32) -> Self {
        match v {
            0 => DataErrorCode::NoError,
            1 => DataErrorCode::NoSession,
            2 => DataErrorCode::TransmissionFailed,
            3 => DataErrorCode::Unknown,
            other => DataErrorCode::Other(other),
        }
    }
}

impl From<DataErrorCode> for u32 {
    fn from(c: DataErrorCode) -> Self {
        match c {
            DataErrorCode::NoError => 0,
            DataErrorCode::NoSession => 1,
            DataErrorCode::TransmissionFailed => 2,
            DataErrorCode::Unknown => 3,
            DataErrorCode::Other(v) => v,
        }
    }
}

/// NFC payload. `source` names the physical role that produced the bytes, not
/// the role that should receive them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfcData {
    pub source: NfcSource,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum NfcSource {
    Reader,
    Card,
    Other(u32),
}

impl From<u32> for NfcSource {
    fn from(v: u32) -> Self {
        match v {
            0 => NfcSource::Reader,
            1 => NfcSource::Card,
            other => NfcSource::Other(other),
        }
    }
}

impl From<NfcSource> for u32 {
    fn from(s: NfcSource) -> Self {
        match s {
            NfcSource::Reader => 0,
            NfcSource::Card => 1,
            NfcSource::Other(v) => v,
        }
    }
}

/// Session request (client to server) or reply (server to client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub opcode: SessionOpcode,
    /// Present only on `*Fail` replies.
    pub errcode: Option<SessionErrorCode>,
    /// Present on `CreateSuccess` replies and `Join` requests.
    pub secret: Option<String>,
}

impl Session {
    pub fn request(opcode: SessionOpcode) -> Self {
        Self {
            opcode,
            errcode: None,
            secret: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum SessionOpcode {
    Create,
    CreateSuccess,
    CreateFail,
    Join,
    JoinSuccess,
    JoinFail,
    Leave,
    LeaveSuccess,
    LeaveFail,
    PeerJoined,
    PeerLeft,
    Other(u32),
}

impl From<u32> for SessionOpcode {
    fn from(v: u32) -> Self {
        match v {
            0 => SessionOpcode::Create,
            1 => SessionOpcode::CreateSuccess,
            2 => SessionOpcode::CreateFail,
            3 => SessionOpcode::Join,
            4 => SessionOpcode::JoinSuccess,
            5 => SessionOpcode::JoinFail,
            6 => SessionOpcode::Leave,
            7 => SessionOpcode::LeaveSuccess,
            8 => SessionOpcode::LeaveFail,
            9 => SessionOpcode::PeerJoined,
            10 => SessionOpcode::PeerLeft,
            other => SessionOpcode::Other(other),
        }
    }
}

impl From<SessionOpcode> for u32 {
    fn from(op: SessionOpcode) -> Self {
        match op {
            SessionOpcode::Create => 0,
            SessionOpcode::CreateSuccess => 1,
            SessionOpcode::CreateFail => 2,
            SessionOpcode::Join => 3,
            SessionOpcode::JoinSuccess => 4,
            SessionOpcode::JoinFail => 5,
            SessionOpcode::Leave => 6,
            SessionOpcode::LeaveSuccess => 7,
            SessionOpcode::LeaveFail => 8,
            SessionOpcode::PeerJoined => 9,
            SessionOpcode::PeerLeft => 10,
            SessionOpcode::Other(v) => v,
        }
    }
}

/// Reason attached to a failed session operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum SessionErrorCode {
    NoError,
    CreateUnknown,
    CreateAlreadyInSession,
    JoinUnknown,
    JoinAlreadyInSession,
    JoinSessionFull,
    JoinUnknownSecret,
    LeaveUnknown,
    LeaveNotInSession,
    Other(u32),
}

impl From<u32> for SessionErrorCode {
    fn from(v: u32) -> Self {
        match v {
            0 => SessionErrorCode::NoError,
            1 => SessionErrorCode::CreateUnknown,
            2 => SessionErrorCode::CreateAlreadyInSession,
            3 => SessionErrorCode::JoinUnknown,
            4 => SessionErrorCode::JoinAlreadyInSession,
            5 => SessionErrorCode::JoinSessionFull,
            6 => SessionErrorCode::JoinUnknownSecret,
            7 => SessionErrorCode::LeaveUnknown,
            8 => SessionErrorCode::LeaveNotInSession,
            other => SessionErrorCode::Other(other),
        }
    }
}

impl From<SessionErrorCode> for u32 {
    fn from(c: SessionErrorCode) -> Self {
        match c {
            SessionErrorCode::NoError => 0,
            SessionErrorCode::CreateUnknown => 1,
            SessionErrorCode::CreateAlreadyInSession => 2,
            SessionErrorCode::JoinUnknown => 3,
            SessionErrorCode::JoinAlreadyInSession => 4,
            SessionErrorCode::JoinSessionFull => 5,
            SessionErrorCode::JoinUnknownSecret => 6,
            SessionErrorCode::LeaveUnknown => 7,
            SessionErrorCode::LeaveNotInSession => 8,
            SessionErrorCode::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum StatusCode {
    KeepaliveReq,
    KeepaliveRep,
    NotImplemented,
    UnknownError,
    UnknownMessage,
    InvalidMsgFmt,
    ReaderFound,
    ReaderRemoved,
    CardFound,
    CardRemoved,
    NfcNoConn,
    Other(u32),
}

impl From<u32> for StatusCode {
    fn from(v: u32) -> Self {
        match v {
            0 => StatusCode::KeepaliveReq,
            1 => StatusCode::KeepaliveRep,
            2 => StatusCode::NotImplemented,
            3 => StatusCode::UnknownError,
            4 => StatusCode::UnknownMessage,
            5 => StatusCode::InvalidMsgFmt,
            6 => StatusCode::ReaderFound,
            7 => StatusCode::ReaderRemoved,
            8 => StatusCode::CardFound,
            9 => StatusCode::CardRemoved,
            10 => StatusCode::NfcNoConn,
            other => StatusCode::Other(other),
        }
    }
}

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        match c {
            StatusCode::KeepaliveReq => 0,
            StatusCode::KeepaliveRep => 1,
            StatusCode::NotImplemented => 2,
            StatusCode::UnknownError => 3,
            StatusCode::UnknownMessage => 4,
            StatusCode::InvalidMsgFmt => 5,
            StatusCode::ReaderFound => 6,
            StatusCode::ReaderRemoved => 7,
            StatusCode::CardFound => 8,
            StatusCode::CardRemoved => 9,
            StatusCode::NfcNoConn => 10,
            StatusCode::Other(v) => v,
        }
    }
}

/// Raw anticollision values of a contactless card, as read from its reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anticol {
    pub atqa: Vec<u8>,
    pub historical: Vec<u8>,
    pub sak: Vec<u8>,
    pub uid: Vec<u8>,
}
