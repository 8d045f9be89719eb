//! Envelope codec: one discriminant byte + bincode body of the variant.
//!
//! The discriminant is explicit so that a frame from a newer peer with an
//! unknown message kind is recognisable as such, instead of failing as a
//! malformed body. Bytes after a decoded body are ignored.

use bincode::Options;

use crate::protocol::{Anticol, Data, Envelope, NfcData, Session, Status};

/// Upper bound on an encoded envelope body, both directions.
pub const MAX_ENVELOPE_LEN: usize = 1024 * 1024; // 1 MiB

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum EnvelopeKind {
    Data = 1,
    NfcData = 2,
    Session = 3,
    Status = 4,
    Anticol = 5,
}

impl TryFrom<u8> for EnvelopeKind {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        match tag {
            1 => Ok(EnvelopeKind::Data),
            2 => Ok(EnvelopeKind::NfcData),
            3 => Ok(EnvelopeKind::Session),
            4 => Ok(EnvelopeKind::Status),
            5 => Ok(EnvelopeKind::Anticol),
            other => Err(other),
        }
    }
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_ENVELOPE_LEN as u64)
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Encode an envelope into its wire representation (without transport framing).
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, EncodeError> {
    let (kind, body) = match envelope {
        Envelope::Data(d) => (EnvelopeKind::Data, options().serialize(d)?),
        Envelope::NfcData(n) => (EnvelopeKind::NfcData, options().serialize(n)?),
        Envelope::Session(s) => (EnvelopeKind::Session, options().serialize(s)?),
        Envelope::Status(s) => (EnvelopeKind::Status, options().serialize(s)?),
        Envelope::Anticol(a) => (EnvelopeKind::Anticol, options().serialize(a)?),
    };
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(kind as u8);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Error encoding an envelope (bincode failure or size limit).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
}

/// Decode one envelope. Pure: nothing is applied until the whole body decoded.
pub fn decode(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let (&tag, body) = bytes.split_first().ok_or(DecodeError::Empty)?;
    let kind = EnvelopeKind::try_from(tag).map_err(DecodeError::UnknownKind)?;
    let envelope = match kind {
        EnvelopeKind::Data => Envelope::Data(options().deserialize::<Data>(body)?),
        EnvelopeKind::NfcData => Envelope::NfcData(options().deserialize::<NfcData>(body)?),
        EnvelopeKind::Session => Envelope::Session(options().deserialize::<Session>(body)?),
        EnvelopeKind::Status => Envelope::Status(options().deserialize::<Status>(body)?),
        EnvelopeKind::Anticol => Envelope::Anticol(options().deserialize::<Anticol>(body)?),
    };
    Ok(envelope)
}

/// Error decoding an envelope.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// No discriminant byte at all.
    #[error("empty envelope")]
    Empty,
    /// Discriminant does not name a known message kind.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
    /// Discriminant known but the body is structurally invalid.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] bincode::Error),
}

impl DecodeError {
    /// True when the frame carried no usable discriminant (as opposed to a bad body).
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, DecodeError::Empty | DecodeError::UnknownKind(_))
    }
}
