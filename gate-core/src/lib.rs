//! NFC Gate protocol core.
//! Host-driven: no I/O; the host feeds frames and hardware events, the core
//! drives the collaborators it was constructed with.

pub mod anticol;
pub mod codec;
pub mod host;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod status;
pub mod wire;

pub use anticol::AnticolProfile;
pub use codec::{decode, encode, DecodeError, EncodeError};
pub use crate::core::{Config, GateCore, RouteError};
pub use host::{
    ApduResponder, Diagnostic, EmulationProfile, HardwareError, HostEvents, ReaderHandle,
    SessionEvent, Transport,
};
pub use protocol::Envelope;
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};

pub mod core;

#[cfg(test)]
mod testing;
