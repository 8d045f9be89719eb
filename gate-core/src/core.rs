//! Host-driven API: GateCore receives frames and hardware events from the host
//! and drives the injected collaborators.

use tracing::{debug, error, info, warn};

use crate::anticol;
use crate::codec::{self, DecodeError, EncodeError};
use crate::host::{
    ApduResponder, Diagnostic, EmulationProfile, HardwareError, HostEvents, ReaderHandle,
    SessionEvent, Transport,
};
use crate::protocol::{
    Anticol, Data, DataErrorCode, Envelope, NfcData, NfcSource, Session, Status, StatusCode,
};
use crate::relay::{Destination, ReaderSlot, RelayError, ResponderSlot};
use crate::session::{InvalidSession, RequestError, SessionState};
use crate::status::{PeerStatus, StatusAction};

/// Default bound on nested `Data::Blob` tunnels.
pub const DEFAULT_MAX_TUNNEL_DEPTH: usize = 8;

/// Default keepalive period in ticks (the daemon ticks once per second).
pub const DEFAULT_KEEPALIVE_INTERVAL_TICKS: u64 = 10;

/// Core tunables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deepest accepted tunnel nesting; deeper frames are rejected as invalid.
    pub max_tunnel_depth: usize,
    /// Mirror diagnostics to the peer as status codes while a session is active.
    pub report_errors_to_peer: bool,
    /// Send a keepalive request every this many ticks while active. 0 disables.
    pub keepalive_interval_ticks: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tunnel_depth: DEFAULT_MAX_TUNNEL_DEPTH,
            report_errors_to_peer: true,
            keepalive_interval_ticks: DEFAULT_KEEPALIVE_INTERVAL_TICKS,
        }
    }
}

/// Message router and relay state machine. One instance per server connection;
/// every mutation goes through `&mut self`.
pub struct GateCore {
    config: Config,
    transport: Box<dyn Transport>,
    host: Box<dyn HostEvents>,
    profile: Box<dyn EmulationProfile>,
    session: SessionState,
    peer: PeerStatus,
    reader: ReaderSlot,
    responder: ResponderSlot,
    tick_count: u64,
}

impl GateCore {
    pub fn new(
        config: Config,
        transport: Box<dyn Transport>,
        host: Box<dyn HostEvents>,
        profile: Box<dyn EmulationProfile>,
    ) -> Self {
        Self {
            config,
            transport,
            host,
            profile,
            session: SessionState::new(),
            peer: PeerStatus::default(),
            reader: ReaderSlot::new(),
            responder: ResponderSlot::new(),
            tick_count: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn peer_status(&self) -> PeerStatus {
        self.peer
    }

    pub fn reader_connected(&self) -> bool {
        self.reader.is_connected()
    }

    /// Process one inbound envelope (transport framing already removed).
    ///
    /// Every failure has been reported to the host by the time this returns;
    /// the error is informational and the core stays usable for the next frame.
    pub fn route(&mut self, bytes: &[u8]) -> Result<(), RouteError> {
        let mut envelope = self.decode(bytes)?;
        let mut depth = 0usize;
        loop {
            let data = match envelope {
                Envelope::Data(data) => data,
                Envelope::NfcData(msg) => return self.handle_nfc_data(msg),
                Envelope::Session(msg) => return self.handle_session(&msg),
                Envelope::Status(msg) => return self.handle_status(msg.code),
                Envelope::Anticol(msg) => return self.handle_anticol(&msg),
            };
            match data {
                Data::Error(code) => return self.handle_data_error(code),
                Data::Blob(inner) => {
                    depth += 1;
                    if depth > self.config.max_tunnel_depth {
                        warn!("tunnel nested deeper than {}", self.config.max_tunnel_depth);
                        self.diagnose(Diagnostic::InvalidFormat);
                        return Err(RouteError::TunnelTooDeep(self.config.max_tunnel_depth));
                    }
                    envelope = self.decode(&inner)?;
                }
            }
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<Envelope, RouteError> {
        codec::decode(bytes).map_err(|e| {
            if e.is_unknown_kind() {
                error!("message fits no known kind: {}", e);
                self.diagnose(Diagnostic::UnknownMessageType);
            } else {
                error!("malformed message, discarding: {}", e);
                self.diagnose(Diagnostic::InvalidFormat);
            }
            RouteError::Decode(e)
        })
    }

    fn handle_data_error(&mut self, code: DataErrorCode) -> Result<(), RouteError> {
        match code {
            DataErrorCode::NoError => debug!("server forwarded our message"),
            DataErrorCode::NoSession => error!("server: message sent outside a session"),
            DataErrorCode::TransmissionFailed => error!("server: transmission to peer failed"),
            DataErrorCode::Unknown => error!("server: unknown error"),
            DataErrorCode::Other(v) => {
                error!("data message with unknown error code {}", v);
                self.diagnose(Diagnostic::InvalidFormat);
                return Err(RouteError::UnknownDataError(v));
            }
        }
        Ok(())
    }

    fn handle_nfc_data(&mut self, msg: NfcData) -> Result<(), RouteError> {
        let destination = Destination::from(msg.source);
        let result = match destination {
            Destination::Card => match self.reader.transceive(&msg.payload) {
                Ok(reply) => {
                    self.send_to_peer(Envelope::NfcData(NfcData {
                        source: NfcSource::Card,
                        payload: reply,
                    }));
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Destination::Reader => self.responder.respond(&msg.payload),
        };
        result.map_err(|e| {
            e.log(destination);
            self.diagnose(Diagnostic::NfcNotConnected);
            RouteError::Relay(e)
        })
    }

    fn handle_session(&mut self, msg: &Session) -> Result<(), RouteError> {
        let event = match self.session.apply(msg) {
            Ok(event) => event,
            Err(e) => {
                error!("session message rejected: {}", e);
                self.diagnose(Diagnostic::InvalidFormat);
                return Err(RouteError::Session(e));
            }
        };
        let announce = matches!(event, SessionEvent::Joined | SessionEvent::PeerJoined);
        if event == SessionEvent::Left {
            self.peer = PeerStatus::default();
        }
        self.host.on_session_event(event);
        if announce {
            self.announce_local_nfc();
        }
        Ok(())
    }

    fn handle_status(&mut self, code: StatusCode) -> Result<(), RouteError> {
        match self.peer.handle(code) {
            StatusAction::Reply(reply) => {
                self.send_to_peer(Envelope::Status(Status { code: reply }))
            }
            StatusAction::Logged => {}
            StatusAction::PeerChanged(kind) => self.host.on_session_event(kind.into()),
            StatusAction::NotImplemented => {
                self.diagnose(Diagnostic::NotImplemented);
                return Err(RouteError::UnknownStatus(code.into()));
            }
        }
        Ok(())
    }

    fn handle_anticol(&mut self, msg: &Anticol) -> Result<(), RouteError> {
        if let Err(e) = anticol::apply(self.profile.as_mut(), msg) {
            // Local emulation channel unusable.
            self.diagnose(Diagnostic::NfcNotConnected);
            return Err(RouteError::Profile(e));
        }
        Ok(())
    }

    /// Ask the server for a new session.
    pub fn request_create(&mut self) -> Result<(), RequestError> {
        let msg = self.session.begin_create()?;
        self.send_session_request(msg)
    }

    /// Ask the server to join the session identified by `secret`.
    pub fn request_join(&mut self, secret: impl Into<String>) -> Result<(), RequestError> {
        let msg = self.session.begin_join(secret.into())?;
        self.send_session_request(msg)
    }

    /// Ask the server to leave the current session.
    pub fn request_leave(&mut self) -> Result<(), RequestError> {
        let msg = self.session.begin_leave()?;
        self.send_session_request(msg)
    }

    fn send_session_request(&mut self, msg: Session) -> Result<(), RequestError> {
        info!("session request {:?}", msg.opcode);
        match codec::encode(&Envelope::Session(msg)) {
            Ok(bytes) => {
                self.transport.send(bytes);
                Ok(())
            }
            Err(e) => {
                self.session.reset();
                Err(e.into())
            }
        }
    }

    /// A tag was presented to the local reader. The previous handle, if any, is
    /// closed before the new one is installed.
    pub fn attach_reader(&mut self, handle: Box<dyn ReaderHandle>) {
        self.reader.install(handle);
        info!("reader handle attached");
        self.announce_local_nfc();
    }

    /// The tag left the local reader.
    pub fn detach_reader(&mut self) {
        if self.reader.release() {
            info!("reader handle released");
            self.send_to_peer_if_active(StatusCode::CardRemoved);
        }
    }

    /// A remote-facing card emulation channel became available.
    pub fn attach_responder(&mut self, responder: Box<dyn ApduResponder>) {
        self.responder.install(responder);
        self.send_to_peer_if_active(StatusCode::ReaderFound);
    }

    pub fn detach_responder(&mut self) {
        if self.responder.release() {
            self.send_to_peer_if_active(StatusCode::ReaderRemoved);
        }
    }

    /// Tell the peer what is attached locally. Only meaningful inside a session.
    fn announce_local_nfc(&mut self) {
        if !self.session.is_active() {
            return;
        }
        if self.responder.is_active() {
            self.send_to_peer(Envelope::Status(Status {
                code: StatusCode::ReaderFound,
            }));
        }
        let identity = match self.reader.get() {
            Some(handle) if handle.is_connected() => anticol::read_identity(handle),
            _ => return,
        };
        info!(uid = %hex::encode(&identity.uid), "announcing local card");
        self.send_to_peer(Envelope::Status(Status {
            code: StatusCode::CardFound,
        }));
        self.send_to_peer(Envelope::Anticol(identity));
    }

    /// Periodic tick: keepalive towards the peer while a session is active.
    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.saturating_add(1);
        let interval = self.config.keepalive_interval_ticks;
        if interval > 0 && self.tick_count % interval == 0 && self.session.is_active() {
            debug!("sending keepalive");
            self.send_to_peer(Envelope::Status(Status {
                code: StatusCode::KeepaliveReq,
            }));
        }
    }

    /// The connection to the server broke. Local state is unrecoverable.
    pub fn on_broken_pipe(&mut self) {
        warn!("connection to server lost");
        self.host.notify(Diagnostic::BrokenPipe);
        self.reader.release();
        self.session.reset();
        self.peer = PeerStatus::default();
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.host.notify(diagnostic);
        if !self.config.report_errors_to_peer {
            return;
        }
        if let Some(code) = diagnostic.peer_status() {
            self.send_to_peer_if_active(code);
        }
    }

    fn send_to_peer_if_active(&mut self, code: StatusCode) {
        if self.session.is_active() {
            self.send_to_peer(Envelope::Status(Status { code }));
        }
    }

    /// Peer-directed messages travel tunneled so the server forwards them opaquely.
    fn send_to_peer(&mut self, envelope: Envelope) {
        let tunneled = codec::encode(&envelope)
            .and_then(|inner| codec::encode(&Envelope::Data(Data::Blob(inner))));
        match tunneled {
            Ok(bytes) => self.transport.send(bytes),
            Err(e) => error!("dropping outbound message: {}", e),
        }
    }
}

/// Why a frame was dropped. Already reported to the host when returned.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("tunnel nested deeper than {0}")]
    TunnelTooDeep(usize),
    #[error("unknown data error code {0}")]
    UnknownDataError(u32),
    #[error(transparent)]
    Session(#[from] InvalidSession),
    #[error("status code {0} not implemented")]
    UnknownStatus(u32),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("emulation profile: {0}")]
    Profile(#[from] HardwareError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
