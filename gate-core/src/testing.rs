//! Recording collaborators for unit tests.

use std::sync::{Arc, Mutex};

use crate::anticol::AnticolProfile;
use crate::codec;
use crate::core::{Config, GateCore};
use crate::host::{
    ApduResponder, Diagnostic, EmulationProfile, HardwareError, HostEvents, ReaderHandle,
    SessionEvent, Transport,
};
use crate::protocol::{Data, Envelope};

pub(crate) type Shared<T> = Arc<Mutex<Vec<T>>>;

fn shared<T>() -> Shared<T> {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) struct RecordingTransport {
    sent: Shared<Vec<u8>>,
}

impl Transport for RecordingTransport {
    fn send(&mut self, envelope: Vec<u8>) {
        self.sent.lock().unwrap().push(envelope);
    }
}

pub(crate) struct RecordingHost {
    diagnostics: Shared<Diagnostic>,
    events: Shared<SessionEvent>,
}

impl HostEvents for RecordingHost {
    fn notify(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic);
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProfileCall {
    Configure(AnticolProfile),
    Enable,
}

pub(crate) struct RecordingProfile {
    calls: Shared<ProfileCall>,
    pub fail_configure: bool,
    pub fail_enable: bool,
}

impl RecordingProfile {
    pub fn new() -> (Self, Shared<ProfileCall>) {
        let calls = shared();
        (
            Self {
                calls: calls.clone(),
                fail_configure: false,
                fail_enable: false,
            },
            calls,
        )
    }
}

impl EmulationProfile for RecordingProfile {
    fn configure(&mut self, profile: &AnticolProfile) -> Result<(), HardwareError> {
        if self.fail_configure {
            return Err(HardwareError::Io("rejected".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push(ProfileCall::Configure(profile.clone()));
        Ok(())
    }

    fn enable(&mut self) -> Result<(), HardwareError> {
        if self.fail_enable {
            return Err(HardwareError::Io("emulation unavailable".into()));
        }
        self.calls.lock().unwrap().push(ProfileCall::Enable);
        Ok(())
    }
}

/// What a [`FakeReader`] saw.
#[derive(Debug, Default)]
pub(crate) struct ReaderLog {
    pub commands: Vec<Vec<u8>>,
    pub closed: usize,
}

pub(crate) struct FakeReader {
    pub connected: bool,
    pub reply: Result<Vec<u8>, HardwareError>,
    pub uid: Vec<u8>,
    log: Arc<Mutex<ReaderLog>>,
}

impl FakeReader {
    pub fn new(connected: bool, reply: Vec<u8>) -> (Self, Arc<Mutex<ReaderLog>>) {
        let log = Arc::new(Mutex::new(ReaderLog::default()));
        (
            Self {
                connected,
                reply: Ok(reply),
                uid: vec![0x04, 0xA1, 0xB2, 0xC3],
                log: log.clone(),
            },
            log,
        )
    }
}

impl ReaderHandle for FakeReader {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, HardwareError> {
        self.log.lock().unwrap().commands.push(command.to_vec());
        self.reply.clone()
    }

    fn uid(&self) -> Vec<u8> {
        self.uid.clone()
    }

    fn atqa(&self) -> Vec<u8> {
        vec![0x44, 0x00]
    }

    fn sak(&self) -> Vec<u8> {
        vec![0x20]
    }

    fn historical_bytes(&self) -> Vec<u8> {
        vec![0x80]
    }

    fn close(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }
}

pub(crate) struct RecordingResponder {
    responses: Shared<Vec<u8>>,
}

impl RecordingResponder {
    pub fn new() -> (Self, Shared<Vec<u8>>) {
        let responses = shared();
        (
            Self {
                responses: responses.clone(),
            },
            responses,
        )
    }
}

impl ApduResponder for RecordingResponder {
    fn send_response(&mut self, apdu: &[u8]) -> Result<(), HardwareError> {
        self.responses.lock().unwrap().push(apdu.to_vec());
        Ok(())
    }
}

/// A core wired to recording collaborators.
pub(crate) struct Harness {
    pub core: GateCore,
    pub sent: Shared<Vec<u8>>,
    pub diagnostics: Shared<Diagnostic>,
    pub events: Shared<SessionEvent>,
    pub profile_calls: Shared<ProfileCall>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config {
            report_errors_to_peer: false,
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let (profile, profile_calls) = RecordingProfile::new();
        Self::build(config, profile, profile_calls)
    }

    /// Profile failing on configure, or on enable when `fail_configure` is false.
    pub fn with_broken_profile(fail_configure: bool) -> Self {
        let (mut profile, profile_calls) = RecordingProfile::new();
        profile.fail_configure = fail_configure;
        profile.fail_enable = !fail_configure;
        Self::build(
            Config {
                report_errors_to_peer: false,
                ..Config::default()
            },
            profile,
            profile_calls,
        )
    }

    fn build(config: Config, profile: RecordingProfile, profile_calls: Shared<ProfileCall>) -> Self {
        let sent = shared();
        let diagnostics = shared();
        let events = shared();
        let core = GateCore::new(
            config,
            Box::new(RecordingTransport { sent: sent.clone() }),
            Box::new(RecordingHost {
                diagnostics: diagnostics.clone(),
                events: events.clone(),
            }),
            Box::new(profile),
        );
        Self {
            core,
            sent,
            diagnostics,
            events,
            profile_calls,
        }
    }

    /// Encode and route one envelope.
    pub fn deliver(&mut self, envelope: Envelope) {
        let bytes = codec::encode(&envelope).unwrap();
        let _ = self.core.route(&bytes);
    }

    /// Everything sent so far, with one level of tunneling removed.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| match codec::decode(bytes).unwrap() {
                Envelope::Data(Data::Blob(inner)) => codec::decode(&inner).unwrap(),
                other => other,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.diagnostics.lock().unwrap().clear();
        self.events.lock().unwrap().clear();
    }
}
