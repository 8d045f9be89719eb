//! Session lifecycle: Idle -> Pending -> Active -> Idle.
//!
//! Server replies are accepted in every phase. Out-of-phase replies apply the
//! same rule as in-phase ones, except that a `*Fail` only leaves a matching
//! pending request and never touches an established session.

use tracing::{info, warn};

use crate::host::SessionEvent;
use crate::protocol::{Session, SessionErrorCode, SessionOpcode};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Pending(PendingRequest),
    Active,
}

/// Request sent to the server and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    Create,
    Join(String),
}

/// Process-local session state. The token is only ever set while `Active`.
#[derive(Debug, Default)]
pub struct SessionState {
    phase: Phase,
    token: Option<String>,
    peer_present: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Session secret, defined only while active.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn peer_present(&self) -> bool {
        self.peer_present
    }

    /// Idle -> Pending(Create). Returns the request to send.
    pub fn begin_create(&mut self) -> Result<Session, RequestError> {
        self.ensure_idle()?;
        self.phase = Phase::Pending(PendingRequest::Create);
        Ok(Session::request(SessionOpcode::Create))
    }

    /// Idle -> Pending(Join). Returns the request to send.
    pub fn begin_join(&mut self, secret: String) -> Result<Session, RequestError> {
        self.ensure_idle()?;
        self.phase = Phase::Pending(PendingRequest::Join(secret.clone()));
        Ok(Session {
            opcode: SessionOpcode::Join,
            errcode: None,
            secret: Some(secret),
        })
    }

    /// Leave request. State only changes once the server confirms.
    pub fn begin_leave(&self) -> Result<Session, RequestError> {
        if !self.is_active() {
            return Err(RequestError::NotInSession);
        }
        Ok(Session::request(SessionOpcode::Leave))
    }

    fn ensure_idle(&self) -> Result<(), RequestError> {
        match self.phase {
            Phase::Idle => Ok(()),
            Phase::Pending(_) => Err(RequestError::RequestPending),
            Phase::Active => Err(RequestError::AlreadyInSession),
        }
    }

    /// Apply a server reply. Returns the event for the host, or why the
    /// message is not a valid reply.
    pub fn apply(&mut self, msg: &Session) -> Result<SessionEvent, InvalidSession> {
        match msg.opcode {
            SessionOpcode::CreateSuccess => {
                let secret = msg.secret.clone().ok_or(InvalidSession::MissingSecret)?;
                if self.phase != Phase::Pending(PendingRequest::Create) {
                    warn!("session created while {:?}", self.phase);
                }
                info!("session created");
                self.phase = Phase::Active;
                self.token = Some(secret.clone());
                self.peer_present = false;
                Ok(SessionEvent::Created(secret))
            }
            SessionOpcode::CreateFail => {
                let err = msg.errcode.unwrap_or(SessionErrorCode::CreateUnknown);
                if self.phase == Phase::Pending(PendingRequest::Create) {
                    self.phase = Phase::Idle;
                } else {
                    warn!("create failure while {:?}, keeping state", self.phase);
                }
                Ok(SessionEvent::CreateFailed(err))
            }
            SessionOpcode::JoinSuccess => {
                match std::mem::take(&mut self.phase) {
                    Phase::Pending(PendingRequest::Join(secret)) => {
                        info!("joined session");
                        self.phase = Phase::Active;
                        self.token = Some(secret);
                        self.peer_present = true;
                    }
                    other => {
                        if other != Phase::Active {
                            warn!("join confirmation while {:?}", other);
                        }
                        self.phase = other;
                    }
                }
                Ok(SessionEvent::Joined)
            }
            SessionOpcode::JoinFail => {
                let err = msg.errcode.unwrap_or(SessionErrorCode::JoinUnknown);
                if matches!(self.phase, Phase::Pending(PendingRequest::Join(_))) {
                    self.phase = Phase::Idle;
                }
                Ok(SessionEvent::JoinFailed(err))
            }
            SessionOpcode::LeaveSuccess => {
                if !self.is_active() {
                    warn!("leave confirmation while {:?}", self.phase);
                }
                info!("left session");
                self.reset();
                Ok(SessionEvent::Left)
            }
            SessionOpcode::LeaveFail => Ok(SessionEvent::LeaveFailed(
                msg.errcode.unwrap_or(SessionErrorCode::LeaveUnknown),
            )),
            SessionOpcode::PeerJoined => {
                self.peer_present = true;
                Ok(SessionEvent::PeerJoined)
            }
            SessionOpcode::PeerLeft => {
                self.peer_present = false;
                Ok(SessionEvent::PeerLeft)
            }
            op @ (SessionOpcode::Create
            | SessionOpcode::Join
            | SessionOpcode::Leave
            | SessionOpcode::Other(_)) => Err(InvalidSession::UnexpectedOpcode(op)),
        }
    }

    /// Back to Idle, forgetting the token and the peer.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.token = None;
        self.peer_present = false;
    }
}

/// Local session request that cannot be issued in the current phase.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("already in a session")]
    AlreadyInSession,
    #[error("a session request is already pending")]
    RequestPending,
    #[error("not in a session")]
    NotInSession,
    #[error(transparent)]
    Encode(#[from] crate::codec::EncodeError),
}

/// Inbound session message that is not a valid server reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSession {
    #[error("unexpected session opcode {0:?}")]
    UnexpectedOpcode(SessionOpcode),
    #[error("session created without a secret")]
    MissingSecret,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(opcode: SessionOpcode) -> Session {
        Session::request(opcode)
    }

    fn created(secret: &str) -> Session {
        Session {
            opcode: SessionOpcode::CreateSuccess,
            errcode: None,
            secret: Some(secret.into()),
        }
    }

    fn failed(opcode: SessionOpcode, err: SessionErrorCode) -> Session {
        Session {
            opcode,
            errcode: Some(err),
            secret: None,
        }
    }

    #[test]
    fn create_then_leave() {
        let mut s = SessionState::new();
        let req = s.begin_create().unwrap();
        assert_eq!(req.opcode, SessionOpcode::Create);
        assert_eq!(s.phase(), &Phase::Pending(PendingRequest::Create));
        assert_eq!(s.token(), None);

        let ev = s.apply(&created("S")).unwrap();
        assert_eq!(ev, SessionEvent::Created("S".into()));
        assert!(s.is_active());
        assert_eq!(s.token(), Some("S"));

        assert_eq!(s.begin_leave().unwrap().opcode, SessionOpcode::Leave);
        assert!(s.is_active());
        assert_eq!(s.apply(&reply(SessionOpcode::LeaveSuccess)).unwrap(), SessionEvent::Left);
        assert_eq!(s.phase(), &Phase::Idle);
        assert_eq!(s.token(), None);
    }

    #[test]
    fn create_fail_returns_to_idle() {
        let mut s = SessionState::new();
        s.begin_create().unwrap();
        let ev = s
            .apply(&failed(SessionOpcode::CreateFail, SessionErrorCode::CreateUnknown))
            .unwrap();
        assert_eq!(ev, SessionEvent::CreateFailed(SessionErrorCode::CreateUnknown));
        assert_eq!(s.phase(), &Phase::Idle);
    }

    #[test]
    fn fail_without_code_uses_opcode_specific_unknown() {
        let mut s = SessionState::new();
        s.begin_create().unwrap();
        assert_eq!(
            s.apply(&reply(SessionOpcode::CreateFail)).unwrap(),
            SessionEvent::CreateFailed(SessionErrorCode::CreateUnknown)
        );
        assert_eq!(
            s.apply(&reply(SessionOpcode::LeaveFail)).unwrap(),
            SessionEvent::LeaveFailed(SessionErrorCode::LeaveUnknown)
        );
    }

    #[test]
    fn failures_never_touch_established_secret() {
        let mut s = SessionState::new();
        s.begin_create().unwrap();
        s.apply(&created("S")).unwrap();
        for op in [
            SessionOpcode::CreateFail,
            SessionOpcode::JoinFail,
            SessionOpcode::LeaveFail,
        ] {
            s.apply(&failed(op, SessionErrorCode::Other(77))).unwrap();
            assert!(s.is_active());
            assert_eq!(s.token(), Some("S"));
        }
    }

    #[test]
    fn join_success_completes_pending_join() {
        let mut s = SessionState::new();
        let req = s.begin_join("abc".into()).unwrap();
        assert_eq!(req.secret.as_deref(), Some("abc"));
        assert_eq!(s.token(), None);
        assert_eq!(s.apply(&reply(SessionOpcode::JoinSuccess)).unwrap(), SessionEvent::Joined);
        assert!(s.is_active());
        assert_eq!(s.token(), Some("abc"));
        assert!(s.peer_present());
    }

    #[test]
    fn join_fail_returns_to_idle() {
        let mut s = SessionState::new();
        s.begin_join("abc".into()).unwrap();
        let ev = s
            .apply(&failed(SessionOpcode::JoinFail, SessionErrorCode::JoinUnknownSecret))
            .unwrap();
        assert_eq!(ev, SessionEvent::JoinFailed(SessionErrorCode::JoinUnknownSecret));
        assert_eq!(s.phase(), &Phase::Idle);
        assert_eq!(s.token(), None);
    }

    #[test]
    fn join_success_while_active_keeps_state() {
        let mut s = SessionState::new();
        s.begin_create().unwrap();
        s.apply(&created("S")).unwrap();
        s.apply(&reply(SessionOpcode::JoinSuccess)).unwrap();
        assert!(s.is_active());
        assert_eq!(s.token(), Some("S"));
    }

    #[test]
    fn out_of_phase_create_success_is_accepted() {
        let mut s = SessionState::new();
        s.apply(&created("late")).unwrap();
        assert!(s.is_active());
        assert_eq!(s.token(), Some("late"));
    }

    #[test]
    fn out_of_phase_join_success_while_idle_keeps_idle() {
        let mut s = SessionState::new();
        s.apply(&reply(SessionOpcode::JoinSuccess)).unwrap();
        assert_eq!(s.phase(), &Phase::Idle);
        assert_eq!(s.token(), None);
    }

    #[test]
    fn create_success_without_secret_is_invalid() {
        let mut s = SessionState::new();
        s.begin_create().unwrap();
        assert_eq!(
            s.apply(&reply(SessionOpcode::CreateSuccess)),
            Err(InvalidSession::MissingSecret)
        );
        assert_eq!(s.phase(), &Phase::Pending(PendingRequest::Create));
    }

    #[test]
    fn peer_presence_is_orthogonal() {
        let mut s = SessionState::new();
        s.begin_create().unwrap();
        s.apply(&created("S")).unwrap();
        s.apply(&reply(SessionOpcode::PeerJoined)).unwrap();
        assert!(s.peer_present());
        assert!(s.is_active());
        s.apply(&reply(SessionOpcode::PeerLeft)).unwrap();
        assert!(!s.peer_present());
        assert!(s.is_active());
    }

    #[test]
    fn request_opcodes_are_not_replies() {
        let mut s = SessionState::new();
        for op in [
            SessionOpcode::Create,
            SessionOpcode::Join,
            SessionOpcode::Leave,
            SessionOpcode::Other(200),
        ] {
            assert_eq!(
                s.apply(&reply(op)),
                Err(InvalidSession::UnexpectedOpcode(op))
            );
        }
        assert_eq!(s.phase(), &Phase::Idle);
    }

    #[test]
    fn requests_guarded_by_phase() {
        let mut s = SessionState::new();
        assert!(matches!(s.begin_leave(), Err(RequestError::NotInSession)));
        s.begin_create().unwrap();
        assert!(matches!(s.begin_create(), Err(RequestError::RequestPending)));
        assert!(matches!(
            s.begin_join("x".into()),
            Err(RequestError::RequestPending)
        ));
        s.apply(&created("S")).unwrap();
        assert!(matches!(s.begin_create(), Err(RequestError::AlreadyInSession)));
    }
}
