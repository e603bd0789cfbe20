//! MCP Lifecycle Management
//!
//! A session moves through `Uninitialized -> AwaitingInitializedNotification
//! -> Ready -> Closed`. The side that sends `initialize` passes through
//! `AwaitingInitializedNotification` until it has sent
//! `notifications/initialized`; the side that answers goes straight to
//! `Ready` once its response is written. `Closed` is terminal.
//!
//! This module also owns protocol version negotiation, which never fails: an
//! unsupported requested version is answered with the latest supported one.

use tokio::sync::watch;
use tracing::{ debug, info };

use crate::errors::Error;
use crate::protocol::method::Method;

/// Latest protocol version this crate speaks
pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";

/// Protocol versions this crate speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// Which end of the conversation a session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Sends `initialize`, consumes tools/resources/prompts
    Client,
    /// Answers `initialize`, provides tools/resources/prompts
    Server,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Client => write!(f, "client"),
            SessionRole::Server => write!(f, "server"),
        }
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Only `initialize` and `ping` are legal
    Uninitialized,

    /// The initiator has its `initialize` result but has not yet sent
    /// `notifications/initialized`
    AwaitingInitializedNotification,

    /// Normal operation
    Ready,

    /// The transport is gone
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "Uninitialized"),
            SessionState::AwaitingInitializedNotification => write!(f, "AwaitingInitializedNotification"),
            SessionState::Ready => write!(f, "Ready"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Pick the version to answer an `initialize` with.
///
/// `supported` is ordered newest first. The requested version is echoed back
/// when supported; otherwise the newest supported version is offered and the
/// peer decides whether it can live with it.
pub fn negotiate_version(requested: &str, supported: &[String]) -> String {
    if supported.iter().any(|v| v == requested) {
        return requested.to_string();
    }
    let latest = supported.first().map(String::as_str).unwrap_or(LATEST_PROTOCOL_VERSION);
    debug!("Requested protocol version {} not supported, offering {}", requested, latest);
    latest.to_string()
}

/// Tracks the state of one session and answers "may this happen now?"
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<SessionState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self { state }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Move to a new state, rejecting transitions the protocol does not allow
    pub fn transition_to(&self, next: SessionState) -> Result<(), Error> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|current| {
            use SessionState::*;
            let allowed = matches!(
                (*current, next),
                (Uninitialized, AwaitingInitializedNotification) |
                    (Uninitialized, Ready) |
                    (AwaitingInitializedNotification, Ready) |
                    (Uninitialized | AwaitingInitializedNotification | Ready, Closed)
            );
            if *current == next {
                return false;
            }
            if !allowed {
                outcome = Err(match *current {
                    Closed => Error::SessionClosed,
                    from => Error::Protocol(format!("invalid state transition {} -> {}", from, next)),
                });
                return false;
            }
            info!("Session state {} -> {}", current, next);
            *current = next;
            true
        });
        outcome
    }

    /// Mark the session closed; idempotent
    pub fn close(&self) {
        self.state.send_if_modified(|current| {
            if *current == SessionState::Closed {
                return false;
            }
            info!("Session state {} -> {}", current, SessionState::Closed);
            *current = SessionState::Closed;
            true
        });
    }

    /// Wait until the session reaches `target` (or closes)
    pub async fn wait_for(&self, target: SessionState) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| *s == target || *s == SessionState::Closed).await {
            Ok(state) => *state,
            Err(_) => SessionState::Closed,
        }
    }

    /// May we send a request with this method now?
    pub fn check_outbound_request(&self, method: &str) -> Result<(), Error> {
        match self.state() {
            SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Uninitialized if !allowed_before_init(method) => {
                Err(Error::Protocol(format!("cannot send {} before initialization", method)))
            }
            SessionState::AwaitingInitializedNotification if method != Method::Ping.as_str() => {
                Err(
                    Error::Protocol(
                        format!("cannot send {} before notifications/initialized", method)
                    )
                )
            }
            SessionState::Ready if method == Method::Initialize.as_str() => {
                Err(Error::Protocol("session is already initialized".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// May we send a notification with this method now?
    pub fn check_outbound_notification(&self, method: &str) -> Result<(), Error> {
        let cancelled = Method::NotificationsCancelled.as_str();
        match self.state() {
            SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Uninitialized if method != cancelled => {
                Err(Error::Protocol(format!("cannot send {} before initialization", method)))
            }
            SessionState::AwaitingInitializedNotification
                if method != cancelled && method != Method::NotificationsInitialized.as_str() => {
                Err(
                    Error::Protocol(
                        format!("cannot send {} before notifications/initialized", method)
                    )
                )
            }
            _ => Ok(()),
        }
    }

    /// May the peer send us a request with this method now?
    ///
    /// Violations are answered with InvalidRequest; nothing is queued.
    pub fn check_inbound_request(&self, method: &str) -> Result<(), Error> {
        match self.state() {
            SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Uninitialized if !allowed_before_init(method) => {
                Err(Error::Protocol(format!("received {} before initialization", method)))
            }
            SessionState::AwaitingInitializedNotification | SessionState::Ready
                if method == Method::Initialize.as_str() => {
                Err(Error::Protocol("session is already initialized".to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn allowed_before_init(method: &str) -> bool {
    method.parse::<Method>().is_ok_and(|m| m.allowed_before_init())
}
