use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex};

/// A signed-in operator
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub operator: String,
    pub signed_in_at: DateTime<Local>,
}

/// Where the current session lives. The idle monitor never touches it directly;
/// the host wires `sign_out` into the monitor's logout hook.
pub trait SessionStore: Send + Sync + 'static {
    fn sign_in(&self, operator: &str) -> Session;
    fn current(&self) -> Option<Session>;
    /// Ends the session, returning it if one was open
    fn sign_out(&self) -> Option<Session>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<Option<Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn sign_in(&self, operator: &str) -> Session {
        let session = Session {
            operator: operator.to_string(),
            signed_in_at: Local::now(),
        };
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        tracing::info!(operator, "signed in");
        session
    }

    fn current(&self) -> Option<Session> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn sign_out(&self) -> Option<Session> {
        let ended = self.inner.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(session) = &ended {
            tracing::info!(operator = %session.operator, "signed out");
        }
        ended
    }
}
