//! Pooled HTTP client shared by every adapter for the add-on's lifetime.

use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use crate::error::BotError;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug)]
enum SessionState {
    Idle,
    Open(Client),
    Closed,
}

/// Lazily-built `reqwest` client that can be closed exactly once.
///
/// After [`close`](Self::close) every call to [`client`](Self::client) fails
/// with [`BotError::SessionClosed`].
#[derive(Debug)]
pub struct HttpSession {
    state: Mutex<SessionState>,
    insecure_skip_verify: bool,
}

impl HttpSession {
    /// Create a session; no connection pool is built until first use.
    #[must_use]
    pub fn new(insecure_skip_verify: bool) -> Self {
        Self { state: Mutex::new(SessionState::Idle), insecure_skip_verify }
    }

    /// Get a handle to the shared client, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::SessionClosed`] after shutdown, or a config error if
    /// the TLS backend cannot be initialised.
    pub fn client(&self) -> Result<Client, BotError> {
        let mut state = self.lock();
        match &*state {
            SessionState::Open(client) => Ok(client.clone()),
            SessionState::Closed => Err(BotError::SessionClosed),
            SessionState::Idle => {
                let client = Client::builder()
                    .redirect(Policy::limited(MAX_REDIRECTS))
                    .danger_accept_invalid_certs(self.insecure_skip_verify)
                    .build()
                    .map_err(|e| BotError::Config(format!("failed to build HTTP client: {e}")))?;
                debug!(insecure = self.insecure_skip_verify, "HTTP session opened");
                *state = SessionState::Open(client.clone());
                Ok(client)
            }
        }
    }

    /// Close the session. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if matches!(*state, SessionState::Closed) {
            return false;
        }
        *state = SessionState::Closed;
        debug!("HTTP session closed");
        true
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), SessionState::Closed)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
