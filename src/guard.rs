//! Per-user cooldown and in-flight job tracking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum spacing between two accepted commands from one user.
pub const COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct GuardState {
    last_accepted: HashMap<String, Instant>,
    /// User to the id of the ticket holding their slot.
    processing: HashMap<String, u64>,
    next_ticket: u64,
}

/// Outcome of an admission check.
#[derive(Debug)]
pub enum Admission {
    /// The command may proceed; the user stays marked busy until the ticket drops.
    Allowed(ProcessingTicket),
    /// The user's previous accepted command was too recent.
    Cooldown {
        /// Time left in the window.
        remaining: Duration,
    },
    /// The user already has a job running.
    AlreadyProcessing,
}

/// Decides whether a user's command may start.
///
/// State is only reachable through [`admit`](Self::admit), [`is_processing`](Self::is_processing)
/// and [`clear`](Self::clear).
#[derive(Debug)]
pub struct AdmissionGuard {
    state: Arc<Mutex<GuardState>>,
    cooldown: Duration,
}

impl Default for AdmissionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGuard {
    /// Create a guard with the standard [`COOLDOWN`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_cooldown(COOLDOWN)
    }

    /// Create a guard with a custom cooldown window.
    #[must_use]
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self { state: Arc::default(), cooldown }
    }

    /// Check a user in.
    ///
    /// A busy user is rejected before the cooldown is consulted, and a
    /// rejected attempt never moves the cooldown timestamp. On success the
    /// user is marked busy and the cooldown restarts.
    pub fn admit(&self, user_id: &str) -> Admission {
        let now = Instant::now();
        let mut state = lock(&self.state);

        if state.processing.contains_key(user_id) {
            debug!(user = user_id, "rejected: job already in flight");
            return Admission::AlreadyProcessing;
        }

        if let Some(last) = state.last_accepted.get(user_id) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.cooldown {
                debug!(user = user_id, ?elapsed, "rejected: cooldown");
                return Admission::Cooldown { remaining: self.cooldown - elapsed };
            }
        }

        let id = state.next_ticket;
        state.next_ticket += 1;
        state.last_accepted.insert(user_id.to_string(), now);
        state.processing.insert(user_id.to_string(), id);
        Admission::Allowed(ProcessingTicket {
            state: Arc::clone(&self.state),
            user_id: user_id.to_string(),
            id,
        })
    }

    /// Whether the user currently has a job in flight.
    #[must_use]
    pub fn is_processing(&self, user_id: &str) -> bool {
        lock(&self.state).processing.contains_key(user_id)
    }

    /// Forget every user. Called at shutdown.
    ///
    /// Tickets still alive afterwards no longer own a slot; dropping them
    /// leaves any newer admission of the same user untouched.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.last_accepted.clear();
        state.processing.clear();
    }
}

/// Marks a user busy for as long as it lives.
///
/// Dropping it clears the flag, so every exit path of a job (success, error,
/// panic, cancelled future) releases the user.
#[derive(Debug)]
pub struct ProcessingTicket {
    state: Arc<Mutex<GuardState>>,
    user_id: String,
    id: u64,
}

impl ProcessingTicket {
    #[cfg(test)]
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for ProcessingTicket {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.processing.get(&self.user_id) == Some(&self.id) {
            state.processing.remove(&self.user_id);
        }
    }
}

// A panic while holding the lock leaves the maps consistent, so poisoning is ignored.
fn lock(state: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_command_is_allowed_and_marks_processing() {
        let guard = AdmissionGuard::new();
        let Admission::Allowed(ticket) = guard.admit("alice") else {
            panic!("expected admission");
        };
        assert_eq!(ticket.user_id(), "alice");
        assert!(guard.is_processing("alice"));
        drop(ticket);
        assert!(!guard.is_processing("alice"));
    }

    #[test]
    fn second_command_within_window_hits_cooldown() {
        let guard = AdmissionGuard::new();
        let Admission::Allowed(ticket) = guard.admit("alice") else { panic!() };
        drop(ticket);

        match guard.admit("alice") {
            Admission::Cooldown { remaining } => {
                assert!(remaining <= COOLDOWN);
                assert!(remaining > Duration::from_secs(8));
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[test]
    fn busy_user_is_rejected_even_without_cooldown() {
        let guard = AdmissionGuard::with_cooldown(Duration::ZERO);
        let Admission::Allowed(_ticket) = guard.admit("alice") else { panic!() };
        assert!(matches!(guard.admit("alice"), Admission::AlreadyProcessing));
    }

    #[test]
    fn users_are_independent() {
        let guard = AdmissionGuard::new();
        let Admission::Allowed(_a) = guard.admit("alice") else { panic!() };
        assert!(matches!(guard.admit("bob"), Admission::Allowed(_)));
    }

    #[test]
    fn rejected_duplicate_does_not_restart_cooldown() {
        let guard = AdmissionGuard::with_cooldown(Duration::from_millis(50));
        let Admission::Allowed(ticket) = guard.admit("alice") else { panic!() };
        std::thread::sleep(Duration::from_millis(30));
        assert!(matches!(guard.admit("alice"), Admission::AlreadyProcessing));
        drop(ticket);
        std::thread::sleep(Duration::from_millis(30));
        assert!(matches!(guard.admit("alice"), Admission::Allowed(_)));
    }

    #[test]
    fn ticket_released_on_panic() {
        let guard = AdmissionGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let Admission::Allowed(_ticket) = guard.admit("alice") else { panic!() };
            panic!("job crashed");
        }));
        assert!(result.is_err());
        assert!(!guard.is_processing("alice"));
    }

    #[test]
    fn stale_ticket_after_clear_keeps_new_job_flag() {
        let guard = AdmissionGuard::with_cooldown(Duration::ZERO);
        let Admission::Allowed(stale) = guard.admit("alice") else { panic!() };
        guard.clear();

        let Admission::Allowed(fresh) = guard.admit("alice") else { panic!() };
        drop(stale);
        assert!(guard.is_processing("alice"));
        drop(fresh);
        assert!(!guard.is_processing("alice"));
    }

    #[test]
    fn clear_forgets_everything() {
        let guard = AdmissionGuard::new();
        let Admission::Allowed(ticket) = guard.admit("alice") else { panic!() };
        guard.clear();
        assert!(!guard.is_processing("alice"));
        assert!(matches!(guard.admit("alice"), Admission::Allowed(_)));
        drop(ticket);
    }
}
