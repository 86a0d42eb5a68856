use tokio::sync::watch;

use crate::error::{report_unexpected, BankSyncError};
use crate::models::{Bank, RemoteAccount};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkState {
    Initial,
    /// Optional progress message, e.g. the account currently imported.
    Loading(Option<String>),
    BankLoaded(Bank),
    /// Remote accounts paired with whether they are already imported.
    AccountsLoaded {
        bank: Bank,
        accounts: Vec<(RemoteAccount, bool)>,
    },
    Aborted,
    Succeeded(String),
}

impl WorkState {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Aborted | Self::Succeeded(_))
    }
}

/// Observable work state plus a single-message error slot.
pub struct StatePublisher {
    state: watch::Sender<WorkState>,
    error: watch::Sender<Option<String>>,
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePublisher {
    pub fn new() -> Self {
        let (state, _) = watch::channel(WorkState::Initial);
        let (error, _) = watch::channel(None);
        Self { state, error }
    }

    pub fn set(&self, state: WorkState) {
        tracing::debug!(target: "banking", ?state, "work state");
        self.state.send_replace(state);
    }

    pub fn current(&self) -> WorkState {
        self.state.borrow().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    pub fn error(&self, message: String) {
        self.error.send_replace(Some(message));
    }

    /// Publish `err` in the error slot, then move to `terminal`.
    pub fn fail(&self, err: &BankSyncError, terminal: WorkState) {
        if err.is_unexpected() {
            report_unexpected(err);
        }
        self.error(err.to_string());
        self.set(terminal);
    }

    pub fn clear_error(&self) {
        self.error.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkState> {
        self.state.subscribe()
    }

    pub fn errors(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(WorkState::Aborted.is_done());
        assert!(WorkState::Succeeded("done".into()).is_done());
        assert!(!WorkState::Initial.is_done());
        assert!(!WorkState::Loading(None).is_done());
    }

    #[test]
    fn test_fail_sets_message_then_state() {
        let publisher = StatePublisher::new();
        let mut states = publisher.subscribe();
        let errors = publisher.errors();

        publisher.fail(&BankSyncError::ExecutionFailed("9050 Teilweise fehlerhaft".into()), WorkState::Aborted);

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), WorkState::Aborted);
        assert_eq!(errors.borrow().as_deref(), Some("9050 Teilweise fehlerhaft"));

        publisher.clear_error();
        assert_eq!(publisher.last_error(), None);
    }
}
