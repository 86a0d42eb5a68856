use thiserror::Error;

use crate::banking::bridge::PromptKind;

#[derive(Error, Debug)]
pub enum BankSyncError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bank with routing number {0} not found")]
    BankNotFound(String),

    #[error("Wrong PIN or damaged passport file")]
    WrongCredentials,

    #[error("{0} cancelled")]
    PromptCancelled(PromptKind),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("{0}")]
    ResultNotOk(String),

    #[error("Account {0} has never been synced with its bank")]
    MissingSyncState(i64),

    #[error("Error while retrieving information for account {0}")]
    MissingAccountInfo(i64),

    #[error("This bank has already been added")]
    BankAlreadyAdded,

    #[error("No accounts could be retrieved from the bank")]
    NoAccounts,

    #[error("Unknown bank: {0}")]
    UnknownBank(i64),

    #[error("Unknown account: {0}")]
    UnknownAccount(i64),

    #[error("Unsupported TAN challenge: {0}")]
    UnsupportedChallenge(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl BankSyncError {
    /// Errors outside the banking taxonomy are worth a crash report.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::Db(_) | Self::Io(_) | Self::Json(_) | Self::Protocol(_) | Self::Other(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BankSyncError>;

/// Crash-reporting hook: logs the error with its whole source chain.
pub fn report_unexpected(err: &BankSyncError) {
    let mut chain = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    tracing::error!(target: "banking", error = %chain, "unexpected failure");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_errors_are_expected() {
        assert!(!BankSyncError::WrongCredentials.is_unexpected());
        assert!(!BankSyncError::ExecutionFailed("9050 failed".into()).is_unexpected());
        assert!(!BankSyncError::MissingSyncState(3).is_unexpected());
        assert!(BankSyncError::Other("boom".into()).is_unexpected());
    }

    #[test]
    fn test_status_text_is_surfaced_verbatim() {
        let err = BankSyncError::ExecutionFailed("9942 PIN falsch".into());
        assert_eq!(err.to_string(), "9942 PIN falsch");
    }

    #[test]
    fn test_prompt_cancelled_message() {
        let err = BankSyncError::PromptCancelled(PromptKind::Tan);
        assert_eq!(err.to_string(), "TAN entry cancelled");
    }
}
