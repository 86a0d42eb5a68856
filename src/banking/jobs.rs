use chrono::NaiveDate;
use rusqlite::Connection;

use crate::attributes::{Attribute, Attributes};
use crate::banking::session::SyncSession;
use crate::error::{BankSyncError, Result};
use crate::models::{AccountInformation, Bank, BankingCredentials, RemoteAccount};
use crate::protocol::{JobResult, StatementJob};
use crate::repository;

/// Statement query for a stored account, starting at its last sync.
pub fn sync_job(info: &AccountInformation, credentials: &BankingCredentials, start_date: NaiveDate) -> StatementJob {
    StatementJob {
        account: RemoteAccount {
            iban: info.iban.clone(),
            number: info.number.clone(),
            subnumber: info.subnumber.clone(),
            blz: credentials.blz.clone(),
            bic: credentials.bank.as_ref().map(|b| b.bic.clone()),
            ..Default::default()
        },
        start_date: Some(start_date),
    }
}

/// Submit a single statement job and check both the overall status and the
/// job's own result.
pub fn run_statement_job(session: &mut SyncSession<'_>, job: StatementJob) -> Result<JobResult> {
    tracing::info!(
        target: "banking",
        account = %job.account.display_id(),
        start = ?job.start_date,
        "requesting statement"
    );
    let outcome = session.execute(std::slice::from_ref(&job))?;
    if !outcome.status.ok {
        tracing::info!(target: "banking", status = %outcome.status.text, "execution failed");
        return Err(BankSyncError::ExecutionFailed(outcome.status.text));
    }
    let result = outcome
        .results
        .into_iter()
        .next()
        .ok_or_else(|| BankSyncError::Protocol("no result for statement job".into()))?;
    if !result.ok {
        tracing::info!(target: "banking", result = %result.text, "statement job failed");
        return Err(BankSyncError::ResultNotOk(result.text));
    }
    Ok(result)
}

/// Label for an account created from a bank import.
pub fn account_label(remote: &RemoteAccount, bank: &Bank) -> String {
    let name = remote.name.as_deref().unwrap_or(&bank.name);
    format!("{} {}", name, remote.display_id())
}

pub fn mark_synced(conn: &Connection, account_id: i64, day: NaiveDate) -> Result<()> {
    let mut attrs = Attributes::new();
    attrs.insert(Attribute::LastSyncedWithBank, day.format("%Y-%m-%d").to_string());
    repository::save_account_attributes(conn, account_id, &attrs)
}

pub fn transactions_imported(count: usize) -> String {
    match count {
        0 => "No new transactions".to_string(),
        1 => "1 transaction imported".to_string(),
        n => format!("{n} transactions imported"),
    }
}

pub fn accounts_imported(count: usize) -> String {
    match count {
        1 => "1 account imported".to_string(),
        n => format!("{n} accounts imported"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::models::{AccountKind, HbciVersion};

    fn bank() -> Bank {
        Bank {
            id: 1,
            blz: "12030000".into(),
            bic: "BYLADEM1001".into(),
            name: "DKB".into(),
            user_id: "alice".into(),
        }
    }

    #[test]
    fn test_sync_job_uses_stored_identity_and_bank_bic() {
        let info = AccountInformation {
            number: Some("202051".into()),
            subnumber: Some("00".into()),
            iban: Some("DE02120300000000202051".into()),
            last_synced: None,
        };
        let creds = BankingCredentials::for_bank(&bank(), "4711".into(), HbciVersion::Hbci300);
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let job = sync_job(&info, &creds, start);
        assert_eq!(job.account.iban, info.iban);
        assert_eq!(job.account.subnumber.as_deref(), Some("00"));
        assert_eq!(job.account.bic.as_deref(), Some("BYLADEM1001"));
        assert_eq!(job.start_date, Some(start));
    }

    #[test]
    fn test_messages() {
        assert_eq!(transactions_imported(0), "No new transactions");
        assert_eq!(transactions_imported(3), "3 transactions imported");
        assert_eq!(accounts_imported(2), "2 accounts imported");
    }

    #[test]
    fn test_account_label_falls_back_to_bank_name() {
        let remote = RemoteAccount {
            iban: Some("DE02120300000000202051".into()),
            ..Default::default()
        };
        assert_eq!(account_label(&remote, &bank()), "DKB DE02120300000000202051");
    }

    #[test]
    fn test_mark_synced() {
        let (_dir, conn) = test_db();
        let id = repository::create_account(&conn, "Giro", "EUR", 0, AccountKind::Bank, None).unwrap();
        mark_synced(&conn, id, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()).unwrap();
        let attrs = repository::account_attributes(&conn, id).unwrap();
        assert_eq!(attrs.get(&Attribute::LastSyncedWithBank).map(String::as_str), Some("2024-03-09"));
    }
}
