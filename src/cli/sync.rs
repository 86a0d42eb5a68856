use colored::Colorize;

use crate::banking::WorkState;
use crate::cli::{open_banking, prompts, read_pin, runtime};
use crate::db;
use crate::error::{BankSyncError, Result};
use crate::models::BankingCredentials;
use crate::repository;
use crate::settings::Settings;

pub fn run(settings: &Settings, account_id: i64) -> Result<()> {
    let banking = open_banking(settings)?;
    let conn = db::open(&settings.db_path())?;
    let account = repository::load_account(&conn, account_id)?.ok_or(BankSyncError::UnknownAccount(account_id))?;
    let bank_id = account.bank_id.ok_or(BankSyncError::MissingAccountInfo(account_id))?;
    let bank = repository::load_bank(&conn, bank_id)?;
    drop(conn);

    println!("Syncing {} with {}", account.label.bold(), bank.name);
    let credentials = BankingCredentials::for_bank(&bank, read_pin()?, settings.default_hbci_version);
    let state = runtime()?.block_on(prompts::drive(
        &banking,
        &settings.challenge_dir(),
        banking.sync_account(credentials, account_id),
    ))?;

    match state {
        WorkState::Succeeded(message) => {
            println!("{}", message.green());
            Ok(())
        }
        _ => Err(BankSyncError::Other(
            banking.last_error().unwrap_or_else(|| "Sync did not complete".to_string()),
        )),
    }
}
