use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::banking::{Banking, ImportRequest, WorkState};
use crate::cli::{open_banking, prompts, read_pin, runtime};
use crate::db;
use crate::error::{BankSyncError, Result};
use crate::models::{BankingCredentials, HbciVersion, RemoteAccount};
use crate::repository;
use crate::settings::Settings;

pub fn list(settings: &Settings) -> Result<()> {
    let conn = db::open(&settings.db_path())?;
    let banks = repository::load_banks(&conn)?;
    if banks.is_empty() {
        println!("No banks yet. Add one with `banksync banks add --blz <BLZ> --user <USER>`.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "BLZ", "BIC", "Name", "User"]);
    for bank in banks {
        table.add_row(vec![
            Cell::new(bank.id),
            Cell::new(bank.blz),
            Cell::new(bank.bic),
            Cell::new(bank.name),
            Cell::new(bank.user_id),
        ]);
    }
    println!("Banks\n{table}");
    Ok(())
}

/// Turn a failed or unexpected final state into an error.
fn outcome(banking: &Banking, state: WorkState) -> Result<WorkState> {
    match state {
        WorkState::Aborted | WorkState::Initial => Err(BankSyncError::Other(
            banking.last_error().unwrap_or_else(|| "Operation did not complete".to_string()),
        )),
        other => Ok(other),
    }
}

fn print_remote_accounts(accounts: &[(RemoteAccount, bool)]) {
    let mut table = Table::new();
    table.set_header(vec!["IBAN", "Number", "Name", "Owner", "Currency", "Imported"]);
    for (account, imported) in accounts {
        table.add_row(vec![
            Cell::new(account.iban.as_deref().unwrap_or("")),
            Cell::new(account.number.as_deref().unwrap_or("")),
            Cell::new(account.name.as_deref().unwrap_or("")),
            Cell::new(account.owner.as_deref().unwrap_or("")),
            Cell::new(&account.currency),
            Cell::new(if *imported { "yes" } else { "" }),
        ]);
    }
    println!("{table}");
}

pub fn add(settings: &Settings, blz: &str, user: &str, hbci_version: Option<HbciVersion>) -> Result<()> {
    let banking = open_banking(settings)?;
    let version = hbci_version.unwrap_or(settings.default_hbci_version);
    let credentials = BankingCredentials::new(blz, user, read_pin()?, version);

    let rt = runtime()?;
    let state = rt.block_on(prompts::drive(
        &banking,
        &settings.challenge_dir(),
        banking.add_bank(credentials),
    ))?;
    let WorkState::AccountsLoaded { bank, accounts } = outcome(&banking, state)? else {
        return Err(BankSyncError::Other("Bank login did not return accounts".into()));
    };

    println!("{} {} (ID {})", "Added".green(), bank.name.bold(), bank.id);
    print_remote_accounts(&accounts);
    println!("Import them with `banksync banks import {}`.", bank.id);
    Ok(())
}

/// Pick what to import: the listed IBANs, or everything not imported yet.
fn select_accounts(
    accounts: Vec<(RemoteAccount, bool)>,
    ibans: &[String],
    into: Option<i64>,
) -> Result<Vec<ImportRequest>> {
    let selected: Vec<RemoteAccount> = if ibans.is_empty() {
        accounts
            .into_iter()
            .filter(|(_, imported)| !imported)
            .map(|(account, _)| account)
            .collect()
    } else {
        let mut selected = Vec::with_capacity(ibans.len());
        for iban in ibans {
            let found = accounts
                .iter()
                .find(|(account, _)| account.iban.as_deref() == Some(iban.as_str()))
                .ok_or_else(|| BankSyncError::Other(format!("The bank did not report account {iban}")))?;
            selected.push(found.0.clone());
        }
        selected
    };
    if selected.is_empty() {
        return Err(BankSyncError::Other("Nothing to import: all accounts are already imported".into()));
    }
    if into.is_some() && selected.len() != 1 {
        return Err(BankSyncError::Other("--into needs exactly one account to import".into()));
    }
    Ok(selected
        .into_iter()
        .map(|account| ImportRequest { account, into })
        .collect())
}

pub fn import(
    settings: &Settings,
    bank_id: i64,
    ibans: &[String],
    into: Option<i64>,
    since: Option<NaiveDate>,
) -> Result<()> {
    let banking = open_banking(settings)?;
    let bank = repository::load_bank(&db::open(&settings.db_path())?, bank_id)?;
    if let Some(account_id) = into {
        let linkable = repository::linkable_accounts(&db::open(&settings.db_path())?)?;
        if !linkable.iter().any(|a| a.id == account_id) {
            return Err(BankSyncError::Other(format!(
                "Account {account_id} cannot receive an import (unknown, cash or already linked)"
            )));
        }
    }
    let credentials = BankingCredentials::for_bank(&bank, read_pin()?, settings.default_hbci_version);
    let challenges = settings.challenge_dir();

    let rt = runtime()?;
    let state = rt.block_on(prompts::drive(&banking, &challenges, banking.add_bank(credentials.clone())))?;
    let WorkState::AccountsLoaded { bank, accounts } = outcome(&banking, state)? else {
        return Err(BankSyncError::Other("Bank login did not return accounts".into()));
    };
    let requests = select_accounts(accounts, ibans, into)?;

    let state = rt.block_on(prompts::drive(
        &banking,
        &challenges,
        banking.import_accounts(credentials, bank, requests, since),
    ))?;
    if let WorkState::Succeeded(message) = outcome(&banking, state)? {
        println!("{}", message.green());
    }
    Ok(())
}

pub fn remove(settings: &Settings, bank_id: i64) -> Result<()> {
    let banking = open_banking(settings)?;
    runtime()?.block_on(banking.delete_bank(bank_id))?;
    println!("Removed bank {bank_id}");
    Ok(())
}
