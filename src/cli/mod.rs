pub mod accounts;
pub mod banks;
pub mod init;
pub mod prompts;
pub mod status;
pub mod sync;

use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::banking::bridge::PromptKind;
use crate::banking::{Banking, BankingConfig};
use crate::error::{BankSyncError, Result};
use crate::models::HbciVersion;
use crate::protocol::sandbox::Sandbox;
use crate::protocol::{Properties, ProtocolBackend};
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "banksync", about = "Pull bank statements over FinTS into a local ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for banksync data (default: ~/.local/share/banksync)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage bank logins.
    Banks {
        #[command(subcommand)]
        command: BanksCommands,
    },
    /// Manage local accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Fetch new transactions for an imported account.
    Sync {
        /// Account ID (shown in `banksync accounts list`)
        account_id: i64,
    },
    /// Show data directory, backend and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum BanksCommands {
    /// List stored bank logins.
    List,
    /// Log in to a bank and list its accounts.
    Add {
        /// Bank routing number (BLZ)
        #[arg(long)]
        blz: String,
        /// Online banking user id
        #[arg(long)]
        user: String,
        /// Protocol version (default from settings)
        #[arg(long = "hbci-version", value_enum)]
        hbci_version: Option<HbciVersion>,
    },
    /// Import accounts of a stored bank with their history.
    Import {
        /// Bank ID (shown in `banksync banks list`)
        bank_id: i64,
        /// Only import these IBANs (default: all accounts not yet imported)
        #[arg(long)]
        iban: Vec<String>,
        /// Import into this existing local account instead of creating one
        #[arg(long)]
        into: Option<i64>,
        /// Oldest booking date to fetch: YYYY-MM-DD
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Remove a bank login and its passport.
    Remove {
        /// Bank ID (shown in `banksync banks list`)
        bank_id: i64,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List local accounts with their bank link.
    List,
}

/// Client properties for the protocol engine.
fn properties(settings: &Settings) -> Properties {
    let mut props = Properties::new();
    props.insert("client.product.name".into(), settings.product_id.clone());
    props
}

/// Build the protocol backend and run its one-time process setup.
fn backend(settings: &Settings) -> Result<Arc<dyn ProtocolBackend>> {
    let Some(path) = &settings.sandbox else {
        return Err(BankSyncError::Settings(
            "no protocol backend configured; set \"sandbox\" in settings.json to a bank definition file".into(),
        ));
    };
    let backend = Sandbox::load(std::path::Path::new(path))?;
    backend.initialize()?;
    tracing::debug!(definition = %path, "sandbox backend ready");
    Ok(Arc::new(backend))
}

pub(crate) fn open_banking(settings: &Settings) -> Result<Banking> {
    let backend = backend(settings)?;
    Ok(Banking::new(
        backend,
        BankingConfig {
            db_path: settings.db_path(),
            passport_dir: settings.passport_dir(),
            properties: properties(settings),
        },
    ))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

pub(crate) fn read_pin() -> Result<String> {
    entered_pin(rpassword::prompt_password("PIN: ")?)
}

/// An empty PIN means the user backed out.
fn entered_pin(pin: String) -> Result<String> {
    if pin.is_empty() {
        return Err(BankSyncError::PromptCancelled(PromptKind::Pin));
    }
    Ok(pin)
}
