//! Bank statement synchronisation.
//!
//! [`Banking`] launches the three workflows (add a bank login, import remote
//! accounts, sync one account) on a blocking worker, one at a time, and
//! reports progress through a [`WorkState`] receiver and an error slot. The
//! protocol engine's questions arrive on the [`Prompts`] slots.

pub mod bridge;
pub mod converter;
pub mod dedup;
pub mod jobs;
pub mod session;
pub mod state;


use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use tokio::sync::watch;

use crate::db;
use crate::error::{BankSyncError, Result};
use crate::models::{Account, AccountKind, Bank, BankingCredentials, RemoteAccount};
use crate::protocol::{Properties, ProtocolBackend, StatementJob};
use crate::repository;

pub use bridge::{Prompts, Selection, TanRequest};
pub use state::WorkState;

use bridge::{SessionCallback, Selections};
use session::SyncSession;
use state::StatePublisher;

#[derive(Debug, Clone)]
pub struct BankingConfig {
    pub db_path: PathBuf,
    pub passport_dir: PathBuf,
    /// Client properties handed to the engine for every session.
    pub properties: Properties,
}

/// A remote account to import, optionally into an existing local account.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub account: RemoteAccount,
    pub into: Option<i64>,
}

struct Inner {
    backend: Arc<dyn ProtocolBackend>,
    config: BankingConfig,
    prompts: Prompts,
    state: StatePublisher,
    selections: Mutex<Selections>,
    launch: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct Banking {
    inner: Arc<Inner>,
}

impl Banking {
    pub fn new(backend: Arc<dyn ProtocolBackend>, config: BankingConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                prompts: Prompts::new(),
                state: StatePublisher::new(),
                selections: Mutex::new(Selections::default()),
                launch: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn prompts(&self) -> &Prompts {
        &self.inner.prompts
    }

    pub fn work_state(&self) -> watch::Receiver<WorkState> {
        self.inner.state.subscribe()
    }

    pub fn error_state(&self) -> watch::Receiver<Option<String>> {
        self.inner.state.errors()
    }

    pub fn current_state(&self) -> WorkState {
        self.inner.state.current()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state.last_error()
    }

    pub fn reset(&self) {
        self.inner.state.set(WorkState::Initial);
        self.inner.state.clear_error();
    }

    pub fn clear_error(&self) {
        self.inner.state.clear_error();
    }

    /// Run `work` on a blocking worker once every earlier operation on this
    /// instance has finished, and return the state it left behind.
    async fn launch<F>(&self, work: F) -> WorkState
    where
        F: FnOnce(&Inner) + Send + 'static,
    {
        let _serial = self.inner.launch.lock().await;
        let inner = Arc::clone(&self.inner);
        if let Err(e) = tokio::task::spawn_blocking(move || work(&*inner)).await {
            let err = BankSyncError::Other(format!("banking worker failed: {e}"));
            self.inner.state.fail(&err, WorkState::Aborted);
        }
        self.inner.state.current()
    }

    /// Log in to a bank and list its accounts. New credentials also store the bank.
    pub async fn add_bank(&self, credentials: BankingCredentials) -> WorkState {
        self.launch(move |inner| {
            inner.state.clear_error();
            if let Err(e) = inner.add_bank(&credentials) {
                inner.fail(&e, &credentials, WorkState::Initial);
            }
        })
        .await
    }

    /// Fetch new statement lines for a local account since its last sync.
    pub async fn sync_account(&self, credentials: BankingCredentials, account_id: i64) -> WorkState {
        self.launch(move |inner| {
            inner.state.clear_error();
            match inner.sync_account(&credentials, account_id) {
                Ok(message) => inner.state.set(WorkState::Succeeded(message)),
                Err(e) => inner.fail(&e, &credentials, WorkState::Aborted),
            }
        })
        .await
    }

    /// Import remote accounts one after the other, stopping at the first failure.
    pub async fn import_accounts(
        &self,
        credentials: BankingCredentials,
        bank: Bank,
        accounts: Vec<ImportRequest>,
        start_date: Option<NaiveDate>,
    ) -> WorkState {
        self.launch(move |inner| {
            inner.state.clear_error();
            let mut imported = 0;
            for request in &accounts {
                if let Err(e) = inner.import_account(&credentials, &bank, request, start_date) {
                    inner.fail(&e, &credentials, WorkState::Aborted);
                    return;
                }
                imported += 1;
            }
            inner
                .state
                .set(WorkState::Succeeded(jobs::accounts_imported(imported)));
        })
        .await
    }

    pub async fn load_bank(&self, bank_id: i64) -> WorkState {
        self.launch(move |inner| {
            let loaded = inner.connect().and_then(|conn| repository::load_bank(&conn, bank_id));
            match loaded {
                Ok(bank) => inner.state.set(WorkState::BankLoaded(bank)),
                Err(e) => {
                    if e.is_unexpected() {
                        crate::error::report_unexpected(&e);
                    }
                    inner.state.error(e.to_string());
                }
            }
        })
        .await
    }

    /// Remove a bank, its remembered choices and its passport file.
    pub async fn delete_bank(&self, bank_id: i64) -> Result<()> {
        let _serial = self.inner.launch.lock().await;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.delete_bank(bank_id))
            .await
            .map_err(|e| BankSyncError::Other(format!("banking worker failed: {e}")))?
    }

    pub async fn banks(&self) -> Result<Vec<Bank>> {
        self.query(repository::load_banks).await
    }

    pub async fn linkable_accounts(&self) -> Result<Vec<Account>> {
        self.query(repository::linkable_accounts).await
    }

    async fn query<T, F>(&self, read: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.connect().and_then(|conn| read(&conn)))
            .await
            .map_err(|e| BankSyncError::Other(format!("banking worker failed: {e}")))?
    }

    pub fn submit_tan(&self, tan: Option<String>) -> bool {
        self.inner.prompts.submit_tan(tan)
    }

    pub fn submit_tan_medium(&self, selection: Option<Selection>) -> bool {
        self.inner.prompts.submit_tan_medium(selection)
    }

    pub fn submit_sec_mech(&self, selection: Option<Selection>) -> bool {
        self.inner.prompts.submit_sec_mech(selection)
    }

    pub fn confirm_push_tan(&self) -> bool {
        self.inner.prompts.confirm_push_tan()
    }

    pub fn cancel_push_tan(&self) -> bool {
        self.inner.prompts.cancel_push_tan()
    }
}

impl Inner {
    fn connect(&self) -> Result<Connection> {
        db::open(&self.config.db_path)
    }

    fn fail(&self, err: &BankSyncError, credentials: &BankingCredentials, terminal: WorkState) {
        tracing::info!(
            target: "banking",
            event = "fints_error",
            blz = %credentials.event_blz(),
            error = %err,
            "operation failed"
        );
        bridge::forget(&self.selections);
        self.state.fail(err, terminal);
    }

    /// Open a session, run `work` against it and close it again.
    fn with_session<'a, T>(
        &'a self,
        conn: &'a Connection,
        credentials: &'a BankingCredentials,
        work: impl FnOnce(&mut SyncSession<'a>) -> Result<T>,
    ) -> Result<T> {
        let callback = SessionCallback::new(credentials, &self.prompts, &self.selections, conn)?;
        let mut session = SyncSession::open(
            self.backend.as_ref(),
            credentials,
            &self.config.passport_dir,
            &self.config.properties,
            callback,
        )?;
        work(&mut session)
    }

    fn add_bank(&self, credentials: &BankingCredentials) -> Result<()> {
        let conn = self.connect()?;
        if credentials.is_new() && repository::bank_exists(&conn, &credentials.blz, &credentials.user)? {
            return Err(BankSyncError::BankAlreadyAdded);
        }
        self.state.set(WorkState::Loading(None));

        let (bank, accounts) = self.with_session(&conn, credentials, |session| {
            let bank = match &credentials.bank {
                Some(bank) => bank.clone(),
                None => {
                    let info = session.bank_info();
                    let bank = repository::create_bank(&conn, &info.blz, &info.bic, &info.name, &credentials.user)?;
                    tracing::info!(target: "banking", event = "fints_bank_added", blz = %bank.blz);
                    bridge::persist_pending(&conn, &self.selections, bank.id)?;
                    bank
                }
            };
            Ok((bank, session.accounts()))
        })?;

        if accounts.is_empty() {
            return Err(BankSyncError::NoAccounts);
        }
        let imported = repository::imported_accounts(&conn, bank.id)?;
        let accounts = accounts
            .into_iter()
            .map(|account| {
                let is_imported = imported.iter().any(|info| account.matches(info));
                (account, is_imported)
            })
            .collect();
        self.state.set(WorkState::AccountsLoaded { bank, accounts });
        Ok(())
    }

    fn sync_account(&self, credentials: &BankingCredentials, account_id: i64) -> Result<String> {
        self.state.set(WorkState::Loading(None));
        let conn = self.connect()?;
        let info = repository::account_information(&conn, account_id)?
            .ok_or(BankSyncError::MissingAccountInfo(account_id))?;
        let last_synced = info
            .last_synced
            .ok_or(BankSyncError::MissingSyncState(account_id))?;
        let job = jobs::sync_job(&info, credentials, last_synced);

        let outcome = self.with_session(&conn, credentials, |session| {
            let result = jobs::run_statement_job(session, job)?;
            dedup::persist_unique(&conn, account_id, &result.lines)
        })?;
        jobs::mark_synced(&conn, account_id, Local::now().date_naive())?;

        tracing::info!(
            target: "banking",
            event = "fints_transactions_loaded",
            blz = %credentials.event_blz(),
            imported = outcome.imported,
            skipped = outcome.skipped,
            "transactions loaded"
        );
        Ok(jobs::transactions_imported(outcome.imported))
    }

    fn import_account(
        &self,
        credentials: &BankingCredentials,
        bank: &Bank,
        request: &ImportRequest,
        start_date: Option<NaiveDate>,
    ) -> Result<()> {
        let remote = &request.account;
        self.state.set(WorkState::Loading(Some(format!(
            "Importing account {}",
            remote.display_id()
        ))));
        let conn = self.connect()?;

        let job = StatementJob {
            account: remote.clone(),
            start_date,
        };
        let result = self.with_session(&conn, credentials, |session| jobs::run_statement_job(session, job))?;

        let account_id = match request.into {
            Some(id) => {
                repository::link_account_to_bank(&conn, id, bank.id)?;
                id
            }
            None => repository::create_account(
                &conn,
                &jobs::account_label(remote, bank),
                &remote.currency,
                result.opening_balance.unwrap_or(0),
                AccountKind::Bank,
                Some(bank.id),
            )?,
        };
        repository::save_account_attributes(&conn, account_id, &converter::account_attributes(remote))?;
        let outcome = dedup::persist_unique(&conn, account_id, &result.lines)?;
        jobs::mark_synced(&conn, account_id, Local::now().date_naive())?;

        tracing::info!(
            target: "banking",
            event = "fints_account_imported",
            blz = %credentials.event_blz(),
            account = %remote.display_id(),
            imported = outcome.imported,
            "account imported"
        );
        Ok(())
    }

    fn delete_bank(&self, bank_id: i64) -> Result<()> {
        let conn = self.connect()?;
        let bank = repository::load_bank(&conn, bank_id)?;
        repository::delete_bank(&conn, bank_id)?;
        let passport = session::passport_path(&self.config.passport_dir, &bank.blz, &bank.user_id);
        match std::fs::remove_file(&passport) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(target: "banking", blz = %bank.blz, "bank removed");
        Ok(())
    }
}
