//! Boundary to the FinTS/HBCI client.
//!
//! The wire protocol lives behind [`ProtocolBackend`]; this crate only drives
//! it. Backends call back into a [`ProtocolCallback`] whenever they need input
//! (PIN, TAN, a choice among offered options) and expect the answer to be
//! written into the mutable return buffer before the call returns.

pub mod codes;
pub mod sandbox;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{HbciVersion, RemoteAccount};

/// Connection metadata for one bank, resolved from its routing number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankInfo {
    pub blz: String,
    pub bic: String,
    pub name: String,
    pub pin_tan_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackReason {
    NeedPassphraseLoad,
    NeedPassphraseSave,
    NeedPtPin,
    NeedBlz,
    NeedUserId,
    NeedCustomerId,
    NeedPtPhotoTan,
    NeedPtQrTan,
    NeedPtSecMech,
    NeedPtTan,
    NeedPtTanMedia,
    NeedPtDecoupled,
    HaveError,
    Other(i32),
}

pub trait ProtocolCallback {
    /// Answer a request from the engine by overwriting `ret`.
    fn callback(&mut self, reason: CallbackReason, msg: &str, ret: &mut String) -> Result<()>;

    /// Progress notification. Informational only.
    fn status(&mut self, tag: &str, detail: &[String]);
}

/// Client properties handed to the engine when a worker thread starts.
pub type Properties = BTreeMap<String, String>;

#[derive(Debug)]
pub enum PassportError {
    /// The stored key material could not be read back. With PIN/TAN passports
    /// this is what a wrong passphrase looks like.
    Corrupted(String),
    Other(crate::error::BankSyncError),
}

impl From<crate::error::BankSyncError> for PassportError {
    fn from(e: crate::error::BankSyncError) -> Self {
        Self::Other(e)
    }
}

impl From<std::io::Error> for PassportError {
    fn from(e: std::io::Error) -> Self {
        Self::Other(e.into())
    }
}

pub trait Passport: Send {
    fn blz(&self) -> &str;
    fn user_id(&self) -> &str;
    /// Accounts the bank reported for this user.
    fn accounts(&self) -> Vec<RemoteAccount>;
    fn close(&mut self);
}

pub trait Handle: Send {
    fn execute(&mut self, jobs: &[StatementJob], callback: &mut dyn ProtocolCallback) -> Result<ExecOutcome>;
    fn close(&mut self);
}

pub trait ProtocolBackend: Send + Sync {
    /// Process-wide setup, run once before any thread is initialised.
    fn initialize(&self) -> Result<()>;

    /// Per-thread engine state; paired with [`ProtocolBackend::done_thread`].
    fn init_thread(&self, properties: &Properties) -> Result<()>;
    fn done_thread(&self);

    fn bank_info(&self, blz: &str) -> Option<BankInfo>;

    fn open_passport(
        &self,
        info: &BankInfo,
        path: &Path,
        callback: &mut dyn ProtocolCallback,
    ) -> std::result::Result<Box<dyn Passport>, PassportError>;

    fn open_handle(
        &self,
        version: HbciVersion,
        passport: &mut dyn Passport,
        callback: &mut dyn ProtocolCallback,
    ) -> Result<Box<dyn Handle>>;
}

/// Account history query (`KUmsAll`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementJob {
    pub account: RemoteAccount,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecStatus {
    pub ok: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub ok: bool,
    pub text: String,
    /// Balance at the start of the first reported day, in minor units.
    pub opening_balance: Option<i64>,
    pub lines: Vec<StatementLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub status: ExecStatus,
    /// One result per submitted job, in submission order.
    pub results: Vec<JobResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub bic: Option<String>,
}

/// One booking as the bank reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub booking_date: NaiveDate,
    pub value_date: NaiveDate,
    /// Minor units in `currency`; debits are negative.
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub balance: Option<i64>,
    #[serde(default)]
    pub gv_code: Option<String>,
    #[serde(default)]
    pub booking_text: Option<String>,
    #[serde(default)]
    pub purpose: Vec<String>,
    #[serde(default)]
    pub counterpart: Counterpart,
    #[serde(default)]
    pub customer_ref: Option<String>,
    #[serde(default)]
    pub institute_ref: Option<String>,
    #[serde(default)]
    pub primanota: Option<String>,
    #[serde(default)]
    pub end_to_end_ref: Option<String>,
    #[serde(default)]
    pub mandate_ref: Option<String>,
    #[serde(default)]
    pub creditor_id: Option<String>,
    #[serde(default)]
    pub reversal: bool,
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl std::fmt::Display for StatementLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.booking_date,
            self.amount,
            self.currency,
            self.counterpart.name.as_deref().unwrap_or("-")
        )
    }
}
