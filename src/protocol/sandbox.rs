//! Offline bank described by a JSON file.
//!
//! Behaves like a PIN/TAN bank from the client's point of view: passports are
//! written to disk and protected by the passphrase, dialog setup asks for the
//! PIN and a security mechanism, and every execution is authorised with a TAN
//! in whatever form the chosen mechanism uses.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::codes::{MatrixCode, SecMech};
use super::{
    BankInfo, CallbackReason, ExecOutcome, ExecStatus, Handle, JobResult, Passport, PassportError,
    Properties, ProtocolBackend, ProtocolCallback, StatementJob, StatementLine,
};
use crate::error::{BankSyncError, Result};
use crate::models::{HbciVersion, RemoteAccount};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxDefinition {
    pub banks: Vec<SandboxBank>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxBank {
    #[serde(flatten)]
    pub info: BankInfo,
    /// Supported protocol versions; empty means all.
    #[serde(default)]
    pub versions: Vec<HbciVersion>,
    #[serde(default)]
    pub users: Vec<SandboxUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxUser {
    pub user_id: String,
    pub pin: String,
    #[serde(default = "default_tan")]
    pub tan: String,
    #[serde(default)]
    pub sec_mechs: Vec<SandboxSecMech>,
    #[serde(default)]
    pub tan_media: Vec<String>,
    #[serde(default)]
    pub accounts: Vec<SandboxAccount>,
}

fn default_tan() -> String {
    "123456".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Challenge {
    Plain,
    Flicker,
    Photo,
    Qr,
    Decoupled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSecMech {
    pub id: String,
    pub name: String,
    pub challenge: Challenge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxAccount {
    #[serde(flatten)]
    pub account: RemoteAccount,
    #[serde(default)]
    pub opening_balance: Option<i64>,
    /// Makes the whole execution fail with this status text.
    #[serde(default)]
    pub exec_error: Option<String>,
    /// Makes only this account's job fail with this text.
    #[serde(default)]
    pub job_error: Option<String>,
    #[serde(default)]
    pub lines: Vec<StatementLine>,
}

/// Live resource counters, for checking that sessions clean up after themselves.
#[derive(Debug, Default)]
pub struct SandboxStats {
    initialized: AtomicBool,
    active_threads: AtomicI64,
    open_passports: AtomicI64,
    open_handles: AtomicI64,
}

impl SandboxStats {
    pub fn active_threads(&self) -> i64 {
        self.active_threads.load(Ordering::SeqCst)
    }

    pub fn open_passports(&self) -> i64 {
        self.open_passports.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> i64 {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

pub struct Sandbox {
    definition: SandboxDefinition,
    stats: Arc<SandboxStats>,
}

impl Sandbox {
    pub fn new(definition: SandboxDefinition) -> Self {
        Self {
            definition,
            stats: Arc::new(SandboxStats::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let definition: SandboxDefinition = serde_json::from_str(&content)?;
        Ok(Self::new(definition))
    }

    pub fn stats(&self) -> Arc<SandboxStats> {
        Arc::clone(&self.stats)
    }

    fn bank(&self, blz: &str) -> Option<&SandboxBank> {
        self.definition.banks.iter().find(|b| b.info.blz == blz)
    }

    fn user(&self, blz: &str, user_id: &str) -> Option<&SandboxUser> {
        self.bank(blz)?.users.iter().find(|u| u.user_id == user_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PassportFile {
    blz: String,
    user_id: String,
    customer_id: String,
    passphrase_sha256: String,
}

fn digest(passphrase: &str) -> String {
    hex::encode(Sha256::digest(passphrase.as_bytes()))
}

fn ask(callback: &mut dyn ProtocolCallback, reason: CallbackReason, msg: &str, preset: &str) -> Result<String> {
    let mut ret = preset.to_string();
    callback.callback(reason, msg, &mut ret)?;
    Ok(ret)
}

impl ProtocolBackend for Sandbox {
    fn initialize(&self) -> Result<()> {
        self.stats.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn init_thread(&self, properties: &Properties) -> Result<()> {
        if !self.stats.is_initialized() {
            return Err(BankSyncError::Protocol("engine not initialised".into()));
        }
        tracing::debug!(target: "banking", product = ?properties.get("client.product.name"), "sandbox thread init");
        self.stats.active_threads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn done_thread(&self) {
        self.stats.active_threads.fetch_sub(1, Ordering::SeqCst);
    }

    fn bank_info(&self, blz: &str) -> Option<BankInfo> {
        self.bank(blz).map(|b| b.info.clone())
    }

    fn open_passport(
        &self,
        info: &BankInfo,
        path: &Path,
        callback: &mut dyn ProtocolCallback,
    ) -> std::result::Result<Box<dyn Passport>, PassportError> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: PassportFile = serde_json::from_str(&content)
                .map_err(|e| PassportError::Corrupted(format!("unreadable passport: {e}")))?;
            let passphrase = ask(callback, CallbackReason::NeedPassphraseLoad, "Passphrase", "")?;
            if digest(&passphrase) != file.passphrase_sha256 {
                return Err(PassportError::Corrupted("passport could not be decrypted".into()));
            }
            file
        } else {
            let passphrase = ask(callback, CallbackReason::NeedPassphraseSave, "New passphrase", "")?;
            let blz = ask(callback, CallbackReason::NeedBlz, "Bank routing number", &info.blz)?;
            let user_id = ask(callback, CallbackReason::NeedUserId, "User id", "")?;
            let customer_id = ask(callback, CallbackReason::NeedCustomerId, "Customer id", &user_id)?;
            let file = PassportFile {
                blz,
                user_id,
                customer_id,
                passphrase_sha256: digest(&passphrase),
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&file).map_err(BankSyncError::from)?;
            std::fs::write(path, format!("{json}\n"))?;
            file
        };

        let accounts = self
            .user(&file.blz, &file.user_id)
            .map(|u| {
                u.accounts
                    .iter()
                    .map(|a| RemoteAccount {
                        blz: file.blz.clone(),
                        bic: a.account.bic.clone().or_else(|| Some(info.bic.clone())),
                        ..a.account.clone()
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.stats.open_passports.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SandboxPassport {
            blz: file.blz,
            user_id: file.user_id,
            accounts,
            closed: false,
            stats: self.stats(),
        }))
    }

    fn open_handle(
        &self,
        version: HbciVersion,
        passport: &mut dyn Passport,
        callback: &mut dyn ProtocolCallback,
    ) -> Result<Box<dyn Handle>> {
        let bank = self
            .bank(passport.blz())
            .ok_or_else(|| BankSyncError::Protocol(format!("9010 unknown bank {}", passport.blz())))?;
        if !bank.versions.is_empty() && !bank.versions.contains(&version) {
            return Err(BankSyncError::Protocol(format!(
                "9010 HBCI version {} not supported",
                version.id()
            )));
        }
        let user = self
            .user(passport.blz(), passport.user_id())
            .ok_or_else(|| BankSyncError::Protocol("9931 unknown user".into()))?;

        callback.status("dialog init", &[bank.info.pin_tan_address.clone()]);
        let pin = ask(callback, CallbackReason::NeedPtPin, "PIN", "")?;
        if pin != user.pin {
            return Err(BankSyncError::Protocol("9942 PIN wrong".into()));
        }

        let sec_mech = if user.sec_mechs.is_empty() {
            None
        } else {
            let offered: Vec<SecMech> = user
                .sec_mechs
                .iter()
                .map(|m| SecMech {
                    id: m.id.clone(),
                    name: m.name.clone(),
                })
                .collect();
            let chosen = ask(
                callback,
                CallbackReason::NeedPtSecMech,
                "Select security mechanism",
                &SecMech::join(&offered),
            )?;
            let mech = user
                .sec_mechs
                .iter()
                .find(|m| m.id == chosen)
                .ok_or_else(|| BankSyncError::Protocol(format!("9955 unknown security mechanism {chosen}")))?;
            Some(mech.clone())
        };

        self.stats.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SandboxHandle {
            user: user.clone(),
            sec_mech,
            closed: false,
            stats: self.stats(),
        }))
    }
}

struct SandboxPassport {
    blz: String,
    user_id: String,
    accounts: Vec<RemoteAccount>,
    closed: bool,
    stats: Arc<SandboxStats>,
}

impl Passport for SandboxPassport {
    fn blz(&self) -> &str {
        &self.blz
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn accounts(&self) -> Vec<RemoteAccount> {
        self.accounts.clone()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.open_passports.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct SandboxHandle {
    user: SandboxUser,
    sec_mech: Option<SandboxSecMech>,
    closed: bool,
    stats: Arc<SandboxStats>,
}

fn failed(text: &str) -> ExecOutcome {
    ExecOutcome {
        status: ExecStatus {
            ok: false,
            text: text.to_string(),
        },
        results: Vec::new(),
    }
}

impl SandboxHandle {
    /// Runs the TAN step of the dialog. `Ok(None)` means authorised.
    fn authorise(&self, callback: &mut dyn ProtocolCallback) -> Result<Option<String>> {
        let Some(mech) = &self.sec_mech else {
            return Ok(None);
        };
        if !self.user.tan_media.is_empty() {
            let medium = ask(
                callback,
                CallbackReason::NeedPtTanMedia,
                "Select TAN medium",
                &self.user.tan_media.join("|"),
            )?;
            if !self.user.tan_media.contains(&medium) {
                return Ok(Some(format!("9955 unknown TAN medium {medium}")));
            }
        }
        let challenge_image = MatrixCode {
            mime_type: "image/png".into(),
            image: b"\x89PNG\r\n\x1a\nsandbox".to_vec(),
        };
        let tan = match mech.challenge {
            Challenge::Plain => ask(callback, CallbackReason::NeedPtTan, "Please enter the TAN", "")?,
            Challenge::Flicker => ask(callback, CallbackReason::NeedPtTan, "Please enter the TAN", "0388A01239230520422")?,
            Challenge::Photo => ask(
                callback,
                CallbackReason::NeedPtPhotoTan,
                "Scan the photoTAN graphic",
                &challenge_image.encode(),
            )?,
            Challenge::Qr => ask(
                callback,
                CallbackReason::NeedPtQrTan,
                "Scan the QR code",
                &challenge_image.encode(),
            )?,
            Challenge::Decoupled => {
                ask(callback, CallbackReason::NeedPtDecoupled, "Please confirm the order in your banking app", "")?;
                return Ok(None);
            }
        };
        if tan.trim() != self.user.tan {
            return Ok(Some("9941 TAN invalid".to_string()));
        }
        Ok(None)
    }
}

impl Handle for SandboxHandle {
    fn execute(&mut self, jobs: &[StatementJob], callback: &mut dyn ProtocolCallback) -> Result<ExecOutcome> {
        if let Some(text) = self.authorise(callback)? {
            return Ok(failed(&text));
        }

        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            let found = self.user.accounts.iter().find(|a| {
                let remote = &a.account;
                (remote.iban.is_some() && remote.iban == job.account.iban)
                    || (remote.number.is_some()
                        && remote.number == job.account.number
                        && remote.subnumber == job.account.subnumber)
            });
            let Some(account) = found else {
                results.push(JobResult {
                    ok: false,
                    text: format!("9010 unknown account {}", job.account.display_id()),
                    opening_balance: None,
                    lines: Vec::new(),
                });
                continue;
            };
            if let Some(text) = &account.exec_error {
                return Ok(failed(text));
            }
            if let Some(text) = &account.job_error {
                results.push(JobResult {
                    ok: false,
                    text: text.clone(),
                    opening_balance: None,
                    lines: Vec::new(),
                });
                continue;
            }
            let lines: Vec<StatementLine> = account
                .lines
                .iter()
                .filter(|l| job.start_date.map_or(true, |start| l.booking_date >= start))
                .cloned()
                .collect();
            callback.status("job done", &[job.account.display_id(), lines.len().to_string()]);
            results.push(JobResult {
                ok: true,
                text: "0020 Auftrag ausgeführt".to_string(),
                opening_balance: account.opening_balance,
                lines,
            });
        }

        Ok(ExecOutcome {
            status: ExecStatus {
                ok: true,
                text: "0010 Nachricht entgegengenommen".to_string(),
            },
            results,
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;

    use super::*;
    use crate::protocol::Counterpart;

    pub const BLZ: &str = "12030000";
    pub const USER: &str = "alice";
    pub const PIN: &str = "4711";

    pub fn line(day: u32, amount: i64, payee: &str) -> StatementLine {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        StatementLine {
            booking_date: date,
            value_date: date,
            amount,
            currency: "EUR".into(),
            balance: None,
            gv_code: Some("106".into()),
            booking_text: Some("KARTENZAHLUNG".into()),
            purpose: vec![format!("{payee} purchase")],
            counterpart: Counterpart {
                name: Some(payee.into()),
                iban: None,
                bic: None,
            },
            customer_ref: None,
            institute_ref: None,
            primanota: None,
            end_to_end_ref: None,
            mandate_ref: None,
            creditor_id: None,
            reversal: false,
        }
    }

    pub fn account(iban: &str, number: &str, lines: Vec<StatementLine>) -> SandboxAccount {
        SandboxAccount {
            account: RemoteAccount {
                iban: Some(iban.into()),
                number: Some(number.into()),
                subnumber: Some("00".into()),
                blz: BLZ.into(),
                bic: None,
                name: Some("Girokonto".into()),
                owner: Some("Alice Example".into()),
                currency: "EUR".into(),
            },
            opening_balance: Some(10_000),
            exec_error: None,
            job_error: None,
            lines,
        }
    }

    pub fn user(accounts: Vec<SandboxAccount>) -> SandboxUser {
        SandboxUser {
            user_id: USER.into(),
            pin: PIN.into(),
            tan: "123456".into(),
            sec_mechs: vec![SandboxSecMech {
                id: "942".into(),
                name: "mobileTAN".into(),
                challenge: Challenge::Plain,
            }],
            tan_media: Vec::new(),
            accounts,
        }
    }

    pub fn definition(user: SandboxUser) -> SandboxDefinition {
        SandboxDefinition {
            banks: vec![SandboxBank {
                info: BankInfo {
                    blz: BLZ.into(),
                    bic: "BYLADEM1001".into(),
                    name: "Deutsche Kreditbank Berlin".into(),
                    pin_tan_address: "https://banking-dkb.s-fints-pt-dkb.de/fints30".into(),
                },
                versions: Vec::new(),
                users: vec![user],
            }],
        }
    }
}
