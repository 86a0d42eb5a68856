use std::path::{Path, PathBuf};

use crate::banking::bridge::SessionCallback;
use crate::error::{BankSyncError, Result};
use crate::models::{BankingCredentials, RemoteAccount};
use crate::protocol::{
    BankInfo, ExecOutcome, Handle, Passport, PassportError, Properties, ProtocolBackend, StatementJob,
};

/// Releases the engine's per-thread state when dropped.
struct ThreadGuard<'a> {
    backend: &'a dyn ProtocolBackend,
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        self.backend.done_thread();
    }
}

pub fn passport_path(dir: &Path, blz: &str, user: &str) -> PathBuf {
    let user: String = user
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("passport_{blz}_{user}.dat"))
}

/// An open passport and protocol handle for one bank login.
///
/// Dropping the session closes the handle, then the passport, then the
/// engine's thread state, on every exit path.
pub struct SyncSession<'a> {
    info: BankInfo,
    passport: Box<dyn Passport>,
    handle: Box<dyn Handle>,
    callback: SessionCallback<'a>,
    _thread: ThreadGuard<'a>,
}

impl<'a> SyncSession<'a> {
    pub fn open(
        backend: &'a dyn ProtocolBackend,
        credentials: &BankingCredentials,
        passport_dir: &Path,
        properties: &Properties,
        mut callback: SessionCallback<'a>,
    ) -> Result<Self> {
        backend.init_thread(properties)?;
        let thread = ThreadGuard { backend };

        let info = backend
            .bank_info(&credentials.blz)
            .ok_or_else(|| BankSyncError::BankNotFound(credentials.blz.clone()))?;

        std::fs::create_dir_all(passport_dir)?;
        let path = passport_path(passport_dir, &info.blz, &credentials.user);
        let mut passport = match backend.open_passport(&info, &path, &mut callback) {
            Ok(passport) => passport,
            Err(PassportError::Corrupted(reason)) => {
                tracing::warn!(target: "banking", path = %path.display(), %reason, "passport unreadable");
                return Err(BankSyncError::WrongCredentials);
            }
            Err(PassportError::Other(e)) => return Err(e),
        };

        let handle = match backend.open_handle(credentials.hbci_version, passport.as_mut(), &mut callback) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::info!(target: "banking", blz = %info.blz, error = %e, "handle failed, discarding passport");
                passport.close();
                if let Err(rm) = std::fs::remove_file(&path) {
                    tracing::warn!(target: "banking", path = %path.display(), error = %rm, "could not delete passport");
                }
                return Err(e);
            }
        };

        Ok(Self {
            info,
            passport,
            handle,
            callback,
            _thread: thread,
        })
    }

    pub fn bank_info(&self) -> &BankInfo {
        &self.info
    }

    pub fn accounts(&self) -> Vec<RemoteAccount> {
        self.passport.accounts()
    }

    pub fn execute(&mut self, jobs: &[StatementJob]) -> Result<ExecOutcome> {
        self.handle.execute(jobs, &mut self.callback)
    }
}

impl Drop for SyncSession<'_> {
    fn drop(&mut self) {
        self.handle.close();
        self.passport.close();
    }
}
