//! Human-in-the-loop answers for the protocol engine.
//!
//! The engine asks synchronously, so the worker thread publishes a typed
//! request on a `watch` slot and blocks on a `oneshot` reply. The UI observes
//! the slot and resolves it through one of the `submit_*` functions.
//! Dismissing a prompt is a reply too ([`Reply::Cancelled`]), which the
//! worker turns into [`BankSyncError::PromptCancelled`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tokio::sync::{oneshot, watch};

use crate::error::{BankSyncError, Result};
use crate::models::BankingCredentials;
use crate::protocol::codes::{parse_tan_media, MatrixCode, SecMech};
use crate::protocol::{CallbackReason, ProtocolCallback};
use crate::repository;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Tan,
    TanMedium,
    SecMech,
    PushTan,
    /// Entered on the terminal before a session starts, not through a slot.
    Pin,
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tan => "TAN entry",
            Self::TanMedium => "TAN media selection",
            Self::SecMech => "Security mechanism selection",
            Self::PushTan => "Push TAN confirmation",
            Self::Pin => "PIN entry",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TanRequest {
    pub message: String,
    /// Graphic to scan for photoTAN and QR-TAN; `None` for plain TAN entry.
    pub challenge: Option<MatrixCode>,
}

/// A choice among offered options, optionally remembered for the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub value: String,
    pub remember: bool,
}

impl Selection {
    pub fn once(value: &str) -> Self {
        Self {
            value: value.to_string(),
            remember: false,
        }
    }

    pub fn remembered(value: &str) -> Self {
        Self {
            value: value.to_string(),
            remember: true,
        }
    }
}

#[derive(Debug)]
pub enum Reply<T> {
    Answer(T),
    Cancelled,
}

impl<T> From<Option<T>> for Reply<T> {
    fn from(answer: Option<T>) -> Self {
        answer.map_or(Reply::Cancelled, Reply::Answer)
    }
}

struct Slot<Req, Ans> {
    kind: PromptKind,
    requested: watch::Sender<Option<Req>>,
    pending: Mutex<Option<oneshot::Sender<Reply<Ans>>>>,
}

impl<Req, Ans> Slot<Req, Ans> {
    fn new(kind: PromptKind) -> Self {
        let (requested, _) = watch::channel(None);
        Self {
            kind,
            requested,
            pending: Mutex::new(None),
        }
    }

    /// Publish `request` and block the calling thread until it is answered.
    /// Must not be called from inside an async task.
    fn ask(&self, request: Req) -> Result<Ans> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if pending.is_some() {
                return Err(BankSyncError::Other(format!("{} is already waiting for an answer", self.kind)));
            }
            *pending = Some(tx);
        }
        self.requested.send_replace(Some(request));
        let reply = rx.blocking_recv();
        self.requested.send_replace(None);
        match reply {
            Ok(Reply::Answer(answer)) => Ok(answer),
            Ok(Reply::Cancelled) | Err(_) => Err(BankSyncError::PromptCancelled(self.kind)),
        }
    }

    /// Returns `false` when nothing is outstanding.
    fn resolve(&self, reply: Reply<Ans>) -> bool {
        let Some(tx) = lock(&self.pending).take() else {
            return false;
        };
        self.requested.send_replace(None);
        tx.send(reply).is_ok()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Req>> {
        self.requested.subscribe()
    }
}

/// The four observable prompt slots and their answers.
pub struct Prompts {
    tan: Slot<TanRequest, String>,
    tan_medium: Slot<Vec<String>, Selection>,
    sec_mech: Slot<Vec<SecMech>, Selection>,
    push_tan: Slot<String, ()>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompts {
    pub fn new() -> Self {
        Self {
            tan: Slot::new(PromptKind::Tan),
            tan_medium: Slot::new(PromptKind::TanMedium),
            sec_mech: Slot::new(PromptKind::SecMech),
            push_tan: Slot::new(PromptKind::PushTan),
        }
    }

    pub fn tan_requested(&self) -> watch::Receiver<Option<TanRequest>> {
        self.tan.subscribe()
    }

    pub fn tan_medium_requested(&self) -> watch::Receiver<Option<Vec<String>>> {
        self.tan_medium.subscribe()
    }

    pub fn sec_mech_requested(&self) -> watch::Receiver<Option<Vec<SecMech>>> {
        self.sec_mech.subscribe()
    }

    pub fn push_tan_requested(&self) -> watch::Receiver<Option<String>> {
        self.push_tan.subscribe()
    }

    /// `None` dismisses the prompt.
    pub fn submit_tan(&self, tan: Option<String>) -> bool {
        self.tan.resolve(tan.into())
    }

    pub fn submit_tan_medium(&self, selection: Option<Selection>) -> bool {
        self.tan_medium.resolve(selection.into())
    }

    pub fn submit_sec_mech(&self, selection: Option<Selection>) -> bool {
        self.sec_mech.resolve(selection.into())
    }

    pub fn confirm_push_tan(&self) -> bool {
        self.push_tan.resolve(Reply::Answer(()))
    }

    pub fn cancel_push_tan(&self) -> bool {
        self.push_tan.resolve(Reply::Cancelled)
    }
}

/// Choices in effect for the bank of the current session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selections {
    pub sec_mech: Option<String>,
    pub tan_medium: Option<String>,
    /// Set when the user asked to remember a choice before the bank had an id.
    persist_sec_mech: bool,
    persist_tan_medium: bool,
}

pub fn sec_mech_key(bank_id: i64) -> String {
    format!("selectedSecMech_{bank_id}")
}

pub fn tan_medium_key(bank_id: i64) -> String {
    format!("selectedTanMedium_{bank_id}")
}

/// Drop every choice, including ones still waiting for a bank id.
pub fn forget(selections: &Mutex<Selections>) {
    *lock(selections) = Selections::default();
}

/// Store choices the user asked to remember while the bank was being added.
pub fn persist_pending(conn: &Connection, selections: &Mutex<Selections>, bank_id: i64) -> Result<()> {
    let mut s = lock(selections);
    if s.persist_sec_mech {
        if let Some(value) = &s.sec_mech {
            repository::save_preference(conn, &sec_mech_key(bank_id), value)?;
        }
        s.persist_sec_mech = false;
    }
    if s.persist_tan_medium {
        if let Some(value) = &s.tan_medium {
            repository::save_preference(conn, &tan_medium_key(bank_id), value)?;
        }
        s.persist_tan_medium = false;
    }
    Ok(())
}

/// Pick an option without asking: the only one offered, or a remembered one
/// that is still on offer.
pub fn preselect(options: &[String], remembered: Option<&str>) -> Option<String> {
    if options.len() == 1 {
        return Some(options[0].clone());
    }
    remembered
        .filter(|r| options.iter().any(|o| o == r))
        .map(str::to_string)
}

fn replace(ret: &mut String, value: &str) {
    ret.clear();
    ret.push_str(value);
}

#[derive(Clone, Copy)]
enum Choice {
    SecMech,
    TanMedium,
}

/// Answers the engine for one session.
pub struct SessionCallback<'a> {
    credentials: &'a BankingCredentials,
    prompts: &'a Prompts,
    selections: &'a Mutex<Selections>,
    conn: &'a Connection,
}

impl<'a> SessionCallback<'a> {
    pub fn new(
        credentials: &'a BankingCredentials,
        prompts: &'a Prompts,
        selections: &'a Mutex<Selections>,
        conn: &'a Connection,
    ) -> Result<Self> {
        // Seeded from this bank's preferences only.
        let seeded = match &credentials.bank {
            Some(bank) => Selections {
                sec_mech: repository::load_preference(conn, &sec_mech_key(bank.id))?,
                tan_medium: repository::load_preference(conn, &tan_medium_key(bank.id))?,
                ..Selections::default()
            },
            None => Selections::default(),
        };
        *lock(selections) = seeded;
        Ok(Self {
            credentials,
            prompts,
            selections,
            conn,
        })
    }

    fn remember(&self, choice: Choice, value: &str, persist: bool) -> Result<()> {
        let key = {
            let mut guard = lock(self.selections);
            let s = &mut *guard;
            let (slot, pending) = match choice {
                Choice::SecMech => (&mut s.sec_mech, &mut s.persist_sec_mech),
                Choice::TanMedium => (&mut s.tan_medium, &mut s.persist_tan_medium),
            };
            *slot = Some(value.to_string());
            if !persist {
                return Ok(());
            }
            match &self.credentials.bank {
                Some(bank) => match choice {
                    Choice::SecMech => sec_mech_key(bank.id),
                    Choice::TanMedium => tan_medium_key(bank.id),
                },
                None => {
                    *pending = true;
                    return Ok(());
                }
            }
        };
        repository::save_preference(self.conn, &key, value)
    }

    fn choose_sec_mech(&mut self, ret: &mut String) -> Result<()> {
        let options = SecMech::parse(ret)?;
        if options.is_empty() {
            return Err(BankSyncError::Protocol("bank offered no security mechanism".into()));
        }
        let ids: Vec<String> = options.iter().map(|m| m.id.clone()).collect();
        let remembered = lock(self.selections).sec_mech.clone();
        let chosen = match preselect(&ids, remembered.as_deref()) {
            Some(id) => id,
            None => {
                let selection = self.prompts.sec_mech.ask(options)?;
                self.remember(Choice::SecMech, &selection.value, selection.remember)?;
                selection.value
            }
        };
        tracing::debug!(target: "banking", sec_mech = %chosen, "security mechanism selected");
        replace(ret, &chosen);
        Ok(())
    }

    fn choose_tan_medium(&mut self, ret: &mut String) -> Result<()> {
        let options = parse_tan_media(ret);
        if options.is_empty() {
            return Err(BankSyncError::Protocol("bank offered no TAN medium".into()));
        }
        let remembered = lock(self.selections).tan_medium.clone();
        let chosen = match preselect(&options, remembered.as_deref()) {
            Some(medium) => medium,
            None => {
                let selection = self.prompts.tan_medium.ask(options)?;
                self.remember(Choice::TanMedium, &selection.value, selection.remember)?;
                selection.value
            }
        };
        replace(ret, &chosen);
        Ok(())
    }

    fn ask_tan(&self, request: TanRequest, ret: &mut String) -> Result<()> {
        let tan = self.prompts.tan.ask(request)?;
        replace(ret, &tan);
        Ok(())
    }
}

impl ProtocolCallback for SessionCallback<'_> {
    fn callback(&mut self, reason: CallbackReason, msg: &str, ret: &mut String) -> Result<()> {
        tracing::debug!(target: "banking", ?reason, "callback");
        match reason {
            CallbackReason::NeedPassphraseLoad
            | CallbackReason::NeedPassphraseSave
            | CallbackReason::NeedPtPin => replace(ret, &self.credentials.password),
            CallbackReason::NeedBlz => replace(ret, &self.credentials.blz),
            CallbackReason::NeedUserId | CallbackReason::NeedCustomerId => {
                replace(ret, &self.credentials.user)
            }
            CallbackReason::NeedPtPhotoTan | CallbackReason::NeedPtQrTan => {
                let code = MatrixCode::parse(ret)?;
                self.ask_tan(
                    TanRequest {
                        message: msg.to_string(),
                        challenge: Some(code),
                    },
                    ret,
                )?;
            }
            CallbackReason::NeedPtTan => {
                if !ret.is_empty() {
                    return Err(BankSyncError::UnsupportedChallenge("chipTAN flicker code".into()));
                }
                self.ask_tan(
                    TanRequest {
                        message: msg.to_string(),
                        challenge: None,
                    },
                    ret,
                )?;
            }
            CallbackReason::NeedPtSecMech => self.choose_sec_mech(ret)?,
            CallbackReason::NeedPtTanMedia => self.choose_tan_medium(ret)?,
            CallbackReason::NeedPtDecoupled => self.prompts.push_tan.ask(msg.to_string())?,
            CallbackReason::HaveError => tracing::error!(target: "banking", "{msg}"),
            CallbackReason::Other(_) => {}
        }
        Ok(())
    }

    fn status(&mut self, tag: &str, detail: &[String]) {
        tracing::debug!(target: "banking", status = tag, detail = ?detail);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::db::test_db;
    use crate::models::{Bank, HbciVersion};

    fn credentials(bank: Option<Bank>) -> BankingCredentials {
        let mut creds = BankingCredentials::new("12030000", "alice", "4711".into(), HbciVersion::Hbci300);
        creds.bank = bank;
        creds
    }

    /// Resolve the next published request of a slot from another thread.
    fn answer_when_published<Req, F>(mut rx: watch::Receiver<Option<Req>>, answer: F) -> std::thread::JoinHandle<Req>
    where
        Req: Clone + Send + Sync + 'static,
        F: FnOnce() + Send + 'static,
    {
        std::thread::spawn(move || loop {
            let current = rx.borrow_and_update().clone();
            if let Some(req) = current {
                answer();
                return req;
            }
            std::thread::sleep(Duration::from_millis(5));
        })
    }

    #[test]
    fn test_preselect_single_option() {
        assert_eq!(preselect(&["942".into()], None), Some("942".into()));
        assert_eq!(preselect(&["942".into()], Some("913")), Some("942".into()));
    }

    #[test]
    fn test_preselect_remembered_only_if_still_offered() {
        let options = vec!["912".to_string(), "913".to_string()];
        assert_eq!(preselect(&options, Some("913")), Some("913".into()));
        assert_eq!(preselect(&options, Some("920")), None);
        assert_eq!(preselect(&options, None), None);
    }

    #[test]
    fn test_submit_without_outstanding_request_is_noop() {
        let prompts = Prompts::new();
        assert!(!prompts.submit_tan(Some("123".into())));
        assert!(!prompts.submit_sec_mech(None));
        assert!(!prompts.confirm_push_tan());
        assert!(prompts.tan_requested().borrow().is_none());
    }

    #[test]
    fn test_tan_round_trip() {
        let prompts = Arc::new(Prompts::new());
        let answering = Arc::clone(&prompts);
        let waiter = answer_when_published(prompts.tan_requested(), move || {
            assert!(answering.submit_tan(Some("654321".into())));
        });
        let tan = prompts
            .tan
            .ask(TanRequest {
                message: "Enter TAN".into(),
                challenge: None,
            })
            .unwrap();
        assert_eq!(tan, "654321");
        assert_eq!(waiter.join().unwrap().message, "Enter TAN");
        assert!(prompts.tan_requested().borrow().is_none());
    }

    #[test]
    fn test_dismissed_prompt_is_cancellation() {
        let prompts = Arc::new(Prompts::new());
        let answering = Arc::clone(&prompts);
        answer_when_published(prompts.push_tan_requested(), move || {
            answering.cancel_push_tan();
        });
        let result = prompts.push_tan.ask("Confirm in app".into());
        assert!(matches!(result, Err(BankSyncError::PromptCancelled(PromptKind::PushTan))));
    }

    #[test]
    fn test_credentials_answer_static_requests() {
        let (_dir, conn) = test_db();
        let prompts = Prompts::new();
        let selections = Mutex::new(Selections::default());
        let creds = credentials(None);
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();

        let mut ret = String::from("stale");
        cb.callback(CallbackReason::NeedPtPin, "PIN", &mut ret).unwrap();
        assert_eq!(ret, "4711");
        cb.callback(CallbackReason::NeedBlz, "BLZ", &mut ret).unwrap();
        assert_eq!(ret, "12030000");
        cb.callback(CallbackReason::NeedCustomerId, "Kunden-ID", &mut ret).unwrap();
        assert_eq!(ret, "alice");
    }

    #[test]
    fn test_single_sec_mech_is_auto_selected() {
        let (_dir, conn) = test_db();
        let prompts = Prompts::new();
        let selections = Mutex::new(Selections::default());
        let creds = credentials(None);
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("942:mobileTAN");
        cb.callback(CallbackReason::NeedPtSecMech, "", &mut ret).unwrap();
        assert_eq!(ret, "942");
    }

    #[test]
    fn test_persisted_sec_mech_skips_prompt() {
        let (_dir, conn) = test_db();
        let bank = repository::create_bank(&conn, "12030000", "BYLADEM1001", "DKB", "alice").unwrap();
        repository::save_preference(&conn, &sec_mech_key(bank.id), "913").unwrap();
        let prompts = Prompts::new();
        let selections = Mutex::new(Selections::default());
        let creds = credentials(Some(bank));
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("912:chipTAN|913:QR");
        cb.callback(CallbackReason::NeedPtSecMech, "", &mut ret).unwrap();
        assert_eq!(ret, "913");
    }

    #[test]
    fn test_remembered_tan_medium_is_persisted_for_known_bank() {
        let (_dir, conn) = test_db();
        let bank = repository::create_bank(&conn, "12030000", "BYLADEM1001", "DKB", "alice").unwrap();
        let bank_id = bank.id;
        let prompts = Arc::new(Prompts::new());
        let selections = Mutex::new(Selections::default());
        let creds = credentials(Some(bank));

        let answering = Arc::clone(&prompts);
        let waiter = answer_when_published(prompts.tan_medium_requested(), move || {
            answering.submit_tan_medium(Some(Selection::remembered("Tablet")));
        });
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("Handy|Tablet");
        cb.callback(CallbackReason::NeedPtTanMedia, "", &mut ret).unwrap();

        assert_eq!(ret, "Tablet");
        assert_eq!(waiter.join().unwrap(), vec!["Handy".to_string(), "Tablet".to_string()]);
        assert_eq!(
            repository::load_preference(&conn, &tan_medium_key(bank_id)).unwrap().as_deref(),
            Some("Tablet")
        );
    }

    #[test]
    fn test_remembered_choice_waits_for_bank_id() {
        let (_dir, conn) = test_db();
        let prompts = Arc::new(Prompts::new());
        let selections = Mutex::new(Selections::default());
        let creds = credentials(None);

        let answering = Arc::clone(&prompts);
        answer_when_published(prompts.sec_mech_requested(), move || {
            answering.submit_sec_mech(Some(Selection::remembered("912")));
        });
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("912:chipTAN|913:QR");
        cb.callback(CallbackReason::NeedPtSecMech, "", &mut ret).unwrap();
        assert_eq!(ret, "912");

        persist_pending(&conn, &selections, 7).unwrap();
        assert_eq!(repository::load_preference(&conn, &sec_mech_key(7)).unwrap().as_deref(), Some("912"));
    }

    #[test]
    fn test_second_request_of_same_kind_is_refused() {
        let prompts = Arc::new(Prompts::new());
        let asking = Arc::clone(&prompts);
        let first = std::thread::spawn(move || {
            asking.tan.ask(TanRequest {
                message: "First".into(),
                challenge: None,
            })
        });
        let mut rx = prompts.tan_requested();
        while rx.borrow_and_update().is_none() {
            std::thread::sleep(Duration::from_millis(5));
        }

        let second = prompts.tan.ask(TanRequest {
            message: "Second".into(),
            challenge: None,
        });
        match second {
            Err(BankSyncError::Other(msg)) => assert_eq!(msg, "TAN entry is already waiting for an answer"),
            other => panic!("expected refusal, got {other:?}"),
        }
        assert_eq!(rx.borrow().as_ref().map(|r| r.message.clone()).as_deref(), Some("First"));

        assert!(prompts.submit_tan(Some("111111".into())));
        assert_eq!(first.join().unwrap().unwrap(), "111111");
    }

    #[test]
    fn test_photo_tan_publishes_decoded_image() {
        let (_dir, conn) = test_db();
        let prompts = Arc::new(Prompts::new());
        let selections = Mutex::new(Selections::default());
        let creds = credentials(None);
        let code = MatrixCode {
            mime_type: "image/png".into(),
            image: vec![0x89, b'P', b'N', b'G', 0x00, 0xff],
        };

        let answering = Arc::clone(&prompts);
        let waiter = answer_when_published(prompts.tan_requested(), move || {
            answering.submit_tan(Some("246810".into()));
        });
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        let mut ret = code.encode();
        cb.callback(CallbackReason::NeedPtPhotoTan, "Scan the graphic", &mut ret).unwrap();

        assert_eq!(ret, "246810");
        let request = waiter.join().unwrap();
        assert_eq!(request.message, "Scan the graphic");
        assert_eq!(request.challenge, Some(code));
    }

    #[test]
    fn test_choice_for_one_bank_is_not_applied_to_another() {
        let (_dir, conn) = test_db();
        let bank_a = repository::create_bank(&conn, "12030000", "BYLADEM1001", "DKB", "alice").unwrap();
        let bank_b = repository::create_bank(&conn, "10020030", "BELADEBEXXX", "Sparkasse", "alice").unwrap();
        let prompts = Arc::new(Prompts::new());
        let selections = Mutex::new(Selections::default());

        let answering = Arc::clone(&prompts);
        answer_when_published(prompts.sec_mech_requested(), move || {
            answering.submit_sec_mech(Some(Selection::once("913")));
        });
        let creds_a = credentials(Some(bank_a));
        let mut cb = SessionCallback::new(&creds_a, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("912:chipTAN|913:QR");
        cb.callback(CallbackReason::NeedPtSecMech, "", &mut ret).unwrap();
        assert_eq!(ret, "913");

        let answering = Arc::clone(&prompts);
        let waiter = answer_when_published(prompts.sec_mech_requested(), move || {
            answering.submit_sec_mech(Some(Selection::once("912")));
        });
        let creds_b = credentials(Some(bank_b));
        let mut cb = SessionCallback::new(&creds_b, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("912:chipTAN|913:QR");
        cb.callback(CallbackReason::NeedPtSecMech, "", &mut ret).unwrap();

        assert_eq!(ret, "912");
        assert_eq!(waiter.join().unwrap().len(), 2);
    }

    #[test]
    fn test_pending_choice_does_not_outlive_its_session() {
        let (_dir, conn) = test_db();
        let prompts = Arc::new(Prompts::new());
        let selections = Mutex::new(Selections::default());
        let creds = credentials(None);

        let answering = Arc::clone(&prompts);
        answer_when_published(prompts.sec_mech_requested(), move || {
            answering.submit_sec_mech(Some(Selection::remembered("912")));
        });
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("912:chipTAN|913:QR");
        cb.callback(CallbackReason::NeedPtSecMech, "", &mut ret).unwrap();

        // The next add-bank attempt starts clean.
        SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        assert_eq!(*lock(&selections), Selections::default());
        persist_pending(&conn, &selections, 7).unwrap();
        assert_eq!(repository::load_preference(&conn, &sec_mech_key(7)).unwrap(), None);

        lock(&selections).sec_mech = Some("913".into());
        forget(&selections);
        assert_eq!(*lock(&selections), Selections::default());
    }

    #[test]
    fn test_flicker_challenge_is_unsupported() {
        let (_dir, conn) = test_db();
        let prompts = Prompts::new();
        let selections = Mutex::new(Selections::default());
        let creds = credentials(None);
        let mut cb = SessionCallback::new(&creds, &prompts, &selections, &conn).unwrap();
        let mut ret = String::from("0388A01239230520422");
        let result = cb.callback(CallbackReason::NeedPtTan, "TAN", &mut ret);
        assert!(matches!(result, Err(BankSyncError::UnsupportedChallenge(_))));
    }
}
