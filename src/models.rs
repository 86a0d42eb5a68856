use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum HbciVersion {
    #[default]
    #[value(name = "300")]
    #[serde(rename = "300")]
    Hbci300,
    #[value(name = "220")]
    #[serde(rename = "220")]
    Hbci220,
    #[value(name = "210")]
    #[serde(rename = "210")]
    Hbci210,
    #[value(name = "201")]
    #[serde(rename = "201")]
    Hbci201,
}

impl HbciVersion {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Hbci300 => "300",
            Self::Hbci220 => "220",
            Self::Hbci210 => "210",
            Self::Hbci201 => "201",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    pub id: i64,
    pub blz: String,
    pub bic: String,
    pub name: String,
    pub user_id: String,
}

/// What the user typed in to reach one bank. Fixed for a single sync attempt.
#[derive(Clone)]
pub struct BankingCredentials {
    pub blz: String,
    pub user: String,
    pub password: Zeroizing<String>,
    pub hbci_version: HbciVersion,
    pub bank: Option<Bank>,
}

impl BankingCredentials {
    pub fn new(blz: &str, user: &str, password: String, hbci_version: HbciVersion) -> Self {
        Self {
            blz: blz.trim().to_string(),
            user: user.trim().to_string(),
            password: Zeroizing::new(password),
            hbci_version,
            bank: None,
        }
    }

    /// Credentials for a bank that is already stored locally.
    pub fn for_bank(bank: &Bank, password: String, hbci_version: HbciVersion) -> Self {
        Self {
            blz: bank.blz.clone(),
            user: bank.user_id.clone(),
            password: Zeroizing::new(password),
            hbci_version,
            bank: Some(bank.clone()),
        }
    }

    pub fn is_new(&self) -> bool {
        self.bank.is_none()
    }

    /// The routing number to report in events, preferring the stored bank.
    pub fn event_blz(&self) -> &str {
        self.bank.as_ref().map_or(self.blz.as_str(), |b| b.blz.as_str())
    }
}

impl std::fmt::Debug for BankingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankingCredentials")
            .field("blz", &self.blz)
            .field("user", &self.user)
            .field("password", &"***")
            .field("hbci_version", &self.hbci_version)
            .field("bank", &self.bank.as_ref().map(|b| b.id))
            .finish()
    }
}

/// An account as the bank reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccount {
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub subnumber: Option<String>,
    #[serde(default)]
    pub blz: String,
    #[serde(default)]
    pub bic: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl RemoteAccount {
    pub fn display_id(&self) -> String {
        self.iban
            .clone()
            .or_else(|| self.number.clone())
            .unwrap_or_else(|| "?".to_string())
    }

    /// Same IBAN, or same number/subnumber pair.
    pub fn matches(&self, info: &AccountInformation) -> bool {
        let same_iban = matches!((&self.iban, &info.iban), (Some(a), Some(b)) if a == b);
        let same_number = self.number.is_some()
            && self.number == info.number
            && self.subnumber == info.subnumber;
        same_iban || same_number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Cash,
    Bank,
    Credit,
}

impl AccountKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Bank => "BANK",
            Self::Credit => "CCARD",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "CASH" => Self::Cash,
            "CCARD" => Self::Credit,
            _ => Self::Bank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub label: String,
    pub currency: String,
    pub opening_balance: i64,
    pub kind: AccountKind,
    pub bank_id: Option<i64>,
}

/// Bank-side identity of a local account, read back from its attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInformation {
    pub number: Option<String>,
    pub subnumber: Option<String>,
    pub iban: Option<String>,
    pub last_synced: Option<NaiveDate>,
}

/// A converted statement line ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub account_id: i64,
    /// Minor units; credits positive, debits negative.
    pub amount: i64,
    /// Epoch seconds of the booking day at local midnight.
    pub date: i64,
    pub value_date: i64,
    pub payee: Option<String>,
    pub comment: Option<String>,
    pub reference: Option<String>,
}
