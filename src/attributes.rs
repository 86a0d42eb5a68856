use std::collections::BTreeMap;

/// Keys stored against accounts and transactions that came from a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    // account level
    Iban,
    Number,
    Subnumber,
    Blz,
    Bic,
    Name,
    Owner,
    Currency,
    LastSyncedWithBank,
    // statement line level
    Checksum,
    ValueDate,
    BookingText,
    GvCode,
    Primanota,
    CustomerRef,
    InstituteRef,
    EndToEndRef,
    MandateRef,
    CreditorId,
    CounterpartIban,
    CounterpartBic,
    Balance,
    Reversal,
}

pub type Attributes = BTreeMap<Attribute, String>;

const ALL: &[Attribute] = &[
    Attribute::Iban,
    Attribute::Number,
    Attribute::Subnumber,
    Attribute::Blz,
    Attribute::Bic,
    Attribute::Name,
    Attribute::Owner,
    Attribute::Currency,
    Attribute::LastSyncedWithBank,
    Attribute::Checksum,
    Attribute::ValueDate,
    Attribute::BookingText,
    Attribute::GvCode,
    Attribute::Primanota,
    Attribute::CustomerRef,
    Attribute::InstituteRef,
    Attribute::EndToEndRef,
    Attribute::MandateRef,
    Attribute::CreditorId,
    Attribute::CounterpartIban,
    Attribute::CounterpartBic,
    Attribute::Balance,
    Attribute::Reversal,
];

impl Attribute {
    /// Name persisted in the `attributes` table. These strings are part of
    /// the database format and must not change.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Iban => "IBAN",
            Self::Number => "NUMBER",
            Self::Subnumber => "SUBNUMBER",
            Self::Blz => "BLZ",
            Self::Bic => "BIC",
            Self::Name => "NAME",
            Self::Owner => "OWNER",
            Self::Currency => "CURRENCY",
            Self::LastSyncedWithBank => "LAST_SYCNED_WITH_BANK",
            Self::Checksum => "CHECKSUM",
            Self::ValueDate => "VALUE_DATE",
            Self::BookingText => "BOOKING_TEXT",
            Self::GvCode => "GV_CODE",
            Self::Primanota => "PRIMANOTA",
            Self::CustomerRef => "CUSTOMER_REF",
            Self::InstituteRef => "INSTITUTE_REF",
            Self::EndToEndRef => "END_TO_END_REF",
            Self::MandateRef => "MANDATE_REF",
            Self::CreditorId => "CREDITOR_ID",
            Self::CounterpartIban => "COUNTERPART_IBAN",
            Self::CounterpartBic => "COUNTERPART_BIC",
            Self::Balance => "BALANCE",
            Self::Reversal => "REVERSAL",
        }
    }

    /// `banking` for account attributes, `fints` for statement line attributes.
    pub fn context(&self) -> &'static str {
        match self {
            Self::Iban
            | Self::Number
            | Self::Subnumber
            | Self::Blz
            | Self::Bic
            | Self::Name
            | Self::Owner
            | Self::Currency
            | Self::LastSyncedWithBank => "banking",
            _ => "fints",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        ALL.iter().find(|a| a.key() == key).copied()
    }
}
