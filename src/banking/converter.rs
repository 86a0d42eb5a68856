use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

use crate::attributes::{Attribute, Attributes};
use crate::models::{NewTransaction, RemoteAccount};
use crate::protocol::StatementLine;

/// Epoch seconds of local midnight on `date`.
pub fn local_midnight(date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp(),
        // midnight skipped by a DST jump
        None => Utc.from_utc_datetime(&midnight).timestamp(),
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Stable fingerprint of everything the bank reported for a line.
pub fn checksum(line: &StatementLine) -> String {
    let fields = [
        line.booking_date.to_string(),
        line.value_date.to_string(),
        line.amount.to_string(),
        line.currency.clone(),
        line.balance.map(|b| b.to_string()).unwrap_or_default(),
        opt(&line.gv_code).to_string(),
        opt(&line.booking_text).to_string(),
        line.purpose.join("\n"),
        opt(&line.counterpart.name).to_string(),
        opt(&line.counterpart.iban).to_string(),
        opt(&line.counterpart.bic).to_string(),
        opt(&line.customer_ref).to_string(),
        opt(&line.institute_ref).to_string(),
        opt(&line.primanota).to_string(),
        opt(&line.end_to_end_ref).to_string(),
        opt(&line.mandate_ref).to_string(),
        opt(&line.creditor_id).to_string(),
        line.reversal.to_string(),
    ];
    let mut hasher = Sha256::new();
    for field in &fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Placeholder references banks send when there is none.
fn real_reference(value: &Option<String>) -> Option<String> {
    non_empty(value).filter(|v| v != "NONREF" && v != "NOTPROVIDED")
}

pub fn convert(line: &StatementLine, account_id: i64) -> (NewTransaction, Attributes) {
    let purpose: Vec<&str> = line
        .purpose
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    let txn = NewTransaction {
        account_id,
        amount: line.amount,
        date: local_midnight(line.booking_date),
        value_date: local_midnight(line.value_date),
        payee: non_empty(&line.counterpart.name),
        comment: (!purpose.is_empty()).then(|| purpose.join(" ")),
        reference: real_reference(&line.customer_ref),
    };

    let mut attrs = Attributes::new();
    attrs.insert(Attribute::Checksum, checksum(line));
    attrs.insert(Attribute::ValueDate, line.value_date.format("%Y-%m-%d").to_string());
    let optional = [
        (Attribute::BookingText, non_empty(&line.booking_text)),
        (Attribute::GvCode, non_empty(&line.gv_code)),
        (Attribute::Primanota, non_empty(&line.primanota)),
        (Attribute::CustomerRef, real_reference(&line.customer_ref)),
        (Attribute::InstituteRef, non_empty(&line.institute_ref)),
        (Attribute::EndToEndRef, real_reference(&line.end_to_end_ref)),
        (Attribute::MandateRef, non_empty(&line.mandate_ref)),
        (Attribute::CreditorId, non_empty(&line.creditor_id)),
        (Attribute::CounterpartIban, non_empty(&line.counterpart.iban)),
        (Attribute::CounterpartBic, non_empty(&line.counterpart.bic)),
        (Attribute::Balance, line.balance.map(|b| b.to_string())),
        (Attribute::Reversal, line.reversal.then(|| "true".to_string())),
    ];
    for (attr, value) in optional {
        if let Some(value) = value {
            attrs.insert(attr, value);
        }
    }
    (txn, attrs)
}

/// Attributes identifying a local account with its remote counterpart.
pub fn account_attributes(remote: &RemoteAccount) -> Attributes {
    let mut attrs = Attributes::new();
    let fields = [
        (Attribute::Iban, remote.iban.clone()),
        (Attribute::Number, remote.number.clone()),
        (Attribute::Subnumber, remote.subnumber.clone()),
        (Attribute::Blz, Some(remote.blz.clone()).filter(|b| !b.is_empty())),
        (Attribute::Bic, remote.bic.clone()),
        (Attribute::Name, remote.name.clone()),
        (Attribute::Owner, remote.owner.clone()),
        (Attribute::Currency, Some(remote.currency.clone()).filter(|c| !c.is_empty())),
    ];
    for (attr, value) in fields {
        if let Some(value) = value {
            attrs.insert(attr, value);
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sandbox::fixtures::line;

    #[test]
    fn test_convert_basic_line() {
        let mut l = line(5, -1250, "REWE Markt");
        l.purpose = vec!["REWE SAGT DANKE".into(), "  ".into(), "Filiale 123".into()];
        l.customer_ref = Some("NONREF".into());

        let (txn, attrs) = convert(&l, 3);
        assert_eq!(txn.account_id, 3);
        assert_eq!(txn.amount, -1250);
        assert_eq!(txn.payee.as_deref(), Some("REWE Markt"));
        assert_eq!(txn.comment.as_deref(), Some("REWE SAGT DANKE Filiale 123"));
        assert_eq!(txn.reference, None);
        assert_eq!(txn.date, local_midnight(l.booking_date));
        assert_eq!(attrs.get(&Attribute::ValueDate).map(String::as_str), Some("2024-03-05"));
        assert_eq!(attrs.get(&Attribute::GvCode).map(String::as_str), Some("106"));
        assert!(!attrs.contains_key(&Attribute::CustomerRef));
        assert!(!attrs.contains_key(&Attribute::Reversal));
    }

    #[test]
    fn test_local_midnight_is_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let dt = Local.timestamp_opt(local_midnight(date), 0).unwrap();
        assert_eq!(dt.date_naive(), date);
        assert_eq!(dt.time(), NaiveTime::MIN);
    }

    #[test]
    fn test_checksum_is_stable_and_sensitive() {
        let a = line(5, -1250, "REWE Markt");
        assert_eq!(checksum(&a), checksum(&a.clone()));
        assert_eq!(checksum(&a).len(), 64);

        let mut b = a.clone();
        b.purpose.push("extra".into());
        assert_ne!(checksum(&a), checksum(&b));

        let mut c = a.clone();
        c.counterpart.name = Some("REWE Mark".into());
        assert_ne!(checksum(&a), checksum(&c));
    }

    #[test]
    fn test_reversal_and_counterpart_attributes() {
        let mut l = line(7, 1250, "REWE Markt");
        l.reversal = true;
        l.counterpart.iban = Some("DE89370400440532013000".into());
        l.end_to_end_ref = Some("NOTPROVIDED".into());
        l.balance = Some(98_750);

        let (_, attrs) = convert(&l, 1);
        assert_eq!(attrs.get(&Attribute::Reversal).map(String::as_str), Some("true"));
        assert_eq!(
            attrs.get(&Attribute::CounterpartIban).map(String::as_str),
            Some("DE89370400440532013000")
        );
        assert_eq!(attrs.get(&Attribute::Balance).map(String::as_str), Some("98750"));
        assert!(!attrs.contains_key(&Attribute::EndToEndRef));
    }

    #[test]
    fn test_account_attributes_skip_missing() {
        let remote = RemoteAccount {
            iban: Some("DE02120300000000202051".into()),
            blz: "12030000".into(),
            currency: "EUR".into(),
            ..Default::default()
        };
        let attrs = account_attributes(&remote);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get(&Attribute::Blz).map(String::as_str), Some("12030000"));
        assert!(!attrs.contains_key(&Attribute::Number));
    }
}
