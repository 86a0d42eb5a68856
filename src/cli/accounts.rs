use comfy_table::{Cell, Table};

use crate::attributes::Attribute;
use crate::db;
use crate::error::Result;
use crate::repository;
use crate::settings::Settings;

fn money(minor: i64, currency: &str) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    format!("{sign}{}.{:02} {currency}", minor.abs() / 100, minor.abs() % 100)
}

pub fn list(settings: &Settings) -> Result<()> {
    let conn = db::open(&settings.db_path())?;
    let accounts = repository::load_accounts(&conn)?;
    if accounts.is_empty() {
        println!("No accounts yet. Import some with `banksync banks import <bank-id>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Label", "Type", "Opening", "Bank", "IBAN", "Last synced"]);
    for account in accounts {
        let attrs = repository::account_attributes(&conn, account.id)?;
        let get = |attr: Attribute| attrs.get(&attr).cloned().unwrap_or_default();
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(&account.label),
            Cell::new(account.kind.key()),
            Cell::new(money(account.opening_balance, &account.currency)),
            Cell::new(account.bank_id.map(|id| id.to_string()).unwrap_or_default()),
            Cell::new(get(Attribute::Iban)),
            Cell::new(get(Attribute::LastSyncedWithBank)),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money() {
        assert_eq!(money(123_456, "EUR"), "1234.56 EUR");
        assert_eq!(money(-5, "EUR"), "-0.05 EUR");
        assert_eq!(money(0, "USD"), "0.00 USD");
    }
}
