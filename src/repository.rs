use rusqlite::{Connection, OptionalExtension};

use crate::attributes::{Attribute, Attributes};
use crate::error::{BankSyncError, Result};
use crate::models::{Account, AccountInformation, AccountKind, Bank, NewTransaction};

// ---------------------------------------------------------------------------
// Banks
// ---------------------------------------------------------------------------

fn row_to_bank(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bank> {
    Ok(Bank {
        id: row.get(0)?,
        blz: row.get(1)?,
        bic: row.get(2)?,
        name: row.get(3)?,
        user_id: row.get(4)?,
    })
}

pub fn create_bank(conn: &Connection, blz: &str, bic: &str, name: &str, user_id: &str) -> Result<Bank> {
    conn.execute(
        "INSERT INTO banks (blz, bic, name, user_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![blz, bic, name, user_id],
    )?;
    Ok(Bank {
        id: conn.last_insert_rowid(),
        blz: blz.to_string(),
        bic: bic.to_string(),
        name: name.to_string(),
        user_id: user_id.to_string(),
    })
}

pub fn load_bank(conn: &Connection, id: i64) -> Result<Bank> {
    conn.query_row(
        "SELECT id, blz, bic, name, user_id FROM banks WHERE id = ?1",
        [id],
        row_to_bank,
    )
    .optional()?
    .ok_or(BankSyncError::UnknownBank(id))
}

pub fn load_banks(conn: &Connection) -> Result<Vec<Bank>> {
    let mut stmt = conn.prepare("SELECT id, blz, bic, name, user_id FROM banks ORDER BY name, user_id")?;
    let banks = stmt
        .query_map([], row_to_bank)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(banks)
}

pub fn bank_exists(conn: &Connection, blz: &str, user_id: &str) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM banks WHERE blz = ?1 AND user_id = ?2")?;
    Ok(stmt.exists(rusqlite::params![blz, user_id])?)
}

/// Remove a bank. Linked accounts keep their history but lose the link.
pub fn delete_bank(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("UPDATE accounts SET bank_id = NULL WHERE bank_id = ?1", [id])?;
    let deleted = conn.execute("DELETE FROM banks WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(BankSyncError::UnknownBank(id));
    }
    conn.execute(
        "DELETE FROM preferences WHERE key IN (?1, ?2)",
        rusqlite::params![
            format!("selectedSecMech_{id}"),
            format!("selectedTanMedium_{id}")
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        label: row.get(1)?,
        currency: row.get(2)?,
        opening_balance: row.get(3)?,
        kind: AccountKind::from_key(&row.get::<_, String>(4)?),
        bank_id: row.get(5)?,
    })
}

const ACCOUNT_COLUMNS: &str = "id, label, currency, opening_balance, account_type, bank_id";

pub fn create_account(
    conn: &Connection,
    label: &str,
    currency: &str,
    opening_balance: i64,
    kind: AccountKind,
    bank_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO accounts (label, currency, opening_balance, account_type, bank_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![label, currency, opening_balance, kind.key(), bank_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_account(conn: &Connection, id: i64) -> Result<Option<Account>> {
    Ok(conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            [id],
            row_to_account,
        )
        .optional()?)
}

pub fn load_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"))?;
    let accounts = stmt
        .query_map([], row_to_account)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Local accounts that could receive an import: not cash, not yet tied to a bank.
pub fn linkable_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_type != 'CASH' AND bank_id IS NULL ORDER BY id"
    ))?;
    let accounts = stmt
        .query_map([], row_to_account)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts)
}

pub fn link_account_to_bank(conn: &Connection, account_id: i64, bank_id: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE accounts SET bank_id = ?1 WHERE id = ?2",
        rusqlite::params![bank_id, account_id],
    )?;
    if updated == 0 {
        return Err(BankSyncError::UnknownAccount(account_id));
    }
    Ok(())
}

fn information_from(attrs: &Attributes) -> AccountInformation {
    AccountInformation {
        number: attrs.get(&Attribute::Number).cloned(),
        subnumber: attrs.get(&Attribute::Subnumber).cloned(),
        iban: attrs.get(&Attribute::Iban).cloned(),
        last_synced: attrs
            .get(&Attribute::LastSyncedWithBank)
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
    }
}

/// Bank identity of an account, `None` when the account does not exist or
/// was never linked to a bank account.
pub fn account_information(conn: &Connection, account_id: i64) -> Result<Option<AccountInformation>> {
    if load_account(conn, account_id)?.is_none() {
        return Ok(None);
    }
    let attrs = account_attributes(conn, account_id)?;
    let info = information_from(&attrs);
    if info.iban.is_none() && info.number.is_none() {
        return Ok(None);
    }
    Ok(Some(info))
}

/// Identities of all accounts already imported from the given bank.
pub fn imported_accounts(conn: &Connection, bank_id: i64) -> Result<Vec<AccountInformation>> {
    let mut stmt = conn.prepare("SELECT id FROM accounts WHERE bank_id = ?1")?;
    let ids: Vec<i64> = stmt
        .query_map([bank_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut imported = Vec::with_capacity(ids.len());
    for id in ids {
        imported.push(information_from(&account_attributes(conn, id)?));
    }
    Ok(imported)
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

fn attribute_id(conn: &Connection, attr: Attribute) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO attributes (name, context) VALUES (?1, ?2)",
        rusqlite::params![attr.key(), attr.context()],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM attributes WHERE name = ?1 AND context = ?2",
        rusqlite::params![attr.key(), attr.context()],
        |row| row.get(0),
    )?)
}

pub fn save_account_attributes(conn: &Connection, account_id: i64, attrs: &Attributes) -> Result<()> {
    for (attr, value) in attrs {
        let attribute_id = attribute_id(conn, *attr)?;
        conn.execute(
            "INSERT INTO account_attributes (account_id, attribute_id, value) VALUES (?1, ?2, ?3) \
             ON CONFLICT (account_id, attribute_id) DO UPDATE SET value = excluded.value",
            rusqlite::params![account_id, attribute_id, value],
        )?;
    }
    Ok(())
}

fn collect_attributes(mut stmt: rusqlite::CachedStatement<'_>, owner_id: i64) -> Result<Attributes> {
    let pairs: Vec<(String, String)> = stmt
        .query_map([owner_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(pairs
        .into_iter()
        .filter_map(|(name, value)| Attribute::from_key(&name).map(|a| (a, value)))
        .collect())
}

pub fn account_attributes(conn: &Connection, account_id: i64) -> Result<Attributes> {
    let stmt = conn.prepare_cached(
        "SELECT a.name, aa.value FROM account_attributes aa \
         JOIN attributes a ON a.id = aa.attribute_id WHERE aa.account_id = ?1",
    )?;
    collect_attributes(stmt, account_id)
}

pub fn save_transaction_attributes(conn: &Connection, transaction_id: i64, attrs: &Attributes) -> Result<()> {
    for (attr, value) in attrs {
        let attribute_id = attribute_id(conn, *attr)?;
        conn.execute(
            "INSERT INTO transaction_attributes (transaction_id, attribute_id, value) VALUES (?1, ?2, ?3) \
             ON CONFLICT (transaction_id, attribute_id) DO UPDATE SET value = excluded.value",
            rusqlite::params![transaction_id, attribute_id, value],
        )?;
    }
    Ok(())
}

pub fn transaction_attributes(conn: &Connection, transaction_id: i64) -> Result<Attributes> {
    let stmt = conn.prepare_cached(
        "SELECT a.name, ta.value FROM transaction_attributes ta \
         JOIN attributes a ON a.id = ta.attribute_id WHERE ta.transaction_id = ?1",
    )?;
    collect_attributes(stmt, transaction_id)
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

pub fn insert_transaction(conn: &Connection, txn: &NewTransaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (account_id, amount, date, value_date, payee, comment, reference) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            txn.account_id,
            txn.amount,
            txn.date,
            txn.value_date,
            txn.payee,
            txn.comment,
            txn.reference,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_transactions(conn: &Connection, account_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT count(*) FROM transactions WHERE account_id = ?1",
        [account_id],
        |r| r.get(0),
    )?)
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

pub fn load_preference(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM preferences WHERE key = ?1", [key], |r| r.get(0))
        .optional()?)
}

pub fn save_preference(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO preferences (key, value) VALUES (?1, ?2) \
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}
