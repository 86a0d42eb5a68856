use rusqlite::Connection;

use crate::attributes::Attribute;
use crate::banking::converter;
use crate::error::Result;
use crate::models::NewTransaction;
use crate::protocol::StatementLine;

/// Already stored: same account, amount and day, and the same checksum.
pub fn is_duplicate(conn: &Connection, txn: &NewTransaction, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM transactions t \
         JOIN transaction_attributes ta ON ta.transaction_id = t.id \
         JOIN attributes a ON a.id = ta.attribute_id \
         WHERE t.account_id = ?1 AND t.amount = ?2 AND t.date = ?3 \
         AND a.name = ?4 AND ta.value = ?5",
    )?;
    Ok(stmt.exists(rusqlite::params![
        txn.account_id,
        txn.amount,
        txn.date,
        Attribute::Checksum.key(),
        checksum
    ])?)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub imported: usize,
    pub skipped: usize,
}

/// Convert, filter out duplicates and store `lines` in one transaction.
pub fn persist_unique(conn: &Connection, account_id: i64, lines: &[StatementLine]) -> Result<PersistOutcome> {
    let tx = conn.unchecked_transaction()?;
    let mut outcome = PersistOutcome::default();
    for line in lines {
        tracing::debug!(target: "banking", %line, "statement line");
        let (txn, attrs) = converter::convert(line, account_id);
        let checksum = attrs
            .get(&Attribute::Checksum)
            .cloned()
            .unwrap_or_else(|| converter::checksum(line));
        if is_duplicate(&tx, &txn, &checksum)? {
            outcome.skipped += 1;
            continue;
        }
        let id = crate::repository::insert_transaction(&tx, &txn)?;
        crate::repository::save_transaction_attributes(&tx, id, &attrs)?;
        outcome.imported += 1;
    }
    tx.commit()?;
    Ok(outcome)
}
