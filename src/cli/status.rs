use crate::db;
use crate::error::Result;
use crate::settings::{settings_file_exists, Settings};

fn count(conn: &rusqlite::Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
}

pub fn run(settings: &Settings) -> Result<()> {
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Passports:  {}", settings.passport_dir().display());
    println!(
        "Backend:    {}",
        settings.sandbox.as_deref().map_or("(not configured)".to_string(), |p| format!("sandbox ({p})"))
    );
    println!("HBCI:       {}", settings.default_hbci_version.id());

    if !settings_file_exists() || !db_path.exists() {
        println!();
        println!("Database not found. Run `banksync init` to set up.");
        return Ok(());
    }

    let conn = db::get_connection(&db_path)?;
    println!();
    println!("Banks:         {}", count(&conn, "banks")?);
    println!("Accounts:      {}", count(&conn, "accounts")?);
    println!("Transactions:  {}", count(&conn, "transactions")?);
    Ok(())
}
