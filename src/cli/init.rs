use crate::db;
use crate::error::Result;
use crate::settings::{save_settings, shellexpand_path, Settings};

pub fn run(mut settings: Settings, data_dir: Option<String>) -> Result<()> {
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    save_settings(&settings)?;

    let resolved = settings.data_path();
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(settings.passport_dir())?;
    db::open(&settings.db_path())?;

    println!("Initialized banksync at {}", resolved.display());
    Ok(())
}
