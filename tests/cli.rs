use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Runs the binary with an isolated HOME so settings never leak between tests.
fn banksync(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("banksync").unwrap();
    cmd.env("HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data = home.path().join("data");
    banksync(&home)
        .args(["init", "--data-dir", data.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized banksync at"));
    home
}

#[test]
fn test_init_creates_database_and_settings() {
    let home = initialized();
    assert!(home.path().join("data").join("banksync.db").exists());
    assert!(home.path().join("data").join("passports").is_dir());
    let settings = std::fs::read_to_string(home.path().join(".config/banksync/settings.json")).unwrap();
    assert!(settings.contains("\"data_dir\""));
}

#[test]
fn test_status_before_init() {
    let home = tempfile::tempdir().unwrap();
    banksync(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run `banksync init`"));
}

#[test]
fn test_status_after_init() {
    let home = initialized();
    banksync(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Banks:         0"))
        .stdout(predicate::str::contains("(not configured)"));
}

#[test]
fn test_empty_lists() {
    let home = initialized();
    banksync(&home)
        .args(["banks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No banks yet"));
    banksync(&home)
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts yet"));
}

#[test]
fn test_add_bank_requires_backend() {
    let home = initialized();
    banksync(&home)
        .args(["banks", "add", "--blz", "12030000", "--user", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no protocol backend configured"));
}

#[test]
fn test_sync_unknown_account() {
    let home = initialized();
    let bank = home.path().join("bank.json");
    std::fs::write(&bank, r#"{"banks": []}"#).unwrap();
    let settings_path = home.path().join(".config/banksync/settings.json");
    let mut settings: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&settings_path).unwrap()).unwrap();
    settings["sandbox"] = serde_json::Value::String(bank.to_string_lossy().to_string());
    std::fs::write(&settings_path, settings.to_string()).unwrap();

    banksync(&home)
        .args(["sync", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown account: 7"));
}

#[test]
fn test_rejects_unknown_hbci_version() {
    let home = initialized();
    banksync(&home)
        .args(["banks", "add", "--blz", "12030000", "--user", "alice", "--hbci-version", "400"])
        .assert()
        .failure();
}
