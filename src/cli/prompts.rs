//! Terminal side of the prompt slots: shows what the bank asks for and
//! submits the answer while an operation runs.

use std::future::Future;
use std::path::{Path, PathBuf};

use colored::Colorize;
use dialoguer::{Confirm, Input, Select};

use crate::banking::{Banking, Selection, TanRequest, WorkState};
use crate::error::{BankSyncError, Result};
use crate::protocol::codes::SecMech;

/// Await `operation`, answering every prompt it raises on the terminal.
pub async fn drive<F>(banking: &Banking, challenge_dir: &Path, operation: F) -> Result<WorkState>
where
    F: Future<Output = WorkState>,
{
    let mut tan = banking.prompts().tan_requested();
    let mut media = banking.prompts().tan_medium_requested();
    let mut mechs = banking.prompts().sec_mech_requested();
    let mut push = banking.prompts().push_tan_requested();
    let mut progress = banking.work_state();
    tokio::pin!(operation);

    loop {
        tokio::select! {
            state = &mut operation => return Ok(state),
            Ok(()) = progress.changed() => {
                if let WorkState::Loading(Some(message)) = &*progress.borrow_and_update() {
                    println!("{}", message.dimmed());
                }
            }
            Ok(()) = tan.changed() => {
                let request = tan.borrow_and_update().clone();
                if let Some(request) = request {
                    let dir = challenge_dir.to_path_buf();
                    let answer = blocking(move || ask_tan(&request, &dir)).await?;
                    banking.submit_tan(answer);
                }
            }
            Ok(()) = media.changed() => {
                let offered = media.borrow_and_update().clone();
                if let Some(offered) = offered {
                    let answer = blocking(move || choose("TAN medium", &offered, &offered)).await?;
                    banking.submit_tan_medium(answer);
                }
            }
            Ok(()) = mechs.changed() => {
                let offered = mechs.borrow_and_update().clone();
                if let Some(offered) = offered {
                    let answer = blocking(move || choose_sec_mech(&offered)).await?;
                    banking.submit_sec_mech(answer);
                }
            }
            Ok(()) = push.changed() => {
                let message = push.borrow_and_update().clone();
                if let Some(message) = message {
                    if blocking(move || confirm_push(&message)).await? {
                        banking.confirm_push_tan();
                    } else {
                        banking.cancel_push_tan();
                    }
                }
            }
        }
    }
}

async fn blocking<T, F>(ask: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(ask)
        .await
        .map_err(|e| BankSyncError::Other(format!("prompt failed: {e}")))
}

fn save_challenge(request: &TanRequest, dir: &Path) -> Option<PathBuf> {
    let code = request.challenge.as_ref()?;
    let path = dir.join(format!(
        "challenge-{}.{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S"),
        code.extension()
    ));
    let written = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, &code.image));
    match written {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not save challenge image");
            None
        }
    }
}

/// Empty input dismisses the prompt.
fn ask_tan(request: &TanRequest, challenge_dir: &Path) -> Option<String> {
    println!("\n{}", request.message.bold());
    if let Some(path) = save_challenge(request, challenge_dir) {
        println!("Scan the challenge image: {}", path.display());
    }
    let tan: String = Input::new()
        .with_prompt("TAN (Enter to cancel)")
        .allow_empty(true)
        .interact_text()
        .unwrap_or_default();
    let tan = tan.trim().to_string();
    (!tan.is_empty()).then_some(tan)
}

fn choose(what: &str, labels: &[String], values: &[String]) -> Option<Selection> {
    let index = Select::new()
        .with_prompt(format!("Select {what} (Esc to cancel)"))
        .items(labels)
        .default(0)
        .interact_opt()
        .ok()
        .flatten()?;
    let value = values.get(index)?;
    let remember = Confirm::new()
        .with_prompt("Remember this choice for this bank?")
        .default(true)
        .interact()
        .unwrap_or(false);
    Some(Selection {
        value: value.clone(),
        remember,
    })
}

fn choose_sec_mech(offered: &[SecMech]) -> Option<Selection> {
    let labels: Vec<String> = offered.iter().map(ToString::to_string).collect();
    let ids: Vec<String> = offered.iter().map(|m| m.id.clone()).collect();
    choose("security mechanism", &labels, &ids)
}

fn confirm_push(message: &str) -> bool {
    println!("\n{}", message.bold());
    Confirm::new()
        .with_prompt("Confirmed in your banking app?")
        .default(true)
        .interact()
        .unwrap_or(false)
}
