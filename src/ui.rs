// UI layer: the terminal version of the mint form. `dialoguer` collects
// the fields, an `indicatif` spinner shows the in-progress message and
// `crossterm` colours the final link or the error alert.

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflow::{StatusObserver, SubmissionInput, Workflow, WorkflowState};

/// Main loop: show the form, run the submission, show the result. Ends
/// when the user picks "Exit".
pub async fn main_menu(mut workflow: Workflow) -> Result<()> {
    loop {
        let items = vec!["Mint an NFT", "Exit"];
        let selection = Select::new().items(&items).default(0).interact()?;
        if selection != 0 {
            break;
        }

        let input = match collect_submission().await {
            Ok(input) => input,
            Err(e) => {
                println!("{}", format!("Could not read the form: {}", e).red());
                continue;
            }
        };

        let mut spinner = Spinner::start();
        let result = workflow.submit(&input, &mut spinner).await;
        spinner.finish();

        match result {
            Ok(link) => {
                if !show_complete(&link)? {
                    break;
                }
                workflow.mint_another();
            }
            Err(e) => {
                // The log line carries the failing step; the user only
                // gets the generic alert.
                println!("{}", e.user_message().red().bold());
            }
        }
    }
    Ok(())
}

/// Ask for the wallet that receives the token when none is configured.
pub fn prompt_wallet() -> Result<String> {
    let wallet: String = Input::new()
        .with_prompt("Wallet address (0x...)")
        .validate_with(|w: &String| -> std::result::Result<(), &'static str> {
            if w.starts_with("0x") && w.len() > 2 {
                Ok(())
            } else {
                Err("expected a 0x-prefixed address")
            }
        })
        .interact_text()?;
    Ok(wallet)
}

/// The form fields, then the file read into memory.
async fn collect_submission() -> Result<SubmissionInput> {
    let path = pick_file()?;
    let name: String = Input::new()
        .with_prompt("Name")
        .interact_text()?;
    let description: String = Input::new()
        .with_prompt("Description")
        .interact_text()?;
    let external_url: String = Input::new()
        .with_prompt("Your Website")
        .allow_empty(true)
        .interact_text()?;

    let input = SubmissionInput::from_path(&path, name, description, external_url).await?;
    Ok(input)
}

#[cfg(feature = "file-dialog")]
fn pick_file() -> Result<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Image", &["png", "jpg", "jpeg", "gif", "webp", "svg"])
        .pick_file()
        .ok_or_else(|| anyhow::anyhow!("no file selected"))
}

#[cfg(not(feature = "file-dialog"))]
fn pick_file() -> Result<PathBuf> {
    let path: String = Input::new().with_prompt("File path").interact_text()?;
    Ok(PathBuf::from(path))
}

/// Completion screen. Returns true when the user wants to mint another.
fn show_complete(link: &str) -> Result<bool> {
    println!("{}", "Minting Complete!".green().bold());
    println!("Link to NFT: {}", link.underlined());
    let items = vec!["Mint another", "Exit"];
    let selection = Select::new().items(&items).default(0).interact()?;
    Ok(selection == 0)
}

/// Spinner that follows the workflow's in-progress messages.
struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    fn start() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Spinner { bar }
    }

    fn finish(self) {
        self.bar.finish_and_clear();
    }
}

impl StatusObserver for Spinner {
    fn on_state(&mut self, state: &WorkflowState) {
        if let WorkflowState::InProgress { message } = state {
            self.bar.set_message(message.clone());
        }
    }
}
