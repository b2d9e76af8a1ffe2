// Entrypoint for the CLI application.
// - Keeps `main` small: load config, build the workflow, revoke any key a
//   previous run left behind, then hand off to the UI loop.

use std::path::PathBuf;
use tracing::{info, warn};

use pinmint::api::ApiClient;
use pinmint::config::AppConfig;
use pinmint::pending::PendingStore;
use pinmint::workflow::{Workflow, WorkflowSettings};
use pinmint::{logger, ui};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();

    // `PINMINT_CONFIG` points at a TOML file; `pinmint.toml` otherwise.
    let config_path = std::env::var("PINMINT_CONFIG").ok().map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    let api = ApiClient::new(&config)?;

    let wallet = match &config.wallet_address {
        Some(w) => w.clone(),
        None => ui::prompt_wallet()?,
    };
    let pending = PendingStore::new(
        config
            .pending_path
            .clone()
            .unwrap_or_else(PendingStore::default_path),
    );
    let workflow = Workflow::new(api, WorkflowSettings::from_config(&config, wallet), pending);

    match workflow.recover_pending().await {
        Ok(0) => {}
        Ok(n) => info!("revoked {} upload key(s) left by an earlier run", n),
        Err(e) => warn!("could not check pending revocations: {}", e),
    }

    ui::main_menu(workflow).await?;
    Ok(())
}
