//! The mint workflow: upload the file, pin its metadata, mint, wait for the
//! token id, then refresh the marketplace and revoke the upload key.
//!
//! `Workflow` owns the only `WorkflowState` and is the only writer of it.
//! Every run gets its own credential, content ids and job id; nothing is
//! carried from one run to the next.

use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, MintJob, MintResult, TokenMetadata, UploadCredential};
use crate::config::AppConfig;
use crate::error::{MintError, Result};
use crate::pending::PendingStore;

pub const MSG_REQUESTING_KEY: &str = "Requesting upload key...";
pub const MSG_UPLOADING_FILE: &str = "Uploading File...";
pub const MSG_UPLOADING_METADATA: &str = "Uploading Metadata...";
pub const MSG_MINTING: &str = "Minting NFT...";
pub const MSG_WAITING_TOKEN: &str = "Waiting for Token ID...";
pub const MSG_REFRESHING: &str = "Refreshing metadata...";
pub const MSG_REVOKING: &str = "Revoking upload key...";

/// What the user filled into the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionInput {
    pub file_name: String,
    pub file_bytes: Vec<u8>,
    pub name: String,
    pub description: String,
    pub external_url: String,
}

impl SubmissionInput {
    /// Build an input from a file on disk.
    pub async fn from_path(
        path: &Path,
        name: impl Into<String>,
        description: impl Into<String>,
        external_url: impl Into<String>,
    ) -> Result<Self> {
        let file_bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(SubmissionInput {
            file_name,
            file_bytes,
            name: name.into(),
            description: description.into(),
            external_url: external_url.into(),
        })
    }

    /// Presence checks only; the external URL may be empty.
    pub fn validate(&self) -> Result<()> {
        if self.file_bytes.is_empty() {
            return Err(MintError::InvalidInput("no file selected".into()));
        }
        if self.name.trim().is_empty() {
            return Err(MintError::InvalidInput("name is empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(MintError::InvalidInput("description is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    InProgress { message: String },
    Complete { link: String },
}

/// Receives every state the workflow enters, in order.
pub trait StatusObserver {
    fn on_state(&mut self, state: &WorkflowState);
}

impl<F: FnMut(&WorkflowState)> StatusObserver for F {
    fn on_state(&mut self, state: &WorkflowState) {
        self(state)
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub wallet_address: String,
    pub gateway_url: String,
    pub contract_address: String,
    pub marketplace_base_url: String,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig, wallet_address: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            gateway_url: config.gateway_url.clone(),
            contract_address: config.contract_address.clone(),
            marketplace_base_url: config.marketplace_base_url.clone(),
            poll_attempts: config.poll_attempts,
            poll_interval: config.poll_interval(),
        }
    }

    /// Gateway URL of a pinned object. Plain concatenation: the configured
    /// prefix carries its own trailing slash.
    pub fn gateway_link(&self, cid: &str) -> String {
        format!("{}{}", self.gateway_url, cid)
    }

    /// `<marketplace>/<contract>/<tokenId>`
    pub fn result_link(&self, token_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.marketplace_base_url.trim_end_matches('/'),
            self.contract_address,
            token_id
        )
    }
}

pub struct Workflow {
    api: ApiClient,
    settings: WorkflowSettings,
    pending: PendingStore,
    state: WorkflowState,
}

impl Workflow {
    pub fn new(api: ApiClient, settings: WorkflowSettings, pending: PendingStore) -> Self {
        Self {
            api,
            settings,
            pending,
            state: WorkflowState::Idle,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Leave the completion screen so a new submission can start.
    pub fn mint_another(&mut self) {
        if matches!(self.state, WorkflowState::Complete { .. }) {
            self.state = WorkflowState::Idle;
        }
    }

    /// Run one submission to completion. On success the state ends in
    /// `Complete` and the marketplace link is returned; on any failure the
    /// state falls back to `Idle` and the typed error is returned.
    pub async fn submit<O: StatusObserver>(
        &mut self,
        input: &SubmissionInput,
        observer: &mut O,
    ) -> Result<String> {
        if self.state != WorkflowState::Idle {
            return Err(MintError::NotIdle);
        }

        match self.execute(input, observer).await {
            Ok(link) => {
                info!(link = %link, "Minting Complete!");
                self.enter(WorkflowState::Complete { link: link.clone() }, observer);
                Ok(link)
            }
            Err(e) => {
                error!(kind = e.kind(), "Error during submission: {}", e);
                self.enter(WorkflowState::Idle, observer);
                Err(e)
            }
        }
    }

    fn enter<O: StatusObserver>(&mut self, state: WorkflowState, observer: &mut O) {
        self.state = state;
        observer.on_state(&self.state);
    }

    fn progress<O: StatusObserver>(&mut self, message: &str, observer: &mut O) {
        self.enter(
            WorkflowState::InProgress {
                message: message.to_string(),
            },
            observer,
        );
    }

    async fn execute<O: StatusObserver>(
        &mut self,
        input: &SubmissionInput,
        observer: &mut O,
    ) -> Result<String> {
        input.validate()?;

        self.progress(MSG_REQUESTING_KEY, observer);
        let credential = self.api.fetch_credential().await?;
        self.remember(&credential);

        self.progress(MSG_UPLOADING_FILE, observer);
        let file_cid = self
            .api
            .upload_file(&input.file_name, &input.file_bytes, &credential)
            .await?;
        info!(cid = %file_cid, "file pinned");

        self.progress(MSG_UPLOADING_METADATA, observer);
        let metadata = TokenMetadata {
            name: input.name.clone(),
            description: input.description.clone(),
            image: self.settings.gateway_link(&file_cid),
            external_url: input.external_url.clone(),
        };
        let metadata_cid = self.api.publish_metadata(&metadata, &credential).await?;
        info!(cid = %metadata_cid, "metadata pinned");

        self.progress(MSG_MINTING, observer);
        let uri = self.settings.gateway_link(&metadata_cid);
        let job = self
            .api
            .request_mint(&self.settings.wallet_address, &uri)
            .await?;
        info!(job_id = %job.job_id, "mint requested");

        self.progress(MSG_WAITING_TOKEN, observer);
        let minted = self.poll_for_token(&job).await?;
        let link = self.settings.result_link(&minted.token_id);

        self.progress(MSG_REFRESHING, observer);
        self.api
            .refresh_metadata(&self.settings.contract_address, &minted.token_id)
            .await;

        self.progress(MSG_REVOKING, observer);
        if let Err(e) = self.api.revoke_credential(&credential).await {
            warn!(link = %link, "token minted but the upload key was not revoked");
            return Err(e);
        }
        self.forget(&credential);

        Ok(link)
    }

    fn remember(&self, credential: &UploadCredential) {
        if let Err(e) = self.pending.record(&credential.credential_id) {
            warn!(
                path = %self.pending.path().display(),
                "could not record pending revocation: {}", e
            );
        }
    }

    fn forget(&self, credential: &UploadCredential) {
        if let Err(e) = self.pending.clear(&credential.credential_id) {
            warn!(
                path = %self.pending.path().display(),
                "could not clear pending revocation: {}", e
            );
        }
    }

    /// Check the job at most `poll_attempts` times, `poll_interval` apart,
    /// and stop at the first successful status carrying a token id.
    pub async fn poll_for_token(&self, job: &MintJob) -> Result<MintResult> {
        let attempts = self.settings.poll_attempts;
        for attempt in 1..=attempts {
            match self.api.mint_status(job).await {
                Ok(status) => {
                    if let Some(minted) = status.minted() {
                        info!(attempt, token_id = %minted.token_id, "token id available");
                        return Ok(minted);
                    }
                    debug!(attempt, status = ?status.status(), "token id not ready yet");
                }
                Err(e) => warn!(attempt, "mint status check failed: {}", e),
            }
            if attempt < attempts {
                sleep(self.settings.poll_interval).await;
            }
        }
        Err(MintError::PollTimeout { attempts })
    }

    /// Revoke keys left behind by interrupted or failed runs. Returns how
    /// many were revoked; the rest stay recorded for the next start.
    pub async fn recover_pending(&self) -> Result<usize> {
        let records = self.pending.load()?;
        let mut revoked = 0;
        for record in records {
            match self.api.revoke_credential_id(&record.credential_id).await {
                Ok(()) => {
                    self.pending.clear(&record.credential_id)?;
                    revoked += 1;
                }
                Err(e) => warn!(
                    credential_id = %record.credential_id,
                    issued_at = %record.issued_at,
                    "leftover upload key still not revoked: {}", e
                ),
            }
        }
        if revoked > 0 {
            info!(revoked, "revoked leftover upload keys");
        }
        Ok(revoked)
    }
}
