// Error taxonomy for the mint workflow. Every step returns one of these
// kinds so the orchestrator can log exactly where a run broke, while the
// UI keeps showing a single generic alert.

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, MintError>;

/// Alert shown to the user for any failed run, whatever the step.
pub const GENERIC_ALERT: &str = "Error Minting NFT";

#[derive(ThisError, Debug)]
pub enum MintError {
    #[error("invalid submission: {0}")]
    InvalidInput(String),
    #[error("a previous result is still displayed; choose \"mint another\" first")]
    NotIdle,
    #[error("failed to obtain upload credential: {0}")]
    Credential(String),
    #[error("failed to upload file: {0}")]
    Upload(String),
    #[error("failed to publish metadata: {0}")]
    MetadataPublish(String),
    #[error("failed to request mint: {0}")]
    MintRequest(String),
    #[error("token id not available after {attempts} status checks")]
    PollTimeout { attempts: u32 },
    #[error("failed to revoke upload credential {credential_id}: {reason}")]
    Revoke {
        credential_id: String,
        reason: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MintError {
    /// Short name of the failing step, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            MintError::InvalidInput(_) => "invalid_input",
            MintError::NotIdle => "not_idle",
            MintError::Credential(_) => "credential",
            MintError::Upload(_) => "upload",
            MintError::MetadataPublish(_) => "metadata_publish",
            MintError::MintRequest(_) => "mint_request",
            MintError::PollTimeout { .. } => "poll_timeout",
            MintError::Revoke { .. } => "revoke",
            MintError::Io(_) => "io",
            MintError::Other(_) => "other",
        }
    }

    /// What the user sees. Deliberately the same for every kind.
    pub fn user_message(&self) -> &'static str {
        GENERIC_ALERT
    }
}
