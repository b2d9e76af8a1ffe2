// Persisted list of upload keys that were issued but not yet revoked.
// A run records its key right after fetching it and clears it after the
// revoke call succeeds; anything left over (crash, failed step) is
// revoked on the next start.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::Result;

const PENDING_FILE: &str = ".pinmint_pending.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingRevocation {
    pub credential_id: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PendingStore {
    path: PathBuf,
}

impl PendingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.pinmint_pending.json`, or the working directory without a home.
    pub fn default_path() -> PathBuf {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.join(PENDING_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All outstanding records; a missing file means none.
    pub fn load(&self) -> Result<Vec<PendingRevocation>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(records)
    }

    pub fn record(&self, credential_id: &str) -> Result<()> {
        let mut records = self.load()?;
        if records.iter().any(|r| r.credential_id == credential_id) {
            return Ok(());
        }
        records.push(PendingRevocation {
            credential_id: credential_id.to_string(),
            issued_at: Utc::now(),
        });
        self.save(&records)
    }

    pub fn clear(&self, credential_id: &str) -> Result<()> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.credential_id != credential_id);
        if records.len() == before {
            return Ok(());
        }
        self.save(&records)
    }

    fn save(&self, records: &[PendingRevocation]) -> Result<()> {
        if records.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let data = serde_json::to_string_pretty(records).context("Failed to encode pending list")?;

        // Write beside the target and rename, so a crash never leaves a
        // half-written list behind.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
