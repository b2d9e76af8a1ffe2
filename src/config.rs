// Runtime configuration: endpoints of every collaborator, the contract
// being minted on and the poll budget. Loaded from `pinmint.toml` when it
// exists, then overridden from `PINMINT_*` environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "pinmint.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_pinata_api_url")]
    pub pinata_api_url: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_crossmint_api_url")]
    pub crossmint_api_url: String,
    #[serde(default)]
    pub crossmint_collection_id: String,
    #[serde(default)]
    pub crossmint_client_secret: String,
    #[serde(default)]
    pub crossmint_project_id: String,
    #[serde(default = "default_opensea_api_url")]
    pub opensea_api_url: String,
    #[serde(default)]
    pub opensea_api_key: Option<String>,
    #[serde(default = "default_chain")]
    pub chain: String,
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    #[serde(default = "default_marketplace_base_url")]
    pub marketplace_base_url: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub pending_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read the TOML file (if present) and apply environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&raw)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            AppConfig::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Overwrite fields from `PINMINT_*` keys resolved by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let strings: [(&str, &mut String); 11] = [
            ("PINMINT_BACKEND_URL", &mut self.backend_url),
            ("PINMINT_PINATA_API_URL", &mut self.pinata_api_url),
            ("PINMINT_GATEWAY_URL", &mut self.gateway_url),
            ("PINMINT_CROSSMINT_API_URL", &mut self.crossmint_api_url),
            ("PINMINT_CROSSMINT_COLLECTION_ID", &mut self.crossmint_collection_id),
            ("PINMINT_CROSSMINT_CLIENT_SECRET", &mut self.crossmint_client_secret),
            ("PINMINT_CROSSMINT_PROJECT_ID", &mut self.crossmint_project_id),
            ("PINMINT_OPENSEA_API_URL", &mut self.opensea_api_url),
            ("PINMINT_CHAIN", &mut self.chain),
            ("PINMINT_CONTRACT_ADDRESS", &mut self.contract_address),
            ("PINMINT_MARKETPLACE_BASE_URL", &mut self.marketplace_base_url),
        ];
        for (key, field) in strings {
            if let Some(v) = lookup(key) {
                *field = v;
            }
        }

        if let Some(v) = lookup("PINMINT_OPENSEA_API_KEY") {
            self.opensea_api_key = Some(v);
        }
        if let Some(v) = lookup("PINMINT_WALLET_ADDRESS") {
            self.wallet_address = Some(v);
        }
        if let Some(v) = lookup("PINMINT_PENDING_PATH") {
            self.pending_path = Some(PathBuf::from(v));
        }
        if let Some(n) = lookup("PINMINT_POLL_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.poll_attempts = n;
        }
        if let Some(n) = lookup("PINMINT_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = n;
        }
        if let Some(n) = lookup("PINMINT_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = n;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            pinata_api_url: default_pinata_api_url(),
            gateway_url: default_gateway_url(),
            crossmint_api_url: default_crossmint_api_url(),
            crossmint_collection_id: String::new(),
            crossmint_client_secret: String::new(),
            crossmint_project_id: String::new(),
            opensea_api_url: default_opensea_api_url(),
            opensea_api_key: None,
            chain: default_chain(),
            contract_address: default_contract_address(),
            marketplace_base_url: default_marketplace_base_url(),
            wallet_address: None,
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            pending_path: None,
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_pinata_api_url() -> String {
    "https://api.pinata.cloud".to_string()
}

fn default_gateway_url() -> String {
    "https://gateway.pinata.cloud/ipfs/".to_string()
}

fn default_crossmint_api_url() -> String {
    "https://www.crossmint.com/api/2022-06-09".to_string()
}

fn default_opensea_api_url() -> String {
    "https://api.opensea.io/api/v2".to_string()
}

fn default_chain() -> String {
    "base".to_string()
}

fn default_contract_address() -> String {
    "0x7FC8e27d971d7B2eA951FCe62192F6B76dD319B7".to_string()
}

fn default_marketplace_base_url() -> String {
    "https://opensea.io/assets/base".to_string()
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    6000
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.poll_attempts, 10);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(6000));
        assert_eq!(cfg.chain, "base");
        assert!(cfg.wallet_address.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let raw = r#"
            backend_url = "https://mint.example"
            gateway_url = "https://gw.example/ipfs/"
            poll_attempts = 3
            opensea_api_key = "os-key"
        "#;
        let cfg = AppConfig::from_toml(raw).unwrap();
        assert_eq!(cfg.backend_url, "https://mint.example");
        assert_eq!(cfg.gateway_url, "https://gw.example/ipfs/");
        assert_eq!(cfg.poll_attempts, 3);
        assert_eq!(cfg.opensea_api_key.as_deref(), Some("os-key"));
        assert_eq!(cfg.poll_interval_ms, 6000);
    }

    #[test]
    fn env_overrides_win_and_bad_numbers_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("PINMINT_WALLET_ADDRESS", "0xabc"),
            ("PINMINT_POLL_INTERVAL_MS", "250"),
            ("PINMINT_POLL_ATTEMPTS", "many"),
            ("PINMINT_CONTRACT_ADDRESS", "0xdef"),
            ("PINMINT_REQUEST_TIMEOUT_SECS", "15"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.wallet_address.as_deref(), Some("0xabc"));
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.poll_attempts, 10);
        assert_eq!(cfg.contract_address, "0xdef");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.marketplace_base_url, "https://opensea.io/assets/base");
    }
}
