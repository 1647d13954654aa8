//! Layered client configuration: an optional TOML file overridden by
//! `BIPSEA_*` environment variables.

use crate::error::Result;
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONSTANTS_BASE_URL: &str =
    "https://raw.githubusercontent.com/bipsea/constants/main/";
pub const DEFAULT_PIN_ENDPOINT: &str = "https://api.nft.storage/upload";
pub const DEFAULT_REPIN_ENDPOINT: &str = "https://bipsea-api.vercel.app/api/repin";
pub const DEFAULT_GATEWAY_URL: &str = "https://ipfs.io/ipfs";

/// Endpoints and limits used by every marketplace flow.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SdkConfig {
    /// Directory that hosts `chainIds.json`, `contractAddresses.json`, `abi.json` and `subgraphs.json`.
    pub constants_base_url: String,
    pub pin_endpoint: String,
    /// Bearer token for the pinning service. Never compiled in.
    pub pin_token: Option<String>,
    pub repin_endpoint: String,
    pub gateway_url: String,
    /// Where `download` writes decrypted files.
    pub download_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub item_id_attempts: usize,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            constants_base_url: DEFAULT_CONSTANTS_BASE_URL.to_string(),
            pin_endpoint: DEFAULT_PIN_ENDPOINT.to_string(),
            pin_token: None,
            repin_endpoint: DEFAULT_REPIN_ENDPOINT.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            download_dir: PathBuf::from("."),
            request_timeout_secs: 30,
            item_id_attempts: 8,
        }
    }
}

impl SdkConfig {
    /// Load configuration from an optional file, then `BIPSEA_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("BIPSEA"));

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_public_services() {
        let config = SdkConfig::default();
        assert_eq!(config.gateway_url, "https://ipfs.io/ipfs");
        assert!(config.pin_token.is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "gateway_url = \"https://gw.example/ipfs\"\nitem_id_attempts = 3\npin_token = \"secret\""
        )
        .unwrap();

        let config = SdkConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.gateway_url, "https://gw.example/ipfs");
        assert_eq!(config.item_id_attempts, 3);
        assert_eq!(config.pin_token.as_deref(), Some("secret"));
        assert_eq!(config.pin_endpoint, DEFAULT_PIN_ENDPOINT);
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let config = SdkConfig {
            request_timeout_secs: 0,
            ..SdkConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
