//! Listing metadata published to IPFS, plus the inputs used to create it.

use crate::conditions::AccessCondition;
use crate::error::{MarketError, Result};
use alloy::primitives::utils::parse_ether;
use alloy::primitives::U256;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Item ids stay below 2^53 so they survive a round trip through JSON numbers.
pub const MAX_ITEM_ID: u64 = (1 << 53) - 1;

pub const METADATA_FILENAME: &str = "metadata.json";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// The JSON document published per listing. Immutable once uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub image_uri: String,
    pub chain: String,
    pub chain_id: String,
    /// Wei, decimal integer string.
    pub price: String,
    pub symbol: String,
    pub seller: String,
    pub item_id: String,
    pub filename: String,
    pub encrypted_file_uri: String,
    pub evm_contract_conditions: Vec<AccessCondition>,
    /// Hex-encoded escrowed key.
    pub encrypted_symmetric_key: String,
}

impl Metadata {
    pub fn price_wei(&self) -> Result<U256> {
        U256::from_str_radix(&self.price, 10)
            .map_err(|err| MarketError::InvalidPrice(format!("`{}`: {err}", self.price)))
    }

    pub fn to_blob(&self) -> Result<FileBlob> {
        Ok(FileBlob::new(
            METADATA_FILENAME,
            "application/json",
            serde_json::to_vec(self)?,
        ))
    }
}

/// A named binary payload, the unit the pinning service stores.
#[derive(Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// An unnamed blob; the gateway location falls back to `blob`.
    pub fn anonymous(bytes: Vec<u8>) -> Self {
        Self::new("", OCTET_STREAM, bytes)
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, OCTET_STREAM, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for FileBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBlob")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything needed to list one file for sale.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub title: String,
    pub description: String,
    /// Decimal amount of the chain's native currency, e.g. `"0.25"`.
    pub price: String,
    pub file: FileBlob,
    pub image: FileBlob,
    pub chain: String,
}

/// Client-generated listing identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId(String);

impl ItemId {
    /// Uniform draw from `[1, 2^53)`. Not collision free on its own; the
    /// marketplace checks candidates against the contract before use.
    pub fn random() -> Self {
        Self::from_number(rand::thread_rng().gen_range(1..=MAX_ITEM_ID))
    }

    pub fn from_number(id: u64) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse an item id string into the contract's `uint256` argument.
pub fn item_id_to_u256(item_id: &str) -> Result<U256> {
    U256::from_str_radix(item_id, 10)
        .map_err(|err| MarketError::contract(format!("invalid item id `{item_id}`: {err}")))
}

/// Convert a decimal ether amount into a wei integer string.
pub fn parse_price_to_wei(price: &str) -> Result<String> {
    let trimmed = price.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(MarketError::InvalidPrice(format!("`{price}`")));
    }
    parse_ether(trimmed)
        .map(|wei| wei.to_string())
        .map_err(|err| MarketError::InvalidPrice(format!("`{price}`: {err}")))
}
