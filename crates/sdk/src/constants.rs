//! Remote constant tables: chain ids, contract addresses, contract ABI and subgraphs.
//!
//! Tables are fetched fresh on every call. Nothing is cached, so a stale
//! table upstream is observed immediately by validation.

use crate::error::{MarketError, Result};
use crate::http::{join_base, HttpFetcher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

pub const CHAIN_IDS_FILE: &str = "chainIds.json";
pub const CONTRACT_ADDRESSES_FILE: &str = "contractAddresses.json";
pub const ABI_FILE: &str = "abi.json";
pub const SUBGRAPHS_FILE: &str = "subgraphs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    #[serde(default)]
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

/// One entry of `chainIds.json`. The optional fields are the ones a wallet
/// needs to add a network it does not know yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    /// Hex chain id, e.g. `0x89`.
    pub chain_id: String,
    pub native_currency: NativeCurrency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rpc_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainTable(pub BTreeMap<String, ChainInfo>);

impl ChainTable {
    pub fn get(&self, chain: &str) -> Result<&ChainInfo> {
        self.0
            .get(chain)
            .ok_or_else(|| MarketError::UnknownChain(chain.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractAddresses(pub BTreeMap<String, String>);

impl ContractAddresses {
    pub fn get(&self, chain: &str) -> Result<&str> {
        self.0
            .get(chain)
            .map(String::as_str)
            .ok_or_else(|| MarketError::UnknownChain(chain.to_string()))
    }
}

/// Marketplace contract ABI document (a JSON array of fragments).
pub type ContractAbi = Vec<serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubgraphTable(pub BTreeMap<String, serde_json::Value>);

/// Fetches the constant tables from a static hosting location.
#[derive(Clone, Debug)]
pub struct ConstantsClient {
    base_url: String,
    fetcher: HttpFetcher,
}

impl ConstantsClient {
    pub fn new(base_url: impl Into<String>, fetcher: HttpFetcher) -> Self {
        Self {
            base_url: base_url.into(),
            fetcher,
        }
    }

    pub async fn fetch_chain_ids(&self) -> Result<ChainTable> {
        self.fetch(CHAIN_IDS_FILE).await
    }

    pub async fn fetch_contract_addresses(&self) -> Result<ContractAddresses> {
        self.fetch(CONTRACT_ADDRESSES_FILE).await
    }

    pub async fn fetch_abi(&self) -> Result<ContractAbi> {
        self.fetch(ABI_FILE).await
    }

    pub async fn fetch_subgraphs(&self) -> Result<SubgraphTable> {
        self.fetch(SUBGRAPHS_FILE).await
    }

    async fn fetch<T>(&self, file: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = join_base(&self.base_url, file)?;
        self.fetcher
            .get_json(url.as_str())
            .await
            .inspect_err(|err| error!(table = file, error = %err, "failed to fetch constant table"))
    }
}
