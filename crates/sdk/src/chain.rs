//! Marketplace contract surface.
//!
//! Reads go through [`MarketplaceReader`]; state-changing calls need a
//! wallet-backed signer and go through [`MarketplaceWriter`].

use crate::conditions::ITEMS_FUNCTION;
use crate::constants::ContractAbi;
use crate::error::{MarketError, Result};
use crate::metadata::item_id_to_u256;
use alloy::contract::{ContractInstance, Interface};
use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::{Address, U256};
use alloy::providers::RootProvider;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// `items` output that marks an item as buyable. Deployments whose ABI lacks
/// it fall back to the seller slot.
pub const CAN_BUY_FIELD: &str = "canBuy";

/// Transaction hash returned by a submitted write.
pub type TxHash = String;

/// Live `items(itemId)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainItem {
    pub seller: String,
    pub investor: String,
    pub uri: String,
    pub price: U256,
    /// Whether the item can currently be bought.
    pub listed: bool,
}

impl ChainItem {
    pub fn is_listed(&self) -> bool {
        self.listed
    }

    /// An id the contract has never stored reads back with a zero seller.
    pub fn is_unused(&self) -> bool {
        is_zero_address(&self.seller)
    }
}

pub(crate) fn is_zero_address(address: &str) -> bool {
    let digits = address.trim_start_matches("0x").trim_start_matches("0X");
    digits.chars().all(|c| c == '0')
}

/// The deployed marketplace contract on one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRef {
    pub chain: String,
    pub address: String,
    pub abi: Arc<ContractAbi>,
}

/// Arguments of `sell(itemId, seller, investor, uri, price)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellOrder {
    pub item_id: String,
    /// Original creator; receives 99% of the sale.
    pub seller: String,
    /// Account relisting the item; receives 1%.
    pub investor: String,
    pub uri: String,
    pub price: U256,
}

#[async_trait]
pub trait MarketplaceReader: Send + Sync {
    async fn items(&self, contract: &ContractRef, item_id: &str) -> Result<ChainItem>;
}

#[async_trait]
pub trait MarketplaceWriter: Send + Sync {
    /// Address of the account that signs writes.
    async fn signer_address(&self) -> Result<String>;

    async fn buy(&self, contract: &ContractRef, item_id: &str, value: U256) -> Result<TxHash>;

    async fn sell(&self, contract: &ContractRef, order: &SellOrder) -> Result<TxHash>;

    async fn delist(&self, contract: &ContractRef, item_id: &str) -> Result<TxHash>;
}

/// Read-only JSON-RPC access to the marketplace contract. Calls are
/// encoded and decoded against the ABI carried by the [`ContractRef`].
#[derive(Clone, Debug)]
pub struct RpcMarketplaceReader {
    provider: RootProvider<Http<Client>>,
}

impl RpcMarketplaceReader {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = Url::parse(rpc_url).map_err(|_| MarketError::InvalidBaseUrl(rpc_url.into()))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
        })
    }
}

#[async_trait]
impl MarketplaceReader for RpcMarketplaceReader {
    async fn items(&self, contract: &ContractRef, item_id: &str) -> Result<ChainItem> {
        debug!(chain = %contract.chain, contract = %contract.address, item_id, "reading item");
        let abi = parse_abi(&contract.abi)?;
        let function = abi
            .function(ITEMS_FUNCTION)
            .and_then(|overloads| overloads.first())
            .cloned()
            .ok_or_else(|| MarketError::contract("contract ABI has no `items` function"))?;

        let instance: ContractInstance<Http<Client>, _> = ContractInstance::new(
            parse_address(&contract.address)?,
            self.provider.clone(),
            Interface::new(abi),
        );
        let outputs = instance
            .function(
                ITEMS_FUNCTION,
                &[DynSolValue::Uint(item_id_to_u256(item_id)?, 256)],
            )
            .map_err(|err| MarketError::contract(err.to_string()))?
            .call()
            .await
            .map_err(|err| MarketError::contract(err.to_string()))?;

        chain_item_from_outputs(&function, outputs)
    }
}

fn parse_abi(abi: &ContractAbi) -> Result<JsonAbi> {
    serde_json::from_value(serde_json::Value::Array(abi.clone()))
        .map_err(|err| MarketError::contract(format!("invalid contract ABI: {err}")))
}

/// Pair decoded `items` outputs with their ABI names. A single struct
/// return is flattened into its components.
fn named_outputs(function: &Function, values: Vec<DynSolValue>) -> HashMap<String, DynSolValue> {
    let wraps_struct = matches!(
        (function.outputs.as_slice(), values.as_slice()),
        ([single], [DynSolValue::Tuple(_)]) if !single.components.is_empty()
    );
    if wraps_struct {
        if let Some(DynSolValue::Tuple(fields)) = values.into_iter().next() {
            return function.outputs[0]
                .components
                .iter()
                .map(|param| param.name.clone())
                .zip(fields)
                .collect();
        }
        return HashMap::new();
    }
    function
        .outputs
        .iter()
        .map(|param| param.name.clone())
        .zip(values)
        .collect()
}

fn chain_item_from_outputs(function: &Function, values: Vec<DynSolValue>) -> Result<ChainItem> {
    let fields = named_outputs(function, values);
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| MarketError::contract(format!("`items` output has no `{name}`")))
    };
    let malformed = |name: &str| MarketError::contract(format!("`items` output `{name}` has the wrong type"));

    let seller = field("seller")?
        .as_address()
        .ok_or_else(|| malformed("seller"))?
        .to_string();
    let investor = field("investor")?
        .as_address()
        .ok_or_else(|| malformed("investor"))?
        .to_string();
    let uri = field("uri")?
        .as_str()
        .ok_or_else(|| malformed("uri"))?
        .to_string();
    let (price, _) = field("price")?.as_uint().ok_or_else(|| malformed("price"))?;
    let listed = match fields.get(CAN_BUY_FIELD) {
        Some(value) => value.as_bool().ok_or_else(|| malformed(CAN_BUY_FIELD))?,
        None => !is_zero_address(&seller),
    };

    Ok(ChainItem {
        seller,
        investor,
        uri,
        price,
        listed,
    })
}

fn parse_address(address: &str) -> Result<Address> {
    address
        .parse::<Address>()
        .map_err(|err| MarketError::contract(format!("invalid address `{address}`: {err}")))
}
