//! Browser-style wallet access (EIP-1193 `request`) and the chain-switch helper.

use crate::constants::{ChainInfo, ConstantsClient};
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// EIP-1193 code for a chain the wallet has not been told about.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
/// EIP-1193 code for a prompt the user dismissed.
pub const USER_REJECTED: i64 = 4001;

/// Request-based wallet API. Failures are reported as [`MarketError::Wallet`].
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// Ask the wallet for account access and move it onto `chain`.
///
/// Returns `false` (and logs) on any failure: unknown chain, unreachable
/// constant table, user rejection or provider error.
pub async fn switch_provider_chain(
    wallet: &dyn WalletProvider,
    constants: &ConstantsClient,
    chain: &str,
) -> bool {
    match try_switch(wallet, constants, chain).await {
        Ok(()) => {
            info!(chain, "wallet on requested chain");
            true
        }
        Err(err) if err.is_user_rejection() => {
            warn!(chain, "user declined the wallet prompt");
            false
        }
        Err(err) => {
            error!(chain, error = %err, "could not switch wallet chain");
            false
        }
    }
}

async fn try_switch(
    wallet: &dyn WalletProvider,
    constants: &ConstantsClient,
    chain: &str,
) -> Result<()> {
    let chain_ids = constants.fetch_chain_ids().await?;
    let info = chain_ids.get(chain)?;

    wallet.request("eth_requestAccounts", Value::Null).await?;

    let switched = wallet
        .request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": info.chain_id }]),
        )
        .await;

    match switched {
        Ok(_) => Ok(()),
        Err(MarketError::Wallet {
            code: UNRECOGNIZED_CHAIN,
            ..
        }) if !info.rpc_urls.is_empty() => {
            info!(chain, chain_id = %info.chain_id, "wallet does not know chain, adding it");
            wallet
                .request("wallet_addEthereumChain", add_chain_params(chain, info))
                .await
                .map(|_| ())
        }
        Err(err) => Err(err),
    }
}

fn add_chain_params(chain: &str, info: &ChainInfo) -> Value {
    json!([{
        "chainId": info.chain_id,
        "chainName": info.chain_name.clone().unwrap_or_else(|| chain.to_string()),
        "nativeCurrency": info.native_currency,
        "rpcUrls": info.rpc_urls,
        "blockExplorerUrls": info.block_explorer_urls,
    }])
}
