//! Bipsea marketplace client.
//!
//! Encrypts files client-side, pins them to IPFS, escrows the file key behind
//! on-chain access conditions and drives buy/sell/delist calls against the
//! marketplace contract. Wallets, key escrow and contract writes are reached
//! through the traits in [`wallet`], [`escrow`] and [`chain`].

pub mod chain;
pub mod cipher;
pub mod conditions;
pub mod config;
pub mod constants;
mod error;
pub mod escrow;
pub mod http;
pub mod ipfs;
pub mod market;
pub mod metadata;
pub mod validator;
pub mod wallet;

pub use crate::chain::{ChainItem, ContractRef, MarketplaceReader, MarketplaceWriter, RpcMarketplaceReader};
pub use crate::conditions::{build_contract_conditions, AccessCondition, ConditionArgs};
pub use crate::config::SdkConfig;
pub use crate::constants::ConstantsClient;
pub use crate::error::{MarketError, Result};
pub use crate::escrow::{AuthSig, KeyEscrow};
pub use crate::market::{Collaborators, Marketplace};
pub use crate::metadata::{FileBlob, Metadata, UploadRequest};
pub use crate::validator::{check_metadata, is_valid_metadata, MetadataReport};
pub use crate::wallet::{switch_provider_chain, WalletProvider};
