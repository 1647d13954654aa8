//! Checks a published metadata record against live contract state.
//!
//! Only condition slots 0, 2 and 4 are inspected, and the live arguments of
//! the `purchase` clause are not compared. Tightening either would reject
//! listings that are already published.

use crate::chain::{ChainItem, ContractRef, MarketplaceReader};
use crate::conditions::{ContractCondition, EQUALS, ITEMS_FUNCTION, PURCHASE_FUNCTION};
use crate::constants::ConstantsClient;
use crate::error::Result;
use crate::metadata::Metadata;
use std::sync::Arc;
use tracing::{debug, warn};

/// Canonical values for the metadata's chain, taken from the constant tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalListing {
    pub contract_address: String,
    pub chain_id: String,
}

/// Outcome of every individual check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataReport {
    pub contract_address: bool,
    pub chain_id: bool,
    pub chain: bool,
    pub uri: bool,
    pub seller: bool,
    pub price: bool,
    pub purchase: bool,
}

impl MetadataReport {
    pub fn is_valid(&self) -> bool {
        self.contract_address
            && self.chain_id
            && self.chain
            && self.uri
            && self.seller
            && self.price
            && self.purchase
    }

    /// Names of the checks that failed.
    pub fn failures(&self) -> Vec<&'static str> {
        [
            ("contract_address", self.contract_address),
            ("chain_id", self.chain_id),
            ("chain", self.chain),
            ("uri", self.uri),
            ("seller", self.seller),
            ("price", self.price),
            ("purchase", self.purchase),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Compare `metadata` with canonical constants and the live item. Pure.
pub fn check_metadata(
    uri: &str,
    metadata: &Metadata,
    canonical: &CanonicalListing,
    item: &ChainItem,
) -> MetadataReport {
    let clause = |index: usize| {
        metadata
            .evm_contract_conditions
            .get(index)
            .and_then(|condition| condition.as_contract())
    };
    let (seller, price, purchase) = match (clause(0), clause(2), clause(4)) {
        (Some(seller), Some(price), Some(purchase)) => (seller, price, purchase),
        _ => {
            return MetadataReport {
                chain_id: metadata.chain_id == canonical.chain_id,
                uri: uri == item.uri,
                ..MetadataReport::default()
            }
        }
    };
    let slots = [seller, price, purchase];

    MetadataReport {
        contract_address: slots.iter().all(|clause| {
            clause
                .contract_address
                .eq_ignore_ascii_case(&canonical.contract_address)
        }),
        chain_id: metadata.chain_id == canonical.chain_id,
        chain: slots.iter().all(|clause| clause.chain == metadata.chain),
        uri: uri == item.uri,
        seller: is_items_equality(seller, "seller")
            && seller
                .return_value_test
                .value
                .eq_ignore_ascii_case(&item.seller),
        price: is_items_equality(price, "price")
            && price.return_value_test.value == item.price.to_string(),
        purchase: purchase.function_name == PURCHASE_FUNCTION
            && purchase.return_value_test.comparator == EQUALS
            && purchase.return_value_test.value == "true",
    }
}

fn is_items_equality(clause: &ContractCondition, key: &str) -> bool {
    clause.function_name == ITEMS_FUNCTION
        && clause.return_value_test.key == key
        && clause.return_value_test.comparator == EQUALS
}

/// Fetch fresh constants and the live item, then run [`check_metadata`].
///
/// Mismatches are `Ok(false)`; fetch and contract failures are errors.
pub async fn is_valid_metadata(
    uri: &str,
    metadata: &Metadata,
    constants: &ConstantsClient,
    reader: &dyn MarketplaceReader,
) -> Result<bool> {
    let chain_ids = constants.fetch_chain_ids().await?;
    let abi = constants.fetch_abi().await?;
    let addresses = constants.fetch_contract_addresses().await?;

    let contract = ContractRef {
        chain: metadata.chain.clone(),
        address: addresses.get(&metadata.chain)?.to_string(),
        abi: Arc::new(abi),
    };
    let canonical = CanonicalListing {
        contract_address: contract.address.clone(),
        chain_id: chain_ids.get(&metadata.chain)?.chain_id.clone(),
    };

    let item = reader.items(&contract, &metadata.item_id).await?;
    let report = check_metadata(uri, metadata, &canonical, &item);

    if report.is_valid() {
        debug!(uri, item_id = %metadata.item_id, "metadata valid");
    } else {
        warn!(uri, item_id = %metadata.item_id, failed = ?report.failures(), "metadata rejected");
    }
    Ok(report.is_valid())
}
