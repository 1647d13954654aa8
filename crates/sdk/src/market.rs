//! The five marketplace flows: upload, download, buy, sell, delist.
//!
//! Each flow is a fixed sequence of awaits. Nothing is rolled back when a
//! later step fails, and no flow is idempotent.

use crate::chain::{ContractRef, MarketplaceReader, MarketplaceWriter, SellOrder, TxHash};
use crate::cipher::{decrypt_file, encrypt_file};
use crate::conditions::{build_contract_conditions, ConditionArgs};
use crate::config::SdkConfig;
use crate::constants::ConstantsClient;
use crate::error::{MarketError, Result};
use crate::escrow::KeyEscrow;
use crate::http::HttpFetcher;
use crate::ipfs::{PinningClient, RepinReport};
use crate::metadata::{parse_price_to_wei, ItemId, Metadata, UploadRequest};
use crate::validator::is_valid_metadata;
use crate::wallet::{switch_provider_chain, WalletProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_DOWNLOAD_NAME: &str = "download";

/// External services a [`Marketplace`] drives.
#[derive(Clone)]
pub struct Collaborators {
    pub escrow: Arc<dyn KeyEscrow>,
    pub wallet: Arc<dyn WalletProvider>,
    pub reader: Arc<dyn MarketplaceReader>,
    pub writer: Arc<dyn MarketplaceWriter>,
}

/// Marketplace client. Owns its collaborator handles; call
/// [`Marketplace::init`] before the first flow and
/// [`Marketplace::shutdown`] when done.
pub struct Marketplace {
    config: SdkConfig,
    fetcher: HttpFetcher,
    constants: ConstantsClient,
    pinning: PinningClient,
    collaborators: Collaborators,
}

impl Marketplace {
    pub fn new(config: SdkConfig, collaborators: Collaborators) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.request_timeout())?;
        let constants = ConstantsClient::new(config.constants_base_url.clone(), fetcher.clone());
        let pinning = PinningClient::new(
            config.pin_endpoint.clone(),
            config.pin_token.clone(),
            config.repin_endpoint.clone(),
            config.gateway_url.clone(),
            fetcher.clone(),
        );
        Ok(Self {
            config,
            fetcher,
            constants,
            pinning,
            collaborators,
        })
    }

    pub fn constants(&self) -> &ConstantsClient {
        &self.constants
    }

    /// Connect to the key-escrow network.
    pub async fn init(&self) -> Result<()> {
        self.collaborators.escrow.connect().await?;
        info!("key escrow connected");
        Ok(())
    }

    /// Disconnect from the escrow network and wait for pending repins.
    pub async fn shutdown(&self) -> Result<RepinReport> {
        let report = self.pinning.drain_repins().await;
        if report.failed > 0 {
            warn!(failed = report.failed, "some repin requests failed");
        }
        self.collaborators.escrow.disconnect().await?;
        Ok(report)
    }

    /// Encrypt and publish a file for sale. Returns the metadata location.
    pub async fn upload(&self, request: UploadRequest) -> Result<String> {
        self.ensure_chain(&request.chain).await?;

        let escrow = &self.collaborators.escrow;
        let auth_sig = escrow.sign_auth_message(&request.chain).await?;
        let seller = auth_sig.address.clone();

        let contract = self.contract_ref(&request.chain).await?;
        let item_id = self.fresh_item_id(&contract).await?;
        let price = parse_price_to_wei(&request.price)?;
        info!(chain = %request.chain, %item_id, %price, "listing new item");

        let conditions = build_contract_conditions(&ConditionArgs {
            contract_address: contract.address.clone(),
            chain: request.chain.clone(),
            item_id: item_id.to_string(),
            price: price.clone(),
            seller: seller.clone(),
        });

        let encrypted = encrypt_file(&request.file)?;
        let encrypted_file_uri = self.pinning.upload_file(&encrypted.encrypted_file).await?;
        let encrypted_key = escrow
            .save_encryption_key(
                &conditions,
                &encrypted.symmetric_key,
                &auth_sig,
                &request.chain,
            )
            .await?;
        let image_uri = self.pinning.upload_file(&request.image).await?;

        let chain_ids = self.constants.fetch_chain_ids().await?;
        let chain_info = chain_ids.get(&request.chain)?;

        let metadata = Metadata {
            title: request.title,
            description: request.description,
            image_uri,
            chain: request.chain.clone(),
            chain_id: chain_info.chain_id.clone(),
            price,
            symbol: chain_info.native_currency.symbol.clone(),
            seller,
            item_id: item_id.into_string(),
            filename: request.file.name,
            encrypted_file_uri,
            evm_contract_conditions: conditions,
            encrypted_symmetric_key: hex::encode(encrypted_key),
        };

        let metadata_uri = self.pinning.upload_file(&metadata.to_blob()?).await?;
        info!(%metadata_uri, item_id = %metadata.item_id, "item metadata published");
        Ok(metadata_uri)
    }

    /// Decrypt a purchased file into the configured download directory.
    pub async fn download(&self, metadata_uri: &str) -> Result<PathBuf> {
        let metadata = self.fetch_metadata(metadata_uri).await?;
        self.ensure_chain(&metadata.chain).await?;
        self.ensure_valid(metadata_uri, &metadata).await?;

        let escrow = &self.collaborators.escrow;
        let auth_sig = escrow.sign_auth_message(&metadata.chain).await?;
        let key = escrow
            .get_encryption_key(
                &metadata.evm_contract_conditions,
                &metadata.encrypted_symmetric_key,
                &metadata.chain,
                &auth_sig,
            )
            .await?;

        let sealed = self.fetcher.get_bytes(&metadata.encrypted_file_uri).await?;
        let plain = decrypt_file(&sealed, &key)?;

        let path = download_path(&self.config.download_dir, &metadata.filename);
        tokio::fs::create_dir_all(&self.config.download_dir).await?;
        tokio::fs::write(&path, plain).await?;
        info!(path = %path.display(), item_id = %metadata.item_id, "file downloaded");
        Ok(path)
    }

    /// Pay the listed price for an item.
    pub async fn buy(&self, metadata_uri: &str) -> Result<TxHash> {
        let metadata = self.fetch_metadata(metadata_uri).await?;
        self.ensure_chain(&metadata.chain).await?;
        self.ensure_valid(metadata_uri, &metadata).await?;

        let contract = self.contract_ref(&metadata.chain).await?;
        let tx = self
            .collaborators
            .writer
            .buy(&contract, &metadata.item_id, metadata.price_wei()?)
            .await?;
        info!(%tx, item_id = %metadata.item_id, "buy submitted");
        Ok(tx)
    }

    /// List an item for sale. The original creator keeps the seller share;
    /// the caller becomes the investor.
    pub async fn sell(&self, metadata_uri: &str) -> Result<TxHash> {
        let metadata = self.fetch_metadata(metadata_uri).await?;
        self.ensure_chain(&metadata.chain).await?;

        let writer = &self.collaborators.writer;
        let investor = writer.signer_address().await?;
        let contract = self.contract_ref(&metadata.chain).await?;
        let order = SellOrder {
            item_id: metadata.item_id.clone(),
            seller: metadata.seller.clone(),
            investor,
            uri: metadata_uri.to_string(),
            price: metadata.price_wei()?,
        };
        let tx = writer.sell(&contract, &order).await?;
        info!(%tx, item_id = %metadata.item_id, "sell submitted");
        Ok(tx)
    }

    /// Withdraw a listing so it can no longer be bought.
    pub async fn delist(&self, metadata_uri: &str) -> Result<TxHash> {
        let metadata = self.fetch_metadata(metadata_uri).await?;
        self.ensure_chain(&metadata.chain).await?;
        self.ensure_valid(metadata_uri, &metadata).await?;

        let contract = self.contract_ref(&metadata.chain).await?;
        let item = self
            .collaborators
            .reader
            .items(&contract, &metadata.item_id)
            .await?;
        if !item.is_listed() {
            return Err(MarketError::ItemAlreadyDelisted(metadata.item_id));
        }

        let tx = self
            .collaborators
            .writer
            .delist(&contract, &metadata.item_id)
            .await?;
        info!(%tx, item_id = %metadata.item_id, "delist submitted");
        Ok(tx)
    }

    pub async fn fetch_metadata(&self, metadata_uri: &str) -> Result<Metadata> {
        self.fetcher.get_json(metadata_uri).await
    }

    async fn ensure_chain(&self, chain: &str) -> Result<()> {
        if switch_provider_chain(self.collaborators.wallet.as_ref(), &self.constants, chain).await
        {
            Ok(())
        } else {
            Err(MarketError::ChainSwitchFailed(chain.to_string()))
        }
    }

    async fn ensure_valid(&self, metadata_uri: &str, metadata: &Metadata) -> Result<()> {
        let valid = is_valid_metadata(
            metadata_uri,
            metadata,
            &self.constants,
            self.collaborators.reader.as_ref(),
        )
        .await?;
        if valid {
            Ok(())
        } else {
            Err(MarketError::MetadataInvalid(metadata_uri.to_string()))
        }
    }

    async fn contract_ref(&self, chain: &str) -> Result<ContractRef> {
        let addresses = self.constants.fetch_contract_addresses().await?;
        let abi = self.constants.fetch_abi().await?;
        Ok(ContractRef {
            chain: chain.to_string(),
            address: addresses.get(chain)?.to_string(),
            abi: Arc::new(abi),
        })
    }

    /// Draw item ids until one reads back unused from the contract.
    async fn fresh_item_id(&self, contract: &ContractRef) -> Result<ItemId> {
        let attempts = self.config.item_id_attempts.max(1);
        for _ in 0..attempts {
            let candidate = ItemId::random();
            let existing = self
                .collaborators
                .reader
                .items(contract, candidate.as_str())
                .await?;
            if existing.is_unused() {
                return Ok(candidate);
            }
            warn!(item_id = %candidate, "item id already taken, drawing another");
        }
        Err(MarketError::ItemIdExhausted(attempts))
    }
}

/// Keep only the final path component of a published filename.
fn download_path(dir: &Path, filename: &str) -> PathBuf {
    let name = Path::new(filename)
        .file_name()
        .map(|name| name.to_os_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.into());
    dir.join(name)
}
