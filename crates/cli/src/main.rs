//! Bipsea Marketplace Command Line Interface
//!
//! Inspect constant tables, build access conditions, validate published
//! listings against a live contract and pin files.

use anyhow::{bail, Context, Result};
use bipsea_sdk::constants::ConstantsClient;
use bipsea_sdk::http::HttpFetcher;
use bipsea_sdk::ipfs::PinningClient;
use bipsea_sdk::{
    build_contract_conditions, is_valid_metadata, ConditionArgs, FileBlob, Metadata,
    RpcMarketplaceReader, SdkConfig,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bipsea")]
#[command(about = "Bipsea Marketplace Command Line Interface", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); `BIPSEA_*` environment variables override it
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a remote constant table
    Constants {
        #[arg(value_enum)]
        table: ConstantTable,
    },
    /// Print the access conditions for a listing
    Conditions {
        /// Marketplace contract address
        #[arg(long)]
        contract: String,
        /// Chain name, e.g. polygon
        #[arg(long)]
        chain: String,
        /// Listing item id
        #[arg(long)]
        item_id: String,
        /// Price in wei
        #[arg(long)]
        price: String,
        /// Seller address
        #[arg(long)]
        seller: String,
    },
    /// Validate published metadata against the live contract
    Validate {
        /// Metadata location (gateway URL)
        metadata_uri: String,
        /// JSON-RPC endpoint of the metadata's chain
        #[arg(long)]
        rpc_url: String,
    },
    /// Pin a file and print its gateway location
    Pin {
        /// File to upload
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConstantTable {
    Chains,
    Addresses,
    Abi,
    Subgraphs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = SdkConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let fetcher = HttpFetcher::new(config.request_timeout())?;

    match cli.command {
        Commands::Constants { table } => handle_constants(table, &config, fetcher).await,
        Commands::Conditions {
            contract,
            chain,
            item_id,
            price,
            seller,
        } => {
            let conditions = build_contract_conditions(&ConditionArgs {
                contract_address: contract,
                chain,
                item_id,
                price,
                seller,
            });
            println!("{}", serde_json::to_string_pretty(&conditions)?);
            Ok(())
        }
        Commands::Validate {
            metadata_uri,
            rpc_url,
        } => handle_validate(&metadata_uri, &rpc_url, &config, fetcher).await,
        Commands::Pin { path } => handle_pin(path, &config, fetcher).await,
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn handle_constants(
    table: ConstantTable,
    config: &SdkConfig,
    fetcher: HttpFetcher,
) -> Result<()> {
    let constants = ConstantsClient::new(config.constants_base_url.clone(), fetcher);

    let json: Value = match table {
        ConstantTable::Chains => serde_json::to_value(constants.fetch_chain_ids().await?)?,
        ConstantTable::Addresses => {
            serde_json::to_value(constants.fetch_contract_addresses().await?)?
        }
        ConstantTable::Abi => serde_json::to_value(constants.fetch_abi().await?)?,
        ConstantTable::Subgraphs => serde_json::to_value(constants.fetch_subgraphs().await?)?,
    };
    println!("{}", serde_json::to_string_pretty(&json)?);

    Ok(())
}

async fn handle_validate(
    metadata_uri: &str,
    rpc_url: &str,
    config: &SdkConfig,
    fetcher: HttpFetcher,
) -> Result<()> {
    let metadata: Metadata = fetcher
        .get_json(metadata_uri)
        .await
        .with_context(|| format!("fetching metadata from {metadata_uri}"))?;
    let constants = ConstantsClient::new(config.constants_base_url.clone(), fetcher);
    let reader = RpcMarketplaceReader::new(rpc_url)?;

    let valid = is_valid_metadata(metadata_uri, &metadata, &constants, &reader).await?;
    if !valid {
        bail!("metadata at {metadata_uri} is invalid");
    }

    println!(
        "valid: item {} on {} priced {} wei",
        metadata.item_id, metadata.chain, metadata.price
    );
    Ok(())
}

async fn handle_pin(path: PathBuf, config: &SdkConfig, fetcher: HttpFetcher) -> Result<()> {
    let blob = FileBlob::from_path(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let pinning = PinningClient::new(
        config.pin_endpoint.clone(),
        config.pin_token.clone(),
        config.repin_endpoint.clone(),
        config.gateway_url.clone(),
        fetcher,
    );

    let location = pinning.upload_file(&blob).await?;
    let report = pinning.drain_repins().await;
    info!(succeeded = report.succeeded, failed = report.failed, "repin finished");

    println!("{location}");
    Ok(())
}
