//! Shared harness: a local HTTP server standing in for the constant host,
//! the pinning service and the IPFS gateway, plus in-memory collaborators.

#![allow(dead_code)]

use alloy::primitives::U256;
use async_trait::async_trait;
use axum::extract::{Multipart, Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use bipsea_sdk::chain::{SellOrder, TxHash};
use bipsea_sdk::cipher::SymmetricKey;
use bipsea_sdk::{
    AccessCondition, AuthSig, ChainItem, Collaborators, ContractRef, FileBlob, KeyEscrow,
    MarketError, MarketplaceReader, MarketplaceWriter, Marketplace, Result, SdkConfig,
    UploadRequest, WalletProvider,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const CONTRACT: &str = "0xC0ffee254729296a45a3885639AC7E10F9d54979";
pub const SELLER: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
pub const BUYER: &str = "0x1111111111111111111111111111111111111111";
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
pub const PIN_TOKEN: &str = "test-token";
pub const FILE_BYTES: &[u8] = b"%PDF-1.7 quarterly report";

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub chain_ids: Value,
    pub addresses: Value,
    pub abi: Value,
    pub pins: Mutex<HashMap<String, Vec<u8>>>,
    pub pin_auth: Mutex<Vec<Option<String>>>,
    pub repins: Mutex<Vec<String>>,
    pub fail_repin: AtomicBool,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            chain_ids: json!({
                "polygon": {
                    "chainId": "0x89",
                    "nativeCurrency": {"name": "MATIC", "symbol": "MATIC", "decimals": 18}
                },
                "mumbai": {
                    "chainId": "0x13881",
                    "chainName": "Polygon Mumbai",
                    "nativeCurrency": {"name": "MATIC", "symbol": "MATIC", "decimals": 18},
                    "rpcUrls": ["https://rpc-mumbai.example"]
                }
            }),
            addresses: json!({"polygon": CONTRACT, "mumbai": CONTRACT}),
            abi: items_abi(),
            pins: Mutex::new(HashMap::new()),
            pin_auth: Mutex::new(Vec::new()),
            repins: Mutex::new(Vec::new()),
            fail_repin: AtomicBool::new(false),
        }
    }
}

/// Marketplace ABI with the `items` getter as deployed.
pub fn items_abi() -> Value {
    json!([{
        "type": "function",
        "name": "items",
        "stateMutability": "view",
        "inputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
        "outputs": [
            {"name": "seller", "type": "address", "internalType": "address"},
            {"name": "investor", "type": "address", "internalType": "address"},
            {"name": "uri", "type": "string", "internalType": "string"},
            {"name": "price", "type": "uint256", "internalType": "uint256"},
            {"name": "canBuy", "type": "bool", "internalType": "bool"}
        ]
    }])
}

type Shared = Arc<ServerState>;

async fn chain_ids(State(state): State<Shared>) -> Json<Value> {
    Json(state.chain_ids.clone())
}

async fn addresses(State(state): State<Shared>) -> Json<Value> {
    Json(state.addresses.clone())
}

async fn abi(State(state): State<Shared>) -> Json<Value> {
    Json(state.abi.clone())
}

async fn subgraphs() -> Json<Value> {
    Json(json!({"polygon": {"uri": "https://graph.example/polygon"}}))
}

async fn pin(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> std::result::Result<Json<Value>, StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.pin_auth.lock().unwrap().push(auth);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let mut pins = state.pins.lock().unwrap();
        let cid = format!("Qm{}", pins.len() + 1);
        pins.insert(cid.clone(), bytes.to_vec());
        return Ok(Json(json!({"ok": true, "value": {"cid": cid}})));
    }
    Err(StatusCode::BAD_REQUEST)
}

async fn repin(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    if state.fail_repin.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let cid = body["cid"].as_str().unwrap_or_default().to_string();
    state.repins.lock().unwrap().push(cid);
    StatusCode::OK
}

async fn gateway(
    State(state): State<Shared>,
    Path((cid, _filename)): Path<(String, String)>,
) -> std::result::Result<Vec<u8>, StatusCode> {
    state
        .pins
        .lock()
        .unwrap()
        .get(&cid)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

pub struct TestServer {
    pub base: String,
    pub state: Shared,
}

impl TestServer {
    pub async fn start(state: ServerState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/constants/chainIds.json", get(chain_ids))
            .route("/constants/contractAddresses.json", get(addresses))
            .route("/constants/abi.json", get(abi))
            .route("/constants/subgraphs.json", get(subgraphs))
            .route("/pin", post(pin))
            .route("/repin", post(repin))
            .route("/ipfs/:cid/:filename", get(gateway))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            state,
        }
    }

    pub fn config(&self, download_dir: &std::path::Path) -> SdkConfig {
        SdkConfig {
            constants_base_url: format!("{}/constants", self.base),
            pin_endpoint: format!("{}/pin", self.base),
            pin_token: Some(PIN_TOKEN.to_string()),
            repin_endpoint: format!("{}/repin", self.base),
            gateway_url: format!("{}/ipfs", self.base),
            download_dir: download_dir.to_path_buf(),
            request_timeout_secs: 5,
            item_id_attempts: 4,
        }
    }

    pub fn pin_count(&self) -> usize {
        self.state.pins.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockWallet {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub switch_error: Mutex<Option<i64>>,
}

impl MockWallet {
    pub fn rejecting_switch(code: i64) -> Self {
        let wallet = Self::default();
        *wallet.switch_error.lock().unwrap() = Some(code);
        wallet
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        match method {
            "eth_requestAccounts" => Ok(json!([SELLER])),
            "wallet_switchEthereumChain" => match *self.switch_error.lock().unwrap() {
                Some(code) => Err(MarketError::Wallet {
                    code,
                    message: "switch refused".to_string(),
                }),
                None => Ok(Value::Null),
            },
            "wallet_addEthereumChain" => Ok(Value::Null),
            other => Err(MarketError::Wallet {
                code: 4200,
                message: format!("unsupported method {other}"),
            }),
        }
    }
}

pub struct MockEscrow {
    pub signer: String,
    pub connected: AtomicBool,
    pub deny: AtomicBool,
    escrowed: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockEscrow {
    pub fn new(signer: &str) -> Self {
        Self {
            signer: signer.to_string(),
            connected: AtomicBool::new(false),
            deny: AtomicBool::new(false),
            escrowed: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl KeyEscrow for MockEscrow {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_auth_message(&self, chain: &str) -> Result<AuthSig> {
        Ok(AuthSig {
            sig: "0xsig".to_string(),
            derived_via: "web3.eth.personal.sign".to_string(),
            signed_message: format!("sign in on {chain}"),
            address: self.signer.clone(),
        })
    }

    async fn save_encryption_key(
        &self,
        conditions: &[AccessCondition],
        key: &SymmetricKey,
        _auth_sig: &AuthSig,
        _chain: &str,
    ) -> Result<Vec<u8>> {
        if conditions.len() != 5 {
            return Err(MarketError::Escrow("unexpected condition shape".into()));
        }
        let sealed: Vec<u8> = key.as_bytes().iter().map(|b| b ^ 0x5a).collect();
        self.escrowed
            .lock()
            .unwrap()
            .insert(hex::encode(&sealed), key.as_bytes().to_vec());
        Ok(sealed)
    }

    async fn get_encryption_key(
        &self,
        _conditions: &[AccessCondition],
        encrypted_key_hex: &str,
        _chain: &str,
        _auth_sig: &AuthSig,
    ) -> Result<SymmetricKey> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(MarketError::Escrow("access conditions not satisfied".into()));
        }
        let escrowed = self.escrowed.lock().unwrap();
        let key = escrowed
            .get(encrypted_key_hex)
            .ok_or_else(|| MarketError::Escrow("unknown key".into()))?;
        SymmetricKey::from_slice(key)
    }
}

#[derive(Default)]
pub struct MockChain {
    pub items: Mutex<HashMap<String, ChainItem>>,
    pub writes: Mutex<Vec<String>>,
    /// Report every unknown id as already taken.
    pub occupied: AtomicBool,
}

impl MockChain {
    pub fn item(&self, item_id: &str) -> Option<ChainItem> {
        self.items.lock().unwrap().get(item_id).cloned()
    }

    pub fn set_price(&self, item_id: &str, price: U256) {
        if let Some(item) = self.items.lock().unwrap().get_mut(item_id) {
            item.price = price;
        }
    }

    fn record(&self, entry: String) -> TxHash {
        let mut writes = self.writes.lock().unwrap();
        writes.push(entry);
        format!("0x{:064x}", writes.len())
    }
}

#[async_trait]
impl MarketplaceReader for MockChain {
    async fn items(&self, contract: &ContractRef, item_id: &str) -> Result<ChainItem> {
        assert_eq!(contract.address, CONTRACT);
        if let Some(item) = self.item(item_id) {
            return Ok(item);
        }
        let seller = if self.occupied.load(Ordering::SeqCst) {
            BUYER
        } else {
            ZERO_ADDRESS
        };
        Ok(ChainItem {
            seller: seller.to_string(),
            investor: ZERO_ADDRESS.to_string(),
            uri: String::new(),
            price: U256::ZERO,
            listed: seller != ZERO_ADDRESS,
        })
    }
}

#[async_trait]
impl MarketplaceWriter for MockChain {
    async fn signer_address(&self) -> Result<String> {
        Ok(BUYER.to_string())
    }

    async fn buy(&self, _contract: &ContractRef, item_id: &str, value: U256) -> Result<TxHash> {
        Ok(self.record(format!("buy {item_id} {value}")))
    }

    async fn sell(&self, _contract: &ContractRef, order: &SellOrder) -> Result<TxHash> {
        self.items.lock().unwrap().insert(
            order.item_id.clone(),
            ChainItem {
                seller: order.seller.clone(),
                investor: order.investor.clone(),
                uri: order.uri.clone(),
                price: order.price,
                listed: true,
            },
        );
        Ok(self.record(format!("sell {}", order.item_id)))
    }

    async fn delist(&self, _contract: &ContractRef, item_id: &str) -> Result<TxHash> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(item_id)
            .ok_or_else(|| MarketError::Contract("execution reverted".into()))?;
        item.listed = false;
        drop(items);
        Ok(self.record(format!("delist {item_id}")))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub market: Marketplace,
    pub wallet: Arc<MockWallet>,
    pub escrow: Arc<MockEscrow>,
    pub chain: Arc<MockChain>,
}

impl Harness {
    pub fn new(config: SdkConfig) -> Self {
        Self::with_parts(config, MockWallet::default(), MockChain::default())
    }

    pub fn with_parts(config: SdkConfig, wallet: MockWallet, chain: MockChain) -> Self {
        let wallet = Arc::new(wallet);
        let escrow = Arc::new(MockEscrow::new(SELLER));
        let chain = Arc::new(chain);
        let market = Marketplace::new(
            config,
            Collaborators {
                escrow: escrow.clone(),
                wallet: wallet.clone(),
                reader: chain.clone(),
                writer: chain.clone(),
            },
        )
        .unwrap();
        Self {
            market,
            wallet,
            escrow,
            chain,
        }
    }
}

pub fn sample_upload(chain: &str) -> UploadRequest {
    UploadRequest {
        title: "Quarterly report".to_string(),
        description: "Q3 numbers".to_string(),
        price: "1.5".to_string(),
        file: FileBlob::new("report.pdf", "application/pdf", FILE_BYTES.to_vec()),
        image: FileBlob::new("cover.png", "image/png", vec![0x89, b'P', b'N', b'G']),
        chain: chain.to_string(),
    }
}
