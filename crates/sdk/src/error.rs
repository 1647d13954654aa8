use thiserror::Error;

/// Errors raised by the marketplace client and its collaborators.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("could not switch to chain `{0}`")]
    ChainSwitchFailed(String),
    #[error("metadata at {0} is invalid")]
    MetadataInvalid(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("item {0} already delisted")]
    ItemAlreadyDelisted(String),
    #[error("chain `{0}` is not listed in the constant tables")]
    UnknownChain(String),
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("no unused item id found after {0} attempts")]
    ItemIdExhausted(usize),
    #[error("wallet rejected request (code {code}): {message}")]
    Wallet { code: i64, message: String },
    #[error("key escrow error: {0}")]
    Escrow(String),
    #[error("contract error: {0}")]
    Contract(String),
    #[error("cipher error: {0}")]
    Cipher(String),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hex error: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MarketError>;

impl MarketError {
    pub(crate) fn server_error(status: u16, message: impl Into<String>) -> Self {
        MarketError::ServerError {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn contract(msg: impl Into<String>) -> Self {
        MarketError::Contract(msg.into())
    }

    /// Whether the failure came from a wallet prompt the user declined.
    pub fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            MarketError::Wallet {
                code: crate::wallet::USER_REJECTED,
                ..
            }
        )
    }
}
