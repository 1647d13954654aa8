//! Threshold key escrow: stores a file key behind access conditions and
//! releases it to requesters that satisfy them.

use crate::cipher::SymmetricKey;
use crate::conditions::AccessCondition;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Signed sign-in message proving control of `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    pub sig: String,
    pub derived_via: String,
    pub signed_message: String,
    pub address: String,
}

/// Client handle for the escrow network. Owned by the marketplace and
/// connected once through [`KeyEscrow::connect`].
#[async_trait]
pub trait KeyEscrow: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Prompt the wallet for a sign-in signature on `chain`.
    async fn sign_auth_message(&self, chain: &str) -> Result<AuthSig>;

    /// Escrow `key` behind `conditions`; returns the encrypted key bytes.
    async fn save_encryption_key(
        &self,
        conditions: &[AccessCondition],
        key: &SymmetricKey,
        auth_sig: &AuthSig,
        chain: &str,
    ) -> Result<Vec<u8>>;

    /// Ask the network to decrypt `encrypted_key_hex` for the signer of `auth_sig`.
    async fn get_encryption_key(
        &self,
        conditions: &[AccessCondition],
        encrypted_key_hex: &str,
        chain: &str,
        auth_sig: &AuthSig,
    ) -> Result<SymmetricKey>;
}
