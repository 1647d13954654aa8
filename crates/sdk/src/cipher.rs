//! Client-side file encryption with AES-256-GCM.
//!
//! Ciphertext layout: 12-byte nonce followed by the sealed payload.

use crate::error::{MarketError, Result};
use crate::metadata::FileBlob;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroize;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Per-file key; wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            MarketError::Cipher(format!("key must be {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Result of [`encrypt_file`].
#[derive(Debug)]
pub struct EncryptedFile {
    /// Unnamed blob holding nonce and ciphertext.
    pub encrypted_file: FileBlob,
    pub symmetric_key: SymmetricKey,
}

/// Encrypt `file` under a fresh key.
pub fn encrypt_file(file: &FileBlob) -> Result<EncryptedFile> {
    let symmetric_key = SymmetricKey::generate();
    let bytes = encrypt_bytes(&file.bytes, &symmetric_key)?;
    Ok(EncryptedFile {
        encrypted_file: FileBlob::anonymous(bytes),
        symmetric_key,
    })
}

pub fn encrypt_bytes(data: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| MarketError::Cipher(format!("cipher init failed: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), data)
        .map_err(|e| MarketError::Cipher(format!("encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Reverse of [`encrypt_bytes`]. Fails on a wrong key or tampered payload.
pub fn decrypt_file(sealed: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(MarketError::Cipher("ciphertext shorter than nonce".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| MarketError::Cipher(format!("cipher init failed: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| MarketError::Cipher(format!("decryption failed: {e}")))
}
