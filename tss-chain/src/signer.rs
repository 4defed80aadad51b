use crate::error::ChainError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};
use tss_types::TenantId;

/// Key material resolved for one signature: the raw ed25519 seed plus the
/// StrKey-encoded public key it corresponds to.
pub struct ResolvedKey {
    pub signing_key: SigningKey,
    pub public_key: String,
}

/// Narrow capability for resolving signing key material, so the `Signer`
/// does not itself need to know whether keys live in a KMS, an HSM, or an
/// encrypted database column.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Resolves the distribution account identity for a tenant.
    async fn distribution_key(&self, tenant: &TenantId) -> Result<ResolvedKey, ChainError>;

    /// Decrypts a channel account's at-rest private key material.
    async fn channel_key(&self, encrypted_private_key: &str) -> Result<ResolvedKey, ChainError>;
}

/// Symmetric-passphrase key source: channel-account and distribution seeds
/// are stored AES-256-GCM encrypted, keyed by a passphrase the service
/// holds in memory.
pub struct PassphraseKeySource {
    cipher: Aes256Gcm,
    distribution_seed_encrypted: String,
}

impl PassphraseKeySource {
    pub fn new(passphrase: &str, distribution_seed_encrypted: impl Into<String>) -> Self {
        let key_bytes = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
            distribution_seed_encrypted: distribution_seed_encrypted.into(),
        }
    }

    /// Payload format: `base64(nonce) || ':' || base64(ciphertext)`.
    fn decrypt(&self, payload: &str) -> Result<[u8; 32], ChainError> {
        let (nonce_b64, ct_b64) = payload
            .split_once(':')
            .ok_or_else(|| ChainError::MalformedResponse("malformed encrypted key".into()))?;
        let nonce_bytes = base64::decode(nonce_b64)
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        let ct = base64::decode(ct_b64).map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ct.as_ref())
            .map_err(|_| ChainError::MalformedResponse("decryption failed".into()))?;
        plaintext
            .try_into()
            .map_err(|_| ChainError::MalformedResponse("decrypted seed is not 32 bytes".into()))
    }

    /// Encrypts a freshly generated ed25519 seed for at-rest storage, the
    /// inverse of `decrypt`. Used by channel-account provisioning to produce
    /// the `encrypted_private_key` column value for a brand new key.
    pub fn encrypt_seed(&self, seed: &[u8; 32]) -> Result<String, ChainError> {
        use aes_gcm::aead::{Aead, OsRng};
        use aes_gcm::AeadCore;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, seed.as_ref())
            .map_err(|_| ChainError::MalformedResponse("encryption failed".into()))?;
        Ok(format!("{}:{}", base64::encode(nonce), base64::encode(ciphertext)))
    }

    /// Confirms the configured distribution seed actually decrypts under
    /// this passphrase, for startup validation.
    pub fn validate_distribution_seed(&self) -> Result<(), ChainError> {
        self.resolve(&self.distribution_seed_encrypted).map(|_| ())
    }

    fn resolve(&self, encrypted: &str) -> Result<ResolvedKey, ChainError> {
        let seed = self.decrypt(encrypted)?;
        let signing_key = SigningKey::from_bytes(&seed);
        let public_key =
            tss_types::strkey::encode_ed25519_public_key(&signing_key.verifying_key().to_bytes());
        Ok(ResolvedKey {
            signing_key,
            public_key,
        })
    }
}

#[async_trait]
impl KeySource for PassphraseKeySource {
    async fn distribution_key(&self, _tenant: &TenantId) -> Result<ResolvedKey, ChainError> {
        // Single-tenant distribution seed today; tenant-scoped vaults are a
        // drop-in replacement for this lookup, not a change to the trait.
        self.resolve(&self.distribution_seed_encrypted)
    }

    async fn channel_key(&self, encrypted_private_key: &str) -> Result<ResolvedKey, ChainError> {
        self.resolve(encrypted_private_key)
    }
}

/// Lets `Signer` be built over a boxed trait object, so callers that don't
/// want to carry a generic parameter through their own types (the worker,
/// the CLI wiring) can use `Signer<Box<dyn KeySource>>` directly.
#[async_trait]
impl KeySource for Box<dyn KeySource> {
    async fn distribution_key(&self, tenant: &TenantId) -> Result<ResolvedKey, ChainError> {
        (**self).distribution_key(tenant).await
    }

    async fn channel_key(&self, encrypted_private_key: &str) -> Result<ResolvedKey, ChainError> {
        (**self).channel_key(encrypted_private_key).await
    }
}

/// The signing capability set consumed by the worker:
/// `network_passphrase`, `sign_with_distribution_account`,
/// `sign_with_channel_account`.
pub struct Signer<K> {
    key_source: K,
    network_passphrase: String,
}

impl<K: KeySource> Signer<K> {
    pub fn new(key_source: K, network_passphrase: impl Into<String>) -> Self {
        Self {
            key_source,
            network_passphrase: network_passphrase.into(),
        }
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    /// Resolves the distribution account's public key without signing
    /// anything, for callers that only need to know its identity (building
    /// an envelope's `source_account` before a signature is needed).
    pub async fn distribution_public_key(&self, tenant: &TenantId) -> Result<String, ChainError> {
        Ok(self.key_source.distribution_key(tenant).await?.public_key)
    }

    fn signature_payload(&self, transaction_xdr_body: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(Sha256::digest(self.network_passphrase.as_bytes()));
        hasher.update(transaction_xdr_body);
        hasher.finalize().to_vec()
    }

    /// Signs the transaction-signature-payload hash with the distribution
    /// account key and returns the raw 64-byte signature.
    pub async fn sign_with_distribution_account(
        &self,
        tenant: &TenantId,
        transaction_xdr_body: &[u8],
    ) -> Result<(Vec<u8>, String), ChainError> {
        let key = self.key_source.distribution_key(tenant).await?;
        let payload = self.signature_payload(transaction_xdr_body);
        let signature = key.signing_key.sign(&payload);
        Ok((signature.to_bytes().to_vec(), key.public_key))
    }

    /// Signs with a channel account's key, verifying the caller's
    /// expectation of which public key will be used.
    pub async fn sign_with_channel_account(
        &self,
        encrypted_private_key: &str,
        expected_public_key: &str,
        transaction_xdr_body: &[u8],
    ) -> Result<Vec<u8>, ChainError> {
        let key = self.key_source.channel_key(encrypted_private_key).await?;
        if key.public_key != expected_public_key {
            return Err(ChainError::MalformedResponse(
                "decrypted channel key does not match its recorded public key".into(),
            ));
        }
        let payload = self.signature_payload(transaction_xdr_body);
        let signature = key.signing_key.sign(&payload);
        Ok(signature.to_bytes().to_vec())
    }
}
