//! Key material and verification-method resolution.
//!
//! The kernel never touches raw key bytes during signing or verification:
//! it holds an opaque signing handle and asks a [`KeyResolver`] to turn a
//! `verificationMethod` URI into a verification handle.
//!
//! ## Cryptosuites
//!
//! | Suite | Signing handle | Verification handle |
//! |-------|----------------|---------------------|
//! | `Ed25519` | [`Ed25519Signer`] | [`Ed25519VerificationKey`] |
//! | `HMAC-SHA-256` | [`HmacSha256Key`] | [`HmacSha256Key`] (shared secret) |
//!
//! ## Resolution Cache
//!
//! [`CachedKeyResolver`] puts an LRU cache in front of any resolver so that a
//! package with many proofs from one issuer dereferences its key once.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use lru::LruCache;
use parking_lot::RwLock;
use sha2::Sha256;

/// Cryptosuite name for Ed25519 proofs.
pub const ED25519_SUITE: &str = "Ed25519";

/// Cryptosuite name for shared-secret proofs.
pub const HMAC_SHA256_SUITE: &str = "HMAC-SHA-256";

/// Error type for key handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// No key is published under the verification method.
    #[error("Unknown verification method: {0}")]
    UnknownVerificationMethod(String),
    /// The key cannot be used.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
    /// The verification method could not be dereferenced.
    #[error("Could not retrieve key for {method}: {reason}")]
    Retrieval {
        /// Verification method URI.
        method: String,
        /// Failure description.
        reason: String,
    },
}

/// Opaque private key handle.
pub trait SigningKeyMaterial: Send + Sync {
    /// Cryptosuite recorded in produced proofs.
    fn cryptosuite(&self) -> &str;

    /// Sign a content digest.
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KeyError>;
}

impl<T: SigningKeyMaterial + ?Sized> SigningKeyMaterial for Arc<T> {
    fn cryptosuite(&self) -> &str {
        (**self).cryptosuite()
    }

    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
        (**self).sign(digest)
    }
}

/// Opaque public key handle.
pub trait VerificationKey: Send + Sync {
    /// Cryptosuite this key verifies.
    fn cryptosuite(&self) -> &str;

    /// Check `signature` over `digest`. Mismatch is `false`, never an error.
    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool;
}

/// Trait for dereferencing verification methods.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve `verification_method` to a verification key.
    async fn resolve(&self, verification_method: &str) -> Result<Arc<dyn VerificationKey>, KeyError>;
}

#[async_trait]
impl<T: KeyResolver + ?Sized> KeyResolver for Arc<T> {
    async fn resolve(&self, verification_method: &str) -> Result<Arc<dyn VerificationKey>, KeyError> {
        (**self).resolve(verification_method).await
    }
}

/// Ed25519 signing handle.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Create a signer from a 32-byte secret key.
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    /// Wrap an existing signing key.
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// The matching verification handle.
    pub fn verification_key(&self) -> Ed25519VerificationKey {
        Ed25519VerificationKey {
            key: self.key.verifying_key(),
        }
    }
}

impl SigningKeyMaterial for Ed25519Signer {
    fn cryptosuite(&self) -> &str {
        ED25519_SUITE
    }

    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
        Ok(self.key.sign(digest).to_bytes().to_vec())
    }
}

/// Ed25519 verification handle.
#[derive(Debug, Clone)]
pub struct Ed25519VerificationKey {
    key: VerifyingKey,
}

impl Ed25519VerificationKey {
    /// Import a 32-byte public key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(bytes)
            .map(|key| Self { key })
            .map_err(|e| KeyError::InvalidKey(e.to_string()))
    }
}

impl VerificationKey for Ed25519VerificationKey {
    fn cryptosuite(&self) -> &str {
        ED25519_SUITE
    }

    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool {
        match Signature::from_slice(signature) {
            Ok(sig) => self.key.verify(digest, &sig).is_ok(),
            Err(_) => false,
        }
    }
}

/// Shared-secret key, usable for both signing and verification.
#[derive(Clone)]
pub struct HmacSha256Key {
    secret: Vec<u8>,
}

impl HmacSha256Key {
    /// Create a key from a shared secret (32+ bytes recommended).
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<Hmac<Sha256>, KeyError> {
        Hmac::<Sha256>::new_from_slice(&self.secret).map_err(|e| KeyError::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for HmacSha256Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha256Key").field("secret", &"<redacted>").finish()
    }
}

impl SigningKeyMaterial for HmacSha256Key {
    fn cryptosuite(&self) -> &str {
        HMAC_SHA256_SUITE
    }

    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
        let mut mac = self.mac()?;
        mac.update(digest);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl VerificationKey for HmacSha256Key {
    fn cryptosuite(&self) -> &str {
        HMAC_SHA256_SUITE
    }

    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool {
        match self.mac() {
            Ok(mut mac) => {
                mac.update(digest);
                mac.verify_slice(signature).is_ok()
            }
            Err(_) => false,
        }
    }
}

/// Resolver over a fixed set of published keys.
#[derive(Clone, Default)]
pub struct StaticKeyResolver {
    keys: BTreeMap<String, Arc<dyn VerificationKey>>,
}

impl StaticKeyResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `key` under `verification_method`.
    pub fn with_key(
        mut self,
        verification_method: impl Into<String>,
        key: impl VerificationKey + 'static,
    ) -> Self {
        self.keys.insert(verification_method.into(), Arc::new(key));
        self
    }

    /// Number of published keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are published.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, verification_method: &str) -> Result<Arc<dyn VerificationKey>, KeyError> {
        self.keys
            .get(verification_method)
            .cloned()
            .ok_or_else(|| KeyError::UnknownVerificationMethod(verification_method.to_string()))
    }
}

/// Configuration for the key resolution cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            enabled: true,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}

/// LRU cache in front of another resolver.
///
/// Only successful resolutions are cached; a missing key is retried next time.
pub struct CachedKeyResolver<R: KeyResolver> {
    inner: R,
    cache: Option<Arc<RwLock<LruCache<String, Arc<dyn VerificationKey>>>>>,
}

impl<R: KeyResolver> CachedKeyResolver<R> {
    /// Create a cached resolver with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, CacheConfig::default())
    }

    /// Create a cached resolver with custom configuration.
    pub fn with_config(inner: R, config: CacheConfig) -> Self {
        let cache = if config.enabled {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            Some(Arc::new(RwLock::new(LruCache::new(size))))
        } else {
            None
        };
        Self { inner, cache }
    }

    /// Resolve and report whether the answer came from cache.
    pub async fn resolve_tracked(
        &self,
        verification_method: &str,
    ) -> Result<(Arc<dyn VerificationKey>, bool), KeyError> {
        if let Some(cache) = &self.cache {
            if let Some(key) = cache.read().peek(verification_method) {
                return Ok((Arc::clone(key), true));
            }
        }

        let key = self.inner.resolve(verification_method).await?;

        if let Some(cache) = &self.cache {
            cache.write().put(verification_method.to_string(), Arc::clone(&key));
        }

        Ok((key, false))
    }

    /// Get cache statistics.
    ///
    /// Returns `None` if caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
            }
        })
    }

    /// Clear the cache.
    ///
    /// Does nothing if caching is disabled.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}

#[async_trait]
impl<R: KeyResolver> KeyResolver for CachedKeyResolver<R> {
    async fn resolve(&self, verification_method: &str) -> Result<Arc<dyn VerificationKey>, KeyError> {
        self.resolve_tracked(verification_method).await.map(|(key, _)| key)
    }
}
