//! Curve25519 keys in WireGuard's base64 text form
//!
//! Private and public keys are X25519 (x25519-dalek); preshared keys are
//! 32 random bytes. All of them travel as standard base64, 44 characters.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use rand_core::OsRng;
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};

/// Raw length of every WireGuard key
pub const KEY_LENGTH: usize = 32;

/// Static key pair of one peer
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    /// Rebuild a pair from raw private key bytes, deriving the public half
    /// like `wg pubkey`
    pub fn from_private_key(private_key: [u8; KEY_LENGTH]) -> Self {
        Self::from_secret(StaticSecret::from(private_key))
    }

    pub fn from_private_key_base64(private_key: &str) -> Result<Self> {
        Ok(Self::from_private_key(decode_key(private_key)?))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> &[u8; KEY_LENGTH] {
        self.public.as_bytes()
    }

    pub fn private_key_base64(&self) -> String {
        STANDARD.encode(self.secret.to_bytes())
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.public.as_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_base64())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Key helpers that work on the base64 text stored in the network
pub struct WireGuardKeys;

impl WireGuardKeys {
    /// Fresh preshared key for a new connection
    pub fn generate_preshared_key() -> String {
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        STANDARD.encode(key)
    }

    /// Check that `public_key` is the public half of `private_key`
    pub fn check_pair(private_key: &str, public_key: &str) -> Result<()> {
        let pair = KeyPair::from_private_key_base64(private_key)?;
        if decode_key(public_key)? != *pair.public_key() {
            return Err(Error::WireGuardConfig(
                "public key does not match private key".to_string(),
            ));
        }
        Ok(())
    }

    /// First 8 characters of a key, for logs
    pub fn format_key_short(key: &str) -> String {
        match key.get(..8) {
            Some(prefix) if key.len() > 8 => format!("{}...", prefix),
            _ => key.to_string(),
        }
    }
}

fn decode_key(key: &str) -> Result<[u8; KEY_LENGTH]> {
    let bytes = STANDARD
        .decode(key.trim())
        .map_err(|e| Error::WireGuardConfig(format!("Invalid base64 key: {}", e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::WireGuardConfig(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            bytes.len()
        ))
    })
}
