//! The Gemini API key at rest.
//!
//! The settings table never holds the key itself. It holds either a pointer
//! to the OS keychain entry (`keychain:saudi-invoicer:gemini_api_key`) or the
//! key sealed with AES-256-GCM (`enc:<salt>:<nonce>:<ciphertext>`, Base64
//! fields). The sealing key is derived from a built-in secret with PBKDF2, so
//! the blob only keeps the key out of plain sight in the database file.

use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose, Engine as _};
use ring::{aead, pbkdf2, rand::{SecureRandom, SystemRandom}};
use std::num::NonZeroU32;

const SEAL_SECRET: &[u8] = b"saudi-invoicer-secret-v1";
const PBKDF2_ROUNDS: u32 = 100_000;
const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

const KEYCHAIN_SERVICE: &str = "saudi-invoicer";
const KEYCHAIN_ACCOUNT: &str = "gemini_api_key";
const KEYCHAIN_PREFIX: &str = "keychain:";
const SEALED_PREFIX: &str = "enc:";

/// Parsed form of the `gemini_api_key` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredKey {
    Keychain,
    Sealed {
        salt: Vec<u8>,
        nonce: [u8; NONCE_LEN],
        ciphertext: Vec<u8>,
    },
}

impl StoredKey {
    pub fn parse(stored: &str) -> Result<Self> {
        if let Some(location) = stored.strip_prefix(KEYCHAIN_PREFIX) {
            if location != keychain_location() {
                bail!("Invalid keychain reference");
            }
            return Ok(StoredKey::Keychain);
        }

        let Some(sealed) = stored.strip_prefix(SEALED_PREFIX) else {
            bail!("Unknown encrypted format");
        };
        let fields: Vec<&str> = sealed.split(':').collect();
        let [salt, nonce, ciphertext] = fields.as_slice() else {
            bail!("Invalid encrypted payload");
        };
        let nonce: [u8; NONCE_LEN] = decode_field("nonce", nonce)?
            .try_into()
            .map_err(|_| anyhow!("Invalid nonce length"))?;
        Ok(StoredKey::Sealed {
            salt: decode_field("salt", salt)?,
            nonce,
            ciphertext: decode_field("ciphertext", ciphertext)?,
        })
    }

    pub fn encode(&self) -> String {
        match self {
            StoredKey::Keychain => format!("{}{}", KEYCHAIN_PREFIX, keychain_location()),
            StoredKey::Sealed { salt, nonce, ciphertext } => format!(
                "{}{}:{}:{}",
                SEALED_PREFIX,
                general_purpose::STANDARD.encode(salt),
                general_purpose::STANDARD.encode(nonce),
                general_purpose::STANDARD.encode(ciphertext)
            ),
        }
    }

    /// Seals `api_key` with a fresh salt and nonce.
    pub fn seal(api_key: &str) -> Result<Self> {
        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut salt).map_err(|_| anyhow!("Failed to generate salt"))?;
        rng.fill(&mut nonce).map_err(|_| anyhow!("Failed to generate nonce"))?;

        let mut ciphertext = api_key.as_bytes().to_vec();
        sealing_key(&salt)?
            .seal_in_place_append_tag(aead::Nonce::assume_unique_for_key(nonce), aead::Aad::empty(), &mut ciphertext)
            .map_err(|_| anyhow!("Encryption failed"))?;

        Ok(StoredKey::Sealed {
            salt: salt.to_vec(),
            nonce,
            ciphertext,
        })
    }

    pub fn reveal(&self) -> Result<String> {
        match self {
            StoredKey::Keychain => keychain_entry()?
                .get_password()
                .map_err(|e| anyhow!("Keychain fetch error: {}", e)),
            StoredKey::Sealed { salt, nonce, ciphertext } => {
                let mut buffer = ciphertext.clone();
                let plain = sealing_key(salt)?
                    .open_in_place(aead::Nonce::assume_unique_for_key(*nonce), aead::Aad::empty(), &mut buffer)
                    .map_err(|_| anyhow!("Decryption failed"))?;
                Ok(String::from_utf8(plain.to_vec())?)
            }
        }
    }
}

/// Keychain first, sealed blob when no keychain is reachable. Returns the
/// value to put in the settings table.
pub fn protect_api_key(api_key: &str) -> Result<String> {
    let stored = match keychain_entry().and_then(|entry| {
        entry
            .set_password(api_key)
            .map_err(|e| anyhow!("Keychain store error: {}", e))
    }) {
        Ok(()) => StoredKey::Keychain,
        Err(err) => {
            tracing::debug!(error = %err, "keychain unavailable, sealing key locally");
            StoredKey::seal(api_key)?
        }
    };
    Ok(stored.encode())
}

pub fn reveal_api_key(stored: &str) -> Result<String> {
    StoredKey::parse(stored)?.reveal()
}

/// Drops the keychain entry behind `stored`, if there is one. A sealed blob
/// lives only in the settings row, so there is nothing else to remove.
pub fn forget_api_key(stored: &str) -> Result<()> {
    if let StoredKey::Keychain = StoredKey::parse(stored)? {
        match keychain_entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => bail!("Keychain delete error: {}", e),
        }
    }
    Ok(())
}

fn keychain_location() -> String {
    format!("{}:{}", KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT)
}

fn keychain_entry() -> Result<keyring::Entry> {
    keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).map_err(|e| anyhow!("Keychain error: {}", e))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|e| anyhow!("Decode {}: {}", name, e))
}

fn sealing_key(salt: &[u8]) -> Result<aead::LessSafeKey> {
    let rounds = NonZeroU32::new(PBKDF2_ROUNDS).ok_or_else(|| anyhow!("Invalid iterations"))?;
    let mut key_bytes = [0u8; 32];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, rounds, salt, SEAL_SECRET, &mut key_bytes);
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key_bytes).map_err(|_| anyhow!("Invalid key material"))?;
    Ok(aead::LessSafeKey::new(unbound))
}
