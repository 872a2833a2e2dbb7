//! Ed25519 keypairs: construction from derived secrets and the private-key text encodings.

use ed25519_dalek::SigningKey;
use solana_keypair::Keypair;
use solana_signer::Signer as _;
use zeroize::Zeroizing;

use crate::errors::WalletError;

pub const KEYPAIR_LEN: usize = 64;

/// How an imported private key string was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    Base58,
    Hex,
    /// The string's own bytes are the 64-byte keypair.
    RawAscii,
}

/// Accept `bytes` only if they are a 64-byte `secret || public` keypair whose public half
/// matches the secret.
fn keypair_from_bytes(bytes: &[u8]) -> Option<Keypair> {
    let arr: &[u8; KEYPAIR_LEN] = bytes.try_into().ok()?;
    SigningKey::from_keypair_bytes(arr).ok()?;
    Keypair::try_from(bytes).ok()
}

fn decode_base58(text: &str) -> Option<Keypair> {
    let bytes = Zeroizing::new(bs58::decode(text).into_vec().ok()?);
    keypair_from_bytes(&bytes)
}

fn decode_hex(text: &str) -> Option<Keypair> {
    let t = text.strip_prefix("0x").unwrap_or(text);
    let bytes = Zeroizing::new(hex::decode(t).ok()?);
    keypair_from_bytes(&bytes)
}

/// Build the keypair for a 32-byte Ed25519 secret. `label` names the source in errors.
pub fn from_seed_material(secret: &[u8; 32], label: &str) -> Result<Keypair, WalletError> {
    let signing = SigningKey::from_bytes(secret);
    let bytes = Zeroizing::new(signing.to_keypair_bytes());
    Keypair::try_from(bytes.as_slice()).map_err(|e| WalletError::DerivationFailure {
        path: label.to_owned(),
        reason: e.to_string(),
    })
}

/// Decode a user-supplied private key: base58, then hex, then the raw bytes of the string.
/// The first interpretation that yields a valid keypair wins.
pub fn decode_private_key(text: &str) -> Result<(Keypair, KeyEncoding), WalletError> {
    let t = text.trim();
    if t.is_empty() {
        return Err(WalletError::InvalidPrivateKeyFormat);
    }
    if let Some(kp) = decode_base58(t) {
        return Ok((kp, KeyEncoding::Base58));
    }
    if let Some(kp) = decode_hex(t) {
        return Ok((kp, KeyEncoding::Hex));
    }
    if let Some(kp) = keypair_from_bytes(t.as_bytes()) {
        return Ok((kp, KeyEncoding::RawAscii));
    }
    Err(WalletError::InvalidPrivateKeyFormat)
}

pub fn from_encoded_private_key(text: &str) -> Result<Keypair, WalletError> {
    decode_private_key(text).map(|(kp, _)| kp)
}

/// Decode a persisted `privateKey` field (base58, or hex written by older builds).
pub fn from_persisted(text: &str) -> Result<Keypair, WalletError> {
    let t = text.trim();
    decode_base58(t)
        .or_else(|| decode_hex(t))
        .ok_or(WalletError::InvalidPrivateKeyFormat)
}

/// Canonical text form: base58 of the 64-byte keypair.
pub fn to_encoded(kp: &Keypair) -> Zeroizing<String> {
    let bytes = Zeroizing::new(kp.to_bytes());
    Zeroizing::new(bs58::encode(bytes.as_slice()).into_string())
}

pub fn public_key_of(kp: &Keypair) -> String {
    kp.pubkey().to_string()
}
