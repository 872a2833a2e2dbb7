//! At-rest sealing for the credential slot: AES-256-GCM under a key derived (HKDF-SHA256) from
//! a per-machine random secret.

use aes_gcm::{
    aead::{Aead as _, KeyInit as _},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use eyre::Context as _;
use hkdf::Hkdf;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;
use zeroize::Zeroizing;

use crate::fsutil;

pub const BOX_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
pub const MACHINE_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoBox {
    pub v: u8,
    pub nonce_b64: String,
    pub ct_b64: String,
}

pub fn fill_random(buf: &mut [u8]) {
    let mut rng = rand::rng();
    rng.fill_bytes(buf);
}

/// Per-slot encryption key. `slot` is the storage key the record lives under.
pub fn derive_slot_key(
    machine_secret: &[u8; MACHINE_SECRET_LEN],
    slot: &str,
) -> eyre::Result<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(None, machine_secret);
    let info = format!("ainshtein:{slot}:credential");
    let mut out = Zeroizing::new([0_u8; 32]);
    hk.expand(info.as_bytes(), out.as_mut_slice())
        .map_err(|e| eyre::eyre!("hkdf expand: {e}"))?;
    Ok(out)
}

pub fn encrypt_aes_gcm(key32: &[u8; 32], plaintext: &[u8]) -> eyre::Result<CryptoBox> {
    let cipher = Aes256Gcm::new_from_slice(key32).context("aes init")?;
    let mut nonce = [0_u8; NONCE_LEN];
    fill_random(&mut nonce);
    let ct = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| eyre::eyre!("aes encrypt: {e}"))?;

    Ok(CryptoBox {
        v: BOX_VERSION,
        nonce_b64: base64::engine::general_purpose::STANDARD.encode(nonce),
        ct_b64: base64::engine::general_purpose::STANDARD.encode(ct),
    })
}

pub fn decrypt_aes_gcm(key32: &[u8; 32], b: &CryptoBox) -> eyre::Result<Zeroizing<Vec<u8>>> {
    if b.v != BOX_VERSION {
        eyre::bail!("unsupported CryptoBox version: {}", b.v);
    }
    let cipher = Aes256Gcm::new_from_slice(key32).context("aes init")?;
    let nonce = base64::engine::general_purpose::STANDARD
        .decode(&b.nonce_b64)
        .context("decode nonce")?;
    if nonce.len() != NONCE_LEN {
        eyre::bail!("invalid nonce length");
    }
    let ct = base64::engine::general_purpose::STANDARD
        .decode(&b.ct_b64)
        .context("decode ciphertext")?;

    let pt = cipher
        .decrypt(Nonce::from_slice(&nonce), ct.as_ref())
        .map_err(|e| eyre::eyre!("aes decrypt: {e}"))?;
    Ok(Zeroizing::new(pt))
}

fn parse_machine_secret(buf: &[u8]) -> eyre::Result<Zeroizing<[u8; MACHINE_SECRET_LEN]>> {
    let arr: [u8; MACHINE_SECRET_LEN] = buf
        .try_into()
        .map_err(|e| eyre::eyre!("machine secret wrong length: {e}"))?;
    Ok(Zeroizing::new(arr))
}

/// Read the machine secret if one has been created.
pub fn read_machine_secret(
    path: &Path,
) -> eyre::Result<Option<Zeroizing<[u8; MACHINE_SECRET_LEN]>>> {
    let Some(buf) = fsutil::read_if_exists(path).context("read machine secret")? else {
        return Ok(None);
    };
    let buf = Zeroizing::new(buf);
    parse_machine_secret(&buf).map(Some)
}

/// Read the machine secret, creating it (mode 0600) on first use.
pub fn ensure_machine_secret(path: &Path) -> eyre::Result<Zeroizing<[u8; MACHINE_SECRET_LEN]>> {
    if let Some(existing) = read_machine_secret(path)? {
        return Ok(existing);
    }
    let mut secret = Zeroizing::new([0_u8; MACHINE_SECRET_LEN]);
    fill_random(secret.as_mut_slice());
    fsutil::write_atomic_restrictive(path, secret.as_slice(), fsutil::MODE_FILE_PRIVATE)
        .context("write machine secret")?;
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::ContextCompat as _;

    #[test]
    fn aes_gcm_roundtrip() -> eyre::Result<()> {
        let key = [7_u8; 32];
        let pt = br#"{"privateKey":"x"}"#.to_vec();
        let boxv = encrypt_aes_gcm(&key, &pt).context("encrypt")?;
        let out = decrypt_aes_gcm(&key, &boxv).context("decrypt")?;
        assert_eq!(out.as_slice(), pt.as_slice());
        Ok(())
    }

    #[test]
    fn aes_gcm_wrong_key_fails() -> eyre::Result<()> {
        let key = [7_u8; 32];
        let boxv = encrypt_aes_gcm(&key, b"secret").context("encrypt")?;
        let err = decrypt_aes_gcm(&[8_u8; 32], &boxv)
            .err()
            .context("wrong key must fail")?;
        assert!(err.to_string().contains("aes decrypt"));
        Ok(())
    }

    #[test]
    fn slot_keys_differ_per_slot() -> eyre::Result<()> {
        let machine = [3_u8; MACHINE_SECRET_LEN];
        let a = derive_slot_key(&machine, "ainshtein_wallet_data")?;
        let b = derive_slot_key(&machine, "other")?;
        assert_ne!(a.as_slice(), b.as_slice());
        assert_eq!(
            a.as_slice(),
            derive_slot_key(&machine, "ainshtein_wallet_data")?.as_slice()
        );
        Ok(())
    }

    #[test]
    fn machine_secret_is_created_once() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("machine_secret.bin");
        assert!(read_machine_secret(&p)?.is_none());
        let first = ensure_machine_secret(&p)?;
        let second = ensure_machine_secret(&p)?;
        assert_eq!(first.as_slice(), second.as_slice());
        Ok(())
    }

    #[test]
    fn truncated_machine_secret_is_rejected() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("machine_secret.bin");
        std::fs::write(&p, [1_u8; 5])?;
        assert!(read_machine_secret(&p).is_err());
        Ok(())
    }
}
