//! BIP-39 recovery phrase to 64-byte seed.

use bip39::{Language, Mnemonic};
use std::fmt;
use tracing::warn;
use zeroize::Zeroizing;

use crate::errors::WalletError;

pub const SEED_LEN: usize = 64;

/// Length of the key material taken from the front of the seed for the "direct" candidate.
pub const DIRECT_MATERIAL_LEN: usize = 32;

/// Binary seed derived from a recovery phrase. Zeroized on drop and never printed.
pub struct Seed(Zeroizing<[u8; SEED_LEN]>);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }

    /// The first 32 bytes, used verbatim as an Ed25519 secret by older wallet builds.
    pub fn direct_material(&self) -> Zeroizing<[u8; DIRECT_MATERIAL_LEN]> {
        let mut out = Zeroizing::new([0_u8; DIRECT_MATERIAL_LEN]);
        for (dst, src) in out.iter_mut().zip(self.0.iter()) {
            *dst = *src;
        }
        out
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// Collapse runs of whitespace and lowercase every word.
pub fn normalize_phrase(phrase: &str) -> Zeroizing<String> {
    Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn parse_mnemonic(normalized: &str) -> Result<Mnemonic, WalletError> {
    match Mnemonic::parse_in_normalized(Language::English, normalized) {
        Ok(m) => Ok(m),
        Err(bip39::Error::InvalidChecksum) => {
            // Words and length are valid. Older builds derived accounts without a checksum
            // check, so keep those accounts reachable.
            warn!("recovery phrase checksum mismatch; continuing without checksum");
            Mnemonic::parse_in_normalized_without_checksum_check(Language::English, normalized)
                .map_err(|e| WalletError::InvalidRecoveryPhrase(e.to_string()))
        }
        Err(e) => Err(WalletError::InvalidRecoveryPhrase(e.to_string())),
    }
}

/// Expand a recovery phrase (+ optional passphrase) into its 64-byte seed.
///
/// PBKDF2-HMAC-SHA512, 2048 rounds, salt `"mnemonic" || passphrase` (BIP-39).
pub fn expand(phrase: &str, passphrase: Option<&str>) -> Result<Seed, WalletError> {
    let normalized = normalize_phrase(phrase);
    if normalized.is_empty() {
        return Err(WalletError::InvalidRecoveryPhrase(
            "seed phrase cannot be empty".into(),
        ));
    }
    let mnemonic = parse_mnemonic(&normalized)?;
    Ok(Seed::from_bytes(mnemonic.to_seed(passphrase.unwrap_or(""))))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str =
        "have work cattle cream victory just garden pilot lonely fiscal rough winner";

    #[test]
    fn expand_is_deterministic() -> eyre::Result<()> {
        let a = expand(PHRASE, None)?;
        let b = expand(PHRASE, Some(""))?;
        assert_eq!(a.as_bytes(), b.as_bytes());
        Ok(())
    }

    #[test]
    fn passphrase_changes_seed() -> eyre::Result<()> {
        let plain = expand(PHRASE, None)?;
        let salted = expand(PHRASE, Some("1"))?;
        assert_ne!(plain.as_bytes(), salted.as_bytes());
        Ok(())
    }

    #[test]
    fn messy_whitespace_and_case_are_normalized() -> eyre::Result<()> {
        let messy = format!("  {}\n", PHRASE.to_uppercase().replace(' ', " \t "));
        let a = expand(&messy, None)?;
        let b = expand(PHRASE, None)?;
        assert_eq!(a.as_bytes(), b.as_bytes());
        Ok(())
    }

    #[test]
    fn matches_solana_seed_phrase_crate() -> eyre::Result<()> {
        let ours = expand(PHRASE, Some("hunter2"))?;
        let theirs =
            solana_seed_phrase::generate_seed_from_seed_phrase_and_passphrase(PHRASE, "hunter2");
        assert_eq!(ours.as_bytes().as_slice(), theirs.as_slice());
        Ok(())
    }

    #[test]
    fn empty_phrase_is_rejected() {
        assert!(matches!(
            expand("   ", None),
            Err(WalletError::InvalidRecoveryPhrase(_))
        ));
    }

    #[test]
    fn unknown_word_is_rejected() {
        let bad = PHRASE.replace("cattle", "cattlex");
        assert!(matches!(
            expand(&bad, None),
            Err(WalletError::InvalidRecoveryPhrase(_))
        ));
    }

    #[test]
    fn wrong_word_count_is_rejected() {
        assert!(matches!(
            expand("have work cattle", None),
            Err(WalletError::InvalidRecoveryPhrase(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_bytes() -> eyre::Result<()> {
        let s = expand(PHRASE, None)?;
        assert_eq!(format!("{s:?}"), "Seed(<redacted>)");
        Ok(())
    }
}
