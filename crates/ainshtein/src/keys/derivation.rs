//! SLIP-0010 hierarchical derivation for Ed25519 (hardened segments only).

use hmac::{Hmac, Mac as _};
use sha2::Sha512;
use std::{fmt, str::FromStr};
use zeroize::{Zeroize as _, Zeroizing};

use crate::{config::INDEX_PLACEHOLDER, errors::WalletError, keys::seed::Seed};

type HmacSha512 = Hmac<Sha512>;

pub const HARDENED_OFFSET: u32 = 0x8000_0000;
const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

/// A parsed `m/a'/b'/...` path. Every segment is hardened; the stored values are the raw
/// indices without the hardened offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    segments: Vec<u32>,
}

impl DerivationPath {
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Instantiate a template such as `m/44'/501'/{index}'/0'`.
    pub fn from_template(template: &str, index: u32) -> Result<Self, WalletError> {
        template
            .replace(INDEX_PLACEHOLDER, &index.to_string())
            .parse()
    }
}

fn failure(path: &str, reason: impl Into<String>) -> WalletError {
    WalletError::DerivationFailure {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

fn strip_hardened_marker(seg: &str) -> Option<&str> {
    seg.strip_suffix('\'')
        .or_else(|| seg.strip_suffix('h'))
        .or_else(|| seg.strip_suffix('H'))
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        let mut parts = path.split('/');
        if parts.next() != Some("m") {
            return Err(failure(path, "path must start with 'm'"));
        }

        let mut segments = Vec::new();
        for seg in parts {
            if seg.is_empty() {
                return Err(failure(path, "empty path segment"));
            }
            let digits = strip_hardened_marker(seg)
                .ok_or_else(|| failure(path, format!("segment {seg} is not hardened")))?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(failure(path, format!("segment {seg} is not numeric")));
            }
            let value: u32 = digits
                .parse()
                .map_err(|e| failure(path, format!("segment {seg}: {e}")))?;
            if value >= HARDENED_OFFSET {
                return Err(failure(path, format!("segment {seg} is out of range")));
            }
            segments.push(value);
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for s in &self.segments {
            write!(f, "/{s}'")?;
        }
        Ok(())
    }
}

/// Private key + chain code at one node of the tree.
struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

impl ExtendedKey {
    fn from_hmac_output(out: &[u8]) -> Self {
        let mut key = Zeroizing::new([0_u8; 32]);
        let mut chain_code = Zeroizing::new([0_u8; 32]);
        let (il, ir) = out.split_at(out.len().min(32));
        for (dst, src) in key.iter_mut().zip(il) {
            *dst = *src;
        }
        for (dst, src) in chain_code.iter_mut().zip(ir) {
            *dst = *src;
        }
        Self { key, chain_code }
    }

    fn master(seed: &[u8]) -> Result<Self, WalletError> {
        let mut mac = HmacSha512::new_from_slice(MASTER_HMAC_KEY)
            .map_err(|e| failure("m", e.to_string()))?;
        mac.update(seed);
        let mut out = mac.finalize().into_bytes();
        let node = Self::from_hmac_output(&out);
        out.as_mut_slice().zeroize();
        Ok(node)
    }

    fn child(&self, index: u32) -> Result<Self, WalletError> {
        let hardened = index | HARDENED_OFFSET;
        let mut mac = HmacSha512::new_from_slice(self.chain_code.as_slice())
            .map_err(|e| failure("m", e.to_string()))?;
        mac.update(&[0_u8]);
        mac.update(self.key.as_slice());
        mac.update(&hardened.to_be_bytes());
        let mut out = mac.finalize().into_bytes();
        let node = Self::from_hmac_output(&out);
        out.as_mut_slice().zeroize();
        Ok(node)
    }
}

/// Derive the 32-byte Ed25519 secret at `path` from raw seed bytes.
pub fn derive_from_bytes(
    seed: &[u8],
    path: &DerivationPath,
) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let mut node = ExtendedKey::master(seed)?;
    for &segment in &path.segments {
        node = node.child(segment)?;
    }
    Ok(node.key)
}

pub fn derive(seed: &Seed, path: &DerivationPath) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    derive_from_bytes(seed.as_bytes(), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slip10_seed() -> eyre::Result<Vec<u8>> {
        Ok(hex::decode("000102030405060708090a0b0c0d0e0f")?)
    }

    #[test]
    fn slip10_test_vector_1() -> eyre::Result<()> {
        let seed = slip10_seed()?;
        let m0 = derive_from_bytes(&seed, &"m/0'".parse::<DerivationPath>()?)?;
        assert_eq!(
            hex::encode(m0.as_slice()),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
        let m01 = derive_from_bytes(&seed, &"m/0'/1'".parse::<DerivationPath>()?)?;
        assert_eq!(
            hex::encode(m01.as_slice()),
            "b1d0bad404bf35da785a64ca1ac54b2617211d2777696fbffaf208f746ae84f2"
        );
        Ok(())
    }

    #[test]
    fn master_key_matches_slip10() -> eyre::Result<()> {
        let seed = slip10_seed()?;
        let m = derive_from_bytes(&seed, &"m".parse::<DerivationPath>()?)?;
        assert_eq!(
            hex::encode(m.as_slice()),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        Ok(())
    }

    #[test]
    fn parse_and_display_roundtrip() -> eyre::Result<()> {
        let p: DerivationPath = "m/44'/501'/0'/0'".parse()?;
        assert_eq!(p.segments(), &[44, 501, 0, 0]);
        assert_eq!(p.to_string(), "m/44'/501'/0'/0'");

        let h: DerivationPath = "m/44h/501H/2'".parse()?;
        assert_eq!(h.to_string(), "m/44'/501'/2'");
        Ok(())
    }

    #[test]
    fn template_substitutes_index() -> eyre::Result<()> {
        let p = DerivationPath::from_template("m/501'/{index}'/0'", 666)?;
        assert_eq!(p.to_string(), "m/501'/666'/0'");
        Ok(())
    }

    #[test]
    fn malformed_paths_are_derivation_failures() {
        for bad in [
            "44'/501'",
            "m/44'//0'",
            "m/44'/501",
            "m/abc'",
            "m/'",
            "m/2147483648'",
            "m/-1'",
            "",
        ] {
            let res = bad.parse::<DerivationPath>();
            assert!(
                matches!(res, Err(WalletError::DerivationFailure { .. })),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn largest_hardened_index_is_accepted() -> eyre::Result<()> {
        let p: DerivationPath = "m/2147483647'".parse()?;
        assert_eq!(p.segments(), &[HARDENED_OFFSET - 1]);
        Ok(())
    }
}
