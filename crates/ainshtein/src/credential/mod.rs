pub mod crypto;
mod file;

pub use file::FileCredentialStore;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use solana_keypair::Keypair;
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{errors::WalletError, keys::keypair};

/// Name of the single persisted credential slot.
pub const WALLET_STORAGE_KEY: &str = "ainshtein_wallet_data";

pub const RECORD_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImportMethod {
    SeedPhrase,
    PrivateKey,
}

/// The persisted wallet credential. Overwritten wholesale on every import.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Absent on records written before versioning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    #[serde(rename = "privateKey", alias = "privateKeyEncoded")]
    pub private_key: String,
    pub public_key: String,
    #[zeroize(skip)]
    pub import_method: ImportMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_password: Option<String>,
    pub imported_at: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("version", &self.version)
            .field("public_key", &self.public_key)
            .field("import_method", &self.import_method)
            .field("has_seed_phrase", &self.seed_phrase.is_some())
            .field("imported_at", &self.imported_at)
            .finish_non_exhaustive()
    }
}

impl CredentialRecord {
    pub fn new(
        kp: &Keypair,
        import_method: ImportMethod,
        seed_phrase: Option<String>,
        seed_password: Option<String>,
    ) -> Self {
        Self {
            version: Some(RECORD_VERSION),
            private_key: keypair::to_encoded(kp).as_str().to_owned(),
            public_key: keypair::public_key_of(kp),
            import_method,
            seed_phrase,
            seed_password,
            imported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Recover the keypair and check it matches `public_key`.
    pub fn keypair(&self) -> Result<Keypair, WalletError> {
        let kp = keypair::from_persisted(&self.private_key)
            .map_err(|e| WalletError::StorageCorrupt(format!("undecodable private key: {e}")))?;
        if keypair::public_key_of(&kp) != self.public_key {
            return Err(WalletError::StorageCorrupt(
                "public key does not match private key".into(),
            ));
        }
        Ok(kp)
    }

    pub fn to_json(&self) -> Result<Zeroizing<String>, WalletError> {
        serde_json::to_string(self)
            .map(Zeroizing::new)
            .map_err(|e| WalletError::StorageWriteFailure(format!("serialize record: {e}")))
    }

    /// Parse and validate stored JSON.
    pub fn from_json(raw: &str) -> Result<Self, WalletError> {
        let rec: Self = serde_json::from_str(raw)
            .map_err(|e| WalletError::StorageCorrupt(format!("invalid storage format: {e}")))?;
        if let Some(v) = rec.version {
            if v > RECORD_VERSION {
                return Err(WalletError::StorageCorrupt(format!(
                    "unsupported record version {v}"
                )));
            }
        }
        rec.keypair()?;
        Ok(rec)
    }
}

/// Durable home of the single credential slot.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is stored. Unreadable or inconsistent data is `StorageCorrupt`.
    async fn load(&self) -> Result<Option<CredentialRecord>, WalletError>;

    /// Replace the slot. Either the whole record is stored or the previous one is kept.
    async fn save(&self, record: &CredentialRecord) -> Result<(), WalletError>;

    /// Remove the slot. Clearing an empty slot succeeds.
    async fn clear(&self) -> Result<(), WalletError>;
}

/// In-process store holding the record JSON.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Zeroizing<String>>>,
    fail_writes: AtomicBool,
}

impl fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCredentialStore").finish_non_exhaustive()
    }
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with arbitrary slot contents, e.g. a legacy or damaged record.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(Zeroizing::new(raw.into()))),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent `save`/`clear` calls fail with `StorageWriteFailure`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn raw(&self) -> Option<String> {
        self.slot.lock().await.as_ref().map(|s| s.as_str().to_owned())
    }

    fn check_writable(&self) -> Result<(), WalletError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WalletError::StorageWriteFailure(
                "storage unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, WalletError> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .map(|raw| CredentialRecord::from_json(raw))
            .transpose()
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), WalletError> {
        self.check_writable()?;
        let json = record.to_json()?;
        *self.slot.lock().await = Some(json);
        Ok(())
    }

    async fn clear(&self) -> Result<(), WalletError> {
        self.check_writable()?;
        *self.slot.lock().await = None;
        Ok(())
    }
}
