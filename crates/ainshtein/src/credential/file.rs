use async_trait::async_trait;
use eyre::Context as _;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use tracing::debug;

use super::{
    crypto::{self, CryptoBox},
    CredentialRecord, CredentialStore, WALLET_STORAGE_KEY,
};
use crate::{errors::WalletError, fsutil, paths::AinshteinPaths};

/// Encrypted single-slot store under the user's config directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    paths: AinshteinPaths,
}

/// Held for the duration of a write; unlocks on drop.
struct WriteLock(File);

impl Drop for WriteLock {
    fn drop(&mut self) {
        drop(FileExt::unlock(&self.0));
    }
}

fn write_failure(e: &eyre::Report) -> WalletError {
    WalletError::StorageWriteFailure(format!("{e:#}"))
}

impl FileCredentialStore {
    pub const fn new(paths: AinshteinPaths) -> Self {
        Self { paths }
    }

    /// Exclusive lock for writers across processes. Fails fast instead of waiting.
    fn acquire_write_lock(&self) -> Result<WriteLock, WalletError> {
        let p = self.paths.lock_file();
        let open = || -> eyre::Result<File> {
            if let Some(parent) = p.parent() {
                fsutil::ensure_private_dir(parent)?;
            }
            let mut oo = OpenOptions::new();
            oo.create(true).read(true).write(true).truncate(false);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                oo.mode(fsutil::MODE_FILE_PRIVATE);
            }
            oo.open(&p).context("open lock file")
        };
        let f = open().map_err(|e| write_failure(&e))?;
        match f.try_lock_exclusive() {
            Ok(()) => Ok(WriteLock(f)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(WalletError::StorageBusy),
            Err(e) => Err(WalletError::StorageWriteFailure(format!(
                "lock exclusive: {e}"
            ))),
        }
    }

    fn read_box(&self) -> Result<Option<CryptoBox>, WalletError> {
        let raw = fsutil::read_if_exists(&self.paths.credential_file())
            .map_err(|e| WalletError::StorageCorrupt(format!("{e:#}")))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| WalletError::StorageCorrupt(format!("invalid envelope: {e}")))
    }

    fn write_box(&self, record: &CredentialRecord) -> eyre::Result<()> {
        let machine = crypto::ensure_machine_secret(&self.paths.machine_secret_file())?;
        let key = crypto::derive_slot_key(&machine, WALLET_STORAGE_KEY)?;
        let json = record
            .to_json()
            .map_err(|e| eyre::eyre!("{e}"))?;
        let sealed = crypto::encrypt_aes_gcm(&key, json.as_bytes())?;
        let out = serde_json::to_vec_pretty(&sealed).context("serialize envelope")?;
        fsutil::write_atomic_restrictive(
            &self.paths.credential_file(),
            &out,
            fsutil::MODE_FILE_PRIVATE,
        )
        .context("write credential")
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, WalletError> {
        let Some(sealed) = self.read_box()? else {
            return Ok(None);
        };
        let machine = crypto::read_machine_secret(&self.paths.machine_secret_file())
            .map_err(|e| WalletError::StorageCorrupt(format!("{e:#}")))?
            .ok_or_else(|| WalletError::StorageCorrupt("machine secret missing".into()))?;
        let key = crypto::derive_slot_key(&machine, WALLET_STORAGE_KEY)
            .map_err(|e| WalletError::StorageCorrupt(format!("{e:#}")))?;
        let plain = crypto::decrypt_aes_gcm(&key, &sealed)
            .map_err(|e| WalletError::StorageCorrupt(format!("{e:#}")))?;
        let text = std::str::from_utf8(&plain)
            .map_err(|e| WalletError::StorageCorrupt(format!("record is not utf-8: {e}")))?;
        CredentialRecord::from_json(text).map(Some)
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), WalletError> {
        let _lock = self.acquire_write_lock()?;
        self.write_box(record).map_err(|e| write_failure(&e))?;
        debug!(public_key = %record.public_key, "credential saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), WalletError> {
        let _lock = self.acquire_write_lock()?;
        fsutil::remove_if_exists(&self.paths.credential_file()).map_err(|e| write_failure(&e))?;
        debug!("credential cleared");
        Ok(())
    }
}
