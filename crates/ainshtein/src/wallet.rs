//! The wallet context: owns the credential store, the ledger and the in-memory wallet state, and
//! drives imports through discovery to persistence.

use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use solana_keypair::Keypair;
use std::fmt;
use tracing::{info, warn};

use crate::{
    amount,
    config::DiscoveryPolicy,
    credential::{CredentialRecord, CredentialStore, ImportMethod},
    discovery::{
        BalanceSource, Candidate, CandidateSummary, DiscoveryStage, Orchestrator, Selection,
        StageJournal,
    },
    errors::{UserError, WalletError},
    keys::{keypair, seed},
};

/// What the user supplied for one import attempt.
#[derive(Debug)]
pub enum RecoveryInput {
    Phrase {
        words: SecretString,
        passphrase: Option<SecretString>,
    },
    PrivateKey {
        encoded: SecretString,
    },
}

impl RecoveryInput {
    /// An empty passphrase is treated as none.
    pub fn phrase(words: String, passphrase: Option<String>) -> Self {
        Self::Phrase {
            words: SecretString::new(words.into()),
            passphrase: passphrase
                .filter(|p| !p.is_empty())
                .map(|p| SecretString::new(p.into())),
        }
    }

    pub fn private_key(encoded: String) -> Self {
        Self::PrivateKey {
            encoded: SecretString::new(encoded.into()),
        }
    }
}

/// What the UI layer renders.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WalletState {
    pub imported: bool,
    pub public_key: Option<String>,
    pub lamports: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_method: Option<ImportMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<String>,
    /// Last non-fatal problem (failed refresh, unreadable stored credential).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UserError>,
}

impl WalletState {
    pub fn balance_sol(&self) -> String {
        amount::lamports_to_sol_string(self.lamports)
    }
}

/// The account an import settled on.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportedAccount {
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub lamports: u64,
    pub import_method: ImportMethod,
}

/// Several funded accounts were found; the caller picks one (or cancels).
pub struct PendingSelection {
    candidates: Vec<Candidate>,
    words: SecretString,
    passphrase: Option<SecretString>,
}

impl fmt::Debug for PendingSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSelection")
            .field("candidates", &self.candidates)
            .finish_non_exhaustive()
    }
}

impl PendingSelection {
    /// Funded candidates, richest first.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn summaries(&self) -> Vec<CandidateSummary> {
        self.candidates.iter().map(Candidate::summary).collect()
    }
}

#[derive(Debug)]
pub enum ImportOutcome {
    Imported(ImportedAccount),
    /// No derived account holds funds. Nothing was persisted.
    NoneFound { scanned: usize },
    AwaitingUserChoice(PendingSelection),
}

fn seed_phrase_record(
    candidate: Candidate,
    words: &SecretString,
    passphrase: Option<&SecretString>,
) -> (Keypair, CredentialRecord, String, Option<u64>) {
    let path = candidate.path().to_owned();
    let balance = candidate.balance();
    let kp = candidate.into_keypair();
    let record = CredentialRecord::new(
        &kp,
        ImportMethod::SeedPhrase,
        Some(seed::normalize_phrase(words.expose_secret()).as_str().to_owned()),
        passphrase.map(|p| p.expose_secret().to_owned()),
    );
    (kp, record, path, balance)
}

pub struct WalletContext<S, L> {
    store: S,
    ledger: L,
    policy: DiscoveryPolicy,
    keypair: Option<Keypair>,
    state: WalletState,
    journal: StageJournal,
}

impl<S, L> fmt::Debug for WalletContext<S, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletContext")
            .field("state", &self.state)
            .field("stage", &self.journal.current())
            .finish_non_exhaustive()
    }
}

impl<S: CredentialStore, L: BalanceSource> WalletContext<S, L> {
    pub fn new(store: S, ledger: L, policy: DiscoveryPolicy) -> Self {
        Self {
            store,
            ledger,
            policy,
            keypair: None,
            state: WalletState::default(),
            journal: StageJournal::default(),
        }
    }

    pub const fn state(&self) -> &WalletState {
        &self.state
    }

    /// The active keypair, present once a wallet is imported or loaded.
    pub const fn keypair(&self) -> Option<&Keypair> {
        self.keypair.as_ref()
    }

    pub fn stage(&self) -> DiscoveryStage {
        self.journal.current()
    }

    pub fn stage_history(&self) -> &[DiscoveryStage] {
        self.journal.history()
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn policy(&self) -> &DiscoveryPolicy {
        &self.policy
    }

    /// Load the persisted credential, if any, and fetch its balance. Never fails: an unreadable
    /// record leaves the wallet not imported with `state.error` set.
    pub async fn init(&mut self) {
        self.journal.reset();
        self.keypair = None;
        self.state = WalletState::default();

        let loaded = match self.store.load().await {
            Ok(Some(rec)) => rec.keypair().map(|kp| Some((kp, rec))),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(Some((kp, rec))) => {
                info!(public_key = %rec.public_key, "stored wallet loaded");
                self.state.imported = true;
                self.state.public_key = Some(rec.public_key.clone());
                self.state.import_method = Some(rec.import_method);
                self.state.imported_at = Some(rec.imported_at.clone());
                self.keypair = Some(kp);
                // Balance failures are recorded in `state.error`.
                drop(self.refresh().await);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "stored credential unreadable; treating wallet as not imported");
                self.state.error = Some(e.into());
            }
        }
    }

    /// Re-query the active account's balance.
    pub async fn refresh(&mut self) -> Result<u64, WalletError> {
        let Some(pk) = self.state.public_key.clone() else {
            return Err(WalletError::NotImported);
        };
        match self.ledger.get_balance(&pk).await {
            Ok(lamports) => {
                self.state.lamports = lamports;
                self.state.error = None;
                Ok(lamports)
            }
            Err(e) => {
                warn!(public_key = %pk, error = %e, "balance refresh failed");
                self.state.error = Some(e.clone().into());
                Err(e)
            }
        }
    }

    /// Run discovery without persisting anything. Returns every candidate with its balance.
    pub async fn scan(
        &mut self,
        words: &SecretString,
        passphrase: Option<&SecretString>,
    ) -> Result<Vec<Candidate>, WalletError> {
        self.journal.reset();
        let res = Orchestrator::new(&self.policy, &self.ledger)
            .scan(words, passphrase, &mut self.journal)
            .await;
        self.journal.abort();
        res
    }

    pub async fn import(&mut self, input: RecoveryInput) -> Result<ImportOutcome, WalletError> {
        self.journal.reset();
        match input {
            RecoveryInput::PrivateKey { encoded } => {
                let kp = match keypair::from_encoded_private_key(encoded.expose_secret()) {
                    Ok(kp) => kp,
                    Err(e) => {
                        warn!("private key import rejected");
                        return Err(e);
                    }
                };
                let record = CredentialRecord::new(&kp, ImportMethod::PrivateKey, None, None);
                let mut acct = self.complete(kp, record, None, None).await?;
                // Persisted already; a failed balance query only leaves the balance at zero.
                if let Ok(lamports) = self.refresh().await {
                    acct.lamports = lamports;
                }
                Ok(ImportOutcome::Imported(acct))
            }
            RecoveryInput::Phrase { words, passphrase } => {
                match self.discover(&words, passphrase.as_ref()).await? {
                    Selection::NoneFound { scanned } => Ok(ImportOutcome::NoneFound { scanned }),
                    Selection::AutoSelected(c) => {
                        let (kp, record, path, balance) =
                            seed_phrase_record(c, &words, passphrase.as_ref());
                        let acct = self.complete(kp, record, Some(path), balance).await?;
                        Ok(ImportOutcome::Imported(acct))
                    }
                    Selection::AwaitingUserChoice(candidates) => {
                        Ok(ImportOutcome::AwaitingUserChoice(PendingSelection {
                            candidates,
                            words,
                            passphrase,
                        }))
                    }
                }
            }
        }
    }

    /// Import the account `public_key` without asking: a funded account derived from the
    /// phrase, or the account the private key belongs to. Any other outcome persists nothing and
    /// fails with `SelectionNotOffered`, except an empty discovery which reports `NoneFound`.
    pub async fn import_account(
        &mut self,
        input: RecoveryInput,
        public_key: &str,
    ) -> Result<ImportOutcome, WalletError> {
        self.journal.reset();
        match input {
            RecoveryInput::PrivateKey { encoded } => {
                let owner = keypair::from_encoded_private_key(encoded.expose_secret())
                    .map(|kp| keypair::public_key_of(&kp))?;
                if owner != public_key {
                    warn!(public_key, "private key belongs to a different account");
                    return Err(WalletError::SelectionNotOffered(public_key.to_owned()));
                }
                self.import(RecoveryInput::PrivateKey { encoded }).await
            }
            RecoveryInput::Phrase { words, passphrase } => {
                let funded = match self.discover(&words, passphrase.as_ref()).await? {
                    Selection::NoneFound { scanned } => {
                        warn!(public_key, scanned, "requested account not found");
                        return Ok(ImportOutcome::NoneFound { scanned });
                    }
                    Selection::AutoSelected(c) => vec![c],
                    Selection::AwaitingUserChoice(candidates) => candidates,
                };
                let pending = PendingSelection {
                    candidates: funded,
                    words,
                    passphrase,
                };
                self.complete_selection(pending, public_key)
                    .await
                    .map(ImportOutcome::Imported)
            }
        }
    }

    /// Discovery up to the selection decision. A failure returns the journal to `Idle`.
    async fn discover(
        &mut self,
        words: &SecretString,
        passphrase: Option<&SecretString>,
    ) -> Result<Selection, WalletError> {
        let ran = Orchestrator::new(&self.policy, &self.ledger)
            .run(words, passphrase, &mut self.journal)
            .await;
        match ran {
            Ok(s) => {
                if let Selection::NoneFound { scanned } = &s {
                    info!(scanned, "no funded accounts found");
                }
                Ok(s)
            }
            Err(e) => {
                warn!(error = %e.code(), "discovery aborted");
                self.journal.abort();
                Err(e)
            }
        }
    }

    /// Resume a pending selection with the chosen account's public key.
    pub async fn complete_selection(
        &mut self,
        pending: PendingSelection,
        public_key: &str,
    ) -> Result<ImportedAccount, WalletError> {
        let PendingSelection {
            candidates,
            words,
            passphrase,
        } = pending;
        let Some(chosen) = candidates
            .into_iter()
            .find(|c| c.public_key() == public_key)
        else {
            warn!(public_key, "selection not among offered candidates");
            self.journal.abort();
            return Err(WalletError::SelectionNotOffered(public_key.to_owned()));
        };
        let (kp, record, path, balance) = seed_phrase_record(chosen, &words, passphrase.as_ref());
        self.complete(kp, record, Some(path), balance).await
    }

    /// Drop a pending selection without persisting anything.
    pub fn cancel_selection(&mut self, pending: PendingSelection) {
        drop(pending);
        info!("account selection cancelled");
        self.journal.abort();
    }

    /// Remove the stored credential and forget the active wallet.
    pub async fn clear(&mut self) -> Result<(), WalletError> {
        self.store.clear().await?;
        self.keypair = None;
        self.state = WalletState::default();
        self.journal.reset();
        info!("wallet cleared");
        Ok(())
    }

    async fn complete(
        &mut self,
        kp: Keypair,
        record: CredentialRecord,
        path: Option<String>,
        balance: Option<u64>,
    ) -> Result<ImportedAccount, WalletError> {
        self.journal.enter(DiscoveryStage::Completing);
        if let Err(e) = self.store.save(&record).await {
            warn!(error = %e, "credential write failed; wallet state unchanged");
            self.journal.abort();
            return Err(e);
        }

        let lamports = balance.unwrap_or(0);
        self.state = WalletState {
            imported: true,
            public_key: Some(record.public_key.clone()),
            lamports,
            import_method: Some(record.import_method),
            imported_at: Some(record.imported_at.clone()),
            error: None,
        };
        self.keypair = Some(kp);
        self.journal.enter(DiscoveryStage::Terminal);
        info!(
            public_key = %record.public_key,
            method = ?record.import_method,
            path = path.as_deref().unwrap_or("-"),
            "wallet imported"
        );

        Ok(ImportedAccount {
            public_key: record.public_key.clone(),
            path,
            lamports,
            import_method: record.import_method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::MemoryCredentialStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const PHRASE: &str =
        "have work cattle cream victory just garden pilot lonely fiscal rough winner";
    const ACCOUNT0: &str = "Bsw8DaAn7tb7n4AuP1WWVDS4BjEW3EVKnDwobqx8WYFC";

    struct Ledger(HashMap<&'static str, u64>);

    #[async_trait]
    impl BalanceSource for Ledger {
        async fn get_balance(&self, public_key: &str) -> Result<u64, WalletError> {
            Ok(self.0.get(public_key).copied().unwrap_or(0))
        }
    }

    fn ctx(
        funded: &[(&'static str, u64)],
    ) -> WalletContext<MemoryCredentialStore, Ledger> {
        WalletContext::new(
            MemoryCredentialStore::new(),
            Ledger(funded.iter().copied().collect()),
            DiscoveryPolicy::default(),
        )
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_state() -> eyre::Result<()> {
        let mut w = ctx(&[(ACCOUNT0, 10)]);
        w.store().set_fail_writes(true);
        let res = w
            .import(RecoveryInput::phrase(PHRASE.to_owned(), None))
            .await;
        assert!(matches!(res, Err(WalletError::StorageWriteFailure(_))));
        assert!(!w.state().imported);
        assert!(w.keypair().is_none());
        assert_eq!(w.stage(), DiscoveryStage::Idle);
        assert!(w.stage_history().contains(&DiscoveryStage::Completing));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_without_wallet_is_not_imported() {
        let mut w = ctx(&[]);
        assert!(matches!(w.refresh().await, Err(WalletError::NotImported)));
    }

    #[tokio::test]
    async fn seed_phrase_is_persisted_normalized() -> eyre::Result<()> {
        let mut w = ctx(&[(ACCOUNT0, 10)]);
        let messy = format!("  {}  ", PHRASE.to_uppercase());
        w.import(RecoveryInput::phrase(messy, Some(String::new())))
            .await?;
        let rec = w
            .store()
            .load()
            .await?
            .ok_or_else(|| eyre::eyre!("record missing"))?;
        assert_eq!(rec.seed_phrase.as_deref(), Some(PHRASE));
        assert_eq!(rec.seed_password, None);
        assert_eq!(rec.import_method, ImportMethod::SeedPhrase);
        Ok(())
    }

    #[test]
    fn balance_renders_in_sol() {
        let s = WalletState {
            lamports: 2_500_000_000,
            ..WalletState::default()
        };
        assert_eq!(s.balance_sol(), "2.5");
    }
}
