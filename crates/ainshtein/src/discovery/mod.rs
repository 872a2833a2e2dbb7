//! Account discovery: expand the phrase, generate candidates, probe balances and decide between
//! auto-selection, a user choice, or an empty result.

pub mod candidates;
pub mod probe;

pub use candidates::{Candidate, CandidateSummary};
pub use probe::{BalanceSource, ProbeConfig};

use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use tracing::info;

use crate::{config::DiscoveryPolicy, errors::WalletError, keys::seed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStage {
    Idle,
    Expanding,
    Generating,
    Probing,
    AutoSelected,
    AwaitingUserChoice,
    NoneFound,
    Completing,
    Terminal,
}

impl DiscoveryStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Expanding => "expanding",
            Self::Generating => "generating",
            Self::Probing => "probing",
            Self::AutoSelected => "auto_selected",
            Self::AwaitingUserChoice => "awaiting_user_choice",
            Self::NoneFound => "none_found",
            Self::Completing => "completing",
            Self::Terminal => "terminal",
        }
    }

    /// True while an import is doing work (the UI's loading indicator).
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Expanding | Self::Generating | Self::Probing | Self::Completing
        )
    }
}

/// Records the stages one import attempt passes through.
#[derive(Debug, Clone)]
pub struct StageJournal {
    history: Vec<DiscoveryStage>,
}

impl Default for StageJournal {
    fn default() -> Self {
        Self {
            history: vec![DiscoveryStage::Idle],
        }
    }
}

impl StageJournal {
    pub fn current(&self) -> DiscoveryStage {
        self.history
            .last()
            .copied()
            .unwrap_or(DiscoveryStage::Idle)
    }

    pub fn history(&self) -> &[DiscoveryStage] {
        &self.history
    }

    pub fn enter(&mut self, stage: DiscoveryStage) {
        info!(from = self.current().as_str(), to = stage.as_str(), "discovery stage");
        self.history.push(stage);
    }

    /// Start a new attempt.
    pub fn reset(&mut self) {
        self.history.clear();
        self.history.push(DiscoveryStage::Idle);
    }

    /// Abort the current attempt and return to `Idle`, keeping the history for inspection.
    pub fn abort(&mut self) {
        if self.current() != DiscoveryStage::Idle {
            self.enter(DiscoveryStage::Idle);
        }
    }
}

/// Result of filtering probed candidates.
#[derive(Debug)]
pub enum Selection {
    NoneFound { scanned: usize },
    AutoSelected(Candidate),
    /// Two or more funded accounts, richest first.
    AwaitingUserChoice(Vec<Candidate>),
}

/// Keep funded candidates, sort them by balance (descending, ties in generation order) and
/// decide whether the caller must choose.
pub fn select(probed: Vec<Candidate>) -> Selection {
    let scanned = probed.len();
    let mut funded: Vec<Candidate> = probed.into_iter().filter(Candidate::has_funds).collect();
    funded.sort_by(|a, b| b.lamports().cmp(&a.lamports()));
    if funded.len() > 1 {
        return Selection::AwaitingUserChoice(funded);
    }
    match funded.pop() {
        Some(c) => Selection::AutoSelected(c),
        None => Selection::NoneFound { scanned },
    }
}

/// Drives the read-only part of discovery against a ledger.
pub struct Orchestrator<'a, L: ?Sized> {
    policy: &'a DiscoveryPolicy,
    ledger: &'a L,
}

impl<'a, L: BalanceSource + ?Sized> Orchestrator<'a, L> {
    pub const fn new(policy: &'a DiscoveryPolicy, ledger: &'a L) -> Self {
        Self { policy, ledger }
    }

    /// Expanding -> Generating -> Probing. Returns every candidate with its balance, in
    /// generation order. The seed is dropped before any network call.
    pub async fn scan(
        &self,
        phrase: &SecretString,
        passphrase: Option<&SecretString>,
        journal: &mut StageJournal,
    ) -> Result<Vec<Candidate>, WalletError> {
        journal.enter(DiscoveryStage::Expanding);
        let seed = seed::expand(
            phrase.expose_secret(),
            passphrase.map(|p| p.expose_secret()),
        )?;

        journal.enter(DiscoveryStage::Generating);
        let generated = candidates::generate(&seed, self.policy);
        drop(seed);

        journal.enter(DiscoveryStage::Probing);
        let probed = probe::probe(self.ledger, generated, &ProbeConfig::from(self.policy)).await;
        let funded = probed.iter().filter(|c| c.has_funds()).count();
        info!(scanned = probed.len(), funded, "probe finished");
        Ok(probed)
    }

    /// Full discovery up to the selection decision.
    pub async fn run(
        &self,
        phrase: &SecretString,
        passphrase: Option<&SecretString>,
        journal: &mut StageJournal,
    ) -> Result<Selection, WalletError> {
        let probed = self.scan(phrase, passphrase, journal).await?;
        let selection = select(probed);
        journal.enter(match &selection {
            Selection::NoneFound { .. } => DiscoveryStage::NoneFound,
            Selection::AutoSelected(_) => DiscoveryStage::AutoSelected,
            Selection::AwaitingUserChoice(_) => DiscoveryStage::AwaitingUserChoice,
        });
        Ok(selection)
    }
}
