//! Failure-tolerant balance probing.

use async_trait::async_trait;
use futures::{stream, StreamExt as _};
use std::time::Duration;
use tracing::{debug, warn};

use super::candidates::Candidate;
use crate::{config::DiscoveryPolicy, errors::WalletError};

/// Remote ledger able to report an account's balance in lamports.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn get_balance(&self, public_key: &str) -> Result<u64, WalletError>;

    /// Worst-case duration of one `get_balance` call including its own retries, if bounded.
    /// Probing never cuts a query off before this.
    fn query_budget(&self) -> Option<Duration> {
        None
    }
}

#[async_trait]
impl<T: BalanceSource + ?Sized> BalanceSource for std::sync::Arc<T> {
    async fn get_balance(&self, public_key: &str) -> Result<u64, WalletError> {
        (**self).get_balance(public_key).await
    }

    fn query_budget(&self) -> Option<Duration> {
        (**self).query_budget()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl From<&DiscoveryPolicy> for ProbeConfig {
    fn from(p: &DiscoveryPolicy) -> Self {
        Self {
            concurrency: p.probe_concurrency.max(1),
            timeout: Duration::from_secs(p.probe_timeout_seconds.max(1)),
        }
    }
}

/// Query one balance. A failure or timeout leaves `balance` unset.
async fn probe_one<L: BalanceSource + ?Sized>(
    ledger: &L,
    mut candidate: Candidate,
    timeout: Duration,
) -> Candidate {
    let result = tokio::time::timeout(timeout, ledger.get_balance(candidate.public_key())).await;
    match result {
        Ok(Ok(lamports)) => {
            debug!(path = candidate.path(), lamports, "balance");
            candidate.set_balance(lamports);
        }
        Ok(Err(e)) => {
            warn!(path = candidate.path(), public_key = candidate.public_key(), error = %e, "balance query failed");
        }
        Err(_) => {
            warn!(
                path = candidate.path(),
                public_key = candidate.public_key(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "balance query timed out"
            );
        }
    }
    candidate
}

/// Query every candidate's balance with bounded concurrency. The output keeps input order.
///
/// The per-query deadline is the configured timeout, raised to the ledger's own budget so
/// endpoint fallbacks and retry rounds get to run.
pub async fn probe<L: BalanceSource + ?Sized>(
    ledger: &L,
    candidates: Vec<Candidate>,
    cfg: &ProbeConfig,
) -> Vec<Candidate> {
    let timeout = ledger
        .query_budget()
        .map_or(cfg.timeout, |budget| cfg.timeout.max(budget));
    stream::iter(candidates)
        .map(|c| probe_one(ledger, c, timeout))
        .buffered(cfg.concurrency.max(1))
        .collect()
        .await
}
