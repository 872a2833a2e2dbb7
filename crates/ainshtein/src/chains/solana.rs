use async_trait::async_trait;
use eyre::Context as _;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::{str::FromStr as _, time::Duration};
use tracing::debug;

use crate::{
    config::AinshteinConfig,
    discovery::BalanceSource,
    errors::WalletError,
    retry::{try_all_with_backoff, BackoffConfig},
};

fn allow_insecure_http() -> bool {
    std::env::var("AINSHTEIN_ALLOW_INSECURE_HTTP")
        .ok()
        .is_some_and(|v| {
            matches!(
                v.as_str(),
                "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON"
            )
        })
}

fn is_loopback_http(url: &str) -> bool {
    fn host_prefix_ok(s: &str, prefix: &str) -> bool {
        if !s.starts_with(prefix) {
            return false;
        }
        matches!(s.as_bytes().get(prefix.len()), None | Some(b':' | b'/'))
    }
    let u = url.trim();
    host_prefix_ok(u, "http://127.0.0.1")
        || host_prefix_ok(u, "http://localhost")
        || host_prefix_ok(u, "http://[::1]")
}

/// Reject plaintext endpoints other than a local validator unless explicitly allowed.
pub fn validate_rpc_url(url: &str) -> eyre::Result<()> {
    let u = url.trim();
    if u.starts_with("https://") || is_loopback_http(u) {
        return Ok(());
    }
    if u.starts_with("http://") {
        if allow_insecure_http() {
            return Ok(());
        }
        eyre::bail!("refusing insecure http RPC endpoint {u}; use https or set AINSHTEIN_ALLOW_INSECURE_HTTP=1");
    }
    eyre::bail!("unsupported RPC endpoint scheme: {u}");
}

/// Balance queries against Solana JSON-RPC with endpoint fallback and bounded retries.
#[derive(Debug, Clone)]
pub struct SolanaLedger {
    rpc_urls: Vec<String>,
    request_timeout: Duration,
    backoff: BackoffConfig,
}

impl SolanaLedger {
    /// `rpc_urls` in priority order; blanks are skipped and the first copy of a repeat wins.
    pub fn new(
        rpc_urls: &[String],
        request_timeout: Duration,
        backoff: BackoffConfig,
    ) -> eyre::Result<Self> {
        let mut urls: Vec<String> = Vec::with_capacity(rpc_urls.len());
        for u in rpc_urls {
            let t = u.trim();
            if t.is_empty() || urls.iter().any(|x| x == t) {
                continue;
            }
            validate_rpc_url(t)?;
            urls.push(t.to_owned());
        }
        if urls.is_empty() {
            eyre::bail!("no Solana RPC endpoint configured");
        }
        Ok(Self {
            rpc_urls: urls,
            request_timeout,
            backoff,
        })
    }

    pub fn from_config(cfg: &AinshteinConfig) -> eyre::Result<Self> {
        Self::new(
            &cfg.rpc_urls(),
            Duration::from_secs(cfg.rpc.request_timeout_seconds.max(1)),
            BackoffConfig::with_rounds(cfg.rpc.retry_rounds),
        )
    }

    /// Upper bound on one balance query: every endpoint times out in every round.
    pub fn max_query_time(&self) -> Duration {
        let attempts = u32::try_from(self.rpc_urls.len().saturating_mul(self.backoff.rounds))
            .unwrap_or(u32::MAX);
        self.request_timeout
            .saturating_mul(attempts)
            .saturating_add(self.backoff.max_total_sleep())
    }

    pub fn rpc_urls(&self) -> &[String] {
        &self.rpc_urls
    }

    fn rpc_for_url(&self, url: &str) -> RpcClient {
        RpcClient::new_with_timeout_and_commitment(
            url.to_owned(),
            self.request_timeout,
            CommitmentConfig::confirmed(),
        )
    }

    async fn with_fallback_and_backoff<T, Fut>(
        &self,
        context_label: &'static str,
        f: impl Fn(RpcClient) -> Fut + Sync,
    ) -> eyre::Result<T>
    where
        T: Send,
        Fut: std::future::Future<Output = eyre::Result<T>> + Send,
    {
        try_all_with_backoff(
            &self.rpc_urls,
            &self.backoff,
            |u| {
                let rpc = self.rpc_for_url(u);
                let f = &f;
                async move { f(rpc).await }
            },
            context_label,
        )
        .await
    }

    pub fn parse_pubkey(s: &str) -> eyre::Result<Pubkey> {
        Pubkey::from_str(s.trim()).context("parse solana pubkey")
    }

    pub async fn get_sol_balance(&self, owner: Pubkey) -> eyre::Result<u64> {
        self.with_fallback_and_backoff("get balance", |rpc| async move {
            let v = rpc.get_balance(&owner).await.context("get balance")?;
            Ok(v)
        })
        .await
    }
}

#[async_trait]
impl BalanceSource for SolanaLedger {
    async fn get_balance(&self, public_key: &str) -> Result<u64, WalletError> {
        let failure = |e: &eyre::Report| WalletError::BalanceQueryFailure {
            public_key: public_key.to_owned(),
            reason: format!("{e:#}"),
        };
        let owner = Self::parse_pubkey(public_key).map_err(|e| failure(&e))?;
        let lamports = self.get_sol_balance(owner).await.map_err(|e| failure(&e))?;
        debug!(public_key, lamports, "balance fetched");
        Ok(lamports)
    }

    fn query_budget(&self) -> Option<Duration> {
        Some(self.max_query_time())
    }
}
