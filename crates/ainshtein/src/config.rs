use serde::{Deserialize, Serialize};

pub const SOLANA_MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const SOLANA_DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

/// Placeholder substituted with the account index in path templates.
pub const INDEX_PLACEHOLDER: &str = "{index}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RpcConfig {
    /// Solana RPC endpoint URL used for balance queries.
    pub solana_rpc_url: String,
    /// Additional endpoints to try, in order, if the primary fails.
    pub solana_fallback_rpc_urls: Vec<String>,
    /// Transport-level timeout for a single JSON-RPC request (seconds).
    pub request_timeout_seconds: u64,
    /// Full passes over all endpoints before a balance query is reported as failed.
    pub retry_rounds: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            solana_rpc_url: SOLANA_DEVNET_RPC_URL.into(),
            solana_fallback_rpc_urls: vec![],
            request_timeout_seconds: 20,
            retry_rounds: 2,
        }
    }
}

/// Which derivation paths account discovery probes, and how.
///
/// The template/index set is a compatibility heuristic covering the layouts used by popular
/// Solana wallets, not a protocol requirement, so it lives in config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryPolicy {
    /// Emit the legacy candidate built straight from the first 32 seed bytes.
    pub include_direct: bool,
    /// Paths probed unconditionally right after the direct candidate, with their index.
    pub pinned_paths: Vec<PinnedPath>,
    /// Path templates containing `{index}`.
    pub templates: Vec<String>,
    /// Indices substituted into every template (index-major order).
    pub indices: Vec<u32>,
    /// Maximum number of balance queries in flight.
    pub probe_concurrency: usize,
    /// Per-candidate balance query deadline (seconds). A timeout counts as a failed query.
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinnedPath {
    pub path: String,
    pub index: u32,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        let mut indices: Vec<u32> = (0..10).collect();
        indices.extend([666, 999]);
        Self {
            include_direct: true,
            pinned_paths: vec![
                PinnedPath {
                    path: "m/44'/501'/0'/0'".into(),
                    index: 0,
                },
                PinnedPath {
                    path: "m/44'/501'/1'/0'".into(),
                    index: 1,
                },
            ],
            templates: vec![
                "m/44'/501'/{index}'/0'".into(),
                "m/44'/501'/{index}'".into(),
                "m/501'/0'/{index}'".into(),
                "m/501'/{index}'/0'".into(),
            ],
            indices,
            probe_concurrency: 4,
            probe_timeout_seconds: 15,
        }
    }
}

impl DiscoveryPolicy {
    /// Upper bound on candidates before deduplication.
    pub fn search_space(&self) -> usize {
        usize::from(self.include_direct)
            .saturating_add(self.pinned_paths.len())
            .saturating_add(self.templates.len().saturating_mul(self.indices.len()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AinshteinConfig {
    pub rpc: RpcConfig,
    pub discovery: DiscoveryPolicy,
}

impl AinshteinConfig {
    pub fn rpc_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(1 + self.rpc.solana_fallback_rpc_urls.len());
        let candidates = std::iter::once(&self.rpc.solana_rpc_url)
            .chain(self.rpc.solana_fallback_rpc_urls.iter());
        for u in candidates {
            let t = u.trim();
            if t.is_empty() || urls.iter().any(|x| x == t) {
                continue;
            }
            urls.push(t.to_owned());
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_known_wallet_layouts() {
        let p = DiscoveryPolicy::default();
        assert!(p.include_direct);
        assert_eq!(p.indices, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 666, 999]);
        assert_eq!(p.templates.len(), 4);
        assert!(p.templates.iter().all(|t| t.contains(INDEX_PLACEHOLDER)));
        assert_eq!(p.search_space(), 1 + 2 + 4 * 12);
    }

    #[test]
    fn rpc_urls_dedupes_and_skips_blank() {
        let cfg = AinshteinConfig {
            rpc: RpcConfig {
                solana_rpc_url: " https://a.example ".into(),
                solana_fallback_rpc_urls: vec![
                    String::new(),
                    "https://a.example".into(),
                    "https://b.example".into(),
                ],
                ..RpcConfig::default()
            },
            ..AinshteinConfig::default()
        };
        assert_eq!(
            cfg.rpc_urls(),
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() -> eyre::Result<()> {
        let cfg: AinshteinConfig = toml::from_str(
            r#"
            [discovery]
            indices = [0, 1]
            "#,
        )?;
        assert_eq!(cfg.discovery.indices, vec![0, 1]);
        assert_eq!(cfg.discovery.templates.len(), 4);
        assert_eq!(cfg.rpc.solana_rpc_url, SOLANA_DEVNET_RPC_URL);
        Ok(())
    }
}
