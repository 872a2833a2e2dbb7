use crate::{
    config::{AinshteinConfig, SOLANA_DEVNET_RPC_URL, SOLANA_MAINNET_RPC_URL},
    paths::AinshteinPaths,
};
use eyre::Context as _;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

fn network_rpc_url(s: &str) -> Option<&'static str> {
    match s.trim().to_lowercase().as_str() {
        "mainnet" | "main" | "mainnet-beta" => Some(SOLANA_MAINNET_RPC_URL),
        "devnet" | "dev" | "testnet" | "test" => Some(SOLANA_DEVNET_RPC_URL),
        _ => None,
    }
}

/// Apply environment variable overrides. Precedence (highest first):
/// `AINSHTEIN_RPC_URL`, legacy `RPC_URL`, `AINSHTEIN_NETWORK`.
fn apply_env_overrides(cfg: &mut AinshteinConfig) {
    fn env_nonempty(var: &str) -> Option<String> {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    if let Some(url) = env_nonempty("AINSHTEIN_NETWORK")
        .as_deref()
        .and_then(network_rpc_url)
    {
        url.clone_into(&mut cfg.rpc.solana_rpc_url);
    }
    if let Some(url) = env_nonempty("RPC_URL") {
        cfg.rpc.solana_rpc_url = url;
    }
    if let Some(url) = env_nonempty("AINSHTEIN_RPC_URL") {
        cfg.rpc.solana_rpc_url = url;
    }
    if let Some(n) =
        env_nonempty("AINSHTEIN_PROBE_CONCURRENCY").and_then(|v| v.parse::<usize>().ok())
    {
        if n > 0 {
            cfg.discovery.probe_concurrency = n;
        }
    }
}

impl ConfigStore {
    pub fn new(paths: &AinshteinPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<AinshteinConfig> {
        if !self.path.exists() {
            let cfg = AinshteinConfig::default();
            self.save(&cfg)?;
            let mut effective = cfg;
            apply_env_overrides(&mut effective);
            return Ok(effective);
        }

        let s = fs::read_to_string(&self.path).context("read config.toml")?;
        let mut cfg: AinshteinConfig = toml::from_str(&s).context("parse config.toml")?;
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &AinshteinConfig) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent() {
            crate::fsutil::ensure_private_dir(parent)?;
        }
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_string_atomic_restrictive(
            &self.path,
            &s,
            crate::fsutil::MODE_FILE_PRIVATE,
        )
        .context("write config.toml")?;
        Ok(())
    }
}
