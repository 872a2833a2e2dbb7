//! Ordered, deduplicated candidate accounts for one seed.

use serde::Serialize;
use solana_keypair::Keypair;
use std::{collections::HashSet, fmt};
use tracing::{debug, warn};

use crate::{
    config::DiscoveryPolicy,
    errors::WalletError,
    keys::{
        derivation::{self, DerivationPath},
        keypair,
        seed::Seed,
    },
};

/// Path label of the candidate built directly from the seed's first 32 bytes.
pub const DIRECT_LABEL: &str = "direct";

/// A provisionally derived account. The public key is always computed from the keypair.
pub struct Candidate {
    public_key: String,
    path: String,
    index: u32,
    keypair: Keypair,
    balance: Option<u64>,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("public_key", &self.public_key)
            .field("path", &self.path)
            .field("index", &self.index)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

impl Candidate {
    pub fn new(path: impl Into<String>, index: u32, keypair: Keypair) -> Self {
        Self {
            public_key: keypair::public_key_of(&keypair),
            path: path.into(),
            index,
            keypair,
            balance: None,
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// `None` when the balance query failed or has not run.
    pub const fn balance(&self) -> Option<u64> {
        self.balance
    }

    pub fn lamports(&self) -> u64 {
        self.balance.unwrap_or(0)
    }

    pub fn has_funds(&self) -> bool {
        self.lamports() > 0
    }

    pub fn into_keypair(self) -> Keypair {
        self.keypair
    }

    pub(crate) fn set_balance(&mut self, lamports: u64) {
        self.balance = Some(lamports);
    }

    pub fn summary(&self) -> CandidateSummary {
        CandidateSummary {
            public_key: self.public_key.clone(),
            path: self.path.clone(),
            index: self.index,
            lamports: self.balance,
            sol: self.balance.map(crate::amount::lamports_to_sol_string),
        }
    }
}

/// Secret-free view of a candidate for display and JSON output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CandidateSummary {
    pub public_key: String,
    pub path: String,
    pub index: u32,
    pub lamports: Option<u64>,
    pub sol: Option<String>,
}

struct Collector {
    seen: HashSet<String>,
    out: Vec<Candidate>,
}

impl Collector {
    fn offer(&mut self, c: Candidate) {
        if self.seen.insert(c.public_key.clone()) {
            self.out.push(c);
        } else {
            debug!(path = %c.path, "duplicate public key; keeping earlier candidate");
        }
    }

    fn offer_path(&mut self, seed: &Seed, path: Result<DerivationPath, WalletError>, index: u32) {
        match path.and_then(|p| {
            let label = p.to_string();
            let secret = derivation::derive(seed, &p)?;
            keypair::from_seed_material(&secret, &label).map(|kp| (label, kp))
        }) {
            Ok((label, kp)) => self.offer(Candidate::new(label, index, kp)),
            Err(WalletError::DerivationFailure { path, reason }) => {
                warn!(%path, %reason, "skipping candidate path");
            }
            Err(e) => warn!(error = %e, "skipping candidate path"),
        }
    }

    fn offer_direct(&mut self, seed: &Seed) {
        match keypair::from_seed_material(&seed.direct_material(), DIRECT_LABEL) {
            Ok(kp) => self.offer(Candidate::new(DIRECT_LABEL, 0, kp)),
            Err(e) => warn!(error = %e, "skipping direct candidate"),
        }
    }
}

/// Produce the candidate list: direct, then pinned paths, then the template sweep
/// (index-major, template-minor). Later duplicates by public key are dropped.
pub fn generate(seed: &Seed, policy: &DiscoveryPolicy) -> Vec<Candidate> {
    let mut c = Collector {
        seen: HashSet::with_capacity(policy.search_space()),
        out: Vec::with_capacity(policy.search_space()),
    };

    if policy.include_direct {
        c.offer_direct(seed);
    }
    for pinned in &policy.pinned_paths {
        c.offer_path(seed, pinned.path.parse(), pinned.index);
    }
    for &index in &policy.indices {
        for template in &policy.templates {
            c.offer_path(seed, DerivationPath::from_template(template, index), index);
        }
    }

    // Never probe an empty list.
    if c.out.is_empty() {
        c.offer_direct(seed);
    }
    debug!(candidates = c.out.len(), "candidates generated");
    c.out
}
