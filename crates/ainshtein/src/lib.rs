//! Solana wallet core: BIP39 recovery phrases, SLIP-0010 Ed25519 derivation, funded-account
//! discovery across common wallet path conventions, and sealed on-disk credential storage.
#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

pub mod amount;
pub mod chains;
pub mod config;
pub mod credential;
pub mod discovery;
pub mod errors;
pub mod fsutil;
pub mod keys;
pub mod paths;
pub mod retry;
pub mod store;
pub mod wallet;
