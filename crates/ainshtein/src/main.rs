#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use ainshtein::{
    chains::solana::SolanaLedger,
    credential::FileCredentialStore,
    discovery::Candidate,
    errors::{UserError, WalletError},
    paths::AinshteinPaths,
    store::ConfigStore,
    wallet::{ImportOutcome, RecoveryInput, WalletContext},
};
use clap::{Parser, Subcommand};
use eyre::Context as _;
use secrecy::SecretString;
use std::io::Write as _;
use tracing_subscriber::prelude::*;

mod cli_output;

type Wallet = WalletContext<FileCredentialStore, SolanaLedger>;

#[derive(Parser, Debug)]
#[command(name = "ainshtein", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a wallet and store it encrypted on this machine.
    Import {
        #[command(subcommand)]
        cmd: ImportCommand,
    },

    /// Derive every candidate account from a recovery phrase and print its balance.
    ///
    /// Nothing is stored.
    Scan {
        /// Also prompt for a BIP39 passphrase.
        #[arg(long, default_value_t = false)]
        passphrase: bool,
    },

    /// Print the stored wallet and its current balance.
    Show {
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Delete the stored wallet.
    Logout,

    /// Print resolved paths (useful for debugging).
    Paths,
}

#[derive(Subcommand, Debug)]
enum ImportCommand {
    /// Recover from a 12 or 24 word phrase, searching known derivation paths for funds.
    Phrase {
        /// Also prompt for a BIP39 passphrase.
        #[arg(long, default_value_t = false)]
        passphrase: bool,

        /// Import exactly this account. Fails with `selection_not_offered` if it is not a funded
        /// account of the phrase.
        #[arg(long)]
        select: Option<String>,
    },

    /// Import a single private key (base58, hex or raw 64 bytes).
    Key,
}

fn init_logging(paths: &AinshteinPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("ainshtein.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn write_json(v: &serde_json::Value) -> eyre::Result<()> {
    let s = serde_json::to_string(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write output")?;
    Ok(())
}

/// Print a domain failure as a structured error and turn it into the process error.
fn fail(e: WalletError) -> eyre::Report {
    let ue = UserError::from(e.clone());
    drop(write_json(&serde_json::json!({ "ok": false, "error": ue })));
    eyre::Report::new(e)
}

fn open_wallet(paths: &AinshteinPaths) -> eyre::Result<Wallet> {
    paths.ensure_private_dirs()?;
    let cfg = ConfigStore::new(paths)
        .load_or_init_default()
        .context("load config")?;
    let ledger = SolanaLedger::from_config(&cfg)?;
    Ok(WalletContext::new(
        FileCredentialStore::new(paths.clone()),
        ledger,
        cfg.discovery,
    ))
}

fn read_phrase(with_passphrase: bool) -> eyre::Result<(String, Option<String>)> {
    let words = cli_output::read_secret("Recovery phrase: ")?;
    let passphrase = if with_passphrase {
        Some(cli_output::read_secret("Passphrase: ")?)
    } else {
        None
    };
    Ok((words, passphrase))
}

async fn import_phrase(
    wallet: &mut Wallet,
    with_passphrase: bool,
    select: Option<&str>,
) -> eyre::Result<()> {
    let (words, passphrase) = read_phrase(with_passphrase)?;
    let input = RecoveryInput::phrase(words, passphrase);
    cli_output::print_scanning(wallet.policy().search_space());
    let outcome = match select {
        Some(pk) => wallet.import_account(input, pk).await,
        None => wallet.import(input).await,
    }
    .map_err(fail)?;

    let account = match outcome {
        ImportOutcome::Imported(acct) => acct,
        ImportOutcome::NoneFound { scanned } => {
            cli_output::print_none_found(scanned);
            return write_json(&serde_json::json!({
                "ok": true,
                "status": "none_found",
                "scanned": scanned,
            }));
        }
        ImportOutcome::AwaitingUserChoice(pending) => {
            let summaries = pending.summaries();
            cli_output::print_candidates(&summaries);
            let chosen = cli_output::prompt_selection(summaries.len())?
                .and_then(|i| summaries.get(i))
                .map(|s| s.public_key.clone());
            let Some(pk) = chosen else {
                wallet.cancel_selection(pending);
                return write_json(&serde_json::json!({
                    "ok": true,
                    "status": "cancelled",
                    "candidates": summaries,
                }));
            };
            wallet
                .complete_selection(pending, &pk)
                .await
                .map_err(fail)?
        }
    };

    write_json(&serde_json::json!({
        "ok": true,
        "status": "imported",
        "account": account,
        "balance_sol": wallet.state().balance_sol(),
    }))
}

async fn import_key(wallet: &mut Wallet) -> eyre::Result<()> {
    let encoded = cli_output::read_secret("Private key: ")?;
    let outcome = wallet
        .import(RecoveryInput::private_key(encoded))
        .await
        .map_err(fail)?;
    let ImportOutcome::Imported(account) = outcome else {
        eyre::bail!("unexpected import outcome for a private key");
    };
    write_json(&serde_json::json!({
        "ok": true,
        "status": "imported",
        "account": account,
        "balance_sol": wallet.state().balance_sol(),
        "warning": wallet.state().error,
    }))
}

async fn scan(wallet: &mut Wallet, with_passphrase: bool) -> eyre::Result<()> {
    let (words, passphrase) = read_phrase(with_passphrase)?;
    let words = SecretString::new(words.into());
    let passphrase = passphrase
        .filter(|p| !p.is_empty())
        .map(|p| SecretString::new(p.into()));
    cli_output::print_scanning(wallet.policy().search_space());
    let all = wallet
        .scan(&words, passphrase.as_ref())
        .await
        .map_err(fail)?;
    let funded = all.iter().filter(|c| c.has_funds()).count();
    let candidates: Vec<_> = all.iter().map(Candidate::summary).collect();
    write_json(&serde_json::json!({
        "ok": true,
        "scanned": candidates.len(),
        "funded": funded,
        "candidates": candidates,
    }))
}

async fn show(wallet: &mut Wallet, json: bool) -> eyre::Result<()> {
    wallet.init().await;
    let state = wallet.state();
    if json {
        return write_json(&serde_json::json!({
            "ok": true,
            "wallet": state,
            "balance_sol": state.balance_sol(),
        }));
    }
    cli_output::print_wallet(state);
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = AinshteinPaths::discover()?;
    std::fs::create_dir_all(&paths.data_dir).context("create data dir")?;
    let _log_guard = init_logging(&paths);

    match cli.cmd {
        Command::Paths => write_json(&serde_json::json!({
          "config_dir": paths.config_dir,
          "data_dir": paths.data_dir,
          "log_file": paths.log_file,
        })),
        Command::Import { cmd } => {
            let mut wallet = open_wallet(&paths)?;
            match cmd {
                ImportCommand::Phrase { passphrase, select } => {
                    import_phrase(&mut wallet, passphrase, select.as_deref()).await
                }
                ImportCommand::Key => import_key(&mut wallet).await,
            }
        }
        Command::Scan { passphrase } => {
            let mut wallet = open_wallet(&paths)?;
            scan(&mut wallet, passphrase).await
        }
        Command::Show { json } => {
            let mut wallet = open_wallet(&paths)?;
            show(&mut wallet, json).await
        }
        Command::Logout => {
            let mut wallet = open_wallet(&paths)?;
            wallet.clear().await.map_err(fail)?;
            write_json(&serde_json::json!({ "ok": true, "status": "cleared" }))
        }
    }
}
