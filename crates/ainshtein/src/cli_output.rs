//! Centralised helpers for user-facing CLI interaction on stderr. Stdout carries JSON only.

use ainshtein::{discovery::CandidateSummary, wallet::WalletState};
use std::io::{BufRead as _, IsTerminal as _, Write as _};

fn stderr_write(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    let _flush = stderr.flush();
}

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

fn read_stdin_line() -> eyre::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| eyre::eyre!("read stdin: {e}"))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Read a secret without echo on a terminal, or one line from piped stdin.
pub fn read_secret(prompt: &str) -> eyre::Result<String> {
    if std::io::stdin().is_terminal() {
        return rpassword::prompt_password(prompt).map_err(|e| eyre::eyre!("read secret: {e}"));
    }
    read_stdin_line()
}

pub fn print_scanning(search_space: usize) {
    stderr_writeln(&format!(
        "Searching up to {search_space} derivation paths for funded accounts..."
    ));
}

pub fn print_wallet(state: &WalletState) {
    if let Some(pk) = state.public_key.as_deref().filter(|_| state.imported) {
        stderr_writeln(&format!("address: {pk}"));
        stderr_writeln(&format!("balance: {} SOL", state.balance_sol()));
    } else {
        stderr_writeln("no wallet imported");
    }
    if let Some(e) = &state.error {
        stderr_writeln(&format!("warning: {} ({})", e.message, e.code));
    }
}

pub fn print_none_found(scanned: usize) {
    stderr_writeln(&format!(
        "No wallets with a balance were found ({scanned} accounts checked). Nothing was imported."
    ));
}

pub fn print_candidates(candidates: &[CandidateSummary]) {
    stderr_writeln("Multiple funded accounts found:");
    for (i, c) in candidates.iter().enumerate() {
        let sol = c.sol.as_deref().unwrap_or("?");
        stderr_writeln(&format!(
            "  {n}) {pk}  {sol} SOL  ({path})",
            n = i.saturating_add(1),
            pk = c.public_key,
            path = c.path,
        ));
    }
}

/// Ask which of `count` listed accounts to import. `None` means the user cancelled.
pub fn prompt_selection(count: usize) -> eyre::Result<Option<usize>> {
    stderr_write(&format!("Select an account [1-{count}, empty to cancel]: "));
    let ans = read_stdin_line()?;
    let ans = ans.trim();
    if ans.is_empty() || ans.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    let n: usize = ans
        .parse()
        .map_err(|e| eyre::eyre!("invalid selection {ans}: {e}"))?;
    if n == 0 || n > count {
        eyre::bail!("selection out of range: {n}");
    }
    Ok(Some(n.saturating_sub(1)))
}
