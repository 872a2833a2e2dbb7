/// Lamports per SOL (the chain's fixed unit-conversion constant).
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Lamports rendered as SOL without floats, e.g. `1_500_000_000` => `"1.5"`.
pub fn lamports_to_sol_string(lamports: u64) -> String {
    let whole = lamports / LAMPORTS_PER_SOL;
    let frac = lamports % LAMPORTS_PER_SOL;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_s = format!("{frac:09}");
    format!("{whole}.{}", frac_s.trim_end_matches('0'))
}
