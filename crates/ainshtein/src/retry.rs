use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Number of full rounds. Each round tries every endpoint once.
    pub rounds: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random jitter (`0..=jitter_max_ms`) added to each backoff sleep.
    pub jitter_max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(2),
            jitter_max_ms: 150,
        }
    }
}

impl BackoffConfig {
    pub fn with_rounds(rounds: usize) -> Self {
        Self {
            rounds: rounds.max(1),
            ..Self::default()
        }
    }

    /// Longest total time spent sleeping between rounds, jitter included.
    pub fn max_total_sleep(&self) -> Duration {
        (0..self.rounds.saturating_sub(1))
            .map(|round| {
                backoff_floor(self, round).saturating_add(Duration::from_millis(self.jitter_max_ms))
            })
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

fn backoff_floor(cfg: &BackoffConfig, round: usize) -> Duration {
    let shift = u32::try_from(round.min(16)).unwrap_or(16_u32);
    let pow2 = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
    let base_ms = u64::try_from(cfg.base_delay.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(cfg.max_delay.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(pow2).min(max_ms))
}

fn compute_backoff_delay(cfg: &BackoffConfig, round: usize) -> Duration {
    let jitter = if cfg!(test) || cfg.jitter_max_ms == 0 {
        0
    } else {
        // Avoid holding a non-Send RNG across await points.
        rand::random::<u64>() % cfg.jitter_max_ms.saturating_add(1).max(1)
    };
    backoff_floor(cfg, round).saturating_add(Duration::from_millis(jitter))
}

/// Try `op(endpoint)` across all endpoints, in order, for `rounds` rounds. Sleeps with
/// exponential backoff + jitter between rounds, only after every endpoint has failed.
pub async fn try_all_with_backoff<I, T, Fut>(
    endpoints: &[I],
    cfg: &BackoffConfig,
    mut op: impl FnMut(&I) -> Fut + Send,
    context_label: &'static str,
) -> eyre::Result<T>
where
    I: Sync,
    Fut: std::future::Future<Output = eyre::Result<T>> + Send,
{
    if endpoints.is_empty() {
        eyre::bail!("no endpoints configured");
    }
    if cfg.rounds == 0 {
        eyre::bail!("invalid backoff config: rounds=0");
    }

    let mut last_err: Option<eyre::Report> = None;

    for round in 0..cfg.rounds {
        for endpoint in endpoints {
            match op(endpoint).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        if round + 1 < cfg.rounds {
            tokio::time::sleep(compute_backoff_delay(cfg, round)).await;
        }
    }

    Err(last_err
        .unwrap_or_else(|| eyre::eyre!("unknown error"))
        .wrap_err(context_label))
}
