use web_time::Duration;

/// Tuning knobs for [`crate::Runtime`].
///
/// ```rust
/// use tenure_core::RuntimeConfig;
///
/// let config = RuntimeConfig::default()
///     .max_jobs_per_pump(32)
///     .max_polls_per_pump(8);
/// assert_eq!(config.max_jobs_per_pump, 32);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Dispatcher jobs drained by a single `pump`.
    pub max_jobs_per_pump: usize,
    /// Executor polls performed by a single `pump`.
    pub max_polls_per_pump: usize,
    /// Rounds `run_until_idle` performs before giving up with a warning.
    pub max_settle_rounds: usize,
    /// Pumps slower than this are logged.
    pub slow_pump_threshold: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_pump: 256,
            max_polls_per_pump: 64,
            max_settle_rounds: 64,
            slow_pump_threshold: Duration::from_millis(16),
        }
    }
}

impl RuntimeConfig {
    pub fn max_jobs_per_pump(mut self, n: usize) -> Self {
        self.max_jobs_per_pump = n.max(1);
        self
    }

    pub fn max_polls_per_pump(mut self, n: usize) -> Self {
        self.max_polls_per_pump = n.max(1);
        self
    }

    pub fn max_settle_rounds(mut self, n: usize) -> Self {
        self.max_settle_rounds = n.max(1);
        self
    }

    pub fn slow_pump_threshold(mut self, d: Duration) -> Self {
        self.slow_pump_threshold = d;
        self
    }
}
