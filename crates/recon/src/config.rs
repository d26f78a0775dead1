use std::time::Duration;

/// Pause applied after each entity's batch of existence checks.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

/// Engine settings. Built once at the boundary and lent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconConfig {
    pub cooldown: Duration,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl ReconConfig {
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn from_cooldown_ms(ms: u64) -> Self {
        Self::with_cooldown(Duration::from_millis(ms))
    }
}
