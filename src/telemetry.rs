//! Logging setup and token-usage monitoring.

use std::sync::OnceLock;
use tracing::{info, warn};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Output-token caps per agent.
pub const PLANNER_TOKEN_CAP: u32 = 200;
pub const SEARCH_TOKEN_CAP: u32 = 300;
pub const WRITER_TOKEN_CAP: u32 = 900;

/// Install the global `tracing` subscriber once.
///
/// `RUST_LOG` wins; otherwise `fallback_level` is used, then `info`.
pub fn init_tracing(fallback_level: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// How close an agent came to its output-token cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPressure {
    Normal,
    /// At or above 80% of the cap
    Warning,
    /// At or above 90% of the cap; output may be truncated
    Critical,
}

/// Classify token usage against a cap.
pub fn token_pressure(used: u32, cap: u32) -> TokenPressure {
    if cap == 0 {
        return TokenPressure::Critical;
    }
    let pct = u64::from(used) * 100 / u64::from(cap);
    if pct >= 90 {
        TokenPressure::Critical
    } else if pct >= 80 {
        TokenPressure::Warning
    } else {
        TokenPressure::Normal
    }
}

/// Log an agent's token usage at a level matching its pressure.
pub fn check_token_usage(agent: &str, used: u32, cap: u32) -> TokenPressure {
    let pressure = token_pressure(used, cap);
    let pct = if cap == 0 {
        100
    } else {
        u64::from(used) * 100 / u64::from(cap)
    };
    match pressure {
        TokenPressure::Critical => warn!(
            agent,
            used, cap, "CRITICAL: {}% of output cap used; output may be truncated", pct
        ),
        TokenPressure::Warning => warn!(
            agent,
            used, cap, "{}% of output cap used; review output quality", pct
        ),
        TokenPressure::Normal => info!(agent, used, cap, "{}% of output cap used", pct),
    }
    pressure
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pressure_thresholds() {
        assert_eq!(token_pressure(159, 200), TokenPressure::Normal);
        assert_eq!(token_pressure(160, 200), TokenPressure::Warning);
        assert_eq!(token_pressure(179, 200), TokenPressure::Warning);
        assert_eq!(token_pressure(180, 200), TokenPressure::Critical);
        assert_eq!(token_pressure(950, 900), TokenPressure::Critical);
        assert_eq!(token_pressure(1, 0), TokenPressure::Critical);
    }

    #[test]
    fn test_check_token_usage_returns_pressure() {
        assert_eq!(check_token_usage("WriterAgent", 100, 900), TokenPressure::Normal);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing("debug");
        init_tracing("info");
    }
}
