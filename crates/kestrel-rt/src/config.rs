// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Run configuration, read from the environment.

use std::time::Duration;

use tracing::warn;

use crate::clock::ClockMode;

/// Seconds before the watchdog aborts a run. Positive float; anything else
/// leaves the watchdog off.
pub const HANG_TIMEOUT_VAR: &str = "KESTREL_HANG_TIMEOUT";
/// Suspension count between hang-probe warnings. `0` or empty disables.
pub const HANG_PROBE_VAR: &str = "KESTREL_HANG_PROBE";
/// `monotonic` (default) or `virtual`.
pub const CLOCK_VAR: &str = "KESTREL_CLOCK";

const DEFAULT_PROBE_THRESHOLD: u64 = 100_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub hang_timeout: Option<Duration>,
    pub hang_probe: Option<u64>,
    pub clock: ClockMode,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let hang_timeout = lookup(HANG_TIMEOUT_VAR).and_then(|raw| parse_hang_timeout(&raw));
        let hang_probe = lookup(HANG_PROBE_VAR).and_then(|raw| parse_hang_probe(&raw));
        let clock = match lookup(CLOCK_VAR) {
            Some(raw) if !raw.trim().is_empty() => ClockMode::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown {}, using monotonic clock", CLOCK_VAR);
                ClockMode::Monotonic
            }),
            _ => ClockMode::Monotonic,
        };
        Self {
            hang_timeout,
            hang_probe,
            clock,
        }
    }

    pub fn with_hang_timeout(mut self, limit: Duration) -> Self {
        self.hang_timeout = (!limit.is_zero()).then_some(limit);
        self
    }

    pub fn with_hang_probe(mut self, threshold: u64) -> Self {
        self.hang_probe = (threshold > 0).then_some(threshold);
        self
    }

    pub fn with_clock(mut self, clock: ClockMode) -> Self {
        self.clock = clock;
        self
    }
}

fn parse_hang_timeout(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Duration::try_from_secs_f64(secs).ok(),
        Ok(_) => None,
        Err(_) => {
            warn!(value = %raw, "ignoring unparsable {}", HANG_TIMEOUT_VAR);
            None
        }
    }
}

fn parse_hang_probe(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(0) => None,
        Ok(n) => Some(n),
        Err(_) => Some(DEFAULT_PROBE_THRESHOLD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> RunConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_disables_everything() {
        assert_eq!(config(&[]), RunConfig::default());
    }

    #[test]
    fn positive_timeout_arms_watchdog() {
        let c = config(&[(HANG_TIMEOUT_VAR, "2.5")]);
        assert_eq!(c.hang_timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn non_positive_or_bad_timeout_disables() {
        for raw in ["0", "-3", "", "  ", "soon", "inf", "NaN"] {
            assert_eq!(config(&[(HANG_TIMEOUT_VAR, raw)]).hang_timeout, None, "{raw:?}");
        }
    }

    #[test]
    fn hang_probe_threshold() {
        assert_eq!(config(&[(HANG_PROBE_VAR, "50")]).hang_probe, Some(50));
        assert_eq!(config(&[(HANG_PROBE_VAR, "0")]).hang_probe, None);
        assert_eq!(config(&[(HANG_PROBE_VAR, "yes")]).hang_probe, Some(100_000));
    }

    #[test]
    fn clock_mode() {
        assert_eq!(config(&[(CLOCK_VAR, "virtual")]).clock, ClockMode::Virtual);
        assert_eq!(config(&[(CLOCK_VAR, "bogus")]).clock, ClockMode::Monotonic);
    }

    #[test]
    fn builders() {
        let c = RunConfig::default()
            .with_hang_timeout(Duration::ZERO)
            .with_hang_probe(3)
            .with_clock(ClockMode::Virtual);
        assert_eq!(c.hang_timeout, None);
        assert_eq!(c.hang_probe, Some(3));
        assert_eq!(c.clock, ClockMode::Virtual);
    }
}
