use std::time::Duration;

use chrono::NaiveDate;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Freshness window of each cached query family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub catalog: Duration,
    pub planning: Duration,
    pub stats: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            catalog: Duration::from_secs(30 * 60),
            planning: Duration::from_secs(5 * 60),
            stats: Duration::from_secs(5 * 60),
        }
    }
}

/// Runtime settings, read from `SLOTGRID_*` environment variables.
/// Unset or unparsable values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub ttls: CacheTtls,
    pub metrics_port: Option<u16>,
    /// Reference date for the command-line summary; today when unset.
    pub date: Option<NaiveDate>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let defaults = CacheTtls::default();

        Self {
            api_url: lookup("SLOTGRID_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            api_token: lookup("SLOTGRID_API_TOKEN").filter(|t| !t.is_empty()),
            timeout: secs("SLOTGRID_TIMEOUT_SECS", Duration::from_secs(30)),
            ttls: CacheTtls {
                catalog: secs("SLOTGRID_CATALOG_TTL_SECS", defaults.catalog),
                planning: secs("SLOTGRID_PLANNING_TTL_SECS", defaults.planning),
                stats: secs("SLOTGRID_STATS_TTL_SECS", defaults.stats),
            },
            metrics_port: lookup("SLOTGRID_METRICS_PORT").and_then(|s| s.parse().ok()),
            date: lookup("SLOTGRID_DATE").and_then(|s| s.parse().ok()),
        }
    }
}
