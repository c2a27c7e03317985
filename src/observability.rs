use std::net::SocketAddr;

// ── Backend traffic ─────────────────────────────────────────────

/// Histogram: backend request latency in seconds. Labels: operation.
pub const FETCH_DURATION_SECONDS: &str = "slotgrid_fetch_duration_seconds";

/// Counter: failed backend requests. Labels: operation.
pub const FETCH_FAILURES_TOTAL: &str = "slotgrid_fetch_failures_total";

// ── Query cache ─────────────────────────────────────────────────

/// Counter: lookups answered from a fresh entry. Labels: cache.
pub const CACHE_HITS_TOTAL: &str = "slotgrid_cache_hits_total";

/// Counter: lookups that started a fetch. Labels: cache.
pub const CACHE_MISSES_TOTAL: &str = "slotgrid_cache_misses_total";

/// Counter: lookups that joined a fetch already in flight. Labels: cache.
pub const CACHE_JOINED_TOTAL: &str = "slotgrid_cache_joined_total";

/// Counter: entries dropped by prefix invalidation. Labels: cache.
pub const CACHE_INVALIDATED_TOTAL: &str = "slotgrid_cache_invalidated_total";

// ── Planning ────────────────────────────────────────────────────

/// Counter: data anomalies met while building grids. Labels: kind.
pub const GRID_ANOMALIES_TOTAL: &str = "slotgrid_grid_anomalies_total";

/// Counter: week-view days degraded to an empty grid.
pub const WEEK_DAYS_DEGRADED_TOTAL: &str = "slotgrid_week_days_degraded_total";

/// Histogram: time spent building a statistics snapshot, in seconds.
pub const STATS_DURATION_SECONDS: &str = "slotgrid_stats_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
