//! Prometheus metrics for connection failover and row streaming.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct HostLabel(pub String);

impl prometheus_client::encoding::EncodeLabelSet for HostLabel {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("host", self.0.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ScanMetrics {
    pub connect_attempts: Counter,
    pub connect_failures: Family<HostLabel, Counter>,
    pub locality_hits: Counter,
    pub locality_misses: Counter,
    pub sessions_exhausted: Counter,
    pub open_sessions: Gauge,
    pub rows_read: Counter,
    pub registry: Arc<Registry>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let connect_attempts = Counter::default();
        registry.register(
            "shardscan_connect_attempts",
            "Connection attempts against chunk hosts",
            connect_attempts.clone(),
        );

        let connect_failures = Family::<HostLabel, Counter>::default();
        registry.register(
            "shardscan_connect_failures",
            "Failed connection attempts by host",
            connect_failures.clone(),
        );

        let locality_hits = Counter::default();
        registry.register(
            "shardscan_locality_hits",
            "Host selections that picked the worker's own node",
            locality_hits.clone(),
        );

        let locality_misses = Counter::default();
        registry.register(
            "shardscan_locality_misses",
            "Host selections that fell back to a remote replica",
            locality_misses.clone(),
        );

        let sessions_exhausted = Counter::default();
        registry.register(
            "shardscan_sessions_exhausted",
            "Splits that ran out of connection attempts",
            sessions_exhausted.clone(),
        );

        let open_sessions = Gauge::default();
        registry.register(
            "shardscan_open_sessions",
            "Sessions currently holding a connection",
            open_sessions.clone(),
        );

        let rows_read = Counter::default();
        registry.register(
            "shardscan_rows_read",
            "Rows delivered by streaming readers",
            rows_read.clone(),
        );

        Self {
            connect_attempts,
            connect_failures,
            locality_hits,
            locality_misses,
            sessions_exhausted,
            open_sessions,
            rows_read,
            registry: Arc::new(registry),
        }
    }

    pub fn record_failure(&self, host: &str) {
        self.connect_failures
            .get_or_create(&HostLabel(host.to_string()))
            .inc();
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_labelled_by_host() {
        let metrics = ScanMetrics::new();
        metrics.record_failure("node1");
        metrics.record_failure("node1");
        metrics.record_failure("node2");
        metrics.connect_attempts.inc_by(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("shardscan_connect_failures_total{host=\"node1\"} 2"));
        assert!(text.contains("shardscan_connect_failures_total{host=\"node2\"} 1"));
        assert!(text.contains("shardscan_connect_attempts_total 3"));
    }
}
