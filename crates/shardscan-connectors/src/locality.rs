//! Locality-aware connection with failover across chunk replicas.
//!
//! Each attempt first prefers the replica on the worker's own node, unless
//! that replica is the one that failed last; otherwise it picks a random
//! replica, again steering clear of the last failure. Only the most recent
//! failure is remembered, so an older failed host may be tried again. The
//! attempt cap bounds the loop.

use std::time::Instant;

use shardscan_core::{HostId, HostPicker, RandomPicker, Split};
use tracing::{info, warn};

use crate::config::{ScanConfig, DEFAULT_MAX_CONNECT_ATTEMPTS};
use crate::error::ConnectorError;
use crate::metrics::ScanMetrics;
use crate::session::{HostConnector, Session};

pub struct LocalityConnector<C, P = RandomPicker> {
    connector: C,
    local_address: Option<String>,
    max_attempts: usize,
    picker: P,
    metrics: Option<ScanMetrics>,
}

impl<C: HostConnector> LocalityConnector<C> {
    pub fn new(connector: C, local_address: Option<String>) -> Self {
        Self {
            connector,
            local_address,
            max_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            picker: RandomPicker::new(),
            metrics: None,
        }
    }

    pub fn from_config(connector: C, config: &ScanConfig) -> Self {
        Self::new(connector, config.local_address.clone()).with_max_attempts(config.max_connect_attempts)
    }
}

impl<C: HostConnector, P: HostPicker + Send> LocalityConnector<C, P> {
    pub fn with_picker<Q: HostPicker + Send>(self, picker: Q) -> LocalityConnector<C, Q> {
        LocalityConnector {
            connector: self.connector,
            local_address: self.local_address,
            max_attempts: self.max_attempts,
            picker,
            metrics: self.metrics,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: ScanMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Open a session on one of the split's chunk hosts.
    pub async fn connect(&mut self, split: &Split) -> Result<Session<C::Backend>, ConnectorError> {
        let chunk = split.chunk();
        let started_at = Instant::now();
        let local = self
            .local_address
            .as_deref()
            .and_then(|addr| chunk.host_for(addr));
        let task_addr = self.local_address.as_deref().unwrap_or("<unknown>");

        let mut avoid: Option<HostId> = None;
        let mut attempts = 0usize;

        loop {
            let candidate = match local {
                Some(id) if avoid != Some(id) => {
                    if let Some(m) = &self.metrics {
                        m.locality_hits.inc();
                    }
                    id
                }
                _ => {
                    info!("Data locality failed for {}", task_addr);
                    if let Some(m) = &self.metrics {
                        m.locality_misses.inc();
                    }
                    chunk.any_host(avoid, &mut self.picker)?
                }
            };
            let host = chunk.host(candidate)?;

            info!(
                "Task from {} is connecting to chunk {} on host {} with db url {}",
                task_addr,
                chunk.id(),
                host.address(),
                host.redacted_url()
            );
            if let Some(m) = &self.metrics {
                m.connect_attempts.inc();
            }

            match self.connector.connect(host).await {
                Ok(backend) => {
                    attempts += 1;
                    if let Some(m) = &self.metrics {
                        m.open_sessions.inc();
                    }
                    return Ok(Session::new(backend, host.clone(), candidate, attempts, started_at)
                        .with_metrics(self.metrics.clone()));
                }
                Err(e) if e.is_retryable() => {
                    attempts += 1;
                    if let Some(m) = &self.metrics {
                        m.record_failure(host.address());
                    }
                    warn!(
                        "Connection attempt {}/{} to {} for chunk {} failed: {}",
                        attempts,
                        self.max_attempts,
                        host.address(),
                        chunk.id(),
                        e
                    );
                    if attempts >= self.max_attempts {
                        if let Some(m) = &self.metrics {
                            m.sessions_exhausted.inc();
                        }
                        return Err(ConnectorError::ConnectionExhausted {
                            chunk: chunk.id().to_string(),
                            attempts,
                            last_error: e.to_string(),
                        });
                    }
                    avoid = Some(candidate);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
