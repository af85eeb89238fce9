//! Driver seam and the per-split [`Session`].
//!
//! A [`HostConnector`] opens a [`ScanBackend`] for one chunk host; the
//! backend owns the connection and, once a cursor is opened, the
//! read-only statement and the cursor itself. A session never outlives one
//! split's execution.

use std::time::Instant;

use async_trait::async_trait;
use shardscan_core::{ChunkHost, HostId};

use crate::error::ConnectorError;
use crate::metrics::ScanMetrics;

/// Opens a live backend for a chunk host.
#[async_trait]
pub trait HostConnector: Send + Sync {
    type Backend: ScanBackend;

    /// One connection attempt. Failures should be reported as
    /// [`ConnectorError::ConnectionFailure`] so the caller may retry elsewhere.
    async fn connect(&self, host: &ChunkHost) -> Result<Self::Backend, ConnectorError>;
}

/// A connection able to run one forward-only, read-only cursor.
#[async_trait]
pub trait ScanBackend: Send {
    type Row: Send;

    /// Start the read-only statement and open a cursor over `sql`.
    async fn open_cursor(&mut self, sql: &str) -> Result<(), ConnectorError>;

    /// Up to `max_rows` further rows. Fewer than asked means the cursor is done.
    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<Self::Row>, ConnectorError>;

    /// Close the cursor if one is open.
    async fn close_cursor(&mut self) -> Result<(), ConnectorError>;

    /// End the read-only statement if one is open.
    async fn finish_statement(&mut self) -> Result<(), ConnectorError>;

    /// Close the connection. Further calls are no-ops.
    async fn close(&mut self) -> Result<(), ConnectorError>;
}

/// A connected backend plus what the connector learned getting there.
pub struct Session<B> {
    pub(crate) backend: B,
    host: ChunkHost,
    host_id: HostId,
    attempts: usize,
    started_at: Instant,
    connected_at: Instant,
    pub(crate) metrics: Option<ScanMetrics>,
}

impl<B: ScanBackend> Session<B> {
    pub fn new(
        backend: B,
        host: ChunkHost,
        host_id: HostId,
        attempts: usize,
        started_at: Instant,
    ) -> Self {
        Self {
            backend,
            host,
            host_id,
            attempts,
            started_at,
            connected_at: Instant::now(),
            metrics: None,
        }
    }

    pub(crate) fn with_metrics(mut self, metrics: Option<ScanMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The replica this session is connected to.
    pub fn host(&self) -> &ChunkHost {
        &self.host
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    /// Connection attempts made, including the successful one.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Give the connection back without running a query.
    pub async fn release(mut self) -> Result<(), ConnectorError> {
        if let Some(m) = &self.metrics {
            m.open_sessions.dec();
        }
        release_backend(&mut self.backend).await
    }
}

/// Release everything a backend holds, cursor first, connection last.
/// Every step runs even if an earlier one fails; the first error wins.
pub(crate) async fn release_backend<B: ScanBackend>(backend: &mut B) -> Result<(), ConnectorError> {
    let cursor = backend.close_cursor().await;
    let statement = backend.finish_statement().await;
    let connection = backend.close().await;
    cursor.and(statement).and(connection)
}
