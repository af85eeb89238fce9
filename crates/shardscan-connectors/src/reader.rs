//! Streaming row reader over one split's session.
//!
//! Rows are pulled from the backend in fetch-sized batches and handed out
//! one at a time with a synthetic key counting from 0. Every exit path
//! (exhaustion, fetch error, decode error, explicit close) releases the
//! cursor, the statement and the connection, in that order, exactly once.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::FetchSize;
use crate::decode::RowDecoder;
use crate::error::ConnectorError;
use crate::session::{release_backend, ScanBackend, Session};

pub struct RowReader<B: ScanBackend, D> {
    session: Session<B>,
    decoder: D,
    fetch_size: FetchSize,
    buffer: VecDeque<B::Row>,
    exhausted: bool,
    closed: bool,
    position: u64,
    query_time: Duration,
    executed_at: Instant,
}

impl<B, D> RowReader<B, D>
where
    B: ScanBackend,
    D: RowDecoder<B::Row>,
{
    /// Run `sql` on the session's connection and position before the first
    /// row. If the query cannot be started the session is released.
    pub async fn open(
        mut session: Session<B>,
        sql: &str,
        decoder: D,
        fetch_size: FetchSize,
    ) -> Result<Self, ConnectorError> {
        debug!("Opening cursor on {}: {}", session.host().address(), sql);
        let query_start = Instant::now();
        if let Err(e) = session.backend.open_cursor(sql).await {
            if let Err(release) = session.release().await {
                warn!("Releasing session after failed query: {}", release);
            }
            return Err(match e {
                ConnectorError::QueryExecutionFailure(_) => e,
                other => ConnectorError::QueryExecutionFailure(other.to_string()),
            });
        }
        let executed_at = Instant::now();

        Ok(Self {
            session,
            decoder,
            fetch_size,
            buffer: VecDeque::new(),
            exhausted: false,
            closed: false,
            position: 0,
            query_time: executed_at - query_start,
            executed_at,
        })
    }

    /// The next decoded row and its key, or `None` at end of stream.
    ///
    /// End of stream closes the reader. A fetch or decode error closes it
    /// too and is returned; rows already handed out keep their keys.
    pub async fn next(&mut self) -> Result<Option<(u64, D::Output)>, ConnectorError> {
        if self.closed {
            return Ok(None);
        }

        if self.buffer.is_empty() && !self.exhausted {
            let wanted = self.fetch_size.rows_per_fetch();
            match self.session.backend.fetch(wanted).await {
                Ok(rows) => {
                    if rows.len() < wanted {
                        self.exhausted = true;
                    }
                    self.buffer.extend(rows);
                }
                Err(e) => {
                    self.close_quietly().await;
                    return Err(e);
                }
            }
        }

        let Some(row) = self.buffer.pop_front() else {
            self.close().await?;
            return Ok(None);
        };

        match self.decoder.decode(&row) {
            Ok(value) => {
                let key = self.position;
                self.position += 1;
                if let Some(m) = &self.session.metrics {
                    m.rows_read.inc();
                }
                Ok(Some((key, value)))
            }
            Err(message) => {
                let position = self.position;
                self.close_quietly().await;
                Err(ConnectorError::RowDecodeFailure { position, message })
            }
        }
    }

    /// Rows handed out so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// No row total is known up front, so progress is always 0.
    pub fn progress(&self) -> f32 {
        0.0
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    /// Release cursor, statement and connection. Later calls do nothing.
    pub async fn close(&mut self) -> Result<(), ConnectorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer.clear();

        let result = release_backend(&mut self.session.backend).await;
        if let Some(m) = &self.session.metrics {
            m.open_sessions.dec();
        }

        let connection = self.session.connected_at() - self.session.started_at();
        info!(
            "DB times (ms): connection = {}, query execution = {}, row retrieval = {}",
            connection.as_millis(),
            self.query_time.as_millis(),
            self.executed_at.elapsed().as_millis()
        );
        info!("Rows retrieved = {}", self.position);
        result
    }

    async fn close_quietly(&mut self) {
        if let Err(e) = self.close().await {
            warn!("Releasing session after failed read: {}", e);
        }
    }
}

impl<B: ScanBackend, D> Drop for RowReader<B, D> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "Row reader for {} dropped without close after {} rows",
                self.session.host().address(),
                self.position
            );
        }
    }
}

/// Stream every row of one split through `on_row`, closing the reader on
/// every exit path. Returning `ControlFlow::Break` stops early. Yields the
/// number of rows delivered.
pub async fn read_split<B, D, F>(
    session: Session<B>,
    sql: &str,
    decoder: D,
    fetch_size: FetchSize,
    mut on_row: F,
) -> Result<u64, ConnectorError>
where
    B: ScanBackend,
    D: RowDecoder<B::Row>,
    F: FnMut(u64, D::Output) -> ControlFlow<()>,
{
    let mut reader = RowReader::open(session, sql, decoder, fetch_size).await?;
    loop {
        match reader.next().await {
            Ok(Some((key, value))) => {
                if on_row(key, value).is_break() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                reader.close_quietly().await;
                return Err(e);
            }
        }
    }
    reader.close().await?;
    Ok(reader.position())
}
