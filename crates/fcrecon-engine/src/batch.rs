//! Batch writer
//!
//! Buffers records into fixed-size batches and flushes each one as a
//! contiguous write directly after the previous batch. A failed flush is
//! retried at the same start row; sinks replace that region, so retries
//! never duplicate output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fcrecon_core::{BatchConfig, ReconcileError, ReconciledRecord, RecordSink};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Shared cancellation flag, checked before every flush
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of [`BatchWriter::write_batches`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Records durably written
    pub written: usize,
    pub batches: usize,
    /// The run stopped early; everything in `written` is still valid
    pub cancelled: bool,
}

pub struct BatchWriter {
    size: usize,
    max_attempts: u32,
    pause: Duration,
    cancel: Option<CancelToken>,
}

impl BatchWriter {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            size: config.size.max(1),
            max_attempts: config.max_attempts.max(1),
            pause: Duration::from_millis(config.pause_ms),
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Write `records` to `sink` in order. The sink must already have begun.
    ///
    /// The cancel token is checked before each batch is pulled from
    /// `records`, so a cancelled run leaves the rest of the iterator untouched.
    ///
    /// `on_flushed` sees each batch after it has been written, so callers
    /// can aggregate exactly what reached the destination.
    pub fn write_batches<S, I, F>(
        &self,
        sink: &mut S,
        records: I,
        mut on_flushed: F,
    ) -> Result<BatchOutcome, ReconcileError>
    where
        S: RecordSink + ?Sized,
        I: IntoIterator<Item = ReconciledRecord>,
        F: FnMut(&[ReconciledRecord]),
    {
        let mut outcome = BatchOutcome::default();
        let mut buffer = Vec::with_capacity(self.size);

        let mut records = records.into_iter();
        loop {
            // Checked before pulling the next batch
            if self.is_cancelled() {
                warn!(
                    written = outcome.written,
                    "cancelled before batch {}",
                    outcome.batches + 1
                );
                outcome.cancelled = true;
                return Ok(outcome);
            }

            buffer.clear();
            buffer.extend(records.by_ref().take(self.size));
            if buffer.is_empty() {
                break;
            }
            if outcome.batches > 0 && !self.pause.is_zero() {
                thread::sleep(self.pause);
            }

            self.flush(sink, outcome.written, outcome.batches + 1, &buffer)?;
            on_flushed(&buffer);

            outcome.written += buffer.len();
            outcome.batches += 1;
            debug!(batch = outcome.batches, rows = buffer.len(), total = outcome.written, "flushed");
        }

        Ok(outcome)
    }

    fn flush<S>(
        &self,
        sink: &mut S,
        start: usize,
        batch: usize,
        records: &[ReconciledRecord],
    ) -> Result<(), ReconcileError>
    where
        S: RecordSink + ?Sized,
    {
        let mut attempt = 1;
        loop {
            match sink.write_batch(start, records) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts => {
                    warn!(batch, attempt, start, error = %e, "retrying batch");
                    attempt += 1;
                }
                Err(e) => {
                    error!(batch, attempts = attempt, error = %e, "batch write exhausted retries");
                    return Err(ReconcileError::WriteFailed {
                        batch,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
