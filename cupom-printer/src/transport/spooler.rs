//! Spooler RAW writer
//!
//! Drives a print queue through open → document → page → chunked writes →
//! page end → document end → close. The platform binding sits behind
//! [`SpoolBackend`]; this module owns the ordering, the chunk pacing and
//! the cleanup guarantees.
//!
//! Chunks default to 1 KiB with a 50 ms pause between them. Authenticating
//! printers drop data when their receive buffer overflows.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::error::{PrintError, PrintResult};
use crate::router::TransportKind;

const TRANSPORT: TransportKind = TransportKind::Spooler;

/// Default spooler chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default pause between chunks
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(50);

/// Document name shown in the OS print queue
const DOC_NAME: &str = "Cupom";

/// Platform print-queue operations, one call per state transition
pub trait SpoolBackend {
    fn open_queue(&mut self, queue: &str) -> PrintResult<()>;
    fn start_document(&mut self, doc_name: &str) -> PrintResult<()>;
    fn start_page(&mut self) -> PrintResult<()>;
    /// Returns the byte count the spooler reports as written
    fn write(&mut self, chunk: &[u8]) -> PrintResult<usize>;
    fn end_page(&mut self) -> PrintResult<()>;
    fn end_document(&mut self) -> PrintResult<()>;
    fn close_queue(&mut self) -> PrintResult<()>;
}

/// Spooler session state, in acquisition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpoolState {
    Idle,
    QueueOpened,
    DocumentStarted,
    PageStarted,
    Writing,
    PageEnded,
    DocumentEnded,
    Closed,
}

/// Chunk size and pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpoolSettings {
    pub chunk_size: usize,
    pub chunk_delay: Duration,
}

impl Default for SpoolSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

/// How one payload is split for the spooler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunk_size: usize,
    pub delay: Duration,
    pub total_chunks: usize,
}

impl ChunkPlan {
    pub fn new(payload_len: usize, settings: SpoolSettings) -> Self {
        let chunk_size = settings.chunk_size.max(1);
        Self {
            chunk_size,
            delay: settings.chunk_delay,
            total_chunks: payload_len.div_ceil(chunk_size),
        }
    }
}

/// Holds the backend while resources are acquired; releases whatever is
/// still held when dropped.
struct SpoolSession<'a, B: SpoolBackend> {
    backend: &'a mut B,
    state: SpoolState,
}

impl<'a, B: SpoolBackend> SpoolSession<'a, B> {
    fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            state: SpoolState::Idle,
        }
    }

    /// Release the most recently acquired stage.
    ///
    /// The state moves on even when the call fails: a failed release is not
    /// retried, and the outer stages still have to be released.
    fn release_next(&mut self) -> PrintResult<()> {
        let (result, next) = match self.state {
            SpoolState::PageStarted | SpoolState::Writing => {
                (self.backend.end_page(), SpoolState::PageEnded)
            }
            SpoolState::DocumentStarted | SpoolState::PageEnded => {
                (self.backend.end_document(), SpoolState::DocumentEnded)
            }
            SpoolState::QueueOpened | SpoolState::DocumentEnded => {
                (self.backend.close_queue(), SpoolState::Closed)
            }
            SpoolState::Idle | SpoolState::Closed => (Ok(()), SpoolState::Closed),
        };
        self.state = next;
        result
    }

    /// Release everything, reporting the first failure
    fn finish(mut self) -> PrintResult<()> {
        let mut first_error = None;
        while self.state != SpoolState::Closed {
            if let Err(e) = self.release_next() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<B: SpoolBackend> Drop for SpoolSession<'_, B> {
    fn drop(&mut self) {
        if self.state != SpoolState::Closed {
            debug!(state = ?self.state, "unwinding spooler session");
        }
        while self.state != SpoolState::Closed {
            let state = self.state;
            if let Err(e) = self.release_next() {
                warn!(?state, error = %e, "spooler cleanup step failed");
            }
        }
    }
}

/// Chunked RAW writer over any [`SpoolBackend`]
#[derive(Debug, Clone)]
pub struct RawSpoolWriter {
    settings: SpoolSettings,
}

impl RawSpoolWriter {
    pub fn new(settings: SpoolSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> SpoolSettings {
        self.settings
    }

    /// Write one job to `queue`.
    ///
    /// `timeout` bounds the whole submission and is checked before every
    /// chunk. Any failure, including a short write or the timeout, aborts the
    /// job; opened stages are always released before returning.
    #[instrument(skip(self, backend, data), fields(data_len = data.len()))]
    pub fn write<B: SpoolBackend>(
        &self,
        backend: &mut B,
        queue: &str,
        data: &[u8],
        timeout: Duration,
    ) -> PrintResult<()> {
        let started = Instant::now();
        let plan = ChunkPlan::new(data.len(), self.settings);
        let mut session = SpoolSession::new(backend);

        session.backend.open_queue(queue)?;
        session.state = SpoolState::QueueOpened;

        session.backend.start_document(DOC_NAME)?;
        session.state = SpoolState::DocumentStarted;

        session.backend.start_page()?;
        session.state = SpoolState::PageStarted;

        info!(
            chunks = plan.total_chunks,
            chunk_size = plan.chunk_size,
            "writing to spooler"
        );

        for (index, chunk) in data.chunks(plan.chunk_size).enumerate() {
            if index > 0 && !plan.delay.is_zero() {
                std::thread::sleep(plan.delay);
            }
            if started.elapsed() > timeout {
                return Err(PrintError::Timeout {
                    transport: TRANSPORT,
                    after: timeout,
                });
            }

            session.state = SpoolState::Writing;
            let written = session.backend.write(chunk)?;
            if written != chunk.len() {
                return Err(PrintError::PartialWrite {
                    transport: TRANSPORT,
                    written,
                    expected: chunk.len(),
                });
            }
            debug!(chunk = index + 1, of = plan.total_chunks, "chunk written");
        }

        session.finish()?;
        info!("spooler job complete");
        Ok(())
    }
}

impl Default for RawSpoolWriter {
    fn default() -> Self {
        Self::new(SpoolSettings::default())
    }
}
