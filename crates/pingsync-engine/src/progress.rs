//! Progress frames and the sinks they are written to
//!
//! A running job reports through newline-delimited JSON objects:
//!
//! ```text
//! {"progress":"started","jobId":"…","total":10,"processed":0}
//! {"progress":"processing","processed":5,"total":10,"added":5,...}
//! {"progress":"complete","total":10,"added":10,...,"cancelled":false}
//! {"error":"Invalid credentials format.","details":[...]}
//! ```
//!
//! ## Sinks
//!
//! - [`ChannelSink`] - bounded channel backing a streaming HTTP body
//! - [`WriterSink`] - any async writer, e.g. stdout for the CLI
//! - `Vec<ProgressFrame>` - collects frames in tests

use async_trait::async_trait;
use pingsync_core::domain::{BatchJobState, JobId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

// ============================================================================
// Frames
// ============================================================================

/// One line of the progress stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressFrame {
    Status(StatusFrame),
    Error(ErrorFrame),
}

/// Frames tagged with `"progress"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "progress", rename_all = "lowercase")]
pub enum StatusFrame {
    #[serde(rename_all = "camelCase")]
    Started {
        job_id: JobId,
        total: usize,
        processed: usize,
    },
    #[serde(rename_all = "camelCase")]
    Processing {
        processed: usize,
        total: usize,
        added: usize,
        modified: usize,
        skipped: usize,
        not_found: usize,
        deleted: usize,
        error: usize,
    },
    #[serde(rename_all = "camelCase")]
    Cancelled {
        processed: usize,
        total: usize,
        unprocessed: usize,
        added: usize,
        modified: usize,
        skipped: usize,
        not_found: usize,
        deleted: usize,
        errors: usize,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        total: usize,
        added: usize,
        deleted: usize,
        modified: usize,
        skipped: usize,
        not_found: usize,
        errors: usize,
        error_details: Vec<String>,
        cancelled: bool,
    },
}

/// Validation or fatal failure; ends the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
    #[serde(default)]
    pub details: Vec<String>,
}

impl ProgressFrame {
    pub fn started(job_id: JobId, state: &BatchJobState) -> Self {
        ProgressFrame::Status(StatusFrame::Started {
            job_id,
            total: state.total(),
            processed: state.processed(),
        })
    }

    pub fn processing(state: &BatchJobState) -> Self {
        let c = state.counters();
        ProgressFrame::Status(StatusFrame::Processing {
            processed: state.processed(),
            total: state.total(),
            added: c.added,
            modified: c.modified,
            skipped: c.skipped,
            not_found: c.not_found,
            deleted: c.deleted,
            error: c.errors,
        })
    }

    pub fn cancelled(state: &BatchJobState) -> Self {
        let c = state.counters();
        ProgressFrame::Status(StatusFrame::Cancelled {
            processed: state.processed(),
            total: state.total(),
            unprocessed: state.unprocessed(),
            added: c.added,
            modified: c.modified,
            skipped: c.skipped,
            not_found: c.not_found,
            deleted: c.deleted,
            errors: c.errors,
        })
    }

    pub fn complete(state: &BatchJobState) -> Self {
        let c = state.counters();
        ProgressFrame::Status(StatusFrame::Complete {
            total: state.total(),
            added: c.added,
            deleted: c.deleted,
            modified: c.modified,
            skipped: c.skipped,
            not_found: c.not_found,
            errors: c.errors,
            error_details: state.error_details().to_vec(),
            cancelled: false,
        })
    }

    pub fn error(message: impl Into<String>, details: Vec<String>) -> Self {
        ProgressFrame::Error(ErrorFrame {
            error: message.into(),
            details,
        })
    }

    /// Serialized frame followed by `\n`
    pub fn to_line(&self) -> Vec<u8> {
        // Frames hold only strings and integers
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        line
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProgressFrame::Error(_))
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// The receiving side of a progress stream went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("progress sink closed")]
pub struct SinkClosed;

/// Destination for a job's progress frames
///
/// `emit` may wait when the consumer is slow; the row loop pauses with it.
#[async_trait]
pub trait ProgressSink: Send {
    async fn emit(&mut self, frame: ProgressFrame) -> Result<(), SinkClosed>;
}

/// Sends frames into a bounded channel
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressFrame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ProgressFrame>) -> Self {
        Self { tx }
    }

    /// A sink and the receiver that drains it
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn emit(&mut self, frame: ProgressFrame) -> Result<(), SinkClosed> {
        self.tx.send(frame).await.map_err(|_| SinkClosed)
    }
}

/// Writes NDJSON lines to an async writer, flushing after each frame
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> ProgressSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&mut self, frame: ProgressFrame) -> Result<(), SinkClosed> {
        self.writer
            .write_all(&frame.to_line())
            .await
            .map_err(|_| SinkClosed)?;
        self.writer.flush().await.map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl ProgressSink for Vec<ProgressFrame> {
    async fn emit(&mut self, frame: ProgressFrame) -> Result<(), SinkClosed> {
        self.push(frame);
        Ok(())
    }
}
