//! Progress reporting
//!
//! The engine reports through the [`ProgressSink`] trait and never assumes a
//! transport. Events are serializable so a sink can forward them as JSON to
//! whatever is listening.

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::sync::{FileFailure, SyncResult};

/// Events emitted during a run
///
/// Zero or more `Progress`/`ItemError` events are followed by exactly one
/// terminal `Success` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        percent: Option<u8>,
    },
    /// A single file failed; the run continues
    ItemError {
        path: String,
        reason: String,
        percent: u8,
    },
    #[serde(rename_all = "camelCase")]
    Success {
        message: String,
        uploaded_count: usize,
        total_count: usize,
        repository_url: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        failures: Vec<FileFailure>,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn progress(message: impl Into<String>) -> Self {
        ProgressEvent::Progress {
            message: message.into(),
            percent: None,
        }
    }

    pub fn progress_at(message: impl Into<String>, percent: u8) -> Self {
        ProgressEvent::Progress {
            message: message.into(),
            percent: Some(percent),
        }
    }

    pub fn success(result: &SyncResult) -> Self {
        let message = if result.failures.is_empty() {
            format!(
                "Success! Uploaded {} files to the \"{}\" branch.",
                result.uploaded_count, result.branch
            )
        } else {
            format!(
                "Uploaded {} of {} files to the \"{}\" branch; {} failed.",
                result.uploaded_count,
                result.total_count,
                result.branch,
                result.failures.len()
            )
        };

        ProgressEvent::Success {
            message,
            uploaded_count: result.uploaded_count,
            total_count: result.total_count,
            repository_url: result.repository_url.clone(),
            failures: result.failures.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Success { .. } | ProgressEvent::Error { .. })
    }

    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::Progress { percent, .. } => *percent,
            ProgressEvent::ItemError { percent, .. } => Some(*percent),
            ProgressEvent::Success { .. } | ProgressEvent::Error { .. } => None,
        }
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    /// Whether the consumer has gone away; the engine stops between uploads
    fn is_closed(&self) -> bool {
        false
    }
}

/// Writes events to stdout, as human-readable lines or as JSON lines
#[derive(Debug, Default)]
pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    pub fn human() -> Self {
        Self { json: false }
    }

    pub fn json() -> Self {
        Self { json: true }
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: ProgressEvent) {
        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => error!("Failed to serialize progress event: {}", e),
            }
            return;
        }

        match &event {
            ProgressEvent::Progress {
                message,
                percent: Some(percent),
            } => println!("   [{:>3}%] {}", percent, message),
            ProgressEvent::Progress { message, percent: None } => println!("🔄 {}", message),
            ProgressEvent::ItemError { path, reason, percent } => {
                warn!("Upload failed for {}: {}", path, reason);
                println!("   [{:>3}%] ❌ {}: {}", percent, path, reason);
            }
            ProgressEvent::Success {
                message,
                repository_url,
                failures,
                ..
            } => {
                println!();
                println!("🎉 {}", message);
                println!("   🔗 {}", repository_url);
                if !failures.is_empty() {
                    println!("\n🔍 Failed Uploads:");
                    for failure in failures {
                        println!("   ❌ {}: {}", failure.path, failure.reason);
                    }
                }
            }
            ProgressEvent::Error { message } => {
                error!("{}", message);
                println!("❌ {}", message);
            }
        }
    }
}

/// Forwards events into a tokio channel
///
/// Dropping the receiver cancels the run before its next upload.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            info!("Progress consumer disconnected");
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Percentages in the order they were reported
    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().filter_map(ProgressEvent::percent).collect()
    }

    pub fn terminal(&self) -> Option<ProgressEvent> {
        self.events().into_iter().rev().find(ProgressEvent::is_terminal)
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
