//! Progress reporting for batch commands
//!
//! Adapts to the output context:
//! - TTY mode: animated spinners and progress bars
//! - Non-TTY mode: start and finish lines on stderr
//! - Machine mode: JSON progress events on stderr
//! - Quiet mode: no output
//!
//! Handles are `Sync`, so a parallel evaluation can update one bar from
//! worker threads.

use std::io::IsTerminal;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

// ============================================================================
// Progress Mode Detection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Tty,
    NonTty,
    Machine,
    Quiet,
}

impl ProgressMode {
    #[must_use]
    pub fn detect(machine: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if machine {
            Self::Machine
        } else if std::io::stderr().is_terminal() {
            Self::Tty
        } else {
            Self::NonTty
        }
    }
}

// ============================================================================
// Progress Events (Machine Mode)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    SpinnerStart,
    SpinnerComplete,
    ProgressStart,
    ProgressComplete,
    ProgressError,
}

/// JSON progress event written to stderr in machine mode.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub event: ProgressEventType,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl ProgressEvent {
    fn new(event: ProgressEventType, operation: &str) -> Self {
        Self {
            event_type: "progress",
            event,
            operation: operation.to_string(),
            current: None,
            total: None,
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn with_progress(mut self, current: u64, total: Option<u64>) -> Self {
        self.current = Some(current);
        self.total = total;
        self
    }

    fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            eprintln!("{json}");
        }
    }
}

// ============================================================================
// Progress Reporter
// ============================================================================

pub struct ProgressReporter {
    mode: ProgressMode,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(machine: bool, quiet: bool) -> Self {
        Self::with_mode(ProgressMode::detect(machine, quiet))
    }

    #[must_use]
    pub const fn with_mode(mode: ProgressMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Spinner for an operation of unknown length, such as connecting to a model server.
    pub fn spinner(&self, msg: &str) -> ProgressHandle {
        match self.mode {
            ProgressMode::Quiet => ProgressHandle::Noop,
            ProgressMode::Machine => {
                ProgressEvent::new(ProgressEventType::SpinnerStart, msg).emit();
                ProgressHandle::Machine {
                    operation: msg.to_string(),
                    total: None,
                }
            }
            ProgressMode::NonTty => {
                eprintln!("[rag-eval] {msg}...");
                ProgressHandle::NonTty {
                    operation: msg.to_string(),
                }
            }
            ProgressMode::Tty => {
                let pb = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
                    pb.set_style(style);
                }
                pb.set_message(msg.to_string());
                pb.enable_steady_tick(Duration::from_millis(100));
                ProgressHandle::Tty(pb)
            }
        }
    }

    /// Bar for `total` steps.
    pub fn progress(&self, total: u64, msg: &str) -> ProgressHandle {
        match self.mode {
            ProgressMode::Quiet => ProgressHandle::Noop,
            ProgressMode::Machine => {
                ProgressEvent::new(ProgressEventType::ProgressStart, msg)
                    .with_progress(0, Some(total))
                    .emit();
                ProgressHandle::Machine {
                    operation: msg.to_string(),
                    total: Some(total),
                }
            }
            ProgressMode::NonTty => {
                eprintln!("[rag-eval] {msg} (0/{total})");
                ProgressHandle::NonTty {
                    operation: msg.to_string(),
                }
            }
            ProgressMode::Tty => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                ) {
                    pb.set_style(style.progress_chars("█▓▒░"));
                }
                pb.set_message(msg.to_string());
                ProgressHandle::Tty(pb)
            }
        }
    }

    /// Warning line, suppressed in quiet mode.
    pub fn warn(&self, msg: &str) {
        match self.mode {
            ProgressMode::Quiet => {}
            ProgressMode::Machine => {
                let event = serde_json::json!({
                    "type": "warning",
                    "message": msg,
                    "timestamp": Utc::now().to_rfc3339(),
                });
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
            ProgressMode::NonTty | ProgressMode::Tty => {
                eprintln!("[rag-eval] WARN: {msg}");
            }
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

// ============================================================================
// Progress Handle
// ============================================================================

pub enum ProgressHandle {
    Tty(ProgressBar),
    NonTty { operation: String },
    Machine {
        operation: String,
        total: Option<u64>,
    },
    Noop,
}

impl ProgressHandle {
    pub fn set_position(&self, pos: u64) {
        if let Self::Tty(pb) = self {
            pb.set_position(pos);
        }
    }

    pub fn finish_with_message(&self, msg: &str) {
        match self {
            Self::Tty(pb) => pb.finish_with_message(format!("✓ {msg}")),
            Self::Machine { operation, total } => {
                let event_type = if total.is_some() {
                    ProgressEventType::ProgressComplete
                } else {
                    ProgressEventType::SpinnerComplete
                };
                ProgressEvent::new(event_type, operation)
                    .with_message(msg)
                    .emit();
            }
            Self::NonTty { .. } => eprintln!("[rag-eval] ✓ {msg}"),
            Self::Noop => {}
        }
    }

    pub fn finish(&self) {
        match self {
            Self::Tty(pb) => pb.finish_and_clear(),
            Self::Machine { operation, .. } => {
                ProgressEvent::new(ProgressEventType::SpinnerComplete, operation).emit();
            }
            Self::NonTty { .. } | Self::Noop => {}
        }
    }

    pub fn abandon_with_message(&self, msg: &str) {
        match self {
            Self::Tty(pb) => pb.abandon_with_message(format!("✗ {msg}")),
            Self::Machine { operation, .. } => {
                ProgressEvent::new(ProgressEventType::ProgressError, operation)
                    .with_message(msg)
                    .emit();
            }
            Self::NonTty { operation } => eprintln!("[rag-eval] ✗ {operation}: {msg}"),
            Self::Noop => {}
        }
    }

    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }
}

/// Run `work` under a bar of `total` steps, finishing or abandoning it by outcome.
pub fn track<T, E: std::fmt::Display>(
    reporter: &ProgressReporter,
    total: usize,
    msg: &str,
    work: impl FnOnce(&ProgressHandle) -> Result<T, E>,
) -> Result<T, E> {
    let handle = reporter.progress(total as u64, msg);
    let result = work(&handle);
    match &result {
        Ok(_) => handle.finish_with_message(msg),
        Err(err) => handle.abandon_with_message(&err.to_string()),
    }
    result
}
