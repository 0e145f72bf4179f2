// src/progress.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Line-oriented progress output supplied by the host.
//!
//! A download is a single network call, so progress is only ever
//! "connecting" followed by "100%"; there is no incremental reporting.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Host output channel for progress lines and advisories.
pub trait IoSink: Send + Sync {
    /// Write `line`, followed by a newline when `newline` is set.
    fn write(&self, line: &str, newline: bool);

    /// Replace the current (unterminated) line with `line` and end it.
    fn overwrite(&self, line: &str);
}

/// Terminal sink: a stderr spinner while a line is open, plain stderr lines otherwise.
///
/// `write(.., false)` opens (or updates) the spinner; `overwrite` finishes it
/// with the final text. Full lines are printed above a running spinner.
#[derive(Default)]
pub struct ConsoleIo {
    active: Mutex<Option<ProgressBar>>,
}

impl ConsoleIo {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn is_spinning(&self) -> bool {
        self.active.lock().map(|a| a.is_some()).unwrap_or(false)
    }
}

impl std::fmt::Debug for ConsoleIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleIo")
            .field("spinning", &self.is_spinning())
            .finish()
    }
}

impl IoSink for ConsoleIo {
    fn write(&self, line: &str, newline: bool) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if newline {
            match active.as_ref() {
                Some(pb) => pb.suspend(|| eprintln!("{line}")),
                None => eprintln!("{line}"),
            }
        } else {
            active
                .get_or_insert_with(Self::spinner)
                .set_message(line.to_string());
        }
    }

    fn overwrite(&self, line: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.take() {
            Some(pb) => pb.finish_with_message(line.to_string()),
            None => eprintln!("{line}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIo;

impl IoSink for NullIo {
    fn write(&self, _line: &str, _newline: bool) {}
    fn overwrite(&self, _line: &str) {}
}

/// One call recorded by [`RecordingIo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    Write { line: String, newline: bool },
    Overwrite(String),
}

/// Keeps every call in memory; handy for embedding hosts that render later.
#[derive(Debug, Default)]
pub struct RecordingIo {
    events: Mutex<Vec<IoEvent>>,
}

impl RecordingIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IoEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: IoEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl IoSink for RecordingIo {
    fn write(&self, line: &str, newline: bool) {
        self.push(IoEvent::Write {
            line: line.to_string(),
            newline,
        });
    }

    fn overwrite(&self, line: &str) {
        self.push(IoEvent::Overwrite(line.to_string()));
    }
}
