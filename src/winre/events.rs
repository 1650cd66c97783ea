//! Ordered record of what a run did
//!
//! Components receive `&mut RunResult` and append to it instead of bumping
//! counters, so the caller decides what a warning or a failure means.

use serde::Serialize;
use serde_json::Value;

use crate::ui::prelude::*;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Status,
    Detect,
    Config,
    Success,
    Warning,
    Failed,
    Metric,
}

impl EventKind {
    fn level(self) -> Level {
        match self {
            EventKind::Status | EventKind::Detect | EventKind::Config => Level::Info,
            EventKind::Metric => Level::Debug,
            EventKind::Success => Level::Success,
            EventKind::Warning => Level::Warn,
            EventKind::Failed => Level::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunEvent {
    pub kind: EventKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunResult {
    events: Vec<RunEvent>,
    #[serde(skip)]
    quiet: bool,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record without printing
    #[cfg(test)]
    pub fn quiet() -> Self {
        Self {
            events: Vec::new(),
            quiet: true,
        }
    }

    pub fn record(
        &mut self,
        kind: EventKind,
        code: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let event = RunEvent {
            kind,
            code: code.to_string(),
            message: message.into(),
            data,
        };
        if !self.quiet {
            emit(kind.level(), &event.code, &event.message, event.data.clone());
        }
        self.events.push(event);
    }

    pub fn status(&mut self, code: &str, message: impl Into<String>) {
        self.record(EventKind::Status, code, message, None);
    }

    pub fn detect(&mut self, code: &str, message: impl Into<String>, data: Value) {
        self.record(EventKind::Detect, code, message, Some(data));
    }

    pub fn config(&mut self, code: &str, message: impl Into<String>) {
        self.record(EventKind::Config, code, message, None);
    }

    pub fn success(&mut self, code: &str, message: impl Into<String>) {
        self.record(EventKind::Success, code, message, None);
    }

    pub fn warning(&mut self, code: &str, message: impl Into<String>) {
        self.record(EventKind::Warning, code, message, None);
    }

    pub fn failed(&mut self, code: &str, message: impl Into<String>) {
        self.record(EventKind::Failed, code, message, None);
    }

    pub fn metric(&mut self, code: &str, message: impl Into<String>, data: Value) {
        self.record(EventKind::Metric, code, message, Some(data));
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RunEvent> {
        self.events.iter().filter(|e| e.kind == EventKind::Warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.events.iter().any(|e| e.code == code)
    }
}
