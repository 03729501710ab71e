use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::path::Path;

/// Terminal status of a whole run. `CompletedEmpty` is a clean exit with
/// nothing to publish, distinct from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Success,
    CompletedEmpty,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Default, Serialize)]
pub struct Metrics {
    pub seeded: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct TraceEntry {
    pub story_id: String,
    pub title: String,
    pub status: StoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-run accumulator, owned by the orchestrator and passed by reference
/// through the story loop. Persisted after every state transition so a
/// crash mid-run leaves the most recent consistent snapshot on disk.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub status: RunStatus,
    pub metrics: Metrics,
    pub trace: Vec<TraceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            status: RunStatus::Started,
            metrics: Metrics::default(),
            trace: Vec::new(),
            error: None,
        }
    }

    pub fn record_success(&mut self, story_id: String, title: String) {
        self.metrics.processed += 1;
        self.trace.push(TraceEntry {
            story_id,
            title,
            status: StoryStatus::Success,
            reason: None,
            error: None,
        });
    }

    pub fn record_skip(&mut self, story_id: String, title: String, reason: String) {
        self.metrics.skipped += 1;
        self.trace.push(TraceEntry {
            story_id,
            title,
            status: StoryStatus::Skipped,
            reason: Some(reason),
            error: None,
        });
    }

    pub fn record_failure(&mut self, story_id: String, title: String, error: String) {
        self.metrics.failed += 1;
        self.trace.push(TraceEntry {
            story_id,
            title,
            status: StoryStatus::Failed,
            reason: None,
            error: Some(error),
        });
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Creating report directory {}", parent.display()))?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)
            .with_context(|| format!("Writing run report to {}", path.display()))
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
