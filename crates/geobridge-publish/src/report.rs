//! Outcome of a publish session.
//!
//! Per-item failures do not stop a session; they are collected here
//! together with converter warnings and returned by `close_publishing`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::error;
use uuid::Uuid;

use crate::error::PublishError;

/// One item that could not be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishFailure {
    /// Layer, style or group name.
    pub item: String,
    pub message: String,
}

/// Summary of a publish session.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub session_id: Uuid,
    pub server: String,
    pub workspace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Layers whose data reached the server.
    pub layers: Vec<String>,
    pub styles: Vec<String>,
    pub groups: Vec<String>,

    pub warnings: Vec<String>,
    pub errors: Vec<PublishFailure>,
}

impl PublishReport {
    pub fn new(session_id: Uuid, server: &str, workspace: &str) -> Self {
        PublishReport {
            session_id,
            server: server.to_string(),
            workspace: workspace.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            layers: Vec::new(),
            styles: Vec::new(),
            groups: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record_layer(&mut self, name: &str) {
        push_unique(&mut self.layers, name);
    }

    pub fn record_style(&mut self, name: &str) {
        push_unique(&mut self.styles, name);
    }

    pub fn record_group(&mut self, name: &str) {
        push_unique(&mut self.groups, name);
    }

    pub fn record_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    /// Logs and stores a failure for `item`.
    pub fn record_failure(&mut self, item: &str, err: &PublishError) {
        error!(%item, error = %err, "Publish step failed");
        self.errors.push(PublishFailure {
            item: item.to_string(),
            message: err.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn failed_items(&self) -> Vec<&str> {
        self.errors.iter().map(|failure| failure.item.as_str()).collect()
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workspace '{}' on {}", self.workspace, self.server)?;
        writeln!(
            f,
            "  {} layer(s), {} style(s), {} group(s) published",
            self.layers.len(),
            self.styles.len(),
            self.groups.len()
        )?;
        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }
        for failure in &self.errors {
            writeln!(f, "  error: {}: {}", failure.item, failure.message)?;
        }
        Ok(())
    }
}
