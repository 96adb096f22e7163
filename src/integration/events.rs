//! Event log records.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::{Action, Alert, AlertKind, AlertStatus, LossReason};

/// One row of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: f64,
    pub name: String,
    pub action: String,
    pub status: String,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    pub confidence: f32,
}

impl EventRecord {
    pub fn from_alert(alert: &Alert, timestamp: f64, image_path: Option<PathBuf>) -> Self {
        let action = match alert.kind {
            AlertKind::ActionTimeout => "Action Timeout",
            AlertKind::TargetMissing => "Missing",
            AlertKind::Sleeping => "Sleeping",
            AlertKind::WantedPerson => "Wanted Person",
        };
        let status = match alert.status {
            AlertStatus::Triggered => "ALERT TRIGGERED",
            AlertStatus::Continued => "ALERT CONTINUED",
        };
        Self {
            timestamp,
            name: alert.name.clone(),
            action: action.to_string(),
            status: status.to_string(),
            image_path,
            confidence: alert.confidence,
        }
    }

    pub fn action_performed(name: &str, action: Action, timestamp: f64, confidence: f32) -> Self {
        Self {
            timestamp,
            name: name.to_string(),
            action: action.label().to_string(),
            status: "PERFORMED".to_string(),
            image_path: None,
            confidence,
        }
    }

    pub fn track_lost(name: &str, reason: LossReason, timestamp: f64) -> Self {
        let status = match reason {
            LossReason::TrackerFailure => "LOST (TRACKER)",
            LossReason::ImplausibleStep => "LOST (JUMP)",
            LossReason::GhostBox => "LOST (NO POSE)",
            LossReason::Overlap => "LOST (OVERLAP)",
        };
        Self {
            timestamp,
            name: name.to_string(),
            action: "Missing".to_string(),
            status: status.to_string(),
            image_path: None,
            confidence: 0.0,
        }
    }
}

/// In-memory event log, written out as JSON lines.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_json_lines<W: Write>(&self, mut out: W) -> Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n").map_err(|e| Error::io("<event log>", e))?;
        }
        Ok(())
    }
}
