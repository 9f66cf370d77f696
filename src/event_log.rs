//! Append-only sink for "intervention performed" and "error occurred"
//! records. The pipeline writes here but never reads back for decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GuardError;
use crate::models::{DetectionMethod, InterventionKind, Platform, Verdict};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub platform: Platform,
    pub method: DetectionMethod,
    pub action: InterventionKind,
    pub source_id: String,
}

impl InterventionRecord {
    pub fn new(verdict: &Verdict, action: InterventionKind, source_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            platform: verdict.platform,
            method: verdict.method,
            action,
            source_id: source_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
}

impl From<&GuardError> for ErrorRecord {
    fn from(error: &GuardError) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

pub trait EventLog: Send + Sync {
    fn record_intervention(&self, record: InterventionRecord);

    fn record_error(&self, record: ErrorRecord);
}

/// Discards everything; for hosts that keep no history.
#[derive(Debug, Default)]
pub struct NullEventLog;

impl EventLog for NullEventLog {
    fn record_intervention(&self, _record: InterventionRecord) {}

    fn record_error(&self, _record: ErrorRecord) {}
}
