//! Domain entities mirrored from persistent storage and from sibling services.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::{JobState, JobType};

/// Event as reported by the Events service. Owned upstream; read-through only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub organizer: Option<String>,
    pub starts_at: Option<OffsetDateTime>,
    pub ends_at: Option<OffsetDateTime>,
}

impl EventDetails {
    /// Events without a known end time are never considered finished.
    pub fn has_ended(&self, now: OffsetDateTime) -> bool {
        self.ends_at.is_some_and(|ends_at| ends_at <= now)
    }
}

/// Participant profile as reported by the Registrations service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub document_id: Option<String>,
}

/// Aggregate progress for one event. Counters are always recomputed from certificates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedEvent {
    pub event_id: i64,
    pub event_name: String,
    pub total_certificates: i64,
    pub generated_count: i64,
    pub sent_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ProcessedEvent {
    pub fn complete(&self) -> bool {
        self.total_certificates > 0 && self.sent_count == self.total_certificates
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CertificateStats {
    pub total: u64,
    pub pending: u64,
    pub generating: u64,
    pub generated: u64,
    pub sent: u64,
    pub error: u64,
    pub delivered: u64,
}

impl CertificateStats {
    pub fn undelivered(&self) -> u64 {
        self.total.saturating_sub(self.delivered)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EventStats {
    pub processed_events: u64,
    pub complete_events: u64,
    pub certificates_generated: u64,
}

impl EventStats {
    pub fn average_per_event(&self) -> f64 {
        if self.processed_events == 0 {
            return 0.0;
        }
        let mean = self.certificates_generated as f64 / self.processed_events as f64;
        (mean * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: OffsetDateTime,
    pub done_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}
