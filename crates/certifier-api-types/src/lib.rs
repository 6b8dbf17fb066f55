//! Request and response types for the certifier HTTP API.
//!
//! The server re-exports these so clients and handlers agree on one wire shape.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a certificate (mirrors Postgres enum `certificate_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "certificate_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Pending,
    Generating,
    Generated,
    Sent,
    Error,
}

impl CertificateStatus {
    pub const ALL: [CertificateStatus; 5] = [
        CertificateStatus::Pending,
        CertificateStatus::Generating,
        CertificateStatus::Generated,
        CertificateStatus::Sent,
        CertificateStatus::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CertificateStatus::Pending => "pending",
            CertificateStatus::Generating => "generating",
            CertificateStatus::Generated => "generated",
            CertificateStatus::Sent => "sent",
            CertificateStatus::Error => "error",
        }
    }

    /// Whether a certificate in this state is expected to own a stored document.
    pub fn has_document(self) -> bool {
        matches!(self, CertificateStatus::Generated | CertificateStatus::Sent)
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CertificateStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| format!("unknown certificate status `{value}`"))
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateEventRequest {
    pub event_id: i64,
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default = "default_true")]
    pub send_email: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateParticipantRequest {
    pub event_id: i64,
    pub participant_id: i64,
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default = "default_true")]
    pub send_email: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResendRequest {
    /// Deliver to this address instead of the cached participant email.
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessRequest {
    #[serde(default = "default_true")]
    pub force_regenerate: bool,
    #[serde(default)]
    pub send_email: bool,
}

impl Default for ReprocessRequest {
    fn default() -> Self {
        Self {
            force_regenerate: true,
            send_email: false,
        }
    }
}

/// Handle returned by every endpoint that enqueues background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandleResponse {
    pub job_id: String,
    pub job_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub job_type: String,
    pub state: String,
    pub attempts: i32,
    pub max_attempts: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub run_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub done_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateResponse {
    pub id: Uuid,
    pub event_id: i64,
    pub participant_id: i64,
    pub validation_code: String,
    pub status: CertificateStatus,
    pub event_name: String,
    pub participant_name: String,
    pub participant_email: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub generated_at: Option<OffsetDateTime>,
    pub sent: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
    pub recipient_email: Option<String>,
    pub send_attempts: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_attempt_at: Option<OffsetDateTime>,
    pub error_log: Option<String>,
    pub validation_count: i64,
    pub can_resend: bool,
    pub file_name: String,
    pub validation_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateListResponse {
    pub items: Vec<CertificateResponse>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Public validation answer. Unknown or ungenerated codes carry only `valid`, `code`
/// and `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub generated_at: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStatsResponse {
    pub total: u64,
    pub pending: u64,
    pub generating: u64,
    pub generated: u64,
    pub sent: u64,
    pub error: u64,
    pub delivered: u64,
    pub undelivered: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEventResponse {
    pub event_id: i64,
    pub event_name: String,
    pub total_certificates: i64,
    pub generated_count: i64,
    pub sent_count: i64,
    pub complete: bool,
    pub generation_progress: f64,
    pub delivery_progress: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEventListResponse {
    pub items: Vec<ProcessedEventResponse>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStatsResponse {
    pub processed_events: u64,
    pub complete_events: u64,
    pub certificates_generated: u64,
    pub average_per_event: f64,
}

/// Percentage of `part` over `total`, rounded to one decimal; zero when `total` is zero.
pub fn progress(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let ratio = part as f64 / total as f64 * 100.0;
    (ratio * 10.0).round() / 10.0
}
