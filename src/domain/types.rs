//! Shared domain enumerations aligned with persisted values.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use certifier_api_types::CertificateStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Scheduled,
    Running,
    Done,
    Failed,
    Killed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Scheduled => "Scheduled",
            JobState::Running => "Running",
            JobState::Done => "Done",
            JobState::Failed => "Failed",
            JobState::Killed => "Killed",
        }
    }
}

impl TryFrom<&str> for JobState {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Pending" | "Latest" => Ok(JobState::Pending),
            "Scheduled" => Ok(JobState::Scheduled),
            "Running" => Ok(JobState::Running),
            "Done" => Ok(JobState::Done),
            "Failed" => Ok(JobState::Failed),
            "Killed" => Ok(JobState::Killed),
            _ => Err(()),
        }
    }
}

/// Queue names; each kind has its own worker and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ScanFinishedEvents,
    GenerateEventCertificates,
    GenerateParticipantCertificate,
    DeliverCertificate,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::ScanFinishedEvents => "scan_finished_events",
            JobType::GenerateEventCertificates => "generate_event_certificates",
            JobType::GenerateParticipantCertificate => "generate_participant_certificate",
            JobType::DeliverCertificate => "deliver_certificate",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "scan_finished_events" => Ok(JobType::ScanFinishedEvents),
            "generate_event_certificates" => Ok(JobType::GenerateEventCertificates),
            "generate_participant_certificate" => Ok(JobType::GenerateParticipantCertificate),
            "deliver_certificate" => Ok(JobType::DeliverCertificate),
            _ => Err(()),
        }
    }
}

/// Failure taxonomy shared by the pipeline. Retry decisions are made on this tag only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RemoteUnavailable,
    NotFound,
    EventNotEnded,
    InvalidInput,
    Template,
    Render,
    Storage,
    Delivery,
    MissingRecipient,
    AttemptsExhausted,
    AlreadyInProgress,
    Conflict,
    Persistence,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::EventNotEnded => "event_not_ended",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Template => "template",
            ErrorKind::Render => "render",
            ErrorKind::Storage => "storage",
            ErrorKind::Delivery => "delivery",
            ErrorKind::MissingRecipient => "missing_recipient",
            ErrorKind::AttemptsExhausted => "attempts_exhausted",
            ErrorKind::AlreadyInProgress => "already_in_progress",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
