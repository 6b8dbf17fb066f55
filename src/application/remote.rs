//! Ports for the sibling services that own events, attendance, and participants.
//!
//! Implementations never retry; transport failures of any shape collapse into
//! [`RemoteError::Unavailable`] and retrying is left to the job layer.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{EventDetails, Participant};

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("remote service unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        Self::Unavailable(detail.to_string())
    }
}

#[async_trait]
pub trait EventsClient: Send + Sync {
    async fn event_details(&self, event_id: i64) -> Result<EventDetails, RemoteError>;

    /// Events the remote marks terminated and whose end time has passed.
    async fn finished_events(&self) -> Result<Vec<EventDetails>, RemoteError>;

    async fn certificate_template(&self, event_id: i64) -> Result<Option<String>, RemoteError>;
}

#[async_trait]
pub trait AttendanceClient: Send + Sync {
    /// Participant ids with a confirmed presence, deduplicated in first-seen order.
    async fn confirmed_attendees(&self, event_id: i64) -> Result<Vec<i64>, RemoteError>;
}

#[async_trait]
pub trait RegistrationsClient: Send + Sync {
    async fn participant(&self, participant_id: i64) -> Result<Participant, RemoteError>;
}
