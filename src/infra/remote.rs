//! reqwest-backed clients for the Events, Attendance, and Registrations services.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};
use tracing::warn;

use crate::application::remote::{
    AttendanceClient, EventsClient, RegistrationsClient, RemoteError,
};
use crate::domain::entities::{EventDetails, Participant};

use super::error::InfraError;

fn user_agent() -> &'static str {
    concat!("certifier/", env!("CARGO_PKG_VERSION"))
}

/// Every sibling service wraps its payload as `{success, data}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    id: i64,
    #[serde(default)]
    nome: String,
    #[serde(default)]
    descricao: Option<String>,
    #[serde(default)]
    local: Option<String>,
    #[serde(default)]
    organizador: Option<String>,
    #[serde(default)]
    data_inicio: Option<String>,
    #[serde(default)]
    data_fim: Option<String>,
    #[serde(default)]
    template_certificado: Option<String>,
}

impl EventPayload {
    fn into_details(self) -> EventDetails {
        EventDetails {
            id: self.id,
            name: self.nome,
            description: non_blank(self.descricao),
            location: non_blank(self.local),
            organizer: non_blank(self.organizador),
            starts_at: self.data_inicio.as_deref().and_then(parse_remote_datetime),
            ends_at: self.data_fim.as_deref().and_then(parse_remote_datetime),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AttendancePayload {
    #[serde(default)]
    participante_id: Option<i64>,
    #[serde(default)]
    usuario_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ParticipantPayload {
    id: i64,
    #[serde(default)]
    nome: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    cpf: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Accepts `YYYY-MM-DD HH:MM:SS` (UTC), naive ISO 8601, RFC 3339, or a bare date.
pub fn parse_remote_datetime(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(value) = PrimitiveDateTime::parse(raw, &spaced) {
        return Some(value.assume_utc());
    }
    let naive_iso = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(value) = PrimitiveDateTime::parse(raw, &naive_iso) {
        return Some(value.assume_utc());
    }
    let date = format_description!("[year]-[month]-[day]");
    Date::parse(raw, &date)
        .ok()
        .map(|date| date.midnight().assume_utc())
}

/// Shared GET plumbing. Not-found is reported as `None`; every other failure is unavailable.
#[derive(Clone, Debug)]
struct ServiceClient {
    client: Client,
    base: Url,
    service: &'static str,
}

impl ServiceClient {
    fn new(service: &'static str, base: &str, timeout: Duration) -> Result<Self, InfraError> {
        let base = Url::parse(base)
            .map_err(|err| InfraError::configuration(format!("{service} url: {err}")))?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            base,
            service,
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}{}", self.base.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url.set_query(None);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, RemoteError> {
        let response = self
            .client
            .get(self.url(path, query))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| self.unavailable(path, err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.unavailable(path, format!("status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.unavailable(path, err))?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|err| self.unavailable(path, format!("malformed body: {err}")))?;
        Ok(envelope.data)
    }

    fn unavailable(&self, path: &str, detail: impl std::fmt::Display) -> RemoteError {
        warn!(
            target = "certifier::remote",
            service = self.service,
            path,
            error = %detail,
            "Remote call failed"
        );
        RemoteError::unavailable(format!("{} {path}: {detail}", self.service))
    }
}

#[derive(Clone, Debug)]
pub struct HttpEventsClient {
    inner: ServiceClient,
}

impl HttpEventsClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, InfraError> {
        Ok(Self {
            inner: ServiceClient::new("events", base, timeout)?,
        })
    }

    async fn event_payload(&self, event_id: i64) -> Result<EventPayload, RemoteError> {
        self.inner
            .get::<EventPayload>(&format!("/api/eventos/{event_id}"), &[])
            .await?
            .ok_or(RemoteError::NotFound {
                entity: "event",
                id: event_id,
            })
    }
}

#[async_trait]
impl EventsClient for HttpEventsClient {
    async fn event_details(&self, event_id: i64) -> Result<EventDetails, RemoteError> {
        Ok(self.event_payload(event_id).await?.into_details())
    }

    async fn finished_events(&self) -> Result<Vec<EventDetails>, RemoteError> {
        let events = self
            .inner
            .get::<Vec<EventPayload>>("/api/eventos", &[("status", "terminado")])
            .await?
            .unwrap_or_default();
        Ok(events.into_iter().map(EventPayload::into_details).collect())
    }

    async fn certificate_template(&self, event_id: i64) -> Result<Option<String>, RemoteError> {
        let payload = self.event_payload(event_id).await?;
        Ok(non_blank(payload.template_certificado))
    }
}

#[derive(Clone, Debug)]
pub struct HttpAttendanceClient {
    inner: ServiceClient,
}

impl HttpAttendanceClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, InfraError> {
        Ok(Self {
            inner: ServiceClient::new("attendance", base, timeout)?,
        })
    }
}

#[async_trait]
impl AttendanceClient for HttpAttendanceClient {
    async fn confirmed_attendees(&self, event_id: i64) -> Result<Vec<i64>, RemoteError> {
        let records = self
            .inner
            .get::<Vec<AttendancePayload>>(&format!("/api/eventos/{event_id}/presencas"), &[])
            .await?
            .unwrap_or_default();

        let mut ids: Vec<i64> = Vec::with_capacity(records.len());
        for record in records {
            match record.participante_id.or(record.usuario_id) {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => warn!(
                    target = "certifier::remote",
                    event_id,
                    "Attendance record without participant id"
                ),
            }
        }
        Ok(ids)
    }
}

#[derive(Clone, Debug)]
pub struct HttpRegistrationsClient {
    inner: ServiceClient,
}

impl HttpRegistrationsClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, InfraError> {
        Ok(Self {
            inner: ServiceClient::new("registrations", base, timeout)?,
        })
    }
}

#[async_trait]
impl RegistrationsClient for HttpRegistrationsClient {
    async fn participant(&self, participant_id: i64) -> Result<Participant, RemoteError> {
        let payload = self
            .inner
            .get::<ParticipantPayload>(&format!("/api/participantes/{participant_id}"), &[])
            .await?
            .ok_or(RemoteError::NotFound {
                entity: "participant",
                id: participant_id,
            })?;

        Ok(Participant {
            id: payload.id,
            name: payload.nome,
            email: payload.email.trim().to_string(),
            document_id: non_blank(payload.cpf),
        })
    }
}
