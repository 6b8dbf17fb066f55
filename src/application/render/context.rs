//! Template context for certificate documents.
//!
//! Keys are Portuguese because event organizers author custom templates against them
//! (`{{ participante.nome }}`, `{{ evento.data_inicio_completa }}`, ...).

use serde_json::{Value, json};
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

use crate::domain::entities::{EventDetails, Participant};

const DEFAULT_ORGANIZER: &str = "Portal de Eventos";

const MONTHS_PT: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required field `{field}` is missing")]
pub struct MissingField {
    pub field: &'static str,
}

/// Identity of the issuing system, rendered into every certificate.
#[derive(Debug, Clone)]
pub struct Issuer {
    pub system_name: String,
    pub public_base_url: String,
}

impl Issuer {
    pub fn validation_url(&self, code: &str) -> String {
        validation_url(&self.public_base_url, code)
    }
}

pub fn validation_url(public_base_url: &str, code: &str) -> String {
    format!(
        "{}/api/v1/validate/{code}",
        public_base_url.trim_end_matches('/')
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    value: Value,
}

impl RenderContext {
    pub fn build(
        event: &EventDetails,
        participant: &Participant,
        code: &str,
        issued_at: OffsetDateTime,
        issuer: &Issuer,
    ) -> Result<Self, MissingField> {
        let event_name = required("evento.nome", &event.name)?;
        let participant_name = required("participante.nome", &participant.name)?;
        let email = required("participante.email", &participant.email)?;
        let starts_at = event.starts_at.ok_or(MissingField {
            field: "evento.data_inicio",
        })?;
        let ends_at = event.ends_at.ok_or(MissingField {
            field: "evento.data_fim",
        })?;

        let value = json!({
            "evento": {
                "id": event.id,
                "nome": event_name,
                "descricao": event.description.clone().unwrap_or_default(),
                "local": event.location.clone().unwrap_or_default(),
                "organizador": event
                    .organizer
                    .clone()
                    .filter(|organizer| !organizer.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ORGANIZER.to_string()),
                "data_inicio": short_date(starts_at),
                "data_fim": short_date(ends_at),
                "data_inicio_completa": long_date(starts_at),
                "data_fim_completa": long_date(ends_at),
                "mesmo_dia": starts_at.date() == ends_at.date(),
            },
            "participante": {
                "id": participant.id,
                "nome": participant_name,
                "email": email,
                "cpf": participant.document_id.clone().unwrap_or_default(),
            },
            "certificado": {
                "codigo": code,
                "data_emissao": short_date(issued_at),
                "url_validacao": issuer.validation_url(code),
            },
            "sistema": {
                "nome": issuer.system_name,
                "url": issuer.public_base_url.trim_end_matches('/'),
            },
        });

        Ok(Self { value })
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }
}

fn required(field: &'static str, value: &str) -> Result<String, MissingField> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Err(MissingField { field })
    } else {
        Ok(collapsed)
    }
}

fn short_date(at: OffsetDateTime) -> String {
    at.format(format_description!("[day]/[month]/[year]"))
        .unwrap_or_default()
}

/// `5 de março de 2025`
pub fn long_date(at: OffsetDateTime) -> String {
    let month = MONTHS_PT[usize::from(u8::from(at.month())) - 1];
    format!("{} de {month} de {}", at.day(), at.year())
}
