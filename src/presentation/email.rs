//! Outgoing email bodies.

use askama::Template;

#[derive(Template)]
#[template(path = "email/certificate_ready.txt")]
pub struct CertificateReadyEmail<'a> {
    pub participant_name: &'a str,
    pub event_name: &'a str,
    pub code: &'a str,
    pub validation_url: &'a str,
    pub system_name: &'a str,
}

impl CertificateReadyEmail<'_> {
    pub fn subject(&self) -> String {
        format!("Certificado do evento: {}", self.event_name)
    }
}
