//! Email dispatch over an HTTP JSON endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, Url};
use serde::Serialize;

use crate::application::delivery::{Mailer, MailerError, OutgoingEmail};

use super::error::InfraError;

#[derive(Serialize)]
struct AttachmentBody<'a> {
    filename: &'a str,
    content_type: &'a str,
    content_base64: String,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    attachments: Vec<AttachmentBody<'a>>,
}

#[derive(Clone, Debug)]
pub struct HttpMailer {
    client: Client,
    endpoint: Url,
    sender: String,
    token: Option<String>,
}

impl HttpMailer {
    pub fn new(
        endpoint: &str,
        sender: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| InfraError::configuration(format!("mail endpoint: {err}")))?;
        let client = Client::builder()
            .user_agent(concat!("certifier/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            sender: sender.into(),
            token,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError> {
        let body = MessageBody {
            from: &self.sender,
            to: &email.to,
            subject: &email.subject,
            body: &email.body,
            attachments: email
                .attachments
                .iter()
                .map(|attachment| AttachmentBody {
                    filename: &attachment.file_name,
                    content_type: attachment.content_type,
                    content_base64: STANDARD.encode(&attachment.bytes),
                })
                .collect(),
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| MailerError(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(MailerError(format!("status {status} body {text}")))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;
    use crate::application::delivery::EmailAttachment;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "ana@example.com".to_string(),
            subject: "Certificado do evento: RustConf".to_string(),
            body: "Olá".to_string(),
            attachments: vec![EmailAttachment {
                file_name: "certificado_ABCDEF0123456789.pdf".to_string(),
                content_type: "application/pdf",
                bytes: Bytes::from_static(b"%PDF"),
            }],
        }
    }

    #[tokio::test]
    async fn posts_json_with_base64_attachment() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/send")
                .header("authorization", "Bearer secret")
                .json_body(json!({
                    "from": "certificados@example.com",
                    "to": "ana@example.com",
                    "subject": "Certificado do evento: RustConf",
                    "body": "Olá",
                    "attachments": [{
                        "filename": "certificado_ABCDEF0123456789.pdf",
                        "content_type": "application/pdf",
                        "content_base64": "JVBERg=="
                    }]
                }));
            then.status(202);
        });

        let mailer = HttpMailer::new(
            &server.url("/send"),
            "certificados@example.com",
            Some("secret".to_string()),
            Duration::from_secs(2),
        )
        .expect("mailer");
        mailer.send(email()).await.expect("send");
        mock.assert();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/send");
            then.status(503).body("down");
        });

        let mailer = HttpMailer::new(
            &server.url("/send"),
            "certificados@example.com",
            None,
            Duration::from_secs(2),
        )
        .expect("mailer");
        let err = mailer.send(email()).await.expect_err("failure");
        assert!(err.0.contains("503"));
    }
}
