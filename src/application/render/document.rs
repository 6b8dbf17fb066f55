use std::{path::PathBuf, sync::Arc, time::Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::documents::DocumentStoreError;

use super::{
    context::{MissingField, RenderContext},
    template::{TemplateEngine, TemplateError},
};

/// A4 landscape, centered layout. Applied to every certificate regardless of template.
pub const CERTIFICATE_STYLESHEET: &str =
    include_str!("../../../templates/certificates/style.css");

/// Literal markers a custom template must contain to be accepted.
pub const REQUIRED_PLACEHOLDERS: [&str; 3] = [
    "{{ participante.nome }}",
    "{{ evento.nome }}",
    "{{ certificado.codigo }}",
];

/// Used when neither a custom nor the default template is available.
pub const FALLBACK_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Certificado</title></head>
<body>
<div class="certificado-container">
  <h1 class="titulo">CERTIFICADO</h1>
  <p class="subtitulo">Certificamos que</p>
  <h2 class="nome-participante">{{ participante.nome }}</h2>
  <p class="evento-info">
    participou do evento <strong>{{ evento.nome }}</strong><br>
    realizado em {{ evento.data_inicio_completa }}{% if evento.data_inicio != evento.data_fim %} a {{ evento.data_fim_completa }}{% endif %}
  </p>
  <p class="codigo-validacao">
    Código de validação: {{ certificado.codigo }}<br>
    Emitido em: {{ certificado.data_emissao }}
  </p>
</div>
</body>
</html>
"#;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PdfEngineError(pub String);

/// External HTML-to-PDF conversion boundary.
#[async_trait]
pub trait PdfEngine: Send + Sync {
    async fn render_pdf(&self, html: String, stylesheet: &str) -> Result<Vec<u8>, PdfEngineError>;
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render input is incomplete: {0}")]
    InvalidInput(#[from] MissingField),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("pdf conversion failed: {0}")]
    Render(#[from] PdfEngineError),
    #[error("document storage failed: {0}")]
    Storage(#[from] DocumentStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    Custom,
    Default,
    Fallback,
}

impl TemplateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateSource::Custom => "custom",
            TemplateSource::Default => "default",
            TemplateSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub template: TemplateSource,
}

pub fn is_acceptable_template(source: &str) -> bool {
    REQUIRED_PLACEHOLDERS
        .iter()
        .all(|marker| source.contains(marker))
}

/// Produces certificate PDFs from a render context.
#[derive(Clone)]
pub struct DocumentRenderer {
    engine: Arc<dyn PdfEngine>,
    templates: Arc<TemplateEngine>,
    default_template_path: PathBuf,
}

impl DocumentRenderer {
    pub fn new(engine: Arc<dyn PdfEngine>, default_template_path: PathBuf) -> Self {
        Self {
            engine,
            templates: Arc::new(TemplateEngine::new()),
            default_template_path,
        }
    }

    /// Choose the template source. Never fails: each missing tier falls through to the next.
    pub async fn select_template(&self, custom: Option<&str>) -> (TemplateSource, String) {
        if let Some(custom) = custom {
            if is_acceptable_template(custom) {
                return (TemplateSource::Custom, custom.to_string());
            }
            warn!(
                target = "certifier::render",
                "Custom template lacks required placeholders; using default"
            );
        }

        match tokio::fs::read_to_string(&self.default_template_path).await {
            Ok(source) => (TemplateSource::Default, source),
            Err(err) => {
                warn!(
                    target = "certifier::render",
                    path = %self.default_template_path.display(),
                    error = %err,
                    "Default template unreadable; using inline fallback"
                );
                (TemplateSource::Fallback, FALLBACK_TEMPLATE.to_string())
            }
        }
    }

    pub async fn render(
        &self,
        context: &RenderContext,
        custom_template: Option<&str>,
    ) -> Result<RenderedDocument, RenderError> {
        let started_at = Instant::now();
        let (template, source) = self.select_template(custom_template).await;
        let html = self.templates.render(&source, context.as_value())?;
        let bytes = self
            .engine
            .render_pdf(html, CERTIFICATE_STYLESHEET)
            .await?;

        info!(
            target = "certifier::render",
            template = template.as_str(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            pdf_bytes = bytes.len(),
            "Certificate document rendered"
        );

        Ok(RenderedDocument { bytes, template })
    }
}
