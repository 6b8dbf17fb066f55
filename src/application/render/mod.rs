//! Certificate document rendering.
//!
//! Rendering is split into template selection, placeholder substitution, and PDF
//! conversion. Conversion is delegated to a [`PdfEngine`]; everything else is pure.

mod context;
mod document;
mod template;

pub use context::{Issuer, MissingField, RenderContext, long_date, validation_url};
pub use document::{
    CERTIFICATE_STYLESHEET, DocumentRenderer, FALLBACK_TEMPLATE, PdfEngine, PdfEngineError,
    REQUIRED_PLACEHOLDERS, RenderError, RenderedDocument, TemplateSource, is_acceptable_template,
};
pub use template::{TemplateEngine, TemplateError};
