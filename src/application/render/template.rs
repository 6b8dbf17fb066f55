//! Jinja-compatible rendering of certificate templates.
//!
//! Custom event templates are authored in Jinja syntax, so they run on minijinja with
//! its builtin filters and tests. Output is HTML-escaped and undefined values render
//! as empty.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template syntax error: {0}")]
    Syntax(String),
    #[error("template evaluation failed: {0}")]
    Evaluation(String),
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => TemplateError::Syntax(err.to_string()),
            _ => TemplateError::Evaluation(err.to_string()),
        }
    }
}

/// Shared environment for rendering template sources that arrive at runtime.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        Self { env }
    }

    pub fn render(&self, source: &str, context: &Value) -> Result<String, TemplateError> {
        Ok(self.env.render_str(source, context)?)
    }
}
