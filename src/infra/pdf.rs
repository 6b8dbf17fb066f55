//! HTML-to-PDF conversion through an external command.
//!
//! The command reads one HTML document on stdin and writes the PDF to stdout.

use std::{
    io::{ErrorKind, Write},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
    time::Instant,
};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::render::{PdfEngine, PdfEngineError};

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone)]
pub struct CommandPdfEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPdfEngine {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    fn convert(&self, document: String) -> Result<Vec<u8>, PdfEngineError> {
        let started_at = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "certifier::pdf",
                    program = %self.program.display(),
                    error = %err,
                    "Failed to spawn PDF engine"
                );
                if err.kind() == ErrorKind::NotFound {
                    PdfEngineError(format!("pdf engine not found: {}", self.program.display()))
                } else {
                    PdfEngineError(format!("failed to spawn pdf engine: {err}"))
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PdfEngineError("pdf engine stdin unavailable".to_string()))?;
        let writer = thread::spawn(move || stdin.write_all(document.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|err| PdfEngineError(format!("pdf engine did not finish: {err}")))?;
        let write_result = writer
            .join()
            .map_err(|_| PdfEngineError("pdf engine input writer panicked".to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "certifier::pdf",
                exit_code = output.status.code().map(i64::from).unwrap_or(-1),
                stderr = %stderr,
                "PDF engine failed"
            );
            return Err(PdfEngineError(format!(
                "pdf engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        write_result.map_err(|err| PdfEngineError(format!("failed to write html: {err}")))?;

        if !output.stdout.starts_with(PDF_MAGIC) {
            return Err(PdfEngineError(
                "pdf engine produced output that is not a PDF".to_string(),
            ));
        }

        info!(
            target = "certifier::pdf",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            pdf_bytes = output.stdout.len(),
            "PDF engine finished"
        );
        Ok(output.stdout)
    }
}

/// Place the stylesheet in a `<style>` element inside `<head>`, or in front of the body.
pub fn inline_stylesheet(html: &str, stylesheet: &str) -> String {
    let style = format!("<style>\n{stylesheet}\n</style>\n");
    match html.find("</head>") {
        Some(index) => {
            let mut document = String::with_capacity(html.len() + style.len());
            document.push_str(&html[..index]);
            document.push_str(&style);
            document.push_str(&html[index..]);
            document
        }
        None => format!("{style}{html}"),
    }
}

#[async_trait]
impl PdfEngine for CommandPdfEngine {
    async fn render_pdf(&self, html: String, stylesheet: &str) -> Result<Vec<u8>, PdfEngineError> {
        let document = inline_stylesheet(&html, stylesheet);
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.convert(document))
            .await
            .map_err(|err| PdfEngineError(format!("pdf task failed: {err}")))?
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};
    use tempfile::TempDir;

    fn make_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    #[test]
    fn stylesheet_goes_into_head() {
        let html = "<html><head><title>x</title></head><body>b</body></html>";
        let document = inline_stylesheet(html, "body { color: red; }");
        let style_at = document.find("<style>").expect("style");
        assert!(style_at < document.find("</head>").expect("head"));

        let bare = inline_stylesheet("<p>b</p>", "p {}");
        assert!(bare.starts_with("<style>"));
    }

    #[tokio::test]
    async fn pipes_html_through_the_command() {
        let dir = TempDir::new().expect("temp dir");
        let captured = dir.path().join("input.html");
        let script = make_script(
            dir.path(),
            "fake-pdf",
            &format!("cat > {}\nprintf '%%PDF-1.7 fake'", captured.display()),
        );

        let engine = CommandPdfEngine::new(script, Vec::new());
        let bytes = engine
            .render_pdf("<html><head></head><body>Ana</body></html>".into(), "h1 {}")
            .await
            .expect("pdf");

        assert!(bytes.starts_with(b"%PDF"));
        let input = fs::read_to_string(&captured).expect("captured input");
        assert!(input.contains("<style>\nh1 {}\n</style>"));
        assert!(input.contains("Ana"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let script = make_script(dir.path(), "broken-pdf", "cat > /dev/null\necho boom >&2\nexit 3");

        let engine = CommandPdfEngine::new(script, Vec::new());
        let err = engine
            .render_pdf("<p>x</p>".into(), "")
            .await
            .expect_err("failure");
        assert!(err.0.contains("boom"));
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let engine = CommandPdfEngine::new(PathBuf::from("/nonexistent/pdf-engine"), Vec::new());
        let err = engine
            .render_pdf("<p>x</p>".into(), "")
            .await
            .expect_err("failure");
        assert!(err.0.contains("not found"));
    }

    #[tokio::test]
    async fn output_must_look_like_a_pdf() {
        let dir = TempDir::new().expect("temp dir");
        let script = make_script(dir.path(), "text-pdf", "cat > /dev/null\necho hello");

        let engine = CommandPdfEngine::new(script, Vec::new());
        let err = engine
            .render_pdf("<p>x</p>".into(), "")
            .await
            .expect_err("failure");
        assert!(err.0.contains("not a PDF"));
    }
}
