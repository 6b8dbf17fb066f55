//! Storage port for generated certificate documents.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("invalid document reference")]
    InvalidPath,
    #[error("document not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Opaque-reference storage for PDF documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes` under a name derived from `file_name` and return its reference.
    async fn put(&self, file_name: &str, bytes: Bytes) -> Result<String, DocumentStoreError>;

    async fn get(&self, document_ref: &str) -> Result<Bytes, DocumentStoreError>;

    /// Removing an absent document is not an error.
    async fn delete(&self, document_ref: &str) -> Result<(), DocumentStoreError>;
}
