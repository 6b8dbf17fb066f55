//! Filesystem storage for generated certificate documents.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::documents::{DocumentStore, DocumentStoreError};

/// Documents live under `<root>/certificates/<year>/<month>/`.
#[derive(Debug)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, document_ref: &str) -> Result<PathBuf, DocumentStoreError> {
        let relative = Path::new(document_ref);
        if document_ref.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(DocumentStoreError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }

    fn build_ref(file_name: &str) -> String {
        let (year, month, _) = OffsetDateTime::now_utc().to_calendar_date();
        let identifier = Uuid::new_v4().simple();
        format!(
            "certificates/{year}/{:02}/{identifier}-{}",
            month as u8,
            sanitize_file_name(file_name)
        )
    }
}

fn sanitize_file_name(original: &str) -> String {
    let cleaned: String = original
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "certificado.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, file_name: &str, bytes: Bytes) -> Result<String, DocumentStoreError> {
        let document_ref = Self::build_ref(file_name);
        let absolute = self.resolve(&document_ref)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial file.
        let partial = absolute.with_extension("partial");
        let mut file = fs::File::create(&partial).await?;
        if let Err(err) = file.write_all(&bytes).await {
            drop(file);
            let _ = fs::remove_file(&partial).await;
            return Err(err.into());
        }
        file.flush().await?;
        drop(file);
        fs::rename(&partial, &absolute).await?;

        Ok(document_ref)
    }

    async fn get(&self, document_ref: &str) -> Result<Bytes, DocumentStoreError> {
        let absolute = self.resolve(document_ref)?;
        match fs::read(absolute).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(DocumentStoreError::NotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, document_ref: &str) -> Result<(), DocumentStoreError> {
        let absolute = self.resolve(document_ref)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
