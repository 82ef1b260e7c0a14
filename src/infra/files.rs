//! Filesystem-backed file catalog for inline post references.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::repos::{FileCatalog, RepoError};
use crate::application::site::SiteIdentity;
use crate::domain::files::FileAsset;

/// Serves references out of the uploads directory.
#[derive(Debug)]
pub struct LocalFileCatalog {
    root: PathBuf,
    public_prefix: String,
    site: Arc<SiteIdentity>,
}

impl LocalFileCatalog {
    pub fn new(root: PathBuf, public_prefix: &str, site: Arc<SiteIdentity>) -> Self {
        let trimmed = public_prefix.trim_matches('/');
        let public_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self {
            root,
            public_prefix,
            site,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path prefix under which files are served, e.g. `/uploads`.
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Read a referenced file for serving, with its guessed content type.
    pub async fn read(&self, reference: &str) -> Result<Option<(Vec<u8>, String)>, RepoError> {
        let Some(path) = self.resolve(reference) else {
            return Ok(None);
        };
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some((bytes, guess_content_type(&path)))),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(RepoError::from_persistence(err)),
        }
    }

    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl FileCatalog for LocalFileCatalog {
    async fn lookup(&self, reference: &str) -> Result<Option<FileAsset>, RepoError> {
        let Some(path) = self.resolve(reference) else {
            debug!(
                target = "quillpress::files",
                reference, "rejected file reference outside uploads root"
            );
            return Ok(None);
        };

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RepoError::from_persistence(err)),
        }

        let content_type = guess_content_type(&path);

        Ok(Some(FileAsset {
            url: self
                .site
                .absolute(&format!("{}/{reference}", self.public_prefix)),
            alt: alt_text(&path),
            content_type,
        }))
    }
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn alt_text(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or_default();
    stem.split(['-', '_', '.'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
