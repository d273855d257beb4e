//! Public URLs for generated media and their cleanup

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, warn};
use url::Url;

use crate::error::DeliveryError;
use crate::generator::MediaKind;
use crate::identity::{FontKey, Word};

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// URL the messaging platform fetches for a generated file
    fn url_for(
        &self,
        kind: MediaKind,
        word: &Word,
        font: &FontKey,
        local_path: &Path,
    ) -> Result<String, DeliveryError>;

    /// Remove local files; already-missing files are not an error
    async fn cleanup(&self, paths: &[PathBuf]);
}

/// Serves media from this process: `https://<fqdn>/<kind>/<word>[?font=<key>]`
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    base: Result<Url, String>,
}

impl LocalMediaStore {
    /// `http://` is upgraded to `https://`; anything else must already be https
    pub fn new(server_fqdn: &str) -> Self {
        let trimmed = server_fqdn.trim().trim_end_matches('/');
        let base = if trimmed.is_empty() {
            Err("SERVER_FQDN is required for media replies".to_string())
        } else {
            let normalized = match trimmed.strip_prefix("http://") {
                Some(rest) => format!("https://{}", rest),
                None => trimmed.to_string(),
            };
            match Url::parse(&normalized) {
                Ok(url) if url.scheme() == "https" => Ok(url),
                Ok(_) => Err("SERVER_FQDN must start with https://".to_string()),
                Err(e) => Err(format!("SERVER_FQDN is not a valid URL: {}", e)),
            }
        };
        if let Err(e) = &base {
            warn!("{}", e);
        }
        Self { base }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    fn url_for(
        &self,
        kind: MediaKind,
        word: &Word,
        font: &FontKey,
        _local_path: &Path,
    ) -> Result<String, DeliveryError> {
        let mut url = self.base.clone().map_err(DeliveryError::MediaUrl)?;
        url.path_segments_mut()
            .map_err(|_| DeliveryError::MediaUrl("SERVER_FQDN cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push(kind.route())
            .push(word.as_str());
        if !font.is_default() {
            url.query_pairs_mut().append_pair("font", font.as_str());
        }
        Ok(url.to_string())
    }

    async fn cleanup(&self, paths: &[PathBuf]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => error!("Media cleanup failed for {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word() -> Word {
        Word::parse("森林").unwrap()
    }

    #[test]
    fn test_url_shape() {
        let store = LocalMediaStore::new("http://kasane.example.com/");
        let url = store
            .url_for(MediaKind::Question, &word(), &FontKey::default_key(), Path::new(""))
            .unwrap();
        assert_eq!(url, "https://kasane.example.com/q/%E6%A3%AE%E6%9E%97");

        let url = store
            .url_for(
                MediaKind::Video,
                &word(),
                &FontKey::from_registered("mincho"),
                Path::new(""),
            )
            .unwrap();
        assert_eq!(url, "https://kasane.example.com/v/%E6%A3%AE%E6%9E%97?font=mincho");
    }

    #[test]
    fn test_requires_https_base() {
        let missing = LocalMediaStore::new("");
        assert!(matches!(
            missing.url_for(MediaKind::Union, &word(), &FontKey::default_key(), Path::new("")),
            Err(DeliveryError::MediaUrl(_))
        ));
        let ftp = LocalMediaStore::new("ftp://example.com");
        assert!(ftp
            .url_for(MediaKind::Union, &word(), &FontKey::default_key(), Path::new(""))
            .is_err());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let present = dir.path().join("Q_森林.png");
        std::fs::write(&present, b"png").unwrap();
        let store = LocalMediaStore::new("https://example.com");
        store
            .cleanup(&[present.clone(), dir.path().join("missing.png")])
            .await;
        assert!(!present.exists());
    }
}
