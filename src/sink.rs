//! Output sinks: where encoded images end up.

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Number of hex digits of the content hash appended to blob names
const HASH_SUFFIX_LEN: usize = 12;

/// Stores bytes under a name and reports where they landed.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Returns the location: a filesystem path or a public URL.
    async fn put(&self, bytes: Vec<u8>, name: &str) -> Result<String>;
}

/// Writes to the local filesystem, creating parent directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl FileSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutputSink for FileSink {
    async fn put(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        let path = Path::new(name);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::DeliveryError(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| Error::DeliveryError(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path.display().to_string())
    }
}

/// `name` with the first hex digits of the content's SHA-256 inserted before
/// the extension: `card.png` → `card-1a2b3c4d5e6f.png`.
pub fn content_addressed_name(name: &str, bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    let suffix = &digest[..HASH_SUFFIX_LEN];
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = file_start + dot;
            format!("{}-{}{}", &name[..dot], suffix, &name[dot..])
        }
        _ => format!("{}-{}", name, suffix),
    }
}

#[cfg(feature = "remote")]
pub use blob::BlobSink;

#[cfg(feature = "remote")]
mod blob {
    use super::*;
    use reqwest::Client;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct PutResponse {
        url: String,
    }

    /// Uploads to a Vercel-Blob-style store: `PUT <api>/<name>` with a
    /// bearer token, answered by JSON carrying the public `url`.
    pub struct BlobSink {
        client: Client,
        api_url: String,
        token: String,
    }

    impl BlobSink {
        pub fn new(api_url: &str, token: &str, user_agent: &str) -> Result<Self> {
            url::Url::parse(api_url)
                .map_err(|e| Error::ConfigError(format!("bad blob api url {}: {}", api_url, e)))?;
            let client = Client::builder()
                .user_agent(user_agent.to_string())
                .build()
                .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self {
                client,
                api_url: api_url.trim_end_matches('/').to_string(),
                token: token.to_string(),
            })
        }

        pub fn object_url(&self, name: &str) -> String {
            format!("{}/{}", self.api_url, name.trim_start_matches('/'))
        }
    }

    #[async_trait]
    impl OutputSink for BlobSink {
        async fn put(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
            let object = content_addressed_name(name, &bytes);
            let url = self.object_url(&object);
            log::debug!("uploading {} bytes to {}", bytes.len(), url);

            let response = self
                .client
                .put(&url)
                .bearer_auth(&self.token)
                .header("x-content-type", content_type(&object))
                .header("x-add-random-suffix", "0")
                .body(bytes)
                .send()
                .await
                .map_err(|e| Error::DeliveryError(format!("upload to {} failed: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::DeliveryError(format!(
                    "upload to {} returned {}: {}",
                    url,
                    status,
                    body.trim()
                )));
            }
            let parsed: PutResponse = response
                .json()
                .await
                .map_err(|e| Error::DeliveryError(format!("unreadable upload response: {}", e)))?;
            Ok(parsed.url)
        }
    }

    fn content_type(name: &str) -> &'static str {
        if name.ends_with(".webp") {
            "image/webp"
        } else if name.ends_with(".png") {
            "image/png"
        } else {
            "application/octet-stream"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_suffix_goes_before_the_extension() {
        let name = content_addressed_name("cards/social-card.png", b"hello");
        // sha256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(name, "cards/social-card-2cf24dba5fb0.png");
        assert_eq!(content_addressed_name("image", b"hello"), "image-2cf24dba5fb0");
        assert_eq!(content_addressed_name("v1.0/.env", b"hello"), "v1.0/.env-2cf24dba5fb0");
    }

    #[tokio::test]
    async fn file_sink_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.png");
        let location = FileSink::new()
            .put(vec![1, 2, 3], &path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(location, path.display().to_string());
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }
}
