//! Cardsmith
//!
//! Turns a declarative description (a named template plus parameters, or raw
//! markup) into a raster image delivered to a file or to blob storage.
//!
//! # Pipeline
//!
//! - **Markup parser** ([`markup`]): JSON element descriptors or HTML/JSX-like
//!   tags become an [`ElementNode`] tree; anything else degrades to text
//! - **Template registry** ([`templates`]): validates parameters against a
//!   declared schema and generates the tree
//! - **Font resolver** ([`fonts`]): fetches or expands font binaries at the
//!   nine canonical weights
//! - **Orchestrator** ([`render`]): layout to SVG, rasterize, re-encode, then
//!   hand the bytes to an output sink ([`sink`])
//!
//! # Example
//!
//! ```no_run
//! use cardsmith::render::{Orchestrator, OutputTarget, TemplateRequest};
//! use cardsmith::RenderConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::from_config(RenderConfig::from_env()?)?;
//! let outcome = orchestrator
//!     .render_template(TemplateRequest::new(
//!         "social-card",
//!         serde_json::json!({"title": "Hello"}),
//!         OutputTarget::Path("card.png".into()),
//!     ))
//!     .await?;
//! println!("saved to {}", outcome.location);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod element;
pub mod error;
pub mod fonts;
pub mod markup;
pub mod render;
pub mod serve;
pub mod sink;
pub mod templates;
pub mod tools;

pub use element::{ElementNode, Node};
pub use error::{Error, Result};
pub use fonts::{FontAsset, FontRequest, FontResolver, FontStyle};
pub use templates::TemplateRegistry;

/// Canvas dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Process configuration for the pipeline.
///
/// Defaults target the public Google Fonts service and Vercel Blob storage.
///
/// # Examples
///
/// ```
/// let cfg = cardsmith::RenderConfig::default();
/// assert_eq!(cfg.markup_size, cardsmith::Size::new(600, 400));
/// assert!(cfg.font_dir.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// User agent for font and blob requests. Font services pick the binary
    /// format from it; a non-browser agent gets TrueType.
    pub user_agent: String,
    /// Upper bound for fetching one remote font, stylesheet and binary
    pub font_timeout_ms: u64,
    /// Cache resolved fonts for this long; `None` disables the cache
    pub font_cache_ttl_secs: Option<u64>,
    /// Serve fonts from this directory instead of the remote service
    pub font_dir: Option<PathBuf>,
    /// css2-style stylesheet endpoint
    pub stylesheet_base: String,
    /// Only binaries on this host are accepted from a stylesheet
    pub font_binary_host: String,
    /// Canvas size for raw markup when the caller gives none
    pub markup_size: Size,
    pub blob_api_url: String,
    /// Bearer token for blob uploads; blob delivery is disabled without it
    pub blob_token: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("cardsmith/", env!("CARGO_PKG_VERSION")).to_string(),
            font_timeout_ms: 10_000,
            font_cache_ttl_secs: None,
            font_dir: None,
            stylesheet_base: "https://fonts.googleapis.com/css2".to_string(),
            font_binary_host: "https://fonts.gstatic.com".to_string(),
            markup_size: Size::new(600, 400),
            blob_api_url: "https://blob.vercel-storage.com".to_string(),
            blob_token: None,
        }
    }
}

impl RenderConfig {
    /// Defaults overlaid with `BLOB_READ_WRITE_TOKEN`, `CARDSMITH_FONT_DIR`,
    /// `CARDSMITH_FONT_TIMEOUT_MS`, `CARDSMITH_FONT_CACHE_TTL_SECS` and
    /// `CARDSMITH_BLOB_API_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Self::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("BLOB_READ_WRITE_TOKEN") {
            cfg.blob_token = Some(token);
        }
        if let Some(dir) = get("CARDSMITH_FONT_DIR") {
            cfg.font_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = get("CARDSMITH_FONT_TIMEOUT_MS") {
            cfg.font_timeout_ms = parse_number("CARDSMITH_FONT_TIMEOUT_MS", &ms)?;
        }
        if let Some(ttl) = get("CARDSMITH_FONT_CACHE_TTL_SECS") {
            cfg.font_cache_ttl_secs = Some(parse_number("CARDSMITH_FONT_CACHE_TTL_SECS", &ttl)?);
        }
        if let Some(url) = get("CARDSMITH_BLOB_API_URL") {
            cfg.blob_api_url = url;
        }
        Ok(cfg)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::ConfigError(format!("{}={:?}: {}", key, value, e)))
}

/// Create the font resolver the configuration asks for.
///
/// A `font_dir` selects bundled fonts; otherwise the remote service is used
/// (feature `remote`). A cache TTL wraps either in a [`fonts::CachingResolver`].
pub fn new_font_resolver(config: &RenderConfig) -> Result<Arc<dyn FontResolver>> {
    let base: Arc<dyn FontResolver> = match &config.font_dir {
        Some(dir) => Arc::new(fonts::BundledFontResolver::from_dir(dir)?),
        None => remote_resolver(config)?,
    };
    Ok(match config.font_cache_ttl_secs {
        Some(ttl) => Arc::new(fonts::CachingResolver::new(base, Duration::from_secs(ttl))),
        None => base,
    })
}

#[cfg(feature = "remote")]
fn remote_resolver(config: &RenderConfig) -> Result<Arc<dyn FontResolver>> {
    Ok(Arc::new(fonts::RemoteFontResolver::new(config)?))
}

#[cfg(not(feature = "remote"))]
fn remote_resolver(_config: &RenderConfig) -> Result<Arc<dyn FontResolver>> {
    Err(Error::ConfigError(
        "no font directory configured and the `remote` feature is disabled".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.markup_size.width, 600);
        assert_eq!(config.markup_size.height, 400);
        assert!(config.blob_token.is_none());
        assert!(config.user_agent.starts_with("cardsmith/"));
    }

    #[test]
    fn config_overlays_environment() {
        let env: HashMap<&str, &str> = [
            ("BLOB_READ_WRITE_TOKEN", "tok"),
            ("CARDSMITH_FONT_TIMEOUT_MS", "2500"),
            ("CARDSMITH_FONT_CACHE_TTL_SECS", "60"),
            ("CARDSMITH_FONT_DIR", ""),
        ]
        .into_iter()
        .collect();
        let cfg = RenderConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.blob_token.as_deref(), Some("tok"));
        assert_eq!(cfg.font_timeout_ms, 2500);
        assert_eq!(cfg.font_cache_ttl_secs, Some(60));
        assert!(cfg.font_dir.is_none());
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let res = RenderConfig::from_lookup(|k| {
            (k == "CARDSMITH_FONT_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(res, Err(Error::ConfigError(_))));
    }

    #[test]
    fn missing_font_dir_fails_resolver_creation() {
        let cfg = RenderConfig {
            font_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(new_font_resolver(&cfg).is_err());
    }
}
