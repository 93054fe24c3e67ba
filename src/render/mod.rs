//! Rendering: element tree → SVG → raster bytes → delivered location.
//!
//! The [`Orchestrator`] owns the per-request state machine. Layout and
//! rasterization sit behind the [`LayoutEngine`] and [`Rasterizer`] traits so
//! either can be swapped (tests use fakes for both).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::ElementNode;
use crate::fonts::{FontAsset, FontRequest};
use crate::{Error, Result, Size};

pub mod layout;
mod orchestrator;
pub mod paint;
pub mod raster;
pub mod text;

pub use layout::BoxLayout;
pub use orchestrator::Orchestrator;
pub use raster::ResvgRasterizer;

/// Inputs to one layout pass
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub width: u32,
    pub height: u32,
    pub fonts: Vec<FontAsset>,
}

/// Turns an element tree into a standalone SVG document of the given size.
pub trait LayoutEngine: Send + Sync {
    fn layout(&self, tree: &ElementNode, options: &LayoutOptions) -> Result<String>;
}

/// Rasterizes SVG to PNG, scaled to `width` with the aspect ratio kept.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, svg: &str, width: u32) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(Error::ConfigError(format!(
                "unsupported image format {:?}, expected png or webp",
                other
            ))),
        }
    }
}

/// Where the finished image goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// A filesystem path; parent directories are created
    Path(PathBuf),
    /// An object name in blob storage
    Blob(String),
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Path(p) => write!(f, "{}", p.display()),
            OutputTarget::Blob(name) => write!(f, "blob:{}", name),
        }
    }
}

/// Render a registered template.
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    pub template: String,
    pub params: Value,
    pub target: OutputTarget,
    /// Overrides the template's declared width
    pub width: Option<u32>,
    /// Overrides the template's declared height
    pub height: Option<u32>,
    /// Replaces the template's fonts when non-empty
    pub fonts: Option<Vec<FontRequest>>,
    pub format: ImageFormat,
    pub quality: u8,
}

impl TemplateRequest {
    pub fn new(template: impl Into<String>, params: Value, target: OutputTarget) -> Self {
        Self {
            template: template.into(),
            params,
            target,
            width: None,
            height: None,
            fonts: None,
            format: ImageFormat::Png,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Render raw markup (JSON descriptor or tags).
#[derive(Debug, Clone)]
pub struct MarkupRequest {
    pub markup: String,
    pub target: OutputTarget,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Defaults to Inter 400 and 700 when absent or empty
    pub fonts: Option<Vec<FontRequest>>,
    pub format: ImageFormat,
    pub quality: u8,
}

impl MarkupRequest {
    pub fn new(markup: impl Into<String>, target: OutputTarget) -> Self {
        Self {
            markup: markup.into(),
            target,
            width: None,
            height: None,
            fonts: None,
            format: ImageFormat::Png,
            quality: DEFAULT_QUALITY,
        }
    }
}

pub const DEFAULT_QUALITY: u8 = 80;

/// Largest accepted canvas edge in pixels
pub const MAX_DIMENSION: u32 = 8192;

/// A delivered image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderOutcome {
    /// Filesystem path or public URL
    pub location: String,
    pub size: Size,
    pub format: ImageFormat,
    /// Encoded size in bytes
    pub bytes: usize,
}

/// Pipeline step a request failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStage {
    Validate,
    ResolveFonts,
    Layout,
    Rasterize,
    Deliver,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderStage::Validate => "validation",
            RenderStage::ResolveFonts => "font resolution",
            RenderStage::Layout => "layout",
            RenderStage::Rasterize => "rasterization",
            RenderStage::Deliver => "delivery",
        })
    }
}

/// Lifecycle of one render request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Validated,
    FontsResolved,
    LaidOut,
    Rasterized,
    Delivered,
    Failed(RenderStage),
}

/// A failed render with the step it failed in
#[derive(Debug)]
pub struct RenderFailure {
    pub stage: RenderStage,
    pub error: Error,
}

impl RenderFailure {
    pub fn new(stage: RenderStage, error: Error) -> Self {
        Self { stage, error }
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for RenderFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_format_parses_case_insensitively() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!(" webp".parse::<ImageFormat>().unwrap(), ImageFormat::Webp);
        assert!("gif".parse::<ImageFormat>().is_err());
        assert_eq!(ImageFormat::Webp.mime_type(), "image/webp");
    }

    #[test]
    fn failure_display_names_the_stage() {
        let failure = RenderFailure::new(
            RenderStage::ResolveFonts,
            Error::NetworkError("connection refused".into()),
        );
        let msg = failure.to_string();
        assert!(msg.starts_with("font resolution failed"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn request_defaults() {
        let req = TemplateRequest::new("quote", Value::Null, OutputTarget::Blob("q.png".into()));
        assert_eq!(req.format, ImageFormat::Png);
        assert_eq!(req.quality, 80);
        assert!(req.width.is_none() && req.fonts.is_none());
    }
}
