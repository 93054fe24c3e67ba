//! Font resolution: turn font requests into concrete font binaries whose
//! weights sit on the nine canonical steps the renderer understands.
//!
//! Backends:
//! - [`RemoteFontResolver`] (feature `remote`): fetches a stylesheet from a
//!   font service and downloads the first binary it references
//! - [`BundledFontResolver`]: serves preloaded fonts, expanding variable
//!   families into one asset per canonical weight
//! - [`CachingResolver`]: a time-bounded cache in front of either

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub mod bundled;
pub mod cache;
#[cfg(feature = "remote")]
pub mod remote;

pub use bundled::{BundledFont, BundledFontResolver, WeightSpec};
pub use cache::CachingResolver;
#[cfg(feature = "remote")]
pub use remote::RemoteFontResolver;

/// The nine weights the layout engine can render.
pub const CANONICAL_WEIGHTS: [u16; 9] = [100, 200, 300, 400, 500, 600, 700, 800, 900];

/// Snap an arbitrary weight to the nearest canonical step.
///
/// Exact midpoints (e.g. 450) resolve to the lower step. Values outside
/// `[100, 900]` clamp to the nearest end.
pub fn snap_weight(weight: u16) -> u16 {
    let mut best = CANONICAL_WEIGHTS[0];
    for step in CANONICAL_WEIGHTS {
        // Strict comparison keeps the lower step on ties.
        if step.abs_diff(weight) < best.abs_diff(weight) {
            best = step;
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    pub fn is_italic(self) -> bool {
        matches!(self, FontStyle::Italic)
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontStyle::Normal => f.write_str("normal"),
            FontStyle::Italic => f.write_str("italic"),
        }
    }
}

fn default_weight() -> u16 {
    400
}

/// A caller's desired font. `weight` may be any value; it is snapped on use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontRequest {
    #[serde(alias = "name")]
    pub family: String,
    #[serde(default = "default_weight")]
    pub weight: u16,
    #[serde(default)]
    pub style: FontStyle,
}

impl FontRequest {
    pub fn new(family: impl Into<String>, weight: u16, style: FontStyle) -> Self {
        Self {
            family: family.into(),
            weight,
            style,
        }
    }

    pub fn normal(family: impl Into<String>, weight: u16) -> Self {
        Self::new(family, weight, FontStyle::Normal)
    }

    pub fn italic(family: impl Into<String>, weight: u16) -> Self {
        Self::new(family, weight, FontStyle::Italic)
    }

    pub fn snapped_weight(&self) -> u16 {
        snap_weight(self.weight)
    }
}

/// A concrete font binary at a canonical weight.
///
/// The byte buffer is immutable and reference counted, so cloning an asset
/// never copies font data.
#[derive(Clone, PartialEq, Eq)]
pub struct FontAsset {
    family: String,
    data: Arc<[u8]>,
    weight: u16,
    style: FontStyle,
}

impl FontAsset {
    /// Build an asset; `weight` is snapped to a canonical step.
    pub fn new(family: impl Into<String>, data: impl Into<Arc<[u8]>>, weight: u16, style: FontStyle) -> Self {
        Self {
            family: family.into(),
            data: data.into(),
            weight: snap_weight(weight),
            style,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    pub fn style(&self) -> FontStyle {
        self.style
    }
}

impl fmt::Debug for FontAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontAsset")
            .field("family", &self.family)
            .field("weight", &self.weight)
            .field("style", &self.style)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// A source of font binaries.
#[async_trait]
pub trait FontResolver: Send + Sync {
    /// Resolve every request into font assets. A failure for any request
    /// aborts the whole resolution.
    async fn resolve(&self, requests: &[FontRequest]) -> Result<Vec<FontAsset>>;
}

#[async_trait]
impl<R: FontResolver + ?Sized> FontResolver for Arc<R> {
    async fn resolve(&self, requests: &[FontRequest]) -> Result<Vec<FontAsset>> {
        (**self).resolve(requests).await
    }
}
