//! Bundled font backend: a read-only table of font binaries loaded at startup.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::{snap_weight, FontAsset, FontRequest, FontResolver, FontStyle, CANONICAL_WEIGHTS};
use crate::{Error, Result};

/// Declared weight of a bundled font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSpec {
    /// A single-weight face
    Static(u16),
    /// A variable face covering `min..=max` on the `wght` axis
    Variable { min: u16, max: u16 },
}

impl WeightSpec {
    /// The canonical weights this face is exposed at.
    pub fn canonical_weights(&self) -> Vec<u16> {
        match *self {
            WeightSpec::Static(w) => vec![snap_weight(w)],
            WeightSpec::Variable { min, max } => CANONICAL_WEIGHTS
                .iter()
                .copied()
                .filter(|w| *w >= min && *w <= max)
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct BundledFont {
    pub family: String,
    pub style: FontStyle,
    pub weight: WeightSpec,
    data: Arc<[u8]>,
}

impl std::fmt::Debug for BundledFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundledFont")
            .field("family", &self.family)
            .field("style", &self.style)
            .field("weight", &self.weight)
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl BundledFont {
    pub fn new(
        family: impl Into<String>,
        style: FontStyle,
        weight: WeightSpec,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            family: family.into(),
            style,
            weight,
            data: data.into(),
        }
    }

    /// Read family, style and weight metadata out of the font binary itself.
    ///
    /// A `wght` variation axis makes the font variable; otherwise the OS/2
    /// weight class is used.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| Error::ConfigError(format!("unreadable font: {}", e)))?;

        let family = face_family(&face)
            .ok_or_else(|| Error::ConfigError("font has no family name".to_string()))?;
        let style = if face.is_italic() {
            FontStyle::Italic
        } else {
            FontStyle::Normal
        };
        let wght = ttf_parser::Tag::from_bytes(b"wght");
        let weight = match face.variation_axes().into_iter().find(|a| a.tag == wght) {
            Some(axis) => WeightSpec::Variable {
                min: axis.min_value.round() as u16,
                max: axis.max_value.round() as u16,
            },
            None => WeightSpec::Static(face.weight().to_number()),
        };
        drop(face);

        Ok(Self::new(family, style, weight, data))
    }

    /// One asset per canonical weight this font covers.
    pub fn expand(&self) -> Vec<FontAsset> {
        self.weight
            .canonical_weights()
            .into_iter()
            .map(|w| FontAsset::new(self.family.clone(), self.data.clone(), w, self.style))
            .collect()
    }
}

fn face_family(face: &ttf_parser::Face<'_>) -> Option<String> {
    for id in [ttf_parser::name_id::TYPOGRAPHIC_FAMILY, ttf_parser::name_id::FAMILY] {
        if let Some(name) = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == id)
            .find_map(|n| n.to_string())
        {
            return Some(name);
        }
    }
    None
}

/// Serves fonts from a fixed, preloaded table.
#[derive(Clone, Default)]
pub struct BundledFontResolver {
    fonts: Arc<Vec<BundledFont>>,
}

impl BundledFontResolver {
    pub fn new(fonts: Vec<BundledFont>) -> Self {
        Self {
            fonts: Arc::new(fonts),
        }
    }

    /// Load every `.ttf`/`.otf` file in `dir`. Files that do not parse are
    /// skipped with a warning.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>();
        paths.sort();

        let mut fonts = Vec::new();
        for path in paths {
            let data = std::fs::read(&path)?;
            match BundledFont::from_bytes(data) {
                Ok(font) => {
                    log::debug!("bundled font {:?} from {}", font, path.display());
                    fonts.push(font);
                }
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
        if fonts.is_empty() {
            return Err(Error::ConfigError(format!(
                "no usable fonts in {}",
                dir.display()
            )));
        }
        Ok(Self::new(fonts))
    }

    pub fn fonts(&self) -> &[BundledFont] {
        &self.fonts
    }

    /// Every asset in the table, variable families expanded.
    pub fn assets(&self) -> Vec<FontAsset> {
        self.fonts.iter().flat_map(BundledFont::expand).collect()
    }
}

#[async_trait]
impl FontResolver for BundledFontResolver {
    async fn resolve(&self, requests: &[FontRequest]) -> Result<Vec<FontAsset>> {
        if requests.is_empty() {
            return Ok(self.assets());
        }

        let mut families: Vec<&FontRequest> = Vec::new();
        for req in requests {
            if !families.iter().any(|f| f.family.eq_ignore_ascii_case(&req.family)) {
                families.push(req);
            }
        }

        let mut assets = Vec::new();
        for req in families {
            let before = assets.len();
            for font in self
                .fonts
                .iter()
                .filter(|f| f.family.eq_ignore_ascii_case(req.family.trim()))
            {
                assets.extend(font.expand());
            }
            if assets.len() == before {
                return Err(Error::FontNotFoundError {
                    family: req.family.clone(),
                    weight: req.snapped_weight(),
                    style: req.style,
                    reason: "not bundled".to_string(),
                });
            }
        }
        Ok(assets)
    }
}
