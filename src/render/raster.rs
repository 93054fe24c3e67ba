use std::sync::Arc;

use log::{debug, warn};

use super::{ImageFormat, Rasterizer};
use crate::{Error, Result};

/// Rasterizes SVG with resvg, scaled to the requested pixel width.
#[derive(Clone)]
pub struct ResvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResvgRasterizer {
    /// No font database: `<text>` elements are dropped. Layout output with
    /// outlined glyphs does not need one.
    pub fn new() -> Self {
        Self {
            fontdb: Arc::new(usvg::fontdb::Database::new()),
        }
    }

    /// Load the system fonts for `<text>` that could not be outlined.
    pub fn with_system_fonts() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        if fontdb.is_empty() {
            warn!("no system fonts found, unshaped text will not render");
        }
        Self {
            fontdb: Arc::new(fontdb),
        }
    }
}

impl Rasterizer for ResvgRasterizer {
    fn rasterize(&self, svg: &str, width: u32) -> Result<Vec<u8>> {
        if width == 0 {
            return Err(Error::RasterError("target width must be positive".to_string()));
        }
        let tree = {
            let mut opts = usvg::Options::default();
            opts.fontdb = Arc::clone(&self.fontdb);
            // data: URLs still resolve; paths and URLs never touch the host
            opts.image_href_resolver.resolve_string = Box::new(
                |href: &str, _: &usvg::Options| -> Option<usvg::ImageKind> {
                    warn!("ignoring external image reference {:?}", href);
                    None
                },
            );
            usvg::Tree::from_str(svg, &opts)
                .map_err(|e| Error::RasterError(format!("SVG parsing failed: {}", e)))?
        };

        let size = tree.size();
        let scale = width as f32 / size.width();
        let height = ((size.height() * scale).round() as u32).max(1);

        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            Error::RasterError(format!("failed to create pixmap ({}x{})", width, height))
        })?;
        resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());
        debug!("rasterized {}x{} svg to {}x{}", size.width(), size.height(), width, height);

        pixmap
            .encode_png()
            .map_err(|e| Error::RasterError(format!("PNG encoding failed: {}", e)))
    }
}

/// Convert a PNG produced by a [`Rasterizer`] into `format`.
///
/// `quality` drives the lossy WebP encoder; 100 switches to lossless.
pub fn encode(png: Vec<u8>, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    match format {
        ImageFormat::Png => Ok(png),
        ImageFormat::Webp => to_webp(&png, quality),
    }
}

#[cfg(feature = "webp")]
fn to_webp(png: &[u8], quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .map_err(|e| Error::RasterError(format!("PNG decoding failed: {}", e)))?;
    let rgba = decoded.to_rgba8();
    let (w, h) = rgba.dimensions();

    let lossless = quality >= 100;
    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), w, h)
        .encode_simple(lossless, f32::from(quality))
        .map_err(|e| Error::RasterError(format!("WebP encoding failed: {:?}", e)))?;
    debug!(
        "encoded {}x{} webp ({} bytes, quality {}{})",
        w,
        h,
        encoded.len(),
        quality,
        if lossless { ", lossless" } else { "" }
    );
    Ok(encoded.to_vec())
}

#[cfg(not(feature = "webp"))]
fn to_webp(_png: &[u8], _quality: u8) -> Result<Vec<u8>> {
    Err(Error::RasterError(
        "WebP output requires the `webp` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50" viewBox="0 0 100 50"><rect width="100" height="50" fill="red"/></svg>"#;

    #[test]
    fn rasterizes_to_png_at_requested_width() {
        let png = ResvgRasterizer::new().rasterize(SVG, 200).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        // IHDR width and height, big endian
        assert_eq!(u32::from_be_bytes([png[16], png[17], png[18], png[19]]), 200);
        assert_eq!(u32::from_be_bytes([png[20], png[21], png[22], png[23]]), 100);
    }

    #[test]
    fn malformed_svg_is_a_raster_error() {
        let res = ResvgRasterizer::new().rasterize("<svg", 10);
        assert!(matches!(res, Err(Error::RasterError(_))));
    }

    #[test]
    fn png_passes_through_unchanged() {
        let bytes = vec![1, 2, 3];
        assert_eq!(encode(bytes.clone(), ImageFormat::Png, 80).unwrap(), bytes);
    }

    #[test]
    fn external_image_references_are_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.png");
        let mut red = tiny_skia::Pixmap::new(4, 4).unwrap();
        red.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));
        red.save_png(&path).unwrap();

        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"><image href="{}" width="4" height="4"/></svg>"#,
            path.display()
        );
        let png = ResvgRasterizer::new().rasterize(&svg, 4).unwrap();
        let pixmap = tiny_skia::Pixmap::decode_png(&png).unwrap();
        assert_eq!(pixmap.pixel(1, 1).unwrap().alpha(), 0);
    }

    /// A noisy RGBA image so that lossy quality makes a visible difference
    #[cfg(feature = "webp")]
    fn noisy_png() -> Vec<u8> {
        let mut pixmap = tiny_skia::Pixmap::new(64, 64).unwrap();
        for (i, px) in pixmap.data_mut().chunks_exact_mut(4).enumerate() {
            let v = (i as u32).wrapping_mul(2_654_435_761);
            px[0] = (v >> 24) as u8;
            px[1] = (v >> 16) as u8;
            px[2] = (v >> 8) as u8;
            px[3] = 255;
        }
        pixmap.encode_png().unwrap()
    }

    #[cfg(feature = "webp")]
    #[test]
    fn webp_quality_changes_the_output() {
        let low = encode(noisy_png(), ImageFormat::Webp, 10).unwrap();
        let high = encode(noisy_png(), ImageFormat::Webp, 90).unwrap();
        assert!(low.len() < high.len(), "{} vs {}", low.len(), high.len());

        let lossless = encode(noisy_png(), ImageFormat::Webp, 100).unwrap();
        assert_eq!(&lossless[12..16], b"VP8L");
    }

    #[cfg(feature = "webp")]
    #[test]
    fn webp_has_riff_header() {
        let png = ResvgRasterizer::new().rasterize(SVG, 20).unwrap();
        let webp = encode(png, ImageFormat::Webp, 80).unwrap();
        assert_eq!(&webp[0..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }
}
