//! Text measurement and glyph outlining over the resolved font assets.

use std::fmt::Write;

use log::warn;
use ttf_parser::{Face, OutlineBuilder};

use super::paint::{num, PaintCommand};
use crate::fonts::FontAsset;

/// Advance used for every character when no face can be parsed, in ems
const FALLBACK_ADVANCE: f32 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Start,
    Center,
    End,
}

/// Inherited text properties of a box
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: String,
    pub size: f32,
    pub weight: u16,
    pub italic: bool,
    pub color: String,
    /// Multiple of `size`
    pub line_height: f32,
    pub letter_spacing: f32,
    pub align: TextAlign,
    pub uppercase: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: String::new(),
            size: 16.0,
            weight: 400,
            italic: false,
            color: "black".to_string(),
            line_height: 1.2,
            letter_spacing: 0.0,
            align: TextAlign::Start,
            uppercase: false,
        }
    }
}

impl TextStyle {
    pub fn line_box(&self) -> f32 {
        self.size * self.line_height
    }
}

pub struct LoadedFace<'a> {
    asset: &'a FontAsset,
    face: Option<Face<'a>>,
}

/// Parsed faces for one layout pass
pub struct FontBook<'a> {
    faces: Vec<LoadedFace<'a>>,
}

impl<'a> FontBook<'a> {
    pub fn new(fonts: &'a [FontAsset]) -> Self {
        let faces = fonts
            .iter()
            .map(|asset| {
                let face = match Face::parse(asset.data(), 0) {
                    Ok(face) => Some(face),
                    Err(e) => {
                        warn!(
                            "font {} {} is not parseable ({}), falling back to svg text",
                            asset.family(),
                            asset.weight(),
                            e
                        );
                        None
                    }
                };
                LoadedFace { asset, face }
            })
            .collect();
        Self { faces }
    }

    /// Best face for a CSS `font-family` list: first listed family that is
    /// present, then closest weight with matching style preferred.
    pub fn select(&self, family: &str, weight: u16, italic: bool) -> Option<&LoadedFace<'a>> {
        let wanted: Vec<&str> = family
            .split(',')
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|f| !f.is_empty())
            .collect();

        let candidates: Vec<&LoadedFace<'a>> = wanted
            .iter()
            .map(|name| {
                self.faces
                    .iter()
                    .filter(|f| f.asset.family().eq_ignore_ascii_case(name))
                    .collect::<Vec<_>>()
            })
            .find(|matches| !matches.is_empty())
            .unwrap_or_else(|| self.faces.iter().collect());

        candidates.into_iter().min_by_key(|f| {
            let style_penalty = if f.asset.style().is_italic() == italic { 0 } else { 1000 };
            style_penalty + (i32::from(f.asset.weight()) - i32::from(weight)).unsigned_abs()
        })
    }
}

/// Wrapped lines of one text run with their advance widths
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<(String, f32)>,
    pub width: f32,
    pub height: f32,
}

fn advance(face: Option<&Face<'_>>, ch: char, style: &TextStyle) -> f32 {
    let base = match face {
        Some(face) => {
            let scale = style.size / f32::from(face.units_per_em());
            face.glyph_index(ch)
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| f32::from(adv) * scale)
                .unwrap_or(style.size * FALLBACK_ADVANCE)
        }
        None => style.size * FALLBACK_ADVANCE,
    };
    base + style.letter_spacing
}

fn run_width(face: Option<&Face<'_>>, text: &str, style: &TextStyle) -> f32 {
    text.chars().map(|c| advance(face, c, style)).sum()
}

/// Collapse whitespace and greedily wrap words into `max_width`. A word wider
/// than the line keeps a line of its own.
pub fn measure(book: &FontBook<'_>, style: &TextStyle, text: &str, max_width: f32) -> TextBlock {
    let loaded = book.select(&style.family, style.weight, style.italic);
    let face = loaded.and_then(|l| l.face.as_ref());
    let text = if style.uppercase {
        text.to_uppercase()
    } else {
        text.to_string()
    };
    let space = advance(face, ' ', style);

    let mut lines: Vec<(String, f32)> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;
    for word in text.split_whitespace() {
        let w = run_width(face, word, style);
        if current.is_empty() {
            current.push_str(word);
            current_width = w;
        } else if current_width + space + w <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += space + w;
        } else {
            lines.push((std::mem::take(&mut current), current_width));
            current.push_str(word);
            current_width = w;
        }
    }
    if !current.is_empty() {
        lines.push((current, current_width));
    }

    let width = lines.iter().map(|(_, w)| *w).fold(0.0, f32::max);
    let height = lines.len() as f32 * style.line_box();
    TextBlock {
        lines,
        width,
        height,
    }
}

/// Emit paint commands for a measured block inside a box of `width`.
pub fn paint(
    book: &FontBook<'_>,
    style: &TextStyle,
    block: &TextBlock,
    x: f32,
    y: f32,
    width: f32,
    out: &mut Vec<PaintCommand>,
) {
    let loaded = book.select(&style.family, style.weight, style.italic);
    let line_box = style.line_box();

    for (i, (line, line_width)) in block.lines.iter().enumerate() {
        let left = match style.align {
            TextAlign::Start => x,
            TextAlign::Center => x + (width - line_width) / 2.0,
            TextAlign::End => x + width - line_width,
        };
        let top = y + i as f32 * line_box;

        match loaded.and_then(|l| l.face.as_ref()) {
            Some(face) => {
                let scale = style.size / f32::from(face.units_per_em());
                let ascent = f32::from(face.ascender()) * scale;
                let descent = -f32::from(face.descender()) * scale;
                let baseline = top + (line_box - (ascent + descent)) / 2.0 + ascent;
                let path = outline_line(face, style, line, left, baseline);
                if !path.is_empty() {
                    out.push(PaintCommand::Glyphs {
                        path,
                        color: style.color.clone(),
                    });
                }
            }
            None => {
                let baseline = top + (line_box - style.size) / 2.0 + style.size * 0.8;
                let family = loaded
                    .map(|l| l.asset.family().to_string())
                    .unwrap_or_else(|| style.family.clone());
                out.push(PaintCommand::Text {
                    x: left,
                    y: baseline,
                    text: line.clone(),
                    family,
                    size: style.size,
                    weight: style.weight,
                    italic: style.italic,
                    color: style.color.clone(),
                });
            }
        }
    }
}

fn outline_line(face: &Face<'_>, style: &TextStyle, line: &str, x: f32, baseline: f32) -> String {
    let scale = style.size / f32::from(face.units_per_em());
    let mut d = String::new();
    let mut pen = x;
    for ch in line.chars() {
        if let Some(gid) = face.glyph_index(ch) {
            let mut sink = PathSink {
                d: &mut d,
                x: pen,
                y: baseline,
                scale,
            };
            let _ = face.outline_glyph(gid, &mut sink);
        }
        pen += advance(Some(face), ch, style);
    }
    d
}

/// Writes glyph outlines as absolute SVG path commands. Font units grow
/// upwards, so y is flipped around the baseline.
struct PathSink<'s> {
    d: &'s mut String,
    x: f32,
    y: f32,
    scale: f32,
}

impl PathSink<'_> {
    fn px(&self, x: f32) -> String {
        num(self.x + x * self.scale)
    }

    fn py(&self, y: f32) -> String {
        num(self.y - y * self.scale)
    }
}

impl OutlineBuilder for PathSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (px, py) = (self.px(x), self.py(y));
        let _ = write!(self.d, "M{} {}", px, py);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (px, py) = (self.px(x), self.py(y));
        let _ = write!(self.d, "L{} {}", px, py);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (ax, ay, px, py) = (self.px(x1), self.py(y1), self.px(x), self.py(y));
        let _ = write!(self.d, "Q{} {} {} {}", ax, ay, px, py);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (ax, ay) = (self.px(x1), self.py(y1));
        let (bx, by) = (self.px(x2), self.py(y2));
        let (px, py) = (self.px(x), self.py(y));
        let _ = write!(self.d, "C{} {} {} {} {} {}", ax, ay, bx, by, px, py);
    }

    fn close(&mut self) {
        self.d.push('Z');
    }
}
