//! Paint commands emitted by the layout pass and their SVG serialization.

use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(String),
    /// CSS angle in degrees (0 points up, clockwise) and `(color, offset)` stops
    LinearGradient {
        angle: f32,
        stops: Vec<(String, Option<f32>)>,
    },
}

impl Fill {
    /// Parse a CSS background value. `none`/`transparent` paint nothing.
    pub fn parse(css: &str) -> Option<Fill> {
        let css = css.trim();
        if css.is_empty() || css == "none" || css == "transparent" {
            return None;
        }
        if let Some(rest) = css.strip_prefix("linear-gradient(") {
            let inner = rest.strip_suffix(')').unwrap_or(rest);
            return parse_linear_gradient(inner);
        }
        Some(Fill::Solid(css.to_string()))
    }
}

fn parse_linear_gradient(inner: &str) -> Option<Fill> {
    let mut parts = split_top_level(inner).into_iter().peekable();
    let mut angle = 180.0;
    if let Some(first) = parts.peek() {
        let first = first.trim();
        if let Some(deg) = first.strip_suffix("deg").and_then(|d| d.trim().parse::<f32>().ok()) {
            angle = deg;
            parts.next();
        } else if let Some(dir) = first.strip_prefix("to ") {
            angle = match dir.trim() {
                "top" => 0.0,
                "right" => 90.0,
                "bottom" => 180.0,
                "left" => 270.0,
                "top right" | "right top" => 45.0,
                "bottom right" | "right bottom" => 135.0,
                "bottom left" | "left bottom" => 225.0,
                "top left" | "left top" => 315.0,
                _ => 180.0,
            };
            parts.next();
        }
    }

    let stops: Vec<(String, Option<f32>)> = parts
        .map(|p| {
            let p = p.trim();
            if p.ends_with(')') {
                return (p.to_string(), None);
            }
            match p.rsplit_once(char::is_whitespace) {
                Some((color, pos)) => match pos.strip_suffix('%').and_then(|v| v.parse::<f32>().ok()) {
                    Some(pct) => (color.trim().to_string(), Some(pct / 100.0)),
                    None => (color.trim().to_string(), None),
                },
                None => (p.to_string(), None),
            }
        })
        .collect();

    if stops.is_empty() {
        return None;
    }
    Some(Fill::LinearGradient { angle, stops })
}

/// Split on commas that are not nested inside parentheses.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Fill>,
        radius: f32,
        stroke: Option<(f32, String)>,
    },
    /// Pre-shaped glyph outlines as SVG path data
    Glyphs { path: String, color: String },
    /// Text the rasterizer has to shape itself (no usable font binary)
    Text {
        x: f32,
        y: f32,
        text: String,
        family: String,
        size: f32,
        weight: u16,
        italic: bool,
        color: String,
    },
    /// Inline SVG markup placed at a box
    Svg {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        markup: String,
    },
    PushOpacity(f32),
    Pop,
}

/// Serialize paint commands into a standalone SVG document.
pub fn to_svg(width: u32, height: u32, commands: &[PaintCommand]) -> String {
    let mut defs = String::new();
    let mut body = String::new();
    let mut gradients = 0usize;

    for cmd in commands {
        match cmd {
            PaintCommand::Rect {
                x,
                y,
                width,
                height,
                fill,
                radius,
                stroke,
            } => {
                let fill_attr = match fill {
                    None => "none".to_string(),
                    Some(Fill::Solid(c)) => escape(c),
                    Some(Fill::LinearGradient { angle, stops }) => {
                        let id = format!("g{}", gradients);
                        gradients += 1;
                        write_gradient(&mut defs, &id, *angle, stops);
                        format!("url(#{})", id)
                    }
                };
                let _ = write!(
                    body,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}""#,
                    num(*x),
                    num(*y),
                    num(*width),
                    num(*height),
                    fill_attr
                );
                if *radius > 0.0 {
                    let _ = write!(body, r#" rx="{}""#, num(*radius));
                }
                if let Some((w, color)) = stroke {
                    let _ = write!(body, r#" stroke="{}" stroke-width="{}""#, escape(color), num(*w));
                }
                body.push_str("/>");
            }
            PaintCommand::Glyphs { path, color } => {
                let _ = write!(body, r#"<path d="{}" fill="{}"/>"#, path, escape(color));
            }
            PaintCommand::Text {
                x,
                y,
                text,
                family,
                size,
                weight,
                italic,
                color,
            } => {
                let _ = write!(
                    body,
                    r#"<text x="{}" y="{}" font-family="{}" font-size="{}" font-weight="{}" font-style="{}" fill="{}" xml:space="preserve">{}</text>"#,
                    num(*x),
                    num(*y),
                    escape(family),
                    num(*size),
                    weight,
                    if *italic { "italic" } else { "normal" },
                    escape(color),
                    escape(text)
                );
            }
            PaintCommand::Svg {
                x,
                y,
                width,
                height,
                markup,
            } => {
                let _ = write!(
                    body,
                    r#"<svg x="{}" y="{}" width="{}" height="{}""#,
                    num(*x),
                    num(*y),
                    num(*width),
                    num(*height)
                );
                body.push_str(markup);
            }
            PaintCommand::PushOpacity(o) => {
                let _ = write!(body, r#"<g opacity="{}">"#, num(*o));
            }
            PaintCommand::Pop => body.push_str("</g>"),
        }
    }

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    );
    if !defs.is_empty() {
        let _ = write!(svg, "<defs>{}</defs>", defs);
    }
    svg.push_str(&body);
    svg.push_str("</svg>");
    svg
}

fn write_gradient(defs: &mut String, id: &str, angle: f32, stops: &[(String, Option<f32>)]) {
    let rad = angle.to_radians();
    let (dx, dy) = (rad.sin() / 2.0, -rad.cos() / 2.0);
    let _ = write!(
        defs,
        r#"<linearGradient id="{}" x1="{}" y1="{}" x2="{}" y2="{}">"#,
        id,
        num(0.5 - dx),
        num(0.5 - dy),
        num(0.5 + dx),
        num(0.5 + dy)
    );
    let last = stops.len().saturating_sub(1).max(1) as f32;
    for (i, (color, offset)) in stops.iter().enumerate() {
        let offset = offset.unwrap_or(i as f32 / last);
        let _ = write!(
            defs,
            r#"<stop offset="{}" stop-color="{}"/>"#,
            num(offset),
            escape(color)
        );
    }
    defs.push_str("</linearGradient>");
}

/// Compact decimal formatting for SVG coordinates.
pub fn num(v: f32) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
