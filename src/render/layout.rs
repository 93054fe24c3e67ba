//! Flexbox-subset layout that turns an element tree into an SVG document.
//!
//! Supported: `display:flex` rows and columns, `justifyContent`, `alignItems`,
//! `gap`, padding, margins, fixed and percentage sizes, solid and linear
//! gradient backgrounds, borders, `borderRadius`, `opacity`, inherited text
//! properties and inline `<svg>` subtrees. Elements without `display:flex`
//! stack their children vertically like blocks.

use log::debug;
use serde_json::Value;

use super::paint::{self, escape, Fill, PaintCommand};
use super::text::{self, FontBook, TextAlign, TextStyle};
use super::{LayoutEngine, LayoutOptions};
use crate::element::{ElementNode, Node};
use crate::{Error, Result};

/// SVG attributes that keep their camelCase spelling
const CAMEL_CASE_SVG_ATTRS: &[&str] = &[
    "viewBox",
    "preserveAspectRatio",
    "gradientTransform",
    "gradientUnits",
    "patternTransform",
    "patternUnits",
    "stdDeviation",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BoxLayout;

impl BoxLayout {
    pub fn new() -> Self {
        Self
    }
}

impl LayoutEngine for BoxLayout {
    fn layout(&self, tree: &ElementNode, options: &LayoutOptions) -> Result<String> {
        if options.width == 0 || options.height == 0 {
            return Err(Error::RenderError(format!(
                "canvas must be non-empty, got {}x{}",
                options.width, options.height
            )));
        }
        let book = FontBook::new(&options.fonts);
        let root = build(tree, &TextStyle::default());
        let (w, h) = (options.width as f32, options.height as f32);

        let mut ctx = Ctx {
            book: &book,
            out: Vec::new(),
        };
        let margin = root.margin();
        let (mut bw, bh) = ctx.measure(&root, w - margin.horizontal(), Some(h - margin.vertical()));
        // the canvas stretches a root without an explicit width
        if root.style().map_or(true, |s| s.width.is_none()) {
            bw = (w - margin.horizontal()).max(0.0);
        }
        ctx.place(&root, margin.left, margin.top, bw, bh);
        Ok(paint::to_svg(options.width, options.height, &ctx.out))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Length {
    Px(f32),
    Percent(f32),
}

impl Length {
    fn resolve(self, reference: f32) -> f32 {
        match self {
            Length::Px(v) => v,
            Length::Percent(p) => reference * p / 100.0,
        }
    }
}

fn parse_length(value: &Value, em: f32) -> Option<Length> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| Length::Px(v as f32)),
        Value::String(s) => parse_length_str(s, em),
        _ => None,
    }
}

fn parse_length_str(s: &str, em: f32) -> Option<Length> {
    let s = s.trim();
    if let Some(p) = s.strip_suffix('%') {
        return p.trim().parse().ok().map(Length::Percent);
    }
    if let Some(v) = s.strip_suffix("px") {
        return v.trim().parse().ok().map(Length::Px);
    }
    if let Some(v) = s.strip_suffix("rem") {
        return v.trim().parse::<f32>().ok().map(|v| Length::Px(v * 16.0));
    }
    if let Some(v) = s.strip_suffix("em") {
        return v.trim().parse::<f32>().ok().map(|v| Length::Px(v * em));
    }
    s.parse().ok().map(Length::Px)
}

fn px(value: Option<&Value>, em: f32) -> Option<f32> {
    value.and_then(|v| parse_length(v, em)).map(|l| match l {
        Length::Px(v) => v,
        Length::Percent(_) => 0.0,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Edges {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

impl Edges {
    fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    /// CSS shorthand with one to four values
    fn parse(value: Option<&Value>, em: f32) -> Edges {
        let values: Vec<f32> = match value {
            Some(Value::Number(n)) => vec![n.as_f64().unwrap_or(0.0) as f32],
            Some(Value::String(s)) => s
                .split_whitespace()
                .map(|part| match parse_length_str(part, em) {
                    Some(Length::Px(v)) => v,
                    _ => 0.0,
                })
                .collect(),
            _ => Vec::new(),
        };
        let (top, right, bottom, left) = match values[..] {
            [all] => (all, all, all, all),
            [v, h] => (v, h, v, h),
            [t, h, b] => (t, h, b, h),
            [t, r, b, l, ..] => (t, r, b, l),
            [] => (0.0, 0.0, 0.0, 0.0),
        };
        Edges {
            top,
            right,
            bottom,
            left,
        }
    }

    fn with_sides(mut self, style: &serde_json::Map<String, Value>, prefix: &str, em: f32) -> Edges {
        if let Some(v) = px(style.get(&format!("{}Top", prefix)), em) {
            self.top = v;
        }
        if let Some(v) = px(style.get(&format!("{}Right", prefix)), em) {
            self.right = v;
        }
        if let Some(v) = px(style.get(&format!("{}Bottom", prefix)), em) {
            self.bottom = v;
        }
        if let Some(v) = px(style.get(&format!("{}Left", prefix)), em) {
            self.left = v;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Justify {
    Start,
    Center,
    End,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Start,
    Center,
    End,
    Stretch,
}

#[derive(Debug, Clone)]
struct BoxStyle {
    width: Option<Length>,
    height: Option<Length>,
    padding: Edges,
    margin: Edges,
    direction: Direction,
    justify: Justify,
    align: Align,
    gap: f32,
    background: Option<Fill>,
    border: Option<(f32, String)>,
    radius: f32,
    opacity: f32,
}

fn resolve_box(style: Option<&serde_json::Map<String, Value>>, em: f32) -> BoxStyle {
    let empty = serde_json::Map::new();
    let s = style.unwrap_or(&empty);
    let get_str = |k: &str| s.get(k).and_then(Value::as_str);

    let flex = get_str("display") == Some("flex");
    let direction = match get_str("flexDirection") {
        Some("row") | Some("row-reverse") => Direction::Row,
        Some("column") | Some("column-reverse") => Direction::Column,
        _ if flex => Direction::Row,
        _ => Direction::Column,
    };
    let justify = match get_str("justifyContent") {
        Some("center") => Justify::Center,
        Some("flex-end") | Some("end") => Justify::End,
        Some("space-between") => Justify::SpaceBetween,
        Some("space-around") => Justify::SpaceAround,
        Some("space-evenly") => Justify::SpaceEvenly,
        _ => Justify::Start,
    };
    let align = match get_str("alignItems") {
        Some("center") => Align::Center,
        Some("flex-start") | Some("start") => Align::Start,
        Some("flex-end") | Some("end") => Align::End,
        _ => Align::Stretch,
    };

    let background = get_str("backgroundImage")
        .filter(|_| !s.contains_key("backgroundSize"))
        .and_then(Fill::parse)
        .or_else(|| get_str("background").and_then(Fill::parse))
        .or_else(|| get_str("backgroundColor").and_then(Fill::parse));

    let border = get_str("border").and_then(|b| {
        let mut width = None;
        let mut color = None;
        for part in b.split_whitespace() {
            match parse_length_str(part, em) {
                Some(Length::Px(v)) if width.is_none() => width = Some(v),
                _ if matches!(part, "solid" | "dashed" | "dotted") => {}
                _ => color = Some(part.to_string()),
            }
        }
        width.filter(|w| *w > 0.0).map(|w| (w, color.unwrap_or_else(|| "black".to_string())))
    });

    BoxStyle {
        width: s.get("width").and_then(|v| parse_length(v, em)),
        height: s.get("height").and_then(|v| parse_length(v, em)),
        padding: Edges::parse(s.get("padding"), em).with_sides(s, "padding", em),
        margin: Edges::parse(s.get("margin"), em).with_sides(s, "margin", em),
        direction,
        justify,
        align,
        gap: px(s.get("gap"), em).unwrap_or(0.0),
        background,
        border,
        radius: px(s.get("borderRadius"), em).unwrap_or(0.0),
        opacity: s
            .get("opacity")
            .and_then(Value::as_f64)
            .map(|o| o.clamp(0.0, 1.0) as f32)
            .unwrap_or(1.0),
    }
}

fn inherit_text(parent: &TextStyle, style: Option<&serde_json::Map<String, Value>>) -> TextStyle {
    let mut t = parent.clone();
    let Some(s) = style else {
        return t;
    };
    if let Some(size) = px(s.get("fontSize"), parent.size) {
        t.size = size;
    }
    if let Some(family) = s.get("fontFamily").and_then(Value::as_str) {
        t.family = family.to_string();
    }
    match s.get("fontWeight") {
        Some(Value::Number(n)) => t.weight = n.as_u64().unwrap_or(400).min(1000) as u16,
        Some(Value::String(w)) => {
            t.weight = match w.as_str() {
                "bold" => 700,
                "normal" => 400,
                other => other.parse().unwrap_or(t.weight),
            }
        }
        _ => {}
    }
    if let Some(style) = s.get("fontStyle").and_then(Value::as_str) {
        t.italic = style == "italic" || style == "oblique";
    }
    if let Some(color) = s.get("color").and_then(Value::as_str) {
        t.color = color.to_string();
    }
    match s.get("lineHeight") {
        Some(Value::Number(n)) => t.line_height = n.as_f64().unwrap_or(1.2) as f32,
        Some(Value::String(v)) if v == "normal" => t.line_height = 1.2,
        Some(Value::String(v)) => {
            if let Some(Length::Px(h)) = parse_length_str(v, t.size) {
                if t.size > 0.0 {
                    t.line_height = h / t.size;
                }
            }
        }
        _ => {}
    }
    if let Some(ls) = px(s.get("letterSpacing"), t.size) {
        t.letter_spacing = ls;
    }
    if let Some(align) = s.get("textAlign").and_then(Value::as_str) {
        t.align = match align {
            "center" => TextAlign::Center,
            "right" | "end" => TextAlign::End,
            _ => TextAlign::Start,
        };
    }
    if let Some(tt) = s.get("textTransform").and_then(Value::as_str) {
        t.uppercase = tt == "uppercase";
    }
    t
}

/// Styled box tree
enum Item {
    Block {
        style: BoxStyle,
        children: Vec<Item>,
    },
    Text {
        text: String,
        style: TextStyle,
    },
    Svg {
        style: BoxStyle,
        width: f32,
        height: f32,
        markup: String,
    },
}

impl Item {
    fn style(&self) -> Option<&BoxStyle> {
        match self {
            Item::Block { style, .. } | Item::Svg { style, .. } => Some(style),
            Item::Text { .. } => None,
        }
    }

    fn margin(&self) -> Edges {
        self.style().map(|s| s.margin).unwrap_or_default()
    }
}

fn build(node: &ElementNode, parent_text: &TextStyle) -> Item {
    let style_map = node.style_map();
    let text_style = inherit_text(parent_text, style_map);
    let style = resolve_box(style_map, text_style.size);

    if node.tag.eq_ignore_ascii_case("svg") {
        let attr_px = |key: &str| node.attributes.get(key).and_then(|v| parse_length(v, 16.0));
        let view_box: Vec<f32> = node
            .attr_str("viewBox")
            .map(|vb| {
                vb.split(|c: char| c == ',' || c.is_whitespace())
                    .filter_map(|p| p.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        let width = style
            .width
            .or_else(|| attr_px("width"))
            .map(|l| l.resolve(0.0))
            .or_else(|| view_box.get(2).copied())
            .unwrap_or(0.0);
        let height = style
            .height
            .or_else(|| attr_px("height"))
            .map(|l| l.resolve(0.0))
            .or_else(|| view_box.get(3).copied())
            .unwrap_or(0.0);
        let mut markup = String::new();
        serialize_svg_attributes(node, &mut markup, true);
        markup.push('>');
        for child in &node.children {
            serialize_svg_node(child, &mut markup);
        }
        markup.push_str("</svg>");
        return Item::Svg {
            style,
            width,
            height,
            markup,
        };
    }

    let children = node
        .children
        .iter()
        .filter_map(|child| match child {
            Node::Element(e) => Some(build(e, &text_style)),
            Node::Text(t) if t.trim().is_empty() => None,
            Node::Text(t) => Some(Item::Text {
                text: t.clone(),
                style: text_style.clone(),
            }),
        })
        .collect();
    Item::Block { style, children }
}

fn kebab_case(name: &str) -> String {
    if CAMEL_CASE_SVG_ATTRS.contains(&name) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Attributes of an svg element. The root's own size and position are
/// written by the paint pass, so they are skipped there.
fn serialize_svg_attributes(node: &ElementNode, out: &mut String, root: bool) {
    for (key, value) in &node.attributes {
        if key == "style" || key == "xmlns" {
            continue;
        }
        if root && matches!(key.as_str(), "width" | "height" | "x" | "y") {
            continue;
        }
        if !is_xml_name(key) {
            continue;
        }
        if let Some(text) = attribute_text(value) {
            if is_href(key) && !is_embedded_reference(&text) {
                debug!("dropping external {}={:?} from inline svg", key, text);
                continue;
            }
            out.push(' ');
            out.push_str(&kebab_case(key));
            out.push_str("=\"");
            out.push_str(&escape(&text));
            out.push('"');
        }
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}

fn is_href(key: &str) -> bool {
    key.eq_ignore_ascii_case("href") || key.eq_ignore_ascii_case("xlink:href")
}

/// Fragment references and inline data only; nothing that reaches the
/// filesystem or the network.
fn is_embedded_reference(value: &str) -> bool {
    let value = value.trim_start();
    value.starts_with('#') || value.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

fn serialize_svg_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&escape(t)),
        Node::Element(e) if !is_xml_name(&e.tag) => {
            debug!("dropping inline svg element with invalid name {:?}", e.tag);
        }
        Node::Element(e) => {
            out.push('<');
            out.push_str(&e.tag);
            serialize_svg_attributes(e, out, false);
            if e.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &e.children {
                serialize_svg_node(child, out);
            }
            out.push_str("</");
            out.push_str(&e.tag);
            out.push('>');
        }
    }
}

struct Ctx<'b, 'f> {
    book: &'b FontBook<'f>,
    out: Vec<PaintCommand>,
}

impl Ctx<'_, '_> {
    /// Border-box size of `item` given the space offered by its parent.
    fn measure(&self, item: &Item, avail_w: f32, avail_h: Option<f32>) -> (f32, f32) {
        match item {
            Item::Text { text, style } => {
                let block = text::measure(self.book, style, text, avail_w);
                (block.width, block.height)
            }
            Item::Svg { width, height, .. } => (*width, *height),
            Item::Block { style, children } => {
                let explicit_w = style.width.map(|l| l.resolve(avail_w));
                let explicit_h = match (style.height, avail_h) {
                    (Some(Length::Percent(p)), Some(h)) => Some(h * p / 100.0),
                    (Some(Length::Px(v)), _) => Some(v),
                    _ => None,
                };
                let inner_w = (explicit_w.unwrap_or(avail_w) - style.padding.horizontal()).max(0.0);
                let inner_h = explicit_h.map(|h| (h - style.padding.vertical()).max(0.0));

                let sizes: Vec<(f32, f32)> = children
                    .iter()
                    .map(|c| {
                        let m = c.margin();
                        let (w, h) = self.measure(c, (inner_w - m.horizontal()).max(0.0), inner_h);
                        (w + m.horizontal(), h + m.vertical())
                    })
                    .collect();
                let gaps = style.gap * sizes.len().saturating_sub(1) as f32;
                let (content_w, content_h) = match style.direction {
                    Direction::Column => (
                        sizes.iter().map(|s| s.0).fold(0.0, f32::max),
                        sizes.iter().map(|s| s.1).sum::<f32>() + gaps,
                    ),
                    Direction::Row => (
                        sizes.iter().map(|s| s.0).sum::<f32>() + gaps,
                        sizes.iter().map(|s| s.1).fold(0.0, f32::max),
                    ),
                };
                (
                    explicit_w.unwrap_or(content_w + style.padding.horizontal()),
                    explicit_h.unwrap_or(content_h + style.padding.vertical()),
                )
            }
        }
    }

    /// Paint `item` into the border box at `(x, y, w, h)`.
    fn place(&mut self, item: &Item, x: f32, y: f32, w: f32, h: f32) {
        match item {
            Item::Text { text, style } => {
                let block = text::measure(self.book, style, text, w);
                text::paint(self.book, style, &block, x, y, w, &mut self.out);
            }
            Item::Svg {
                style,
                width,
                height,
                markup,
            } => {
                let faded = style.opacity < 1.0;
                if faded {
                    self.out.push(PaintCommand::PushOpacity(style.opacity));
                }
                self.out.push(PaintCommand::Svg {
                    x,
                    y,
                    width: *width,
                    height: *height,
                    markup: markup.clone(),
                });
                if faded {
                    self.out.push(PaintCommand::Pop);
                }
            }
            Item::Block { style, children } => {
                let faded = style.opacity < 1.0;
                if faded {
                    self.out.push(PaintCommand::PushOpacity(style.opacity));
                }
                if style.background.is_some() || style.border.is_some() {
                    self.out.push(PaintCommand::Rect {
                        x,
                        y,
                        width: w,
                        height: h,
                        fill: style.background.clone(),
                        radius: style.radius,
                        stroke: style.border.clone(),
                    });
                }
                self.place_children(style, children, x, y, w, h);
                if faded {
                    self.out.push(PaintCommand::Pop);
                }
            }
        }
    }

    fn place_children(&mut self, style: &BoxStyle, children: &[Item], x: f32, y: f32, w: f32, h: f32) {
        if children.is_empty() {
            return;
        }
        let inner_x = x + style.padding.left;
        let inner_y = y + style.padding.top;
        let inner_w = (w - style.padding.horizontal()).max(0.0);
        let inner_h = (h - style.padding.vertical()).max(0.0);
        let row = style.direction == Direction::Row;

        // (border-box width, border-box height, margins)
        let boxes: Vec<(f32, f32, Edges)> = children
            .iter()
            .map(|c| {
                let m = c.margin();
                let (mut cw, mut ch) = self.measure(c, (inner_w - m.horizontal()).max(0.0), Some(inner_h));
                let stretch = style.align == Align::Stretch;
                let fixed = c.style();
                if row {
                    if stretch && fixed.map_or(true, |s| s.height.is_none()) && !matches!(c, Item::Svg { .. }) {
                        ch = (inner_h - m.vertical()).max(0.0);
                    }
                } else if (stretch || matches!(c, Item::Text { .. }))
                    && fixed.map_or(true, |s| s.width.is_none())
                    && !matches!(c, Item::Svg { .. })
                {
                    cw = (inner_w - m.horizontal()).max(0.0);
                }
                (cw, ch, m)
            })
            .collect();

        let main_total: f32 = boxes
            .iter()
            .map(|(cw, ch, m)| if row { cw + m.horizontal() } else { ch + m.vertical() })
            .sum::<f32>()
            + style.gap * (boxes.len() - 1) as f32;
        let free = (if row { inner_w } else { inner_h }) - main_total;
        let n = boxes.len() as f32;
        let (mut cursor, between) = match style.justify {
            Justify::Start => (0.0, 0.0),
            Justify::Center => (free / 2.0, 0.0),
            Justify::End => (free, 0.0),
            Justify::SpaceBetween if n > 1.0 => (0.0, free.max(0.0) / (n - 1.0)),
            Justify::SpaceBetween => (0.0, 0.0),
            Justify::SpaceAround => (free.max(0.0) / n / 2.0, free.max(0.0) / n),
            Justify::SpaceEvenly => (free.max(0.0) / (n + 1.0), free.max(0.0) / (n + 1.0)),
        };

        for (child, (cw, ch, m)) in children.iter().zip(boxes) {
            let cross_avail = if row { inner_h - m.vertical() } else { inner_w - m.horizontal() };
            let cross_size = if row { ch } else { cw };
            let cross_offset = match style.align {
                Align::Start | Align::Stretch => 0.0,
                Align::Center => (cross_avail - cross_size) / 2.0,
                Align::End => cross_avail - cross_size,
            };
            let (cx, cy) = if row {
                (inner_x + cursor + m.left, inner_y + m.top + cross_offset)
            } else {
                (inner_x + m.left + cross_offset, inner_y + cursor + m.top)
            };
            self.place(child, cx, cy, cw, ch);
            cursor += if row { cw + m.horizontal() } else { ch + m.vertical() };
            cursor += style.gap + between;
        }
    }
}
