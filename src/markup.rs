//! Markup parser: JSON descriptors first, then HTML/JSX-like tags, then plain
//! text. Parsing never fails; it degrades to a text container instead.

use scraper::{ElementRef, Html, Node as HtmlNode};
use serde_json::{Map, Number, Value};

use crate::element::{ElementNode, Node};

/// Deepest element nesting kept from tag markup; deeper subtrees collapse to
/// their text. Matches the nesting serde_json allows for descriptors.
pub const MAX_DEPTH: usize = 128;

/// Style properties the layout engine expects as numbers rather than strings.
const NUMERIC_STYLE_PROPERTIES: &[&str] = &[
    "opacity",
    "z-index",
    "font-weight",
    "line-height",
    "order",
    "flex",
    "flex-grow",
    "flex-shrink",
];

/// Parse a markup string into an element tree.
///
/// Accepts, in order of preference, a JSON element descriptor
/// (`{"type": "div", "props": {...}, "children": [...]}`), HTML/JSX-like tag
/// markup, or anything else, which is wrapped verbatim in a `div`.
pub fn parse(markup: &str) -> ElementNode {
    if let Some(node) = parse_json(markup) {
        return node;
    }
    if let Some(node) = parse_tags(markup) {
        return node;
    }
    log::debug!("markup has no structure, wrapping {} bytes as text", markup.len());
    ElementNode::container(markup)
}

/// Materialize a decoded JSON descriptor. Returns `None` when the value is
/// not something the descriptor grammar accepts.
pub fn parse_json(markup: &str) -> Option<ElementNode> {
    let value: Value = serde_json::from_str(markup).ok()?;
    match value {
        Value::String(s) => Some(ElementNode::container(s)),
        Value::Object(_) => element_from_descriptor(&value),
        _ => None,
    }
}

fn element_from_descriptor(value: &Value) -> Option<ElementNode> {
    let obj = value.as_object()?;
    let tag = obj.get("type")?.as_str()?;
    let mut props = obj
        .get("props")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let nested_children = props.remove("children");

    let mut node = ElementNode::new(tag);
    node.attributes = props;

    let children = match obj.get("children") {
        Some(c) => Some(c),
        None => nested_children.as_ref(),
    };
    match children {
        Some(Value::Array(items)) => {
            for item in items {
                push_descriptor_child(&mut node, item);
            }
        }
        Some(single) => push_descriptor_child(&mut node, single),
        None => {}
    }
    Some(node)
}

fn push_descriptor_child(parent: &mut ElementNode, value: &Value) {
    match value {
        Value::String(s) => parent.children.push(Node::Text(s.clone())),
        Value::Number(n) => parent.children.push(Node::Text(n.to_string())),
        Value::Object(_) => {
            if let Some(child) = element_from_descriptor(value) {
                parent.children.push(Node::Element(child));
            }
        }
        // Arrays nest like fragments.
        Value::Array(items) => {
            for item in items {
                push_descriptor_child(parent, item);
            }
        }
        Value::Null | Value::Bool(_) => {}
    }
}

/// Parse HTML/JSX-like markup with the HTML5 fragment grammar.
///
/// Returns `None` when the fragment contains no elements at all.
pub fn parse_tags(markup: &str) -> Option<ElementNode> {
    if !markup.contains('<') {
        return None;
    }
    let fragment = Html::parse_fragment(markup);
    let root = fragment.root_element();

    let mut top = Vec::new();
    let mut saw_element = false;
    for child in root.children() {
        match child.value() {
            HtmlNode::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    saw_element = true;
                    top.push(Node::Element(convert_element(el, 1)));
                }
            }
            HtmlNode::Text(t) => {
                if keep_text(&**t) {
                    top.push(Node::Text((**t).to_string()));
                }
            }
            _ => {}
        }
    }
    if !saw_element {
        return None;
    }

    if top.len() == 1 && matches!(top[0], Node::Element(_)) {
        if let Some(Node::Element(el)) = top.pop() {
            return Some(el);
        }
    }
    let mut wrapper = ElementNode::new("div");
    wrapper.children = top;
    Some(wrapper)
}

fn convert_element(el: ElementRef<'_>, depth: usize) -> ElementNode {
    let value = el.value();
    let mut node = ElementNode::new(value.name());
    for (name, attr) in value.attrs() {
        if name == "style" {
            node.attributes
                .insert("style".to_string(), Value::Object(parse_style(attr)));
        } else {
            node.attributes
                .insert(name.to_string(), Value::String(attr.to_string()));
        }
    }
    if depth >= MAX_DEPTH && el.children().any(|c| c.value().is_element()) {
        log::debug!("<{}> nested {} deep, keeping only its text", value.name(), depth);
        let text: String = el.text().collect();
        if !text.is_empty() {
            node.children.push(Node::Text(text));
        }
        return node;
    }
    for child in el.children() {
        match child.value() {
            HtmlNode::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    node.children.push(Node::Element(convert_element(child_el, depth + 1)));
                }
            }
            HtmlNode::Text(t) => {
                if keep_text(&**t) {
                    node.children.push(Node::Text((**t).to_string()));
                }
            }
            _ => {}
        }
    }
    node
}

/// JSX drops whitespace-only text that spans a line break.
fn keep_text(text: &str) -> bool {
    !(text.trim().is_empty() && text.contains('\n'))
}

/// Convert an inline `style` declaration list into a camelCase property map.
pub fn parse_style(declarations: &str) -> Map<String, Value> {
    let mut style = Map::new();
    for rule in declarations.split(';') {
        let Some((key, value)) = rule.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let numeric = NUMERIC_STYLE_PROPERTIES
            .iter()
            .any(|p| p.eq_ignore_ascii_case(key))
            .then(|| value.parse::<f64>().ok().and_then(Number::from_f64))
            .flatten();
        let value = match numeric {
            Some(n) => Value::Number(normalize_number(n)),
            None => Value::String(value.to_string()),
        };
        style.insert(camel_case(key), value);
    }
    style
}

// Keep integral numbers integral so `font-weight: 700` reads back as 700.
fn normalize_number(n: Number) -> Number {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Number::from(f as i64),
        _ => n,
    }
}

fn camel_case(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '-' {
            upper = !out.is_empty();
            continue;
        }
        if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_descriptor_round_trips() {
        let tree = ElementNode::new("div")
            .style(json!({"display": "flex", "opacity": 0.5}))
            .child(ElementNode::new("span").attr("id", "a").text("one"))
            .text("two");
        assert_eq!(parse(&tree.to_json()), tree);
    }

    #[test]
    fn json_singleton_children_and_scalars() {
        let node = parse(r#"{"type":"p","props":{"id":"x"},"children":"hi"}"#);
        assert_eq!(node.tag, "p");
        assert_eq!(node.children, vec![Node::Text("hi".into())]);

        let node = parse(r#"{"type":"p","children":[1, null, true, "a"]}"#);
        assert_eq!(
            node.children,
            vec![Node::Text("1".into()), Node::Text("a".into())]
        );
    }

    #[test]
    fn json_props_children_used_when_top_level_missing() {
        let node = parse(r#"{"type":"p","props":{"children":["x"],"id":"y"}}"#);
        assert_eq!(node.children, vec![Node::Text("x".into())]);
        assert!(node.attributes.get("children").is_none());
    }

    #[test]
    fn json_string_becomes_container() {
        let node = parse(r#""just text""#);
        assert_eq!(node, ElementNode::container("just text"));
    }

    #[test]
    fn nested_same_named_tags() {
        let node = parse("<div id=\"outer\"><div id=\"inner\">Hi</div><div>There</div></div>");
        assert_eq!(node.tag, "div");
        assert_eq!(node.attr_str("id"), Some("outer"));
        assert_eq!(node.children.len(), 2);
        match &node.children[0] {
            Node::Element(inner) => {
                assert_eq!(inner.attr_str("id"), Some("inner"));
                assert_eq!(inner.text_content(), "Hi");
            }
            other => panic!("unexpected child {:?}", other),
        }
    }

    #[test]
    fn inline_style_is_camel_cased_with_numeric_properties() {
        let node = parse(
            "<div style=\"background-color: #fff; font-weight: 700; opacity: .8; font-size: 32px; --accent: red\">x</div>",
        );
        assert_eq!(node.style_value("backgroundColor"), Some(&json!("#fff")));
        assert_eq!(node.style_value("fontWeight"), Some(&json!(700)));
        assert_eq!(node.style_value("opacity"), Some(&json!(0.8)));
        assert_eq!(node.style_value("fontSize"), Some(&json!("32px")));
        assert_eq!(node.style_value("--accent"), Some(&json!("red")));
    }

    #[test]
    fn non_numeric_weight_stays_a_string() {
        let style = parse_style("font-weight: bold");
        assert_eq!(style.get("fontWeight"), Some(&json!("bold")));
    }

    #[test]
    fn multiple_top_level_nodes_are_wrapped() {
        let node = parse("<h1>A</h1><p>B</p>");
        assert_eq!(node.tag, "div");
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn formatting_whitespace_between_tags_is_dropped() {
        let node = parse("<div>\n  <span>a</span>\n  <span>b</span>\n</div>");
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn plain_text_degrades_verbatim() {
        for input in ["Hello, world", "a < b", "{not json", "42 & 7", "[1,2]"] {
            let node = parse(input);
            assert_eq!(node, ElementNode::container(input), "input {:?}", input);
        }
    }

    fn depth(node: &ElementNode) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(node, 1)];
        while let Some((n, d)) = stack.pop() {
            deepest = deepest.max(d);
            for child in &n.children {
                if let Node::Element(e) = child {
                    stack.push((e, d + 1));
                }
            }
        }
        deepest
    }

    #[test]
    fn deep_nesting_collapses_to_text() {
        let levels = 20_000;
        let markup = format!("{}deep{}", "<div>".repeat(levels), "</div>".repeat(levels));
        let node = parse(&markup);
        assert_eq!(depth(&node), MAX_DEPTH);
        assert_eq!(node.text_content(), "deep");
    }

    #[test]
    fn empty_string_gives_empty_text_child() {
        let node = parse("");
        assert_eq!(node.tag, "div");
        assert_eq!(node.children, vec![Node::Text(String::new())]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn attr_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            ".{0,12}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ]
    }

    // `children` is reserved by the descriptor grammar, so it never appears
    // as an attribute of a tree that must survive a round trip.
    fn attributes() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map(
            "[a-zA-Z][a-zA-Z0-9-]{0,8}".prop_filter("reserved", |k| k != "children"),
            attr_value(),
            0..4,
        )
        .prop_map(|m| m.into_iter().collect())
    }

    fn tree() -> impl Strategy<Value = ElementNode> {
        let tag = "[a-z][a-z0-9]{0,6}";
        let leaf = (tag, attributes()).prop_map(|(tag, attributes)| ElementNode {
            tag,
            attributes,
            children: Vec::new(),
        });
        leaf.prop_recursive(4, 32, 4, move |inner| {
            let child = prop_oneof![inner.prop_map(Node::Element), ".{0,12}".prop_map(Node::Text)];
            (tag, attributes(), prop::collection::vec(child, 0..4)).prop_map(
                |(tag, attributes, children)| ElementNode {
                    tag,
                    attributes,
                    children,
                },
            )
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn descriptor_round_trips(node in tree()) {
            prop_assert_eq!(parse(&node.to_json()), node);
        }

        #[test]
        fn unstructured_text_is_kept_verbatim(text in "[^<{\\[\"]{0,64}") {
            prop_assert_eq!(parse(&text), ElementNode::container(text.clone()));
        }
    }
}
