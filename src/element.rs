//! The element tree shared by the parser, the templates and the layout engine.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

const RESERVED_ATTRIBUTE: &str = "children";

/// A tagged tree node: `tag`, free-form attributes and ordered children.
///
/// Attributes are JSON values so that a `style` attribute can carry an object
/// whose numeric properties stay numbers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Map<String, Value>,
    pub children: Vec<Node>,
}

/// A child of an [`ElementNode`]
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(ElementNode),
    Text(String),
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Map::new(),
            children: Vec::new(),
        }
    }

    /// Generic container used whenever a bare string has to become a tree.
    pub fn container(text: impl Into<String>) -> Self {
        Self::new("div").text(text)
    }

    /// Set an attribute. `children` is reserved by the descriptor form and
    /// is ignored here.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != RESERVED_ATTRIBUTE {
            self.attributes.insert(key, value.into());
        }
        self
    }

    /// Set the `style` attribute. Non-object values are ignored.
    pub fn style(mut self, style: Value) -> Self {
        if style.is_object() {
            self.attributes.insert("style".to_string(), style);
        }
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Append a child only when `child` is `Some`
    pub fn child_opt(mut self, child: Option<impl Into<Node>>) -> Self {
        if let Some(c) = child {
            self.children.push(c.into());
        }
        self
    }

    pub fn style_map(&self) -> Option<&Map<String, Value>> {
        self.attributes.get("style").and_then(Value::as_object)
    }

    pub fn style_value(&self, key: &str) -> Option<&Value> {
        self.style_map().and_then(|s| s.get(key))
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Concatenated text of this node and all descendants, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Serialize to the JSON descriptor form `{type, props, children}`.
    pub fn to_descriptor(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".to_string(), Value::String(self.tag.clone()));
        let props: Map<String, Value> = self
            .attributes
            .iter()
            .filter(|(k, _)| k.as_str() != RESERVED_ATTRIBUTE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !props.is_empty() {
            obj.insert("props".to_string(), Value::Object(props));
        }
        if !self.children.is_empty() {
            let children = self
                .children
                .iter()
                .map(|c| match c {
                    Node::Element(e) => e.to_descriptor(),
                    Node::Text(t) => Value::String(t.clone()),
                })
                .collect();
            obj.insert("children".to_string(), Value::Array(children));
        }
        Value::Object(obj)
    }

    pub fn to_json(&self) -> String {
        self.to_descriptor().to_string()
    }
}

fn collect_text(node: &ElementNode, out: &mut String) {
    for child in &node.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

impl From<ElementNode> for Node {
    fn from(e: ElementNode) -> Self {
        Node::Element(e)
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl Serialize for ElementNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_descriptor().serialize(serializer)
    }
}
