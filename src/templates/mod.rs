//! Template registry: named, schema-validated generators of element trees.
//!
//! The registry is built once and never mutated afterwards, so it can be
//! shared freely between concurrent requests.

use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::element::ElementNode;
use crate::fonts::FontRequest;
use crate::{Error, Result, Size};

mod builtin;
pub mod schema;

pub use schema::{
    FieldKind, FieldSpec, FieldViolation, ParamSchema, TemplateParams, ValidationErrors,
    ViolationKind,
};

/// Pure function from validated parameters to an element tree.
pub type GenerateFn = fn(&TemplateParams) -> ElementNode;

#[derive(Debug, Clone)]
pub struct TemplateDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub size: Size,
    pub fonts: Vec<FontRequest>,
    pub schema: ParamSchema,
    pub generate: GenerateFn,
}

/// Discovery view of a template, without its parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub description: String,
    pub size: Size,
}

/// Full view of a template, including parameters.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateDetails {
    pub name: String,
    pub description: String,
    pub size: Size,
    pub fonts: Vec<FontRequest>,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<TemplateDefinition>,
}

impl TemplateRegistry {
    /// Build a registry; names must be unique and every template must
    /// declare at least one font.
    pub fn new(templates: Vec<TemplateDefinition>) -> Result<Self> {
        for (i, t) in templates.iter().enumerate() {
            if t.fonts.is_empty() {
                return Err(Error::ConfigError(format!(
                    "template {} declares no fonts",
                    t.name
                )));
            }
            if templates[..i].iter().any(|o| o.name == t.name) {
                return Err(Error::ConfigError(format!(
                    "duplicate template name {}",
                    t.name
                )));
            }
        }
        Ok(Self { templates })
    }

    /// Registry holding the built-in templates.
    pub fn builtin() -> Self {
        Self {
            templates: builtin::all(),
        }
    }

    /// Process-wide built-in registry, created on first use.
    pub fn global() -> &'static TemplateRegistry {
        static REGISTRY: OnceLock<TemplateRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::builtin)
    }

    /// Look up a template by name. Surrounding whitespace is ignored; the
    /// match is otherwise exact and case-sensitive.
    pub fn get(&self, name: &str) -> Option<&TemplateDefinition> {
        let name = name.trim();
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.name.to_string()).collect()
    }

    pub fn list(&self) -> Vec<TemplateSummary> {
        self.templates
            .iter()
            .map(|t| TemplateSummary {
                name: t.name.to_string(),
                description: t.description.to_string(),
                size: t.size,
            })
            .collect()
    }

    pub fn describe(&self, name: &str) -> Result<TemplateDetails> {
        let t = self.lookup(name)?;
        Ok(TemplateDetails {
            name: t.name.to_string(),
            description: t.description.to_string(),
            size: t.size,
            fonts: t.fonts.clone(),
            parameters: t.schema.describe(),
        })
    }

    /// Validate `params` against the template schema and generate its tree.
    pub fn validate_and_generate(&self, name: &str, params: &Value) -> Result<ElementNode> {
        let t = self.lookup(name)?;
        let validated = t.schema.validate(params)?;
        Ok((t.generate)(&validated))
    }

    /// Like [`Self::get`] but reports the available names on a miss.
    pub fn lookup(&self, name: &str) -> Result<&TemplateDefinition> {
        self.get(name).ok_or_else(|| Error::TemplateNotFoundError {
            name: name.to_string(),
            available: self.names(),
        })
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_registry_lists_in_insertion_order() {
        let reg = TemplateRegistry::builtin();
        assert_eq!(
            reg.names(),
            vec!["social-card", "blog-header", "social-card-grid", "quote", "geometric"]
        );
        let first = &reg.list()[0];
        assert_eq!(first.size, Size::new(1200, 630));
    }

    #[test]
    fn lookup_trims_but_is_case_sensitive() {
        let reg = TemplateRegistry::builtin();
        assert!(reg.get("  quote\n").is_some());
        assert!(reg.get("Quote").is_none());
    }

    #[test]
    fn social_card_root_fills_canvas() {
        let reg = TemplateRegistry::builtin();
        let tree = reg
            .validate_and_generate("social-card", &json!({"title": "Hello"}))
            .unwrap();
        assert_eq!(tree.style_value("width"), Some(&json!("100%")));
        assert_eq!(tree.style_value("height"), Some(&json!("100%")));
        assert_eq!(tree.style_value("backgroundColor"), Some(&json!("#1a1a1a")));
        assert!(tree.text_content().contains("Hello"));
        assert_eq!(reg.get("social-card").map(|t| t.size), Some(Size::new(1200, 630)));
    }

    #[test]
    fn missing_title_names_the_field() {
        let reg = TemplateRegistry::builtin();
        let err = reg.validate_and_generate("social-card", &json!({})).unwrap_err();
        match err {
            Error::ValidationError(v) => assert!(v.mentions("title")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_template_lists_names() {
        let reg = TemplateRegistry::builtin();
        let err = reg.validate_and_generate("unknown-name", &json!({})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown-name"));
        for name in reg.names() {
            assert!(msg.contains(&name), "{} missing from {}", name, msg);
        }
    }

    #[test]
    fn every_builtin_root_fills_canvas() {
        let reg = TemplateRegistry::builtin();
        for t in reg.list() {
            let params = match t.name.as_str() {
                "quote" => json!({"quote": "Stay hungry", "author": "Someone"}),
                _ => json!({"title": "T", "description": "D", "author": "A", "date": "Today"}),
            };
            let tree = reg.validate_and_generate(&t.name, &params).unwrap();
            assert_eq!(tree.style_value("width"), Some(&json!("100%")), "{}", t.name);
            assert_eq!(tree.style_value("height"), Some(&json!("100%")), "{}", t.name);
        }
    }

    #[test]
    fn registry_rejects_duplicates_and_fontless_templates() {
        let mut defs = builtin::all();
        defs.push(defs[0].clone());
        assert!(matches!(TemplateRegistry::new(defs), Err(Error::ConfigError(_))));

        let mut defs = builtin::all();
        defs[1].fonts.clear();
        assert!(matches!(TemplateRegistry::new(defs), Err(Error::ConfigError(_))));
    }

    #[test]
    fn describe_includes_parameters_and_fonts() {
        let reg = TemplateRegistry::builtin();
        let details = reg.describe("quote").unwrap();
        assert!(details.parameters.contains_key("quote"));
        assert_eq!(details.fonts.len(), 2);
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["size"], json!({"width": 1080, "height": 1080}));
    }
}
