//! Declarative parameter schemas and field-level validation.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Primitive type of a template parameter, with optional bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
        choices: Option<Vec<&'static str>>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
        integer: bool,
    },
    Boolean,
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String { .. } => "string",
            FieldKind::Number { integer: true, .. } => "integer",
            FieldKind::Number { .. } => "number",
            FieldKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: &'static str,
}

impl FieldSpec {
    fn with_kind(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description: "",
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::with_kind(
            name,
            FieldKind::String {
                min_len: None,
                max_len: None,
                choices: None,
            },
        )
    }

    pub fn number(name: &'static str) -> Self {
        Self::with_kind(
            name,
            FieldKind::Number {
                min: None,
                max: None,
                integer: false,
            },
        )
    }

    pub fn integer(name: &'static str) -> Self {
        Self::with_kind(
            name,
            FieldKind::Number {
                min: None,
                max: None,
                integer: true,
            },
        )
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::with_kind(name, FieldKind::Boolean)
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// A field with a default is never reported missing.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    pub fn max_len(mut self, max: usize) -> Self {
        if let FieldKind::String { max_len, .. } = &mut self.kind {
            *max_len = Some(max);
        }
        self
    }

    pub fn min_len(mut self, min: usize) -> Self {
        if let FieldKind::String { min_len, .. } = &mut self.kind {
            *min_len = Some(min);
        }
        self
    }

    pub fn choices(mut self, allowed: &[&'static str]) -> Self {
        if let FieldKind::String { choices, .. } = &mut self.kind {
            *choices = Some(allowed.to_vec());
        }
        self
    }

    pub fn range(mut self, lo: f64, hi: f64) -> Self {
        if let FieldKind::Number { min, max, .. } = &mut self.kind {
            *min = Some(lo);
            *max = Some(hi);
        }
        self
    }

    fn check(&self, value: &Value) -> Option<ViolationKind> {
        match (&self.kind, value) {
            (
                FieldKind::String {
                    min_len,
                    max_len,
                    choices,
                },
                Value::String(s),
            ) => {
                let len = s.chars().count();
                if let Some(min) = min_len {
                    if len < *min {
                        return Some(ViolationKind::TooShort { min: *min });
                    }
                }
                if let Some(max) = max_len {
                    if len > *max {
                        return Some(ViolationKind::TooLong { max: *max });
                    }
                }
                if let Some(allowed) = choices {
                    if !allowed.contains(&s.as_str()) {
                        return Some(ViolationKind::NotAllowed {
                            allowed: allowed.iter().map(|a| a.to_string()).collect(),
                        });
                    }
                }
                None
            }
            (FieldKind::Number { min, max, integer }, Value::Number(n)) => {
                let v = n.as_f64().unwrap_or(f64::NAN);
                if *integer && v.fract() != 0.0 {
                    return Some(ViolationKind::WrongType {
                        expected: "integer",
                        found: "number",
                    });
                }
                if let Some(min) = min {
                    if v < *min {
                        return Some(ViolationKind::BelowMinimum { min: *min });
                    }
                }
                if let Some(max) = max {
                    if v > *max {
                        return Some(ViolationKind::AboveMaximum { max: *max });
                    }
                }
                None
            }
            (FieldKind::Boolean, Value::Bool(_)) => None,
            (kind, other) => Some(ViolationKind::WrongType {
                expected: kind.type_name(),
                found: json_type_name(other),
            }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Ordered set of fields a template accepts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamSchema {
    fields: Vec<FieldSpec>,
}

impl ParamSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate `params`, collecting every violation. On success returns the
    /// declared fields only, with defaults filled in.
    pub fn validate(&self, params: &Value) -> Result<TemplateParams, ValidationErrors> {
        let empty = Map::new();
        let input = match params {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ValidationErrors::single(
                    "",
                    ViolationKind::WrongType {
                        expected: "object",
                        found: json_type_name(other),
                    },
                ))
            }
        };

        let mut out = Map::new();
        let mut violations = Vec::new();
        for field in &self.fields {
            match input.get(field.name) {
                // An explicit null counts as absent.
                None | Some(Value::Null) => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.to_string(), default.clone());
                    } else if field.required {
                        violations.push(FieldViolation {
                            field: field.name.to_string(),
                            kind: ViolationKind::Missing,
                        });
                    }
                }
                Some(value) => match field.check(value) {
                    Some(kind) => violations.push(FieldViolation {
                        field: field.name.to_string(),
                        kind,
                    }),
                    None => {
                        out.insert(field.name.to_string(), value.clone());
                    }
                },
            }
        }

        if violations.is_empty() {
            Ok(TemplateParams(out))
        } else {
            Err(ValidationErrors { violations })
        }
    }

    /// Per-field `{type, required, description, default?}` summary.
    pub fn describe(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| {
                let info = FieldInfo {
                    kind: f.kind.type_name(),
                    required: f.required,
                    description: f.description,
                    default: f.default.clone(),
                };
                (
                    f.name.to_string(),
                    serde_json::to_value(info).unwrap_or(Value::Null),
                )
            })
            .collect()
    }
}

#[derive(Serialize)]
struct FieldInfo {
    #[serde(rename = "type")]
    kind: &'static str,
    required: bool,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

/// Validated, default-filled template parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateParams(Map<String, Value>);

impl TemplateParams {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, or "" when absent.
    pub fn str(&self, key: &str) -> &str {
        self.opt_str(key).unwrap_or_default()
    }

    /// String value of `key`; empty strings count as absent.
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Missing,
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    TooShort {
        min: usize,
    },
    TooLong {
        max: usize,
    },
    BelowMinimum {
        min: f64,
    },
    AboveMaximum {
        max: f64,
    },
    NotAllowed {
        allowed: Vec<String>,
    },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => write!(f, "required"),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "expected {}, received {}", expected, found)
            }
            ViolationKind::TooShort { min } => write!(f, "must be at least {} characters", min),
            ViolationKind::TooLong { max } => write!(f, "must be at most {} characters", max),
            ViolationKind::BelowMinimum { min } => write!(f, "must be >= {}", min),
            ViolationKind::AboveMaximum { max } => write!(f, "must be <= {}", max),
            ViolationKind::NotAllowed { allowed } => {
                write!(f, "must be one of: {}", allowed.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Field name; empty for the parameter object itself
    pub field: String,
    pub kind: ViolationKind,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "params: {}", self.kind)
        } else {
            write!(f, "{}: {}", self.field, self.kind)
        }
    }
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    pub violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    fn single(field: &str, kind: ViolationKind) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.to_string(),
                kind,
            }],
        }
    }

    /// Whether any violation names `field`
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ParamSchema {
        ParamSchema::new(vec![
            FieldSpec::string("title").max_len(10),
            FieldSpec::string("color").default_value("#000"),
            FieldSpec::integer("count").range(1.0, 5.0).optional(),
            FieldSpec::string("mode").choices(&["light", "dark"]).optional(),
            FieldSpec::boolean("flag").optional(),
        ])
    }

    #[test]
    fn fills_defaults_and_strips_unknown_keys() {
        let params = schema()
            .validate(&json!({"title": "Hi", "extra": 1}))
            .unwrap();
        assert_eq!(params.str("title"), "Hi");
        assert_eq!(params.str("color"), "#000");
        assert!(params.get("extra").is_none());
        assert!(params.get("count").is_none());
    }

    #[test]
    fn collects_every_violation() {
        let err = schema()
            .validate(&json!({
                "title": "far too long a title",
                "count": 9,
                "mode": "sepia",
                "flag": "yes"
            }))
            .unwrap_err();
        assert_eq!(err.violations.len(), 4);
        assert!(err.mentions("title"));
        assert!(err.mentions("count"));
        assert!(err.mentions("mode"));
        assert!(err.mentions("flag"));
    }

    #[test]
    fn missing_required_and_wrong_type() {
        let err = schema().validate(&json!({"count": 2.5})).unwrap_err();
        assert_eq!(
            err.violations,
            vec![
                FieldViolation {
                    field: "title".into(),
                    kind: ViolationKind::Missing
                },
                FieldViolation {
                    field: "count".into(),
                    kind: ViolationKind::WrongType {
                        expected: "integer",
                        found: "number"
                    }
                },
            ]
        );
        assert_eq!(err.to_string(), "title: required; count: expected integer, received number");
    }

    #[test]
    fn non_object_params_are_rejected() {
        let err = schema().validate(&json!(["title"])).unwrap_err();
        assert_eq!(err.to_string(), "params: expected object, received array");
    }

    #[test]
    fn describe_reports_type_required_and_default() {
        let info = schema().describe();
        assert_eq!(
            info.get("color"),
            Some(&json!({"type": "string", "required": false, "description": "", "default": "#000"}))
        );
        assert_eq!(info.get("title").and_then(|t| t.get("required")), Some(&json!(true)));
    }
}
