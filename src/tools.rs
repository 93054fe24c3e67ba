//! Tool invocation surface: JSON arguments in, text results out.
//!
//! Every tool returns a [`ToolResult`]; failures are reported with
//! `isError: true` and a readable message, never as an `Err`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::fonts::FontRequest;
use crate::render::{
    ImageFormat, MarkupRequest, Orchestrator, OutputTarget, RenderFailure, TemplateRequest,
    DEFAULT_QUALITY,
};
use crate::{Error, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// All text content joined by newlines
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Name and one-line description of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub const TOOLS: &[ToolInfo] = &[
    ToolInfo {
        name: "list_templates",
        description: "List all available image generation templates",
    },
    ToolInfo {
        name: "get_template",
        description: "Get the schema and required parameters for a specific template",
    },
    ToolInfo {
        name: "generate_image",
        description: "Generate an image from JSX or a JSON element descriptor",
    },
    ToolInfo {
        name: "generate_from_template",
        description: "Generate an image using a predefined template and save it to a path",
    },
    ToolInfo {
        name: "generate_image_from_template",
        description: "Generate an image using a predefined template and upload it to blob storage",
    },
];

#[derive(Debug, Clone, Deserialize)]
pub struct GetTemplateArgs {
    pub template: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageArgs {
    pub jsx: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub google_fonts: Option<Vec<FontRequest>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFromTemplateArgs {
    pub template: String,
    #[serde(default)]
    pub params: Value,
    pub output_path: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub google_fonts: Option<Vec<FontRequest>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageFromTemplateArgs {
    pub template: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub format: ImageFormat,
}

fn default_width() -> u32 {
    600
}

fn default_height() -> u32 {
    400
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

/// The tool set bound to one orchestrator.
#[derive(Clone)]
pub struct Tools {
    orchestrator: Orchestrator,
}

impl Tools {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Dispatch by tool name with raw JSON arguments.
    pub async fn call(&self, name: &str, args: Value) -> ToolResult {
        match name {
            "list_templates" => self.list_templates(),
            "get_template" => match parse_args::<GetTemplateArgs>(args) {
                Ok(a) => self.get_template(&a.template),
                Err(r) => r,
            },
            "generate_image" => match parse_args(args) {
                Ok(a) => self.generate_image(a).await,
                Err(r) => r,
            },
            "generate_from_template" => match parse_args(args) {
                Ok(a) => self.generate_from_template(a).await,
                Err(r) => r,
            },
            "generate_image_from_template" => match parse_args(args) {
                Ok(a) => self.generate_image_from_template(a).await,
                Err(r) => r,
            },
            other => {
                let names: Vec<&str> = TOOLS.iter().map(|t| t.name).collect();
                ToolResult::error(format!(
                    "Unknown tool \"{}\". Available tools: {}",
                    other,
                    names.join(", ")
                ))
            }
        }
    }

    /// Names, descriptions and sizes; parameters are left to `get_template`.
    pub fn list_templates(&self) -> ToolResult {
        let templates = self.orchestrator.registry().list();
        log::debug!("listing {} templates", templates.len());
        pretty(&json!({ "templates": templates }))
    }

    pub fn get_template(&self, name: &str) -> ToolResult {
        match self.orchestrator.registry().describe(name) {
            Ok(details) => pretty(&details),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    /// Render markup to `outputPath`, or to blob storage as `image.<ext>`.
    pub async fn generate_image(&self, args: GenerateImageArgs) -> ToolResult {
        let target = match args.output_path.filter(|p| !p.trim().is_empty()) {
            Some(path) => OutputTarget::Path(path.into()),
            None => OutputTarget::Blob(format!("image.{}", args.format.extension())),
        };
        let request = MarkupRequest {
            markup: args.jsx,
            target,
            width: Some(args.width),
            height: Some(args.height),
            fonts: args.google_fonts,
            format: args.format,
            quality: args.quality,
        };
        match self.orchestrator.render_markup(request).await {
            Ok(outcome) => ToolResult::text(format!("Image saved to: {}", outcome.location)),
            Err(failure) => failure_result(failure),
        }
    }

    pub async fn generate_from_template(&self, args: GenerateFromTemplateArgs) -> ToolResult {
        let request = TemplateRequest {
            template: args.template.clone(),
            params: args.params,
            target: OutputTarget::Path(args.output_path.into()),
            width: args.width,
            height: args.height,
            fonts: args.google_fonts,
            format: args.format,
            quality: args.quality,
        };
        self.template_result(&args.template, request).await
    }

    /// Render at the template's declared size and upload as `<template>.<ext>`.
    pub async fn generate_image_from_template(
        &self,
        args: GenerateImageFromTemplateArgs,
    ) -> ToolResult {
        let name = args.template.trim().to_string();
        let mut request = TemplateRequest::new(
            args.template.clone(),
            args.params,
            OutputTarget::Blob(format!("{}.{}", name, args.format.extension())),
        );
        request.format = args.format;
        self.template_result(&args.template, request).await
    }

    async fn template_result(&self, name: &str, request: TemplateRequest) -> ToolResult {
        match self.orchestrator.render_template(request).await {
            Ok(outcome) => ToolResult::text(format!(
                "Image generated from template \"{}\" ({}) and saved to: {}",
                name.trim(),
                size_label(outcome.size),
                outcome.location
            )),
            Err(RenderFailure {
                error: Error::ValidationError(v),
                ..
            }) => ToolResult::error(format!(
                "Invalid parameters for template \"{}\": {}",
                name.trim(),
                v
            )),
            Err(failure) => failure_result(failure),
        }
    }
}

fn size_label(size: Size) -> String {
    format!("{}x{}", size.width, size.height)
}

/// Unknown templates read as the bare error message; other failures are
/// prefixed with the failing stage.
fn failure_result(failure: RenderFailure) -> ToolResult {
    if matches!(failure.error, Error::TemplateNotFoundError { .. }) {
        ToolResult::error(failure.error.to_string())
    } else {
        ToolResult::error(failure.to_string())
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolResult> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolResult::error(format!("Invalid arguments: {}", e)))
}

fn pretty<T: Serialize>(value: &T) -> ToolResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolResult::text(text),
        Err(e) => ToolResult::error(format!("serialization failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::BundledFontResolver;
    use crate::templates::TemplateRegistry;
    use std::sync::Arc;

    fn tools() -> Tools {
        let orchestrator = Orchestrator::new(
            Arc::new(TemplateRegistry::builtin()),
            Arc::new(BundledFontResolver::default()),
        );
        Tools::new(orchestrator)
    }

    #[test]
    fn result_serializes_is_error_only_when_set() {
        let ok = serde_json::to_value(ToolResult::text("fine")).unwrap();
        assert_eq!(ok, json!({"content": [{"type": "text", "text": "fine"}]}));
        let err = serde_json::to_value(ToolResult::error("bad")).unwrap();
        assert_eq!(err["isError"], json!(true));
    }

    #[tokio::test]
    async fn list_templates_names_every_template() {
        let result = tools().call("list_templates", Value::Null).await;
        assert!(!result.is_error);
        let parsed: Value = serde_json::from_str(&result.joined_text()).unwrap();
        let names: Vec<&str> = parsed["templates"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, TemplateRegistry::builtin().names());
    }

    #[tokio::test]
    async fn get_template_unknown_lists_available() {
        let result = tools()
            .call("get_template", json!({"template": "nonexistent"}))
            .await;
        assert!(result.is_error);
        assert_eq!(
            result.joined_text(),
            "Template \"nonexistent\" not found. Available templates: \
             social-card, blog-header, social-card-grid, quote, geometric"
        );
    }

    #[tokio::test]
    async fn get_template_describes_parameters() {
        let result = tools().call("get_template", json!({"template": "quote"})).await;
        let parsed: Value = serde_json::from_str(&result.joined_text()).unwrap();
        assert_eq!(parsed["parameters"]["quote"]["required"], json!(true));
        assert_eq!(parsed["size"]["width"], json!(1080));
    }

    #[tokio::test]
    async fn invalid_params_are_reported_not_thrown() {
        let result = tools()
            .call(
                "generate_image_from_template",
                json!({"template": "social-card", "params": {}}),
            )
            .await;
        assert!(result.is_error);
        let text = result.joined_text();
        assert!(text.starts_with("Invalid parameters for template \"social-card\""));
        assert!(text.contains("title"));
    }

    #[tokio::test]
    async fn malformed_arguments_and_unknown_tools() {
        let t = tools();
        assert!(t.call("generate_from_template", json!({"template": 3})).await.is_error);
        let unknown = t.call("draw", json!({})).await;
        assert!(unknown.is_error);
        assert!(unknown.joined_text().contains("list_templates"));
    }
}
