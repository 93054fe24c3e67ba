//! Tool calls as a client would issue them

use std::sync::Arc;

use cardsmith::fonts::{BundledFont, BundledFontResolver, FontStyle, WeightSpec};
use cardsmith::render::{LayoutEngine, LayoutOptions, Orchestrator, Rasterizer};
use cardsmith::tools::Tools;
use cardsmith::{ElementNode, Result, TemplateRegistry};
use serde_json::{json, Value};

fn orchestrator() -> Orchestrator {
    let variable = |family: &str| {
        BundledFont::new(family, FontStyle::Normal, WeightSpec::Variable { min: 100, max: 900 }, vec![0u8; 8])
    };
    let fonts = BundledFontResolver::new(vec![variable("Inter"), variable("Roboto")]);
    Orchestrator::new(Arc::new(TemplateRegistry::builtin()), Arc::new(fonts))
}

fn tools() -> Tools {
    Tools::new(orchestrator())
}

/// Takes its time so that later calls can overtake it
struct SlowLayout;

impl LayoutEngine for SlowLayout {
    fn layout(&self, tree: &ElementNode, _options: &LayoutOptions) -> Result<String> {
        std::thread::sleep(std::time::Duration::from_millis(300));
        Ok(tree.text_content())
    }
}

struct EchoRaster;

impl Rasterizer for EchoRaster {
    fn rasterize(&self, svg: &str, _width: u32) -> Result<Vec<u8>> {
        Ok(svg.as_bytes().to_vec())
    }
}

#[tokio::test]
async fn generate_from_template_writes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/blog.png");
    let result = tools()
        .call(
            "generate_from_template",
            json!({
                "template": "blog-header",
                "params": {"title": "Shipping", "author": "Sam", "date": "Today"},
                "outputPath": path,
                "width": 600,
                "height": 315,
            }),
        )
        .await;

    assert!(!result.is_error, "{}", result.joined_text());
    assert_eq!(
        result.joined_text(),
        format!(
            "Image generated from template \"blog-header\" (600x315) and saved to: {}",
            path.display()
        )
    );
    assert!(path.exists());
}

#[tokio::test]
async fn unknown_template_enumerates_registered_names() {
    let dir = tempfile::tempdir().unwrap();
    let result = tools()
        .call(
            "generate_from_template",
            json!({
                "template": "unknown-name",
                "params": {},
                "outputPath": dir.path().join("x.png"),
            }),
        )
        .await;

    assert!(result.is_error);
    let text = result.joined_text();
    assert!(text.starts_with("Template \"unknown-name\" not found. Available templates: "));
    for name in TemplateRegistry::builtin().names() {
        assert!(text.contains(&name), "{} missing from {}", name, text);
    }
}

#[tokio::test]
async fn generate_image_writes_markup_to_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jsx.png");
    let result = tools()
        .call(
            "generate_image",
            json!({
                "jsx": r##"{"type":"div","props":{"style":{"backgroundColor":"#fff"}},"children":["Hi"]}"##,
                "outputPath": path,
                "googleFonts": [{"name": "Roboto", "weight": 450}],
            }),
        )
        .await;
    assert!(!result.is_error, "{}", result.joined_text());
    assert_eq!(result.joined_text(), format!("Image saved to: {}", path.display()));
    assert!(path.exists());
}

#[tokio::test]
async fn blob_tool_without_storage_reports_delivery_failure() {
    let result = tools()
        .call(
            "generate_image_from_template",
            json!({"template": "social-card", "params": {"title": "Hello"}}),
        )
        .await;
    assert!(result.is_error);
    assert!(result.joined_text().starts_with("delivery failed"));
}

#[tokio::test]
async fn out_of_range_quality_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = tools()
        .call(
            "generate_from_template",
            json!({
                "template": "social-card",
                "params": {"title": "Hello"},
                "outputPath": dir.path().join("q.png"),
                "quality": 0,
            }),
        )
        .await;
    assert!(result.is_error);
    assert!(result.joined_text().contains("quality"));
}

#[tokio::test]
async fn serve_answers_fast_calls_while_slow_ones_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slow.out");
    let tools = Tools::new(
        orchestrator()
            .with_layout(Arc::new(SlowLayout))
            .with_rasterizer(Arc::new(EchoRaster)),
    );
    let input = format!(
        "{}\n{}\n\nnot json\n",
        json!({"id": 1, "tool": "generate_image", "arguments": {"jsx": "<p>slow</p>", "outputPath": path}}),
        json!({"id": "two", "tool": "list_templates"}),
    );

    let mut output = Vec::new();
    cardsmith::serve::serve(tools, input.as_bytes(), &mut output).await.unwrap();

    let replies: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(replies.len(), 3);
    // the slow render finishes last even though it was sent first
    assert_eq!(replies[2]["id"], json!(1));
    assert_eq!(
        replies[2]["result"]["content"][0]["text"],
        json!(format!("Image saved to: {}", path.display()))
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "slow");

    let listed = replies.iter().find(|r| r["id"] == json!("two")).unwrap();
    assert!(listed["result"]["content"][0]["text"].as_str().unwrap().contains("social-card"));
    let malformed = replies.iter().find(|r| r["id"].is_null()).unwrap();
    assert_eq!(malformed["result"]["isError"], json!(true));
}
