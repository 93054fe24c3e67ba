use serde_json::json;

use super::{FieldSpec, ParamSchema, TemplateDefinition, TemplateParams};
use crate::element::ElementNode;
use crate::fonts::FontRequest;
use crate::Size;

pub(super) fn all() -> Vec<TemplateDefinition> {
    vec![
        social_card(),
        blog_header(),
        social_card_grid(),
        quote(),
        geometric(),
    ]
}

const TITLE_MAX: usize = 300;

fn social_card() -> TemplateDefinition {
    TemplateDefinition {
        name: "social-card",
        description: "Social media card with title and description",
        size: Size::new(1200, 630),
        fonts: vec![FontRequest::normal("Inter", 700), FontRequest::normal("Inter", 400)],
        schema: ParamSchema::new(vec![
            FieldSpec::string("title")
                .min_len(1)
                .max_len(TITLE_MAX)
                .describe("Main title text for the social card"),
            FieldSpec::string("description")
                .optional()
                .describe("Optional description text"),
            FieldSpec::string("backgroundColor")
                .default_value("#1a1a1a")
                .describe("Background color (CSS color value)"),
        ]),
        generate: generate_social_card,
    }
}

fn generate_social_card(p: &TemplateParams) -> ElementNode {
    ElementNode::new("div")
        .style(json!({
            "display": "flex",
            "flexDirection": "column",
            "justifyContent": "center",
            "alignItems": "center",
            "width": "100%",
            "height": "100%",
            "backgroundColor": p.opt_str("backgroundColor").unwrap_or("#1a1a1a"),
            "color": "#ffffff",
            "fontFamily": "Inter",
            "padding": "60px",
        }))
        .child(
            ElementNode::new("h1")
                .style(json!({
                    "fontSize": "72px",
                    "fontWeight": 700,
                    "marginBottom": "30px",
                    "textAlign": "center",
                    "lineHeight": 1.2,
                }))
                .text(p.str("title")),
        )
        .child_opt(p.opt_str("description").map(|d| {
            ElementNode::new("p")
                .style(json!({
                    "fontSize": "32px",
                    "fontWeight": 400,
                    "textAlign": "center",
                    "opacity": 0.8,
                    "lineHeight": 1.4,
                }))
                .text(d)
        }))
}

fn blog_header() -> TemplateDefinition {
    TemplateDefinition {
        name: "blog-header",
        description: "Blog post header image",
        size: Size::new(1920, 1080),
        fonts: vec![FontRequest::normal("Roboto", 900), FontRequest::normal("Roboto", 400)],
        schema: ParamSchema::new(vec![
            FieldSpec::string("title")
                .min_len(1)
                .max_len(TITLE_MAX)
                .describe("Blog post title"),
            FieldSpec::string("author").optional().describe("Author name"),
            FieldSpec::string("date").optional().describe("Publication date"),
            FieldSpec::string("background")
                .optional()
                .describe("CSS gradient background"),
        ]),
        generate: generate_blog_header,
    }
}

fn generate_blog_header(p: &TemplateParams) -> ElementNode {
    let author = p.opt_str("author");
    let date = p.opt_str("date");
    let byline = (author.is_some() || date.is_some()).then(|| {
        let span = |text: &str| ElementNode::new("span").text(text);
        ElementNode::new("div")
            .style(json!({
                "display": "flex",
                "gap": "20px",
                "fontSize": "28px",
                "fontWeight": 400,
                "opacity": 0.9,
            }))
            .child_opt(author.map(span))
            .child_opt(author.and(date).map(|_| span("\u{2022}")))
            .child_opt(date.map(span))
    });

    ElementNode::new("div")
        .style(json!({
            "display": "flex",
            "flexDirection": "column",
            "justifyContent": "center",
            "alignItems": "center",
            "width": "100%",
            "height": "100%",
            "background": p
                .opt_str("background")
                .unwrap_or("linear-gradient(135deg, #667eea 0%, #764ba2 100%)"),
            "color": "#ffffff",
            "fontFamily": "Roboto",
            "padding": "80px",
        }))
        .child(
            ElementNode::new("h1")
                .style(json!({
                    "fontSize": "96px",
                    "fontWeight": 900,
                    "marginBottom": "40px",
                    "textAlign": "center",
                    "lineHeight": 1.1,
                }))
                .text(p.str("title")),
        )
        .child_opt(byline)
}

fn social_card_grid() -> TemplateDefinition {
    TemplateDefinition {
        name: "social-card-grid",
        description: "Social media card with grid background",
        size: Size::new(1200, 630),
        fonts: vec![
            FontRequest::normal("Playfair Display", 700),
            FontRequest::normal("Playfair Display", 400),
        ],
        schema: ParamSchema::new(vec![
            FieldSpec::string("title")
                .min_len(1)
                .max_len(TITLE_MAX)
                .describe("Main title text for the social card"),
            FieldSpec::string("description")
                .optional()
                .describe("Optional description text"),
            FieldSpec::string("background")
                .optional()
                .describe("CSS gradient background"),
        ]),
        generate: generate_social_card_grid,
    }
}

fn generate_social_card_grid(p: &TemplateParams) -> ElementNode {
    ElementNode::new("div")
        .style(json!({
            "display": "flex",
            "flexDirection": "column",
            "justifyContent": "center",
            "alignItems": "center",
            "width": "100%",
            "height": "100%",
            "background": p.opt_str("background").unwrap_or("#1a1a1a"),
            "backgroundImage": "linear-gradient(rgba(255,255,255,0.1) 1px, transparent 1px), linear-gradient(90deg, rgba(255,255,255,0.1) 1px, transparent 1px)",
            "backgroundSize": "50px 50px",
            "color": "#ffffff",
            "fontFamily": "Playfair Display",
            "padding": "80px",
            "position": "relative",
        }))
        .child(
            ElementNode::new("h1")
                .style(json!({
                    "fontSize": "92px",
                    "fontWeight": 700,
                    "textAlign": "center",
                    "lineHeight": 1.2,
                    "marginBottom": "0px",
                }))
                .text(p.str("title")),
        )
        .child_opt(p.opt_str("description").map(|d| {
            ElementNode::new("p")
                .style(json!({
                    "fontSize": "32px",
                    "fontWeight": 400,
                    "textAlign": "center",
                    "opacity": 0.8,
                    "lineHeight": 1.2,
                }))
                .text(d)
        }))
}

fn quote() -> TemplateDefinition {
    TemplateDefinition {
        name: "quote",
        description: "Inspirational quote image",
        size: Size::new(1080, 1080),
        fonts: vec![
            FontRequest::italic("Playfair Display", 700),
            FontRequest::normal("Open Sans", 400),
        ],
        schema: ParamSchema::new(vec![
            FieldSpec::string("quote")
                .min_len(1)
                .max_len(600)
                .describe("The quote text"),
            FieldSpec::string("author").optional().describe("Quote author"),
            FieldSpec::string("background")
                .optional()
                .describe("CSS gradient background"),
        ]),
        generate: generate_quote,
    }
}

fn generate_quote(p: &TemplateParams) -> ElementNode {
    ElementNode::new("div")
        .style(json!({
            "display": "flex",
            "flexDirection": "column",
            "justifyContent": "center",
            "alignItems": "center",
            "width": "100%",
            "height": "100%",
            "background": p.opt_str("background").unwrap_or("#f7f3f0"),
            "color": "#2d2d2d",
            "padding": "80px",
        }))
        .child(
            ElementNode::new("div")
                .style(json!({
                    "fontSize": "120px",
                    "fontFamily": "Playfair Display",
                    "lineHeight": 0.5,
                    "marginBottom": "20px",
                    "opacity": 0.2,
                }))
                .text("\""),
        )
        .child(
            ElementNode::new("p")
                .style(json!({
                    "fontSize": "48px",
                    "fontFamily": "Playfair Display",
                    "fontStyle": "italic",
                    "fontWeight": 700,
                    "textAlign": "center",
                    "lineHeight": 1.3,
                    "marginBottom": "40px",
                }))
                .text(p.str("quote")),
        )
        .child_opt(p.opt_str("author").map(|a| {
            ElementNode::new("p")
                .style(json!({
                    "fontSize": "24px",
                    "fontFamily": "Open Sans",
                    "fontWeight": 400,
                    "opacity": 0.7,
                }))
                .text(format!("\u{2014} {}", a))
        }))
}

fn geometric() -> TemplateDefinition {
    TemplateDefinition {
        name: "geometric",
        description: "Geometric background",
        size: Size::new(1200, 630),
        fonts: vec![FontRequest::normal("Inter", 700), FontRequest::normal("Inter", 400)],
        schema: ParamSchema::new(vec![
            FieldSpec::string("title")
                .min_len(1)
                .max_len(TITLE_MAX)
                .describe("Main title text for the social card"),
            FieldSpec::string("description")
                .optional()
                .describe("Optional description text"),
            FieldSpec::string("background")
                .optional()
                .describe("CSS gradient background"),
        ]),
        generate: generate_geometric,
    }
}

fn shape(tag: &str, attrs: serde_json::Value) -> ElementNode {
    let mut node = ElementNode::new(tag);
    if let serde_json::Value::Object(map) = attrs {
        node.attributes = map;
    }
    node
}

fn logo() -> ElementNode {
    shape(
        "svg",
        json!({"width": "50", "height": "50", "viewBox": "0 0 50 50", "fill": "none"}),
    )
    .child(shape(
        "path",
        json!({"d": "M25 5L40 15V35L25 45L10 35V15L25 5Z", "stroke": "white", "strokeWidth": "2", "fill": "none"}),
    ))
    .child(shape("circle", json!({"cx": "25", "cy": "25", "r": "8", "fill": "white"})))
}

fn shapes() -> ElementNode {
    let outline = |tag: &str, extra: serde_json::Value, alpha: f32| {
        let mut attrs = json!({
            "stroke": format!("rgba(255,255,255,{})", alpha),
            "strokeWidth": "1",
            "fill": "none",
        });
        if let (Some(a), serde_json::Value::Object(e)) = (attrs.as_object_mut(), extra) {
            a.extend(e);
        }
        shape(tag, attrs)
    };
    shape(
        "svg",
        json!({"width": "400", "height": "300", "viewBox": "0 0 400 300", "fill": "none"}),
    )
    .style(json!({"opacity": 0.2}))
    .child(outline("circle", json!({"cx": "200", "cy": "150", "r": "80"}), 0.5))
    .child(outline("path", json!({"d": "M 320 100 L 370 180 L 270 180 Z"}), 0.4))
    .child(outline("rect", json!({"x": "50", "y": "200", "width": "60", "height": "60"}), 0.3))
    .child(outline("path", json!({"d": "M 150 50 L 190 30 L 230 50 L 230 90 L 190 110 L 150 90 Z"}), 0.4))
    .child(outline("path", json!({"d": "M 100 120 L 130 150 L 100 180 L 70 150 Z"}), 0.3))
    .child(outline("circle", json!({"cx": "340", "cy": "240", "r": "20"}), 0.3))
    .child(outline("circle", json!({"cx": "280", "cy": "60", "r": "15"}), 0.2))
}

fn generate_geometric(p: &TemplateParams) -> ElementNode {
    let heading = ElementNode::new("div")
        .style(json!({
            "display": "flex",
            "flexDirection": "column",
            "alignItems": "flex-start",
        }))
        .child(
            ElementNode::new("div")
                .style(json!({
                    "display": "flex",
                    "flexDirection": "row",
                    "alignItems": "center",
                    "gap": "20px",
                }))
                .child(logo())
                .child(
                    ElementNode::new("h1")
                        .style(json!({
                            "fontSize": "72px",
                            "fontWeight": 700,
                            "margin": 0,
                            "letterSpacing": "-2px",
                        }))
                        .text(p.str("title")),
                ),
        )
        .child(
            ElementNode::new("p")
                .style(json!({
                    "fontSize": "14px",
                    "fontWeight": 400,
                    "textTransform": "uppercase",
                    "letterSpacing": "3px",
                    "opacity": 0.6,
                    "marginTop": "10px",
                    "marginLeft": "70px",
                }))
                .text(p.str("description")),
        );

    let frame = ElementNode::new("div")
        .style(json!({
            "display": "flex",
            "flexDirection": "row",
            "justifyContent": "space-between",
            "alignItems": "flex-end",
            "width": "100%",
            "height": "100%",
            "color": "#ffffff",
            "fontFamily": "Inter, sans-serif",
            "padding": "48px",
            "border": "2px solid rgba(255,255,255,0.2)",
            "borderRadius": "24px",
        }))
        .child(heading)
        .child(shapes());

    ElementNode::new("div")
        .style(json!({
            "display": "flex",
            "width": "100%",
            "height": "100%",
            "background": p.opt_str("background").unwrap_or("#1a1a1a"),
            "padding": "12px",
        }))
        .child(frame)
}
