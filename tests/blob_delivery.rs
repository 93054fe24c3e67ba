//! Blob uploads against a local storage endpoint

#![cfg(feature = "remote")]

use std::sync::{mpsc, Arc};

use cardsmith::fonts::{BundledFont, BundledFontResolver, FontStyle, WeightSpec};
use cardsmith::render::{MarkupRequest, Orchestrator, OutputTarget, RenderStage};
use cardsmith::sink::{content_addressed_name, BlobSink, OutputSink};
use cardsmith::tools::Tools;
use cardsmith::{Error, TemplateRegistry};
use serde_json::json;
use tiny_http::{Header, Method, Response, Server};

struct Upload {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: Vec<u8>,
}

/// Accepts PUTs and answers with the public URL; `/fail/*` answers 500.
fn start_blob_server() -> (String, mpsc::Receiver<Upload>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.server_addr().to_ip().unwrap());
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = Vec::new();
            let _ = request.as_reader().read_to_end(&mut body);
            let path = request.url().to_string();
            let authorization = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_string());
            let _ = tx.send(Upload {
                method: request.method().clone(),
                path: path.clone(),
                authorization,
                body,
            });
            if path.starts_with("/fail/") {
                let _ = request.respond(Response::from_string("quota exceeded").with_status_code(500));
                continue;
            }
            let resp = Response::from_string(
                json!({"url": format!("https://public.blob.test{}", path)}).to_string(),
            )
            .with_header("Content-Type: application/json".parse::<Header>().unwrap());
            let _ = request.respond(resp);
        }
    });

    (base, rx)
}

#[tokio::test]
async fn upload_is_content_addressed_and_authorized() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let (base, uploads) = start_blob_server();
    let sink = BlobSink::new(&base, "secret-token", "cardsmith-test").unwrap();

    let bytes = b"image bytes".to_vec();
    let url = sink.put(bytes.clone(), "cards/hello.png").await.unwrap();

    let expected = content_addressed_name("cards/hello.png", &bytes);
    assert_eq!(url, format!("https://public.blob.test/{}", expected));

    let upload = uploads.recv().unwrap();
    assert_eq!(upload.method, Method::Put);
    assert_eq!(upload.path, format!("/{}", expected));
    assert_eq!(upload.authorization.as_deref(), Some("Bearer secret-token"));
    assert_eq!(upload.body, bytes);
}

#[tokio::test]
async fn same_name_different_content_gets_different_objects() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let (base, _uploads) = start_blob_server();
    let sink = BlobSink::new(&base, "t", "cardsmith-test").unwrap();
    let a = sink.put(b"one".to_vec(), "image.png").await.unwrap();
    let b = sink.put(b"two".to_vec(), "image.png").await.unwrap();
    assert_ne!(a, b);
    assert!(a.ends_with(".png") && b.ends_with(".png"));
}

#[tokio::test]
async fn server_error_is_a_delivery_error() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let (base, _uploads) = start_blob_server();
    let sink = BlobSink::new(&format!("{}/fail", base), "t", "cardsmith-test").unwrap();
    let err = sink.put(b"x".to_vec(), "x.png").await.unwrap_err();
    assert!(
        matches!(err, Error::DeliveryError(ref msg) if msg.contains("500")),
        "unexpected {:?}",
        err
    );
}

#[tokio::test]
async fn markup_tool_uploads_image_png() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let (base, uploads) = start_blob_server();
    let sink = BlobSink::new(&base, "t", "cardsmith-test").unwrap();
    let inter = BundledFont::new(
        "Inter",
        FontStyle::Normal,
        WeightSpec::Variable { min: 100, max: 900 },
        vec![0u8; 16],
    );
    let orchestrator = Orchestrator::new(
        Arc::new(TemplateRegistry::builtin()),
        Arc::new(BundledFontResolver::new(vec![inter])),
    )
    .with_blob_sink(Arc::new(sink));

    let result = Tools::new(orchestrator.clone())
        .call("generate_image", json!({"jsx": "<div>Hello</div>", "width": 60, "height": 40}))
        .await;
    assert!(!result.is_error, "{}", result.joined_text());
    assert!(result.joined_text().starts_with("Image saved to: https://public.blob.test/image-"));

    let upload = uploads.recv().unwrap();
    assert!(upload.path.starts_with("/image-") && upload.path.ends_with(".png"));
    assert_eq!(&upload.body[1..4], b"PNG");

    // failures surface with their stage
    let failure = orchestrator
        .render_markup(MarkupRequest::new("x", OutputTarget::Blob("fail/boom".into())))
        .await
        .unwrap_err();
    assert_eq!(failure.stage, RenderStage::Deliver);
}
