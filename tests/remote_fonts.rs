//! Remote font resolution against a local stylesheet/binary server

#![cfg(feature = "remote")]

use std::sync::mpsc;
use std::time::Duration;

use cardsmith::fonts::{FontRequest, FontResolver, FontStyle, RemoteFontResolver};
use cardsmith::{Error, RenderConfig};
use tiny_http::{Header, Response, Server};

const FONT_BYTES: &[u8] = b"\x00\x01\x00\x00fake-truetype";

/// Serves `/css2` and `/fonts/*`; unknown families get a 400 like the real
/// service. Every request URL is reported on the returned channel.
fn start_font_server(delay: Duration) -> (String, mpsc::Receiver<String>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let base = format!("http://{}", addr);
    let (tx, rx) = mpsc::channel();
    let cdn = base.clone();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let url = request.url().to_string();
            let _ = tx.send(url.clone());
            std::thread::sleep(delay);
            if url.starts_with("/css2") && url.contains("family=Nope") {
                let _ = request.respond(Response::from_string("bad family").with_status_code(400));
            } else if url.starts_with("/css2") {
                let css = format!(
                    "@font-face {{ font-family: 'Inter'; src: url(https://elsewhere.test/x.ttf); }}\n\
                     @font-face {{ font-family: 'Inter'; src: url({}/fonts/inter.ttf) format('truetype'); }}",
                    cdn
                );
                let resp = Response::from_string(css)
                    .with_header("Content-Type: text/css".parse::<Header>().unwrap());
                let _ = request.respond(resp);
            } else if url.starts_with("/fonts/") {
                let _ = request.respond(Response::from_data(FONT_BYTES.to_vec()));
            } else {
                let _ = request.respond(Response::from_string("").with_status_code(404));
            }
        }
    });

    (base, rx)
}

fn resolver(base: &str, timeout_ms: u64) -> RemoteFontResolver {
    let config = RenderConfig {
        stylesheet_base: format!("{}/css2", base),
        font_binary_host: base.to_string(),
        font_timeout_ms: timeout_ms,
        ..Default::default()
    };
    RemoteFontResolver::new(&config).unwrap()
}

#[tokio::test]
async fn resolves_snapped_weights_from_stylesheet() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let (base, requests) = start_font_server(Duration::ZERO);
    let r = resolver(&base, 5_000);

    let assets = r
        .resolve(&[
            FontRequest::normal("Inter", 450),
            FontRequest::italic("Playfair Display", 680),
        ])
        .await
        .unwrap();

    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].family(), "Inter");
    assert_eq!(assets[0].weight(), 400);
    assert_eq!(assets[0].data(), FONT_BYTES);
    assert_eq!(assets[1].weight(), 700);
    assert_eq!(assets[1].style(), FontStyle::Italic);

    let seen: Vec<String> = requests.try_iter().collect();
    assert!(seen.iter().any(|u| u.contains("family=Inter:ital,wght@0,400")));
    assert!(seen.iter().any(|u| u.contains("family=Playfair+Display:ital,wght@1,700")));
    // only the configured host is fetched
    assert!(seen.iter().all(|u| !u.contains("elsewhere")));
}

#[tokio::test]
async fn unknown_family_is_font_not_found() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let (base, _requests) = start_font_server(Duration::ZERO);
    let err = resolver(&base, 5_000)
        .resolve(&[FontRequest::normal("Inter", 400), FontRequest::normal("Nope", 400)])
        .await
        .unwrap_err();
    match err {
        Error::FontNotFoundError { family, weight, .. } => {
            assert_eq!(family, "Nope");
            assert_eq!(weight, 400);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn slow_service_times_out_as_font_not_found() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let (base, _requests) = start_font_server(Duration::from_millis(800));
    let err = resolver(&base, 150)
        .resolve(&[FontRequest::normal("Inter", 700)])
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::FontNotFoundError { ref reason, .. } if reason.contains("timed out")),
        "unexpected {:?}",
        err
    );
}
