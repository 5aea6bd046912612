use std::path::PathBuf;
use std::sync::Arc;

use asylum_rate::domain::YearBounds;
use asylum_rate::io::load_bundle;
use asylum_rate::predict::Predictor;
use asylum_rate::server::{AppState, build_router};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const FRONTEND: &str = "http://localhost:5173";

fn fixture_predictor() -> Predictor {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/bundle");
    let bundle = load_bundle(&dir).expect("load fixture bundle");
    Predictor::new(Arc::new(bundle), YearBounds::default())
}

async fn spawn_app(state: AppState) -> std::net::SocketAddr {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

async fn loaded_app() -> std::net::SocketAddr {
    spawn_app(AppState::new(Some(fixture_predictor()), vec![FRONTEND.to_string()])).await
}

async fn send_raw(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if let Some(body) = body {
        req.push_str("Content-Type: application/json\r\n");
        req.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    req.push_str("\r\n");
    if let Some(body) = body {
        req.push_str(body);
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

async fn post_predict(addr: std::net::SocketAddr, body: &str) -> (u16, Value) {
    let (status, _, body) = send_raw(addr, "POST", "/predict", &[], Some(body)).await;
    let json: Value = serde_json::from_str(&body).expect("json body");
    (status, json)
}

fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

#[tokio::test]
async fn predict_returns_rounded_rate_and_confidence() {
    let addr = loaded_app().await;

    let (status, json) = post_predict(
        addr,
        r#"{"origin":"Syria","asylum":"Germany","year":"2015","procedure":"Government"}"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["rate"].as_f64(), Some(75.0));
    assert_eq!(json["confidence"].as_f64(), Some(25.0));

    // Integer years are accepted too.
    let (status, json) = post_predict(
        addr,
        r#"{"origin":"Syria","asylum":"Germany","year":2015,"procedure":"Government"}"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(json["rate"].as_f64(), Some(75.0));
}

#[tokio::test]
async fn predict_rejects_invalid_input_with_detail() {
    let addr = loaded_app().await;

    let (status, json) = post_predict(
        addr,
        r#"{"origin":"Syria","asylum":"Germany","year":1999,"procedure":"Government"}"#,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(json["detail"], "Year must be between 2000 and 2016");

    let (status, json) = post_predict(
        addr,
        r#"{"origin":"Atlantis","asylum":"Germany","year":"2010","procedure":"UNHCR"}"#,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(json["detail"], "Unknown origin: Atlantis");
    assert_eq!(json["field"], "origin");
    assert_eq!(json["value"], "Atlantis");

    let (status, json) = post_predict(addr, r#"{"origin":"Syria","asylum":"Germany","year":2010}"#).await;
    assert_eq!(status, 400);
    assert_eq!(json["detail"], "Missing required field: procedure");

    let (status, json) = post_predict(addr, "{not json").await;
    assert_eq!(status, 400);
    assert!(json["detail"].as_str().unwrap_or("").starts_with("Invalid request body"));
}

#[tokio::test]
async fn health_and_info_when_loaded() {
    let addr = loaded_app().await;

    let (status, _, body) = send_raw(addr, "GET", "/health", &[], None).await;
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).expect("health json");
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["models_loaded"], true);

    let (status, _, body) = send_raw(addr, "GET", "/model/info", &[], None).await;
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).expect("info json");
    assert_eq!(json["model_type"], "XGBoost");
    assert_eq!(json["n_samples_train"], 800);
    assert_eq!(json["n_samples_test"], 200);
    assert!(json["rmse"].as_f64().is_some());
}

#[tokio::test]
async fn unloaded_service_is_unhealthy_and_refuses_predictions() {
    let addr = spawn_app(AppState::new(None, vec![FRONTEND.to_string()])).await;

    let (status, _, body) = send_raw(addr, "GET", "/health", &[], None).await;
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).expect("health json");
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["models_loaded"], false);

    let (status, json) = post_predict(
        addr,
        r#"{"origin":"Syria","asylum":"Germany","year":"2015","procedure":"Government"}"#,
    )
    .await;
    assert_eq!(status, 503);
    assert_eq!(json["detail"], "Models not loaded");

    let (status, _, _) = send_raw(addr, "GET", "/model/info", &[], None).await;
    assert_eq!(status, 503);
}

#[tokio::test]
async fn cors_allows_configured_origins_only() {
    let addr = loaded_app().await;

    let (status, head, _) = send_raw(
        addr,
        "OPTIONS",
        "/predict",
        &[
            ("Origin", FRONTEND),
            ("Access-Control-Request-Method", "POST"),
        ],
        None,
    )
    .await;
    assert_eq!(status, 204);
    assert_eq!(header(&head, "access-control-allow-origin"), Some(FRONTEND));
    assert_eq!(header(&head, "access-control-allow-methods"), Some("GET,POST,OPTIONS"));
    assert_eq!(header(&head, "access-control-allow-credentials"), Some("true"));

    let (status, head, _) = send_raw(addr, "GET", "/health", &[("Origin", FRONTEND)], None).await;
    assert_eq!(status, 200);
    assert_eq!(header(&head, "access-control-allow-origin"), Some(FRONTEND));

    let (status, head, _) = send_raw(addr, "GET", "/health", &[("Origin", "https://evil.example")], None).await;
    assert_eq!(status, 200);
    assert_eq!(header(&head, "access-control-allow-origin"), None);
}

#[tokio::test]
async fn wildcard_allow_list_admits_any_origin() {
    let addr = spawn_app(AppState::new(Some(fixture_predictor()), vec!["*".to_string()])).await;
    let (_, head, _) = send_raw(addr, "GET", "/health", &[("Origin", "https://anywhere.example")], None).await;
    assert_eq!(header(&head, "access-control-allow-origin"), Some("https://anywhere.example"));
}
