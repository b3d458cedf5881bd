//! End-to-end request flow over real sockets.
//!
//! Every test boots a full `Server` on an ephemeral port and drives it with
//! a plain HTTP client: prefixed routing, virtual hosts, redirect domains,
//! request guardrails, and the built-in operational endpoints.

mod common;

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::BoxError;
use futures_util::future::BoxFuture;
use manifold::health::HealthCheck;
use manifold::http::{response, RequestContext};
use manifold::{DomainConfig, Route, Server};
use reqwest::header::HOST;

fn text_route(method: Method, path: &str, body: &'static str) -> Route {
    Route::new(
        method,
        path,
        move |_req: Request, _ctx: RequestContext| async move {
            response::text(StatusCode::OK, body)
        },
    )
}

#[tokio::test]
async fn test_registered_route_served_with_request_id_echo() {
    let server = Server::from_config(common::test_config()).unwrap();
    server
        .register(Route::new(
            Method::GET,
            "/users",
            |_req: Request, _ctx: RequestContext| async {
                response::json(
                    StatusCode::OK,
                    &serde_json::json!({ "users": ["ada", "grace"] }),
                )
            },
        ))
        .unwrap();
    let (addr, _task) = common::spawn_server(server).await;

    let res = common::client()
        .get(format!("http://{addr}/api/v1/users"))
        .header("x-request-id", "e2e-7f3a")
        .send()
        .await
        .expect("request failed");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("e2e-7f3a"),
        "well-formed inbound request id should be echoed"
    );
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["users"][0], "ada");
}

#[tokio::test]
async fn test_unknown_route_is_404_json() {
    let server = Server::from_config(common::test_config()).unwrap();
    let (addr, _task) = common::spawn_server(server).await;

    let res = common::client()
        .get(format!("http://{addr}/api/v1/missing"))
        .send()
        .await
        .expect("request failed");

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no route matches the request");
}

#[tokio::test]
async fn test_preflight_options_answered_automatically() {
    let server = Server::from_config(common::test_config()).unwrap();
    server
        .register(text_route(Method::GET, "/users", "listing"))
        .unwrap();
    let (addr, _task) = common::spawn_server(server).await;

    let res = common::client()
        .request(Method::OPTIONS, format!("http://{addr}/api/v1/users"))
        .send()
        .await
        .expect("request failed");

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_body_rejected_with_413() {
    let mut config = common::test_config();
    config.limits.max_body_bytes = 1024;
    let server = Server::from_config(config).unwrap();
    server
        .register(Route::new(
            Method::POST,
            "/ingest",
            |req: Request, _ctx: RequestContext| async move {
                let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
                    .await
                    .unwrap_or_default();
                response::text(StatusCode::OK, bytes.len().to_string())
            },
        ))
        .unwrap();
    let (addr, _task) = common::spawn_server(server).await;
    let client = common::client();
    let url = format!("http://{addr}/api/v1/ingest");

    let res = client
        .post(&url)
        .body(vec![0u8; 4096])
        .send()
        .await
        .expect("request failed");
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["max_bytes"], 1024);

    let res = client
        .post(&url)
        .body("small enough")
        .send()
        .await
        .expect("request failed");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "12");
}

#[tokio::test]
async fn test_host_header_selects_domain_table() {
    let server = Server::from_config(common::test_config()).unwrap();
    server
        .register(text_route(Method::GET, "/ping", "top-level"))
        .unwrap();
    server
        .register_domain(
            DomainConfig::new("api.example.com")
                .route(text_route(Method::GET, "/ping", "api domain")),
        )
        .unwrap();
    let (addr, _task) = common::spawn_server(server).await;
    let client = common::client();
    let url = format!("http://{addr}/api/v1/ping");

    // Host matching ignores case and port.
    let res = client
        .get(&url)
        .header(HOST, "API.example.com:9999")
        .send()
        .await
        .expect("request failed");
    assert_eq!(res.text().await.unwrap(), "api domain");

    // No matching virtual host and no default: the top-level table answers.
    let res = client.get(&url).send().await.expect("request failed");
    assert_eq!(res.text().await.unwrap(), "top-level");
}

#[tokio::test]
async fn test_redirect_domain_308_preserves_path_and_query() {
    let server = Server::from_config(common::test_config()).unwrap();
    server
        .register_domain(
            DomainConfig::new("old.example.com").redirect_to("canonical.example.com"),
        )
        .unwrap();
    let (addr, _task) = common::spawn_server(server).await;

    // The stock client would chase the redirect; this one reports it.
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap();
    let res = client
        .get(format!("http://{addr}/docs/setup?page=2"))
        .header(HOST, "old.example.com")
        .send()
        .await
        .expect("request failed");

    assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(
        res.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("http://canonical.example.com/docs/setup?page=2")
    );
}

#[tokio::test]
async fn test_builtin_endpoints_respond() {
    let server = Server::from_config(common::test_config()).unwrap();
    let (addr, _task) = common::spawn_server(server).await;
    let client = common::client();

    let res = client
        .get(format!("http://{addr}/healthz"))
        .send()
        .await
        .expect("liveness request failed");
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let res = client
        .get(format!("http://{addr}/readyz"))
        .send()
        .await
        .expect("readiness request failed");
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("http://{addr}/metrics"))
        .send()
        .await
        .expect("metrics request failed");
    assert_eq!(res.status(), StatusCode::OK);
    let text = res.text().await.unwrap();
    assert!(text.contains("# TYPE manifold_http_requests_total counter"));
    assert!(
        text.contains("manifold_http_requests_total{method=\"GET\",status=\"200\"}"),
        "earlier requests should already be counted:\n{text}"
    );
    assert!(text.contains(
        "manifold_http_request_duration_seconds_count{method=\"GET\",endpoint=\"/healthz\"}"
    ));
}

#[tokio::test]
async fn test_builtin_endpoints_answer_despite_default_domain() {
    let server = Server::from_config(common::test_config()).unwrap();
    server
        .register_domain(
            DomainConfig::new("app.example.com")
                .default_domain()
                .route(text_route(Method::GET, "/ping", "app")),
        )
        .unwrap();
    let (addr, _task) = common::spawn_server(server).await;
    let client = common::client();

    // The default domain swallows every unmatched host, yet the
    // operational endpoints must keep answering.
    let res = client
        .get(format!("http://{addr}/healthz"))
        .send()
        .await
        .expect("liveness request failed");
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("http://{addr}/readyz"))
        .header(HOST, "app.example.com")
        .send()
        .await
        .expect("readiness request failed");
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("http://{addr}/api/v1/ping"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(res.text().await.unwrap(), "app");
}

struct BrokenDependency;

impl HealthCheck for BrokenDependency {
    fn name(&self) -> &str {
        "object-store"
    }

    fn check(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        Box::pin(async { Err(BoxError::from("bucket unreachable")) })
    }
}

#[tokio::test]
async fn test_failing_check_flips_readiness() {
    let server = Server::from_config(common::test_config()).unwrap();
    server.register_health_check(BrokenDependency);
    let (addr, _task) = common::spawn_server(server).await;

    let res = common::client()
        .get(format!("http://{addr}/readyz"))
        .send()
        .await
        .expect("request failed");

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "unready");
    assert_eq!(body["checks"][0]["name"], "object-store");
    assert_eq!(body["checks"][0]["error"], "bucket unreachable");
}

#[tokio::test]
async fn test_handler_panic_surfaces_as_500() {
    let server = Server::from_config(common::test_config()).unwrap();
    server
        .register(Route::new(
            Method::GET,
            "/explode",
            |_req: Request, _ctx: RequestContext| async {
                panic!("exploded on purpose");
                #[allow(unreachable_code)]
                response::empty(StatusCode::OK)
            },
        ))
        .unwrap();
    let (addr, _task) = common::spawn_server(server).await;

    let res = common::client()
        .get(format!("http://{addr}/api/v1/explode"))
        .send()
        .await
        .expect("connection should survive the panic");

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "internal server error");
    // Development mode, so the panic text is included for debugging.
    assert_eq!(body["detail"], "exploded on purpose");
    assert!(body["request_id"].is_string());
}
