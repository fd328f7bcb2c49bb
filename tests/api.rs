use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bill_run_rust::api::{router, AppState, SESSION_HEADER};
use bill_run_rust::ReportService;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    dir: TempDir,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let service = ReportService::new(dir.path().join("out"));
        let router = router(AppState::new(service));
        Self { dir, router }
    }

    fn fixture(&self, name: &str, content: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn post_report(body: Value, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/reports")
        .header("content-type", "application/json");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_last(session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/api/reports/last");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_list_clients() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Request::builder().uri("/api/clients").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    let clients: Vec<&str> = body["clients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert_eq!(clients, vec!["Islestar", "Tysers", "ConvaTec UK", "ConvaTec iPad"]);
}

#[tokio::test]
async fn test_generate_then_fetch_last_report() {
    let app = TestApp::new();
    let roster = app.fixture(
        "services.csv",
        "Cost Centre,Name,Service,Fixed Charges\nLondon,Ann,07700900001,40.00\n",
    );
    let usage = app.fixture("usage.csv", "Service,Usage Category,Cost\n07700900001,Data UK,60.00\n");
    let data = app.fixture("data.csv", "Service,GB\n07700900001,2.5\n");

    let request = json!({
        "client": "Tysers",
        "roster_files": [roster],
        "usage_file": usage,
        "data_usage_file": data,
        "pre_tax_amount": "1,000.00",
        "total_tax_amount": 200,
        "as_of": "2026-10-19"
    });

    let (status, body) = app.send(post_report(request, Some("session-a"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["row_count"], 1);
    assert!(body["warnings"].as_array().unwrap().is_empty());

    let report_path = body["report_path"].as_str().unwrap().to_string();
    assert!(report_path.ends_with("September_2026_Bill_Run_Tysers.csv"));
    assert!(Path::new(&report_path).exists());

    let (status, last) = app.send(get_last(Some("session-a"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["report_path"], report_path.as_str());

    // 其他会话看不到
    let (status, other) = app.send(get_last(Some("session-b"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(other["success"], false);
}

#[tokio::test]
async fn test_unknown_client_is_bad_request() {
    let app = TestApp::new();
    let request = json!({ "client": "Acme", "roster_files": [] });

    let (status, body) = app.send(post_report(request, Some("session-a"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Acme"));

    // 失败的请求不会记录
    let (status, _) = app.send(get_last(Some("session-a"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_roster_column_is_bad_request() {
    let app = TestApp::new();
    let roster = app.fixture("roster.csv", "Name,Service\nAnn,0770\n");
    let usage = app.fixture("usage.csv", "Service,Usage Category,Cost\n");
    let request = json!({
        "client": "islestar",
        "roster_files": [roster],
        "usage_file": usage
    });

    let (status, body) = app.send(post_report(request, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Cost Centre"));
}

#[tokio::test]
async fn test_last_report_requires_session() {
    let app = TestApp::new();
    let (status, body) = app.send(get_last(None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains(SESSION_HEADER));
}
