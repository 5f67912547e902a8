//! Field Registry client tests against a local mock server

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde_json::json;
use sowlink_common::config::RegistryConfig;
use sowlink_common::RecordKind;
use sowlink_rc::registry::{to_field_records, FieldRegistryClient, RegistryError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>,
    fail: bool,
}

async fn getattributes(
    State(state): State<MockState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let page = form.get("page").cloned().unwrap_or_default();
    state.requests.lock().unwrap().push((form, auth));

    if state.fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "registry down").into_response();
    }

    let result = match page.as_str() {
        "1" => json!([
            {"prop_id": 1, "drp": "DR100", "pole": "LAW.P.A001", "site": "LAW", "latitude": "-26.1", "longitude": "28.1"},
            {"prop_id": 2, "drp": "DR200", "pole": "LAWX.P.A001", "site": "LAWX"}
        ]),
        "2" => json!([
            {"prop_id": 3, "drp": "DR101", "pole": "LAW.P.A001", "site": "law ", "latitude": -26.1, "longitude": 28.1}
        ]),
        _ => json!([]),
    };
    Json(json!({
        "success": true,
        "result": result,
        "total_pages": 2.0,
        "current_page": page.parse::<u64>().unwrap_or(0)
    }))
    .into_response()
}

async fn spawn(state: MockState) -> String {
    let app = Router::new()
        .route("/api/apps/app/getattributes", post(getattributes))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn client(base_url: String, token: Option<&str>) -> FieldRegistryClient {
    FieldRegistryClient::new(&RegistryConfig {
        base_url,
        api_token: token.map(str::to_string),
        page_size: 2,
    })
}

#[tokio::test]
async fn test_fetch_site_walks_pages_and_filters_site() {
    let state = MockState::default();
    let base = spawn(state.clone()).await;

    let records = client(base, Some("secret"))
        .fetch_site("law", None)
        .await
        .unwrap();
    let drops: Vec<_> = records.iter().filter_map(|r| r.drp.as_deref()).collect();
    assert_eq!(drops, ["DR100", "DR101"]);

    let requests = state.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let (first, auth) = &requests[0];
    assert_eq!(first["q"], "LAW");
    assert_eq!(first["page"], "1");
    assert_eq!(first["start"], "0");
    assert_eq!(first["limit"], "2");
    assert_eq!(auth.as_deref(), Some("Bearer secret"));
    assert_eq!(requests[1].0["start"], "2");
}

#[tokio::test]
async fn test_max_pages_limits_requests() {
    let state = MockState::default();
    let base = spawn(state.clone()).await;

    let records = client(base, None).fetch_site("LAW", Some(1)).await.unwrap();
    assert_eq!(records.len(), 1);

    let requests = state.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, None);
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let state = MockState {
        fail: true,
        ..Default::default()
    };
    let base = spawn(state).await;

    let err = client(base, None).fetch_site("LAW", None).await.unwrap_err();
    match err {
        RegistryError::Server { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "registry down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fetched_records_become_field_records() {
    let base = spawn(MockState::default()).await;
    let records = client(base, None).fetch_site("LAW", None).await.unwrap();

    let fields = to_field_records("LAW", &records);
    let summary: Vec<_> = fields.iter().map(|f| (f.label.as_str(), f.kind)).collect();
    assert_eq!(
        summary,
        [
            ("LAW.P.A001", RecordKind::Pole),
            ("DR100", RecordKind::Drop),
            ("DR101", RecordKind::Drop)
        ]
    );
    assert!(fields.iter().all(|f| f.latitude == Some(-26.1)));
}
