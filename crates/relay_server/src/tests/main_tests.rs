use super::*;
use async_trait::async_trait;
use axum::{body, body::Body, http::Request};
use relay_api::{MailError, MailTransport, OutgoingMail};
use shared::locale::Locale;
use tokio::sync::Mutex;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().await.push(mail.clone());
        Ok(())
    }
}

fn test_app() -> (Router, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let state = AppState {
        relay: RelayContext {
            transport: transport.clone(),
            locale: Locale::En,
            fallback_domain: "relay.local".into(),
        },
        max_body_bytes: 1024,
    };
    (build_router(Arc::new(state)), transport)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn notification_json() -> String {
    serde_json::json!({
        "clientEmail": "c@x.com",
        "adminEmail": "admin@studio.test",
        "projectTitle": "Logo",
        "description": "Minimal mark",
        "action": "created"
    })
    .to_string()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _) = test_app();
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn send_email_mails_client_and_admin_copy() {
    let (app, transport) = test_app();
    let request = Request::post("/send_email")
        .header("content-type", "application/json")
        .header("host", "studio.example:8080")
        .body(Body::from(notification_json()))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "status": "success" }));

    let sent = transport.sent.lock().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "c@x.com");
    assert_eq!(sent[0].subject, "New design update");
    assert_eq!(sent[1].to, "admin@studio.test");
    assert_eq!(sent[1].subject, "Copy: New design update");
    assert_eq!(sent[0].from, "no-reply@studio.example");
}

#[tokio::test]
async fn root_path_accepts_notifications_too() {
    let (app, transport) = test_app();
    let request = Request::post("/")
        .header("content-type", "application/json")
        .body(Body::from(notification_json()))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.sent.lock().await.len(), 2);
}

#[tokio::test]
async fn localized_action_without_description_is_relayed() {
    let (app, transport) = test_app();
    let body = serde_json::json!({
        "clientEmail": "c@x.com",
        "adminEmail": "admin@studio.test",
        "projectTitle": "Logo",
        "action": "aprobado"
    })
    .to_string();
    let request = Request::post("/send_email")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "status": "success" }));

    let sent = transport.sent.lock().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "c@x.com");
    assert_eq!(sent[1].to, "admin@studio.test");
}

#[tokio::test]
async fn unparseable_body_returns_error_status() {
    let (app, transport) = test_app();
    let request = Request::post("/send_email")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(transport.sent.lock().await.is_empty());
}

#[tokio::test]
async fn empty_body_reports_no_data() {
    let (app, _) = test_app();
    let request = Request::post("/send_email")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "status": "error", "message": "no data" })
    );
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let (app, transport) = test_app();
    let request = Request::post("/send_email")
        .header("content-type", "application/json")
        .header("content-length", "4096")
        .body(Body::from(vec![b' '; 4096]))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(transport.sent.lock().await.is_empty());
}

#[tokio::test]
async fn cors_preflight_is_fully_open() {
    let (app, _) = test_app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/send_email")
        .header("origin", "https://studio.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn cross_origin_post_carries_allow_origin() {
    let (app, _) = test_app();
    let request = Request::post("/send_email")
        .header("origin", "https://studio.example")
        .header("content-type", "application/json")
        .body(Body::from(notification_json()))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn review_session_round_trip_through_relay() {
    use client_core::{ClientSettings, ReviewSession};
    use shared::domain::{SubmissionDraft, SubmissionStatus};

    let (app, transport) = test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let settings = ClientSettings {
        relay_url: Some(format!("http://{addr}/send_email").parse().expect("url")),
        admin_email: "admin@studio.test".into(),
        ..ClientSettings::default()
    };
    let mut session = ReviewSession::from_settings(&settings).expect("session");

    let created = session
        .upload(SubmissionDraft::new("Logo", "c@x.com").with_description("Minimal mark"))
        .expect("upload");
    assert!(created.notification.await.expect("join").is_delivered());

    session.login_client("C@X.com ").expect("login");
    let approved = session
        .approve(created.submission.id, "Great")
        .expect("approve");
    assert_eq!(approved.submission.status, SubmissionStatus::Approved);
    assert!(approved.notification.await.expect("join").is_delivered());

    let sent = transport.sent.lock().await;
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().all(|mail| mail.body.contains("Minimal mark")));
    assert_eq!(session.notification_log().await.len(), 4);
}
