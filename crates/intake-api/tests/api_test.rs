//! HTTP tests for the portal router over in-memory stores.
//!
//! Covers intake validation and the happy path, the synchronous trigger,
//! ownership checks on reads, the share email, and the shared report.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use docx_rs::{Docx, Paragraph, Run};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use intake_api::{parse_allowed_origins, router, AppState};
use intake_core::{DocumentStatus, EmailMessage, Error, NotificationSink, Result};
use intake_db::{FaultPlan, MemoryDatabase};
use intake_inference::mock::MockGenerationBackend;
use intake_inference::AnalysisClient;
use intake_jobs::{
    AnalysisWorker, EmailComposer, LifecycleController, WorkerConfig, WorkerHandle,
};

const STRUCTURE_JSON: &str = r#"[{"question":"What do you sell?","original_response":"boots","improved_response":"Premium hiking boots.","recommendations":["Lead with durability"],"flags":[]}]"#;
const SUMMARY: &str = "Acme sells boots.\n\nThey need reach.";
const BOUNDARY: &str = "intake-test-boundary";

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.fail {
            return Err(Error::Notification("provider down".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct TestApp {
    app: Router,
    db: MemoryDatabase,
    sink: Arc<RecordingSink>,
    user_id: Uuid,
    _worker: WorkerHandle,
}

fn build(worker_enabled: bool, sink: RecordingSink) -> TestApp {
    let db = MemoryDatabase::new();
    let stores = db.stores();
    let sink = Arc::new(sink);
    let emails = EmailComposer::new("https://portal.example");
    let backend = MockGenerationBackend::for_analysis(STRUCTURE_JSON, SUMMARY);
    let controller = LifecycleController::new(
        stores.clone(),
        AnalysisClient::new(Arc::new(backend)),
        sink.clone(),
        emails.clone(),
    );
    let (queue, worker) = AnalysisWorker::new(
        controller.clone(),
        WorkerConfig::default().with_enabled(worker_enabled),
    )
    .start();

    let state = AppState {
        stores,
        controller,
        queue,
        notifier: sink.clone(),
        emails,
        max_upload_bytes: 1024 * 1024,
        db: None,
    };
    TestApp {
        app: router(state, parse_allowed_origins("http://localhost:3000")),
        db,
        sink,
        user_id: Uuid::new_v4(),
        _worker: worker,
    }
}

fn docx_bytes(lines: &[&str]) -> Vec<u8> {
    let docx = lines.iter().fold(Docx::new(), |d, line| {
        d.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*line)))
    });
    let mut buf = Cursor::new(Vec::new());
    docx.build().pack(&mut buf).unwrap();
    buf.into_inner()
}

fn multipart_body(client_name: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(name) = client_name {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"clientName\"\r\n\r\n{}\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

impl TestApp {
    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", self.user_id.to_string())
            .header("x-user-email", "owner@agency.example")
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn upload(&self, client_name: Option<&str>, file: Option<(&str, &[u8])>) -> (StatusCode, Value) {
        let request = self
            .request("POST", "/api/v1/documents/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(client_name, file)))
            .unwrap();
        self.send(request).await
    }

    async fn uploaded_id(&self) -> Uuid {
        let (status, body) = self
            .upload(Some("Acme"), Some(("intake.docx", &docx_bytes(&["Boots."]))))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["document"]["id"].as_str().unwrap().parse().unwrap()
    }

    async fn analyse(&self, id: Uuid) -> (StatusCode, Value) {
        let request = self
            .request("POST", &format!("/api/v1/documents/{}/analyse", id))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

// =============================================================================
// INTAKE
// =============================================================================

#[tokio::test]
async fn test_upload_creates_uploading_document_and_client() {
    let t = build(false, RecordingSink::default());

    let (status, body) = t
        .upload(Some("Acme Ltd"), Some(("Intake Form (v2).docx", &docx_bytes(&["Boots."]))))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["document"]["status"], "uploading");
    assert_eq!(body["document"]["file_type"], "docx");
    assert_eq!(body["document"]["file_name"], "Intake Form (v2).docx");
    assert!(body["document"]["file_path"]
        .as_str()
        .unwrap()
        .ends_with("_Intake_Form__v2_.docx"));
    assert!(body["document"]["share_token"].is_string());
    assert_eq!(body["client"]["name"], "Acme Ltd");
}

#[tokio::test]
async fn test_upload_reuses_client_case_insensitively() {
    let t = build(false, RecordingSink::default());
    let file = docx_bytes(&["Boots."]);

    let (_, first) = t.upload(Some("Acme"), Some(("a.docx", &file))).await;
    let (_, second) = t.upload(Some("ACME"), Some(("b.docx", &file))).await;

    assert_eq!(first["client"]["id"], second["client"]["id"]);
}

#[tokio::test]
async fn test_upload_requires_client_name_and_file() {
    let t = build(false, RecordingSink::default());

    let (status, body) = t.upload(None, Some(("a.docx", b"data"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_input");

    let (status, body) = t.upload(Some("Acme"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_input");

    let (status, _) = t.upload(Some("   "), Some(("a.docx", b"data"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_executables() {
    let t = build(false, RecordingSink::default());

    let (status, body) = t
        .upload(Some("Acme"), Some(("setup.pdf", b"MZ\x90\x00payload")))
        .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "unsupported_file_type");
}

#[tokio::test]
async fn test_upload_reports_db_insert_failure() {
    let t = build(false, RecordingSink::default());
    t.db
        .set_faults(FaultPlan {
            fail_document_insert: true,
            ..Default::default()
        })
        .await;

    let (status, body) = t.upload(Some("Acme"), Some(("a.docx", b"data"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "db_insert_failed");
}

#[tokio::test]
async fn test_upload_reports_client_lookup_failure() {
    let t = build(false, RecordingSink::default());
    t.db
        .set_faults(FaultPlan {
            fail_client_lookup: true,
            ..Default::default()
        })
        .await;

    let (_, body) = t.upload(Some("Acme"), Some(("a.docx", b"data"))).await;

    assert_eq!(body["code"], "client_lookup_failed");
}

#[tokio::test]
async fn test_storage_failure_marks_document_error() {
    let t = build(false, RecordingSink::default());
    t.db
        .set_faults(FaultPlan {
            fail_blob_writes: true,
            ..Default::default()
        })
        .await;

    let (status, body) = t.upload(Some("Acme"), Some(("a.docx", b"data"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "storage_upload_failed");

    let (_, list) = t
        .send(t.request("GET", "/api/v1/documents").body(Body::empty()).unwrap())
        .await;
    assert_eq!(list[0]["status"], "error");
}

#[tokio::test]
async fn test_requests_without_identity_are_unauthorized() {
    let t = build(false, RecordingSink::default());

    let (status, body) = t
        .send(
            Request::builder()
                .uri("/api/v1/documents")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = t
        .send(
            Request::builder()
                .uri("/api/v1/clients")
                .header("x-user-id", "not-a-uuid")
                .header("x-user-email", "a@b.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// LIFECYCLE TRIGGER & READS
// =============================================================================

#[tokio::test]
async fn test_analyse_returns_new_versions() {
    let t = build(false, RecordingSink::default());
    let id = t.uploaded_id().await;

    let (status, body) = t.analyse(id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["analysis"]["version"], 1);

    let (_, body) = t.analyse(id).await;
    assert_eq!(body["analysis"]["version"], 2);

    let (status, doc) = t
        .send(
            t.request("GET", &format!("/api/v1/documents/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["status"], "ready");
    assert_eq!(doc["client_name"], "Acme");
    assert_eq!(doc["analyses"].as_array().unwrap().len(), 2);
    assert_eq!(doc["latest_analysis"]["version"], 2);
}

#[tokio::test]
async fn test_analyse_failure_is_reported_and_recorded() {
    let t = build(false, RecordingSink::default());
    let (_, body) = t
        .upload(Some("Acme"), Some(("blank.docx", &docx_bytes(&["  "]))))
        .await;
    let id: Uuid = body["document"]["id"].as_str().unwrap().parse().unwrap();

    let (status, body) = t.analyse(id).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "analysis_failed");
    let doc = t.db.documents();
    let stored = intake_core::DocumentRepository::get(&doc, id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Error);
}

#[tokio::test]
async fn test_analyse_while_analysing_is_conflict() {
    let t = build(false, RecordingSink::default());
    let id = t.uploaded_id().await;
    intake_core::DocumentRepository::claim_for_analysis(&t.db.documents(), id)
        .await
        .unwrap();

    let (status, body) = t.analyse(id).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_other_users_documents_are_not_found() {
    let t = build(false, RecordingSink::default());
    let id = t.uploaded_id().await;

    let stranger = |method: &str, uri: String| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", Uuid::new_v4().to_string())
            .header("x-user-email", "stranger@elsewhere.example")
    };

    let (status, _) = t
        .send(stranger("GET", format!("/api/v1/documents/{}", id)).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send(
            stranger("POST", format!("/api/v1/documents/{}/analyse", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = t
        .send(stranger("GET", "/api/v1/documents".to_string()).body(Body::empty()).unwrap())
        .await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_documents_and_clients() {
    let t = build(false, RecordingSink::default());
    t.uploaded_id().await;

    let (_, docs) = t
        .send(t.request("GET", "/api/v1/documents").body(Body::empty()).unwrap())
        .await;
    assert_eq!(docs[0]["client_name"], "Acme");

    let (_, clients) = t
        .send(t.request("GET", "/api/v1/clients").body(Body::empty()).unwrap())
        .await;
    assert_eq!(clients.as_array().unwrap().len(), 1);
    assert_eq!(clients[0]["name"], "Acme");
}

#[tokio::test]
async fn test_upload_hands_off_to_worker() {
    let t = build(true, RecordingSink::default());
    let id = t.uploaded_id().await;

    let docs = t.db.documents();
    let mut status = DocumentStatus::Uploading;
    for _ in 0..200 {
        status = intake_core::DocumentRepository::get(&docs, id)
            .await
            .unwrap()
            .unwrap()
            .status;
        if status == DocumentStatus::Ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, DocumentStatus::Ready);
}

// =============================================================================
// SHARING
// =============================================================================

#[tokio::test]
async fn test_share_email_sends_summary_and_link() {
    let t = build(false, RecordingSink::default());
    let id = t.uploaded_id().await;
    t.analyse(id).await;

    let request = t
        .request("POST", "/api/v1/share/email")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({"document_id": id, "email": "ceo@client.example"}).to_string(),
        ))
        .unwrap();
    let (status, body) = t.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let sent = t.sink.sent.lock().unwrap().clone();
    let share = sent
        .iter()
        .find(|m| m.to == "ceo@client.example")
        .expect("share email");
    assert_eq!(share.subject, "Analysis Report: Acme");
    assert!(share.text.contains("They need reach."));
    assert!(share.text.contains("https://portal.example/shared/"));
}

#[tokio::test]
async fn test_share_email_failure_is_reported() {
    let t = build(
        false,
        RecordingSink {
            fail: true,
            ..Default::default()
        },
    );
    let id = t.uploaded_id().await;

    let request = t
        .request("POST", "/api/v1/share/email")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({"document_id": id, "email": "ceo@client.example"}).to_string(),
        ))
        .unwrap();
    let (status, body) = t.send(request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "notification_failed");
}

#[tokio::test]
async fn test_shared_report_only_when_ready() {
    let t = build(false, RecordingSink::default());
    let (_, body) = t
        .upload(Some("Acme"), Some(("intake.docx", &docx_bytes(&["Boots."]))))
        .await;
    let id: Uuid = body["document"]["id"].as_str().unwrap().parse().unwrap();
    let token = body["document"]["share_token"].as_str().unwrap().to_string();
    let shared = || {
        Request::builder()
            .uri(format!("/api/v1/shared/{}", token))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = t.send(shared()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    t.analyse(id).await;
    let (status, report) = t.send(shared()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["client_name"], "Acme");
    assert_eq!(report["analysis"]["version"], 1);
    assert!(report.get("file_path").is_none());
    assert!(report.get("user_id").is_none());

    let (status, _) = t
        .send(
            Request::builder()
                .uri("/api/v1/shared/not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let t = build(false, RecordingSink::default());

    let (status, body) = t
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "memory");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let t = build(false, RecordingSink::default());
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
