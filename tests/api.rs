mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use certifier::application::generation::GenerationRequest;
use certifier::domain::types::{CertificateStatus, JobType};
use support::{API_TOKEN, Harness, PUBLIC_BASE_URL};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {API_TOKEN}"))
        .body(Body::empty())
        .expect("request")
}

fn post(uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-api-key", API_TOKEN);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

async fn seeded() -> Harness {
    let harness = Harness::new();
    harness.finished_event(
        10,
        "Semana de Tecnologia",
        &[(1, "Ana Lima", "ana@example.com"), (2, "Bruno Reis", "bruno@example.com")],
    );
    harness
        .generation()
        .generate_for_event(GenerationRequest {
            event_id: 10,
            force: false,
            send_email: false,
        })
        .await
        .expect("generation");
    harness
}

#[tokio::test]
async fn health_reflects_database_ping() {
    let harness = Harness::new();

    let response = harness
        .router(true)
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().contains_key("x-request-id"));

    let response = harness
        .router(false)
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn protected_routes_require_a_known_token() {
    let harness = Harness::new();

    let response = harness
        .router(true)
        .oneshot(
            Request::get("/api/v1/certificates")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "unauthorized");

    let response = harness
        .router(true)
        .oneshot(
            Request::get("/api/v1/certificates")
                .header(header::AUTHORIZATION, "Bearer wrong-token")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/certificates"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn list_filters_and_paginates_certificates() {
    let harness = seeded().await;

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/certificates?event_id=10&participant_id=2"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["participant_name"], "Bruno Reis");
    assert_eq!(body["items"][0]["status"], "generated");
    assert_eq!(body["items"][0]["can_resend"], true);

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/certificates?limit=1&offset=1"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["offset"], 1);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/certificates?status=sent"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn certificate_detail_carries_links() {
    let harness = seeded().await;
    let certificate = harness.certificates.by_pair(10, 1).await.expect("row");

    let response = harness
        .router(true)
        .oneshot(get(&format!("/api/v1/certificates/{}", certificate.id)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["validation_code"], certificate.validation_code.as_str());
    assert_eq!(
        body["file_name"],
        format!("certificado_{}.pdf", certificate.validation_code)
    );
    assert_eq!(
        body["validation_url"],
        format!("{PUBLIC_BASE_URL}/api/v1/validate/{}", certificate.validation_code)
    );

    let response = harness
        .router(true)
        .oneshot(get(&format!("/api/v1/certificates/{}", uuid::Uuid::new_v4())))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_returns_pdf_attachment() {
    let harness = seeded().await;
    let certificate = harness.certificates.by_pair(10, 1).await.expect("row");

    let response = harness
        .router(true)
        .oneshot(get(&format!(
            "/api/v1/certificates/{}/download",
            certificate.id
        )))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("ascii")
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains(&certificate.validation_code));

    let bytes = body_bytes(response).await;
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn resend_queues_delivery_with_optional_override() {
    let harness = seeded().await;
    let certificate = harness.certificates.by_pair(10, 1).await.expect("row");
    let uri = format!("/api/v1/certificates/{}/resend", certificate.id);

    let response = harness
        .router(true)
        .oneshot(post(&uri, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["job_type"], JobType::DeliverCertificate.as_str());
    assert!(body["job_id"].as_str().is_some_and(|id| !id.is_empty()));

    let response = harness
        .router(true)
        .oneshot(post(&uri, Some(json!({ "email": "outro@example.com" }))))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let payloads = harness.jobs.payloads(JobType::DeliverCertificate).await;
    assert_eq!(payloads.len(), 2);
    assert!(payloads[0].get("recipient_override").is_none());
    assert_eq!(payloads[1]["recipient_override"], "outro@example.com");

    let response = harness
        .router(true)
        .oneshot(post(&uri, Some(json!({ "email": "not-an-address" }))))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resend_rejects_certificates_already_sent() {
    let harness = seeded().await;
    let certificate = harness.certificates.by_pair(10, 1).await.expect("row");
    harness
        .delivery()
        .deliver(certificate.id, None)
        .await
        .expect("delivered");

    let response = harness
        .router(true)
        .oneshot(post(
            &format!("/api/v1/certificates/{}/resend", certificate.id),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "cannot_resend");
}

#[tokio::test]
async fn generation_endpoints_queue_jobs() {
    let harness = Harness::new();

    let response = harness
        .router(true)
        .oneshot(post(
            "/api/v1/certificates/generate-event",
            Some(json!({ "event_id": 10, "force_regenerate": true })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["job_type"], JobType::GenerateEventCertificates.as_str());

    let payloads = harness
        .jobs
        .payloads(JobType::GenerateEventCertificates)
        .await;
    assert_eq!(payloads[0]["event_id"], 10);
    assert_eq!(payloads[0]["force_regenerate"], true);
    assert_eq!(payloads[0]["send_email"], true);

    let response = harness
        .router(true)
        .oneshot(post(
            "/api/v1/certificates/generate-participant",
            Some(json!({ "event_id": 10, "participant_id": 3, "send_email": false })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = harness
        .router(true)
        .oneshot(post(
            "/api/v1/certificates/generate-event",
            Some(json!({ "event_id": 0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn queued_job_status_is_visible() {
    let harness = Harness::new();

    let response = harness
        .router(true)
        .oneshot(post("/api/v1/processed-events/scan", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = json_body(response).await["job_id"]
        .as_str()
        .expect("job id")
        .to_string();

    let response = harness
        .router(true)
        .oneshot(get(&format!("/api/v1/jobs/{job_id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["id"], job_id.as_str());
    assert_eq!(body["job_type"], JobType::ScanFinishedEvents.as_str());
    assert_eq!(body["state"], "Pending");

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/jobs/unknown"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_endpoints_summarize_progress() {
    let harness = seeded().await;
    let certificate = harness.certificates.by_pair(10, 1).await.expect("row");
    harness
        .delivery()
        .deliver(certificate.id, None)
        .await
        .expect("delivered");
    harness.maintenance().refresh_counters().await.expect("refresh");

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/certificates/stats"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["generated"], 1);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["delivered"], 1);
    assert_eq!(body["undelivered"], 1);

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/processed-events/stats"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["processed_events"], 1);
    assert_eq!(body["complete_events"], 0);
    assert_eq!(body["certificates_generated"], 2);
    assert_eq!(body["average_per_event"], 2.0);

    let response = harness
        .router(true)
        .oneshot(get("/api/v1/processed-events"))
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["event_id"], 10);
    assert_eq!(body["items"][0]["sent_count"], 1);
    assert_eq!(body["items"][0]["complete"], false);
}

#[tokio::test]
async fn reprocess_requires_a_processed_event() {
    let harness = seeded().await;

    let response = harness
        .router(true)
        .oneshot(post("/api/v1/processed-events/10/reprocess", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payloads = harness
        .jobs
        .payloads(JobType::GenerateEventCertificates)
        .await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["force_regenerate"], true);
    assert_eq!(payloads[0]["send_email"], false);

    let response = harness
        .router(true)
        .oneshot(post("/api/v1/processed-events/999/reprocess", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_is_public_and_counts_successful_lookups() {
    let harness = seeded().await;
    let certificate = harness.certificates.by_pair(10, 1).await.expect("row");

    let response = harness
        .router(true)
        .oneshot(
            Request::get(format!(
                "/api/v1/validate/{}",
                certificate.validation_code.to_ascii_lowercase()
            ))
            .body(Body::empty())
            .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["code"], certificate.validation_code.as_str());
    assert_eq!(body["participant_name"], "Ana Lima");
    assert_eq!(body["event_name"], "Semana de Tecnologia");

    let row = harness.certificates.by_pair(10, 1).await.expect("row");
    assert_eq!(row.validation_count, 1);
    assert!(row.last_validated_at.is_some());

    let response = harness
        .router(true)
        .oneshot(
            Request::get("/api/v1/validate/NAOEXISTE")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["valid"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn unknown_well_formed_code_is_invalid_without_side_effects() {
    let harness = seeded().await;
    let before = harness.certificates.all().await;

    let response = harness
        .router(true)
        .oneshot(
            Request::get("/api/v1/validate/abcdef0123456789")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "ABCDEF0123456789");
    assert!(body["message"].is_string());

    assert_eq!(harness.certificates.all().await, before);
}

#[tokio::test]
async fn failed_certificate_does_not_validate() {
    let harness = seeded().await;
    let certificate = harness.certificates.by_pair(10, 2).await.expect("row");
    harness
        .certificates
        .put(certifier::domain::certificates::Certificate {
            status: CertificateStatus::Error,
            ..certificate.clone()
        })
        .await;

    let response = harness
        .router(true)
        .oneshot(
            Request::get(format!("/api/v1/validate/{}", certificate.validation_code))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let body = json_body(response).await;
    assert_eq!(body["valid"], false);
    let row = harness.certificates.by_pair(10, 2).await.expect("row");
    assert_eq!(row.validation_count, 0);
}
