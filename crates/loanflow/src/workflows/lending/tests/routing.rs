use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::lending::domain::{LoanStatus, PersonId};
use crate::workflows::lending::memory::InMemoryAuditStore;
use crate::workflows::lending::router::{self, lending_router, LoanStatusUpdate, AUDIT_SYNC_HEADER};
use crate::workflows::lending::service::LoanApplicationService;
use crate::workflows::lending::store::StoreTimeouts;

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(service: &Arc<MemoryService>, request: Request<Body>) -> Response {
    lending_router(service.clone())
        .oneshot(request)
        .await
        .expect("route executes")
}

async fn created_loan_id(service: &Arc<MemoryService>) -> i64 {
    let response = send(
        service,
        json_request(
            Method::POST,
            "/applications",
            serde_json::to_value(submission()).unwrap(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    payload["loans"][0]["loan_id"]
        .as_i64()
        .expect("loan id present")
}

#[tokio::test]
async fn create_route_returns_created_person_with_pending_loan() {
    let (service, _, audit) = build_service();
    let service = Arc::new(service);

    let response = send(
        &service,
        json_request(
            Method::POST,
            "/applications",
            serde_json::to_value(submission()).unwrap(),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().get(AUDIT_SYNC_HEADER).is_none());
    let payload = read_json_body(response).await;
    assert_eq!(payload["person_id"], json!(1));
    assert_eq!(payload["age"], json!(30));
    assert_eq!(payload["gender"], json!("female"));
    assert_eq!(payload["home_ownership"], json!("RENT"));
    assert_eq!(payload["loans"][0]["loan_status"], json!("Pending"));
    assert_eq!(payload["loans"][0]["loan_percent_income"], json!(0.25));
    assert_eq!(payload["loans"][0]["loan_intent"], json!("EDUCATION"));
    assert_eq!(audit.documents().len(), 1);
}

#[tokio::test]
async fn create_handler_rejects_invalid_submission() {
    let (service, _, audit) = build_service();
    let mut submission = submission();
    submission.age = 12;

    let response = router::create_handler::<_, _>(
        State(Arc::new(service)),
        axum::Json(submission),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("age 12"));
    assert!(audit.documents().is_empty());
}

#[tokio::test]
async fn create_handler_returns_internal_error_when_identity_store_is_down() {
    let service = Arc::new(LoanApplicationService::new(
        Arc::new(UnavailableIdentityStore { delay: None }),
        Arc::new(InMemoryAuditStore::default()),
        fixed_engine(SAMPLE_PROBABILITY),
        StoreTimeouts::default(),
    ));

    let response = router::create_handler::<UnavailableIdentityStore, InMemoryAuditStore>(
        State(service),
        axum::Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["store"], json!("identity"));
}

#[tokio::test]
async fn create_handler_times_out_with_gateway_timeout() {
    let service = Arc::new(LoanApplicationService::new(
        Arc::new(UnavailableIdentityStore {
            delay: Some(std::time::Duration::from_secs(5)),
        }),
        Arc::new(InMemoryAuditStore::default()),
        fixed_engine(SAMPLE_PROBABILITY),
        short_timeouts(),
    ));

    let response = router::create_handler::<UnavailableIdentityStore, InMemoryAuditStore>(
        State(service),
        axum::Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn create_handler_flags_stale_audit_on_partial_success() {
    let (service, _, audit) = flaky_service();
    audit.set_failing(true);

    let response = router::create_handler::<_, _>(
        State(Arc::new(service)),
        axum::Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response
            .headers()
            .get(AUDIT_SYNC_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some("stale")
    );
}

#[tokio::test]
async fn person_route_returns_not_found_payload() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);

    let response = send(&service, empty_request(Method::GET, "/persons/404")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_json_body(response).await,
        json!({ "error": "Person not found" })
    );
}

#[tokio::test]
async fn status_route_approves_then_conflicts() {
    let (service, _, audit) = build_service();
    let service = Arc::new(service);
    let loan_id = created_loan_id(&service).await;

    let response = send(
        &service,
        json_request(
            Method::PUT,
            &format!("/loans/{loan_id}"),
            json!({ "loan_status": "Approved" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["loan_status"], json!("Approved"));
    assert_eq!(audit.documents()[0].loan_status, LoanStatus::Approved);

    let response = send(
        &service,
        json_request(
            Method::PUT,
            &format!("/loans/{loan_id}"),
            json!({ "loan_status": "Rejected" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["current_status"], json!("Approved"));
    assert_eq!(payload["requested_status"], json!("Rejected"));
}

#[tokio::test]
async fn status_handler_rejects_pending_and_unknown_labels() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let loan_id = created_loan_id(&service).await;

    for label in ["Pending", "Maybe"] {
        let response = router::update_status_handler::<_, _>(
            State(service.clone()),
            Path(loan_id),
            axum::Json(LoanStatusUpdate {
                loan_status: label.to_string(),
            }),
        )
        .await;
        assert_eq!(
            response.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "label {label} should be rejected"
        );
    }

    let person = service
        .get_person(PersonId(1))
        .await
        .expect("person readable");
    assert_eq!(person.loans[0].loan_status, LoanStatus::Pending);
}

#[tokio::test]
async fn status_route_returns_not_found_for_unknown_loan() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);

    let response = send(
        &service,
        json_request(
            Method::PUT,
            "/loans/31337",
            json!({ "loan_status": "Approved" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_json_body(response).await,
        json!({ "error": "Loan not found" })
    );
}

#[tokio::test]
async fn decision_route_reports_outcome_and_status() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let loan_id = created_loan_id(&service).await;

    let response = send(
        &service,
        empty_request(Method::POST, &format!("/loans/{loan_id}/decision")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["loan"]["loan_status"], json!("Approved"));
    assert_eq!(payload["decision"]["probability"], json!(SAMPLE_PROBABILITY));
    assert_eq!(payload["decision"]["threshold"], json!(0.75));
    assert_eq!(payload["audit"]["state"], json!("synced"));
}

#[tokio::test]
async fn decision_route_conflicts_once_decided() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let loan_id = created_loan_id(&service).await;
    let uri = format!("/loans/{loan_id}/decision");

    let first = send(&service, empty_request(Method::POST, &uri)).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(&service, empty_request(Method::POST, &uri)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let payload = read_json_body(second).await;
    assert_eq!(payload["current_status"], json!("Approved"));
    assert!(payload.get("requested_status").is_none());
}

#[tokio::test]
async fn list_route_honours_skip_and_limit() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    for _ in 0..3 {
        created_loan_id(&service).await;
    }

    let response = send(&service, empty_request(Method::GET, "/persons?skip=1&limit=1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let persons = payload.as_array().expect("array payload");
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0]["person_id"], json!(2));
}

#[tokio::test]
async fn delete_route_removes_person() {
    let (service, _, audit) = build_service();
    let service = Arc::new(service);
    created_loan_id(&service).await;

    let response = send(&service, empty_request(Method::DELETE, "/persons/1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&service, empty_request(Method::GET, "/persons/1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(audit.documents().len(), 1);
}

#[tokio::test]
async fn submit_loan_route_adds_pending_loan() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    created_loan_id(&service).await;

    let response = send(
        &service,
        json_request(
            Method::POST,
            "/persons/1/loans",
            json!({
                "loan_amount": 3000.0,
                "loan_interest_rate": 7.25,
                "loan_intent": "HOMEIMPROVEMENT",
                "previous_loan_defaults": false
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["person_id"], json!(1));
    assert_eq!(payload["loan_status"], json!("Pending"));
    assert_eq!(payload["loan_percent_income"], json!(0.05));
}

#[tokio::test]
async fn reconcile_route_reports_in_sync_loan() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let loan_id = created_loan_id(&service).await;

    let response = send(
        &service,
        empty_request(Method::POST, &format!("/loans/{loan_id}/reconcile")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await, json!({ "outcome": "in_sync" }));
}
