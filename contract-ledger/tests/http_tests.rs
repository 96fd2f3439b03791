//! HTTP surface: routing, header handling and the error body shape

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use contract_ledger::config::ReportingConfig;
use contract_ledger::handlers::{configure_routes, PROFILE_HEADER};
use contract_ledger::{LedgerService, MemoryLedgerStore};
use serde_json::{json, Value};
use std::sync::Arc;

macro_rules! seeded_app {
    () => {{
        let store = Arc::new(MemoryLedgerStore::seeded());
        let service = Arc::new(LedgerService::new(store, &ReportingConfig::default()));
        test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure_routes),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_health() {
    let app = seeded_app!();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_missing_profile_header_is_unauthorized() {
    let app = seeded_app!();
    let req = test::TestRequest::get().uri("/contracts").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], 401);
    assert_eq!(body["error"]["type"], "unauthorized");
}

#[actix_web::test]
async fn test_contract_routes() {
    let app = seeded_app!();

    let req = test::TestRequest::get()
        .uri("/contracts")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["status"], "in_progress");

    let req = test::TestRequest::get()
        .uri("/contracts/1")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/contracts/3")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/contracts/NaN")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/contracts/999")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_deposit_errors() {
    let app = seeded_app!();

    let cases = [
        ("/balances/deposit/NaN", Some(json!({"amount": 10})), "Inappropriate userId provided"),
        ("/balances/deposit/2", None, "An amount property was not passed"),
        ("/balances/deposit/1", Some(json!({"amount": 10})), "You cannot deposit to your own account"),
    ];

    for (uri, body, message) in cases {
        let mut req = test::TestRequest::post()
            .uri(uri)
            .insert_header((PROFILE_HEADER, "1"));
        if let Some(body) = body {
            req = req.set_json(body);
        }
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["message"], message);
    }

    let req = test::TestRequest::post()
        .uri("/balances/deposit/2")
        .insert_header((PROFILE_HEADER, "1"))
        .set_json(json!({"amount": 1000}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "deposit_cap_exceeded");

    let req = test::TestRequest::post()
        .uri("/balances/deposit/999999")
        .insert_header((PROFILE_HEADER, "1"))
        .set_json(json!({"amount": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "payee_not_found");

    let req = test::TestRequest::post()
        .uri("/balances/deposit/2")
        .insert_header((PROFILE_HEADER, "5"))
        .set_json(json!({"amount": 1}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_deposit_success() {
    let app = seeded_app!();

    let req = test::TestRequest::post()
        .uri("/balances/deposit/2")
        .insert_header((PROFILE_HEADER, "1"))
        .set_json(json!({"amount": 100}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Deposit successful");
    assert_eq!(body["receipt"]["payee_id"], 2);
}

#[actix_web::test]
async fn test_pay_job_once() {
    let app = seeded_app!();

    let pay = || {
        test::TestRequest::post()
            .uri("/jobs/2/pay")
            .insert_header((PROFILE_HEADER, "1"))
            .to_request()
    };

    let resp = test::call_service(&app, pay()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["paid"], true);
    assert!(body["payment_date"].is_string());

    let resp = test::call_service(&app, pay()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "job_not_payable");
}

#[actix_web::test]
async fn test_unpaid_jobs() {
    let app = seeded_app!();

    let req = test::TestRequest::get()
        .uri("/jobs/unpaid")
        .insert_header((PROFILE_HEADER, "7"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let ids: Vec<i64> = body
        .as_array()
        .map(|jobs| jobs.iter().filter_map(|j| j["id"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![4, 5, 15]);
}

#[actix_web::test]
async fn test_admin_reports() {
    let app = seeded_app!();

    let req = test::TestRequest::get()
        .uri("/admin/best-profession?end=2020-08-20")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"]["message"],
        "One of the required date params are missing: start, end"
    );

    let req = test::TestRequest::get()
        .uri("/admin/best-profession?start=2020-08-01&end=2020-08-31")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body[0]["profession"], "Programmer");

    let req = test::TestRequest::get()
        .uri("/admin/best-clients?start=2020-08-01&end=2020-08-31&limit=3")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().map(Vec::len), Some(3));
    assert_eq!(body[0]["client_id"], 4);
    assert_eq!(body[0]["full_name"], "Misty Waters");
}

#[actix_web::test]
async fn test_report_query_errors_use_error_body() {
    let app = seeded_app!();

    for limit in ["abc", "-1"] {
        let req = test::TestRequest::get()
            .uri(&format!("/admin/best-clients?end=2020-08-20&limit={}", limit))
            .insert_header((PROFILE_HEADER, "1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["error"]["message"],
            "One of the required date params are missing: start, end"
        );
    }

    let req = test::TestRequest::get()
        .uri("/admin/best-clients?start=2020-08-01&end=2020-08-31&limit=abc")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "validation_error");

    // duplicate keys fail query deserialization itself
    let req = test::TestRequest::get()
        .uri("/admin/best-profession?start=2020-08-01&start=2020-08-02&end=2020-08-31")
        .insert_header((PROFILE_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], 400);
    assert_eq!(body["error"]["type"], "validation_error");
}

#[actix_web::test]
async fn test_zero_amount_deposit_rejected() {
    let app = seeded_app!();

    let req = test::TestRequest::post()
        .uri("/balances/deposit/2")
        .insert_header((PROFILE_HEADER, "1"))
        .set_json(json!({"amount": 0}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "validation_error");
    assert_eq!(
        body["error"]["message"],
        "Validation error: Deposit amount must be positive"
    );
}
