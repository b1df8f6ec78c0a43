//! Router-level checks that never reach the database: authentication,
//! tenant isolation, request rejection and upload rejection all happen
//! before any query.

mod common;

use std::path::Path;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use time::Duration;
use tower::ServiceExt;

use sso_backend::auth::{Session, TokenService};
use sso_backend::db::UserRole;

use common::{bearer, json_body, multipart_content_type, stored_files, test_config, upload_body};

fn app(upload_dir: &Path) -> Router {
    let config = test_config(upload_dir);
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("lazy pool");
    common::app_with_pool(pool, upload_dir)
}

fn exe_upload() -> Body {
    upload_body(
        &[("name", "Carnet"), ("type", "contrato"), ("worker_id", "1"), ("company_id", "5")],
        "setup.exe",
        b"MZ\x00\x00payload",
    )
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::get("/api/v1/companies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Authentication failed");
}

#[tokio::test]
async fn tampered_token_is_unauthorized() {
    let dir = TempDir::new().unwrap();
    let forged = TokenService::new(b"some-other-secret", Duration::minutes(30))
        .issue(&Session {
            user_id: 1,
            username: "admin".to_string(),
            role: UserRole::Admin,
            company_id: None,
        })
        .unwrap();

    let response = app(dir.path())
        .oneshot(
            Request::get("/api/v1/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", forged.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn company_scoped_user_cannot_read_another_company() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::get("/api/v1/companies/7")
                .header(header::AUTHORIZATION, bearer(UserRole::Rrhh, Some(5)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Access denied");
}

#[tokio::test]
async fn guard_cannot_create_companies() {
    let dir = TempDir::new().unwrap();
    let payload = serde_json::json!({ "rut": "76123456-7", "name": "Constructora Sur" });
    let response = app(dir.path())
        .oneshot(
            Request::post("/api/v1/companies")
                .header(header::AUTHORIZATION, bearer(UserRole::Guardia, Some(5)))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_enum_in_body_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let payload = serde_json::json!({
        "type": "bogus",
        "title": "Firma faltante",
        "description": "El contrato no está firmado",
        "deadline": "2030-01-01T00:00:00Z",
        "document_id": 1
    });
    let response = app(dir.path())
        .oneshot(
            Request::post("/api/v1/observations")
                .header(header::AUTHORIZATION, bearer(UserRole::Admin, None))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid input data");
    assert!(body["error"]["details"].as_str().unwrap_or_default().contains("bogus"));
}

#[tokio::test]
async fn unknown_enum_in_query_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::get("/api/v1/documents?status=bogus")
                .header(header::AUTHORIZATION, bearer(UserRole::Admin, None))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid input data");
}

#[tokio::test]
async fn non_numeric_id_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::get("/api/v1/workers/abc")
                .header(header::AUTHORIZATION, bearer(UserRole::Admin, None))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid input data");
}

#[tokio::test]
async fn malformed_login_form_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path())
        .oneshot(
            Request::post("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=only"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid input data");
}

#[tokio::test]
async fn executable_upload_is_rejected_before_storage() {
    let dir = TempDir::new().unwrap();
    let (name, value) = multipart_content_type();
    let response = app(dir.path())
        .oneshot(
            Request::post("/api/v1/documents/upload")
                .header(header::AUTHORIZATION, bearer(UserRole::Empresa, Some(5)))
                .header(name, value)
                .body(exe_upload())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]["details"]
        .as_str()
        .unwrap_or_default()
        .contains("exe"));
    assert_eq!(stored_files(dir.path()), 0);
}

#[tokio::test]
async fn upload_is_authorized_before_the_file_is_inspected() {
    let dir = TempDir::new().unwrap();
    let (name, value) = multipart_content_type();
    let response = app(dir.path())
        .oneshot(
            Request::post("/api/v1/documents/upload")
                .header(header::AUTHORIZATION, bearer(UserRole::Guardia, Some(5)))
                .header(name, value)
                .body(exe_upload())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(stored_files(dir.path()), 0);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let dir = TempDir::new().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
