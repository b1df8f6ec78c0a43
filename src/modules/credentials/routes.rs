use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use super::handlers::{issue_credential, list_credentials, revoke_credential, verify_credential};

pub fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_credentials).post(issue_credential))
        .route("/verify/{token}", get(verify_credential))
        .route("/{id}/revoke", post(revoke_credential))
}
