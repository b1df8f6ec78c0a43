use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::app_state::AppState;
use super::handlers::{list_users, login, me, refresh_token, register, update_me, update_user_status};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me).put(update_me))
        .route("/users", get(list_users))
        .route("/users/{id}/status", patch(update_user_status))
        .route("/refresh-token", post(refresh_token))
}
