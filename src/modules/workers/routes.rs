use axum::{routing::get, Router};

use crate::app_state::AppState;
use super::handlers::{create_worker, deactivate_worker, get_worker, list_workers, update_worker};

pub fn worker_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workers).post(create_worker))
        .route(
            "/{id}",
            get(get_worker).put(update_worker).delete(deactivate_worker),
        )
}
