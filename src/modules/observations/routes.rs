use axum::{routing::get, Router};

use crate::app_state::AppState;
use super::handlers::{
    create_observation, delete_observation, get_observation, list_document_observations,
    list_observations, update_observation,
};

pub fn observation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_observations).post(create_observation))
        .route("/document/{document_id}", get(list_document_observations))
        .route(
            "/{id}",
            get(get_observation)
                .patch(update_observation)
                .delete(delete_observation),
        )
}
