use axum::{http::HeaderValue, middleware, routing::get, Json, Router};
use serde_json::json;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    app_state::AppState,
    middleware::tracing::observability_middleware,
    modules::{
        auth::routes::auth_routes, companies::routes::company_routes,
        credentials::routes::credential_routes, documents::routes::document_routes,
        observations::routes::observation_routes, workers::routes::worker_routes,
    },
};

pub fn create_router(state: AppState) -> Router {
    let env = state.env;
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/companies", company_routes())
        .nest("/workers", worker_routes())
        .nest("/documents", document_routes(env.uploads.max_file_size))
        .nest("/observations", observation_routes())
        .nest("/credentials", credential_routes());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest(&env.app.api_prefix, api)
        .layer(cors_layer(&env.app.cors_origins))
        .layer(middleware::from_fn(observability_middleware))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": state.env.app.name,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.env.app.environment.as_str(),
    }))
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    let db_result = sqlx::query("SELECT 1").execute(&state.db).await;

    let db_status = match db_result {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::info!("Database health check failed: {}", e);
            "unhealthy"
        }
    };

    let telemetry_health = crate::telemetry::telemetry_health_check();
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();

    Json(json!({
        "status": "ok",
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status,
            "telemetry": telemetry_health
        }
    }))
}
