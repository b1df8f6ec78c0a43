use axum::{routing::get, Router};

use crate::app_state::AppState;
use super::handlers::{
    compliance_report, create_company, deactivate_company, get_company, list_companies,
    update_company,
};

pub fn company_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_companies).post(create_company))
        .route(
            "/{id}",
            get(get_company).put(update_company).delete(deactivate_company),
        )
        .route("/{id}/compliance-report", get(compliance_report))
}
