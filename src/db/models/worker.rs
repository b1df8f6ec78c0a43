use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use validator::Validate;

use crate::compliance::{DocumentTally, WorkerComplianceStatus};
use super::document::DocumentResponse;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Worker {
    pub id: i64,
    pub run: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: String,
    pub entry_date: Option<Date>,
    pub is_active: bool,
    pub company_id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerResponse {
    pub id: i64,
    pub run: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: String,
    pub entry_date: Option<Date>,
    pub company_id: i64,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub documents_count: i64,
    pub compliance_status: WorkerComplianceStatus,
}

impl WorkerResponse {
    pub fn project(worker: Worker, documents: DocumentTally) -> Self {
        Self {
            id: worker.id,
            run: worker.run,
            first_name: worker.first_name,
            last_name: worker.last_name,
            email: worker.email,
            phone: worker.phone,
            position: worker.position,
            entry_date: worker.entry_date,
            company_id: worker.company_id,
            is_active: worker.is_active,
            created_at: worker.created_at,
            documents_count: documents.total,
            compliance_status: WorkerComplianceStatus::from_tally(documents),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerWithDocuments {
    #[serde(flatten)]
    pub worker: WorkerResponse,
    pub documents: Vec<DocumentResponse>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewWorker {
    #[validate(length(min = 8, max = 12, message = "run must be 8 to 12 characters"))]
    pub run: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub position: String,
    pub entry_date: Option<Date>,
    pub company_id: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateWorker {
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub position: Option<String>,
    pub is_active: Option<bool>,
}
