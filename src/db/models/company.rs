use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::compliance::DocumentTally;
use super::worker::WorkerResponse;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub rut: String,
    pub name: String,
    pub business_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// Company row plus the statistics derived from its workers and documents.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyResponse {
    pub id: i64,
    pub rut: String,
    pub name: String,
    pub business_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub workers_count: i64,
    pub documents_count: i64,
    pub compliance_percentage: f64,
}

impl CompanyResponse {
    pub fn project(company: Company, workers_count: i64, documents: DocumentTally) -> Self {
        Self {
            id: company.id,
            rut: company.rut,
            name: company.name,
            business_name: company.business_name,
            email: company.email,
            phone: company.phone,
            address: company.address,
            is_active: company.is_active,
            created_at: company.created_at,
            workers_count,
            documents_count: documents.total,
            compliance_percentage: documents.compliance_percentage(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyWithDetails {
    #[serde(flatten)]
    pub company: CompanyResponse,
    pub workers: Vec<WorkerResponse>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCompany {
    #[validate(length(min = 8, max = 12, message = "rut must be 8 to 12 characters"))]
    pub rut: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub business_name: Option<String>,
    #[validate(email(message = "Invalid email address"), length(max = 100))]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 300))]
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCompany {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub business_name: Option<String>,
    #[validate(email(message = "Invalid email address"), length(max = 100))]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 300))]
    pub address: Option<String>,
    pub is_active: Option<bool>,
}
