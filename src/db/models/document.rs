use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use thiserror::Error;
use validator::Validate;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Contrato,
    ExamenMedico,
    CertificadoAltura,
    Epp,
    Induccion,
    Anexo,
    Odi,
    Reglamento,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Contrato => "contrato",
            DocumentType::ExamenMedico => "examen_medico",
            DocumentType::CertificadoAltura => "certificado_altura",
            DocumentType::Epp => "epp",
            DocumentType::Induccion => "induccion",
            DocumentType::Anexo => "anexo",
            DocumentType::Odi => "odi",
            DocumentType::Reglamento => "reglamento",
            DocumentType::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contrato" => Ok(DocumentType::Contrato),
            "examen_medico" => Ok(DocumentType::ExamenMedico),
            "certificado_altura" => Ok(DocumentType::CertificadoAltura),
            "epp" => Ok(DocumentType::Epp),
            "induccion" => Ok(DocumentType::Induccion),
            "anexo" => Ok(DocumentType::Anexo),
            "odi" => Ok(DocumentType::Odi),
            "reglamento" => Ok(DocumentType::Reglamento),
            "other" => Ok(DocumentType::Other),
            _ => Err(format!("Unknown document type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "document_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Observed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("document cannot move from {from:?} to {to:?} through review")]
pub struct InvalidTransition {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 4] = [
        DocumentStatus::Pending,
        DocumentStatus::Approved,
        DocumentStatus::Observed,
        DocumentStatus::Expired,
    ];

    /// Transitions a reviewer may request. `Expired` is reached only through
    /// the passage of time and never through review.
    pub fn review_transition(self, to: DocumentStatus) -> Result<DocumentStatus, InvalidTransition> {
        use DocumentStatus::*;
        match (self, to) {
            (Pending, Approved) | (Pending, Observed) | (Observed, Approved) => Ok(to),
            _ => Err(InvalidTransition { from: self, to }),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Document {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    pub doc_type: DocumentType,
    pub file_path: String,
    pub file_hash: Option<String>,
    pub status: DocumentStatus,
    pub issue_date: Option<Date>,
    pub expiry_date: Option<Date>,
    pub upload_date: OffsetDateTime,
    pub worker_id: i64,
    pub company_id: i64,
    pub uploaded_by: Option<i64>,
    pub reviewed_by: Option<i64>,
    pub review_date: Option<OffsetDateTime>,
    pub review_comments: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub file_path: String,
    pub file_hash: Option<String>,
    pub issue_date: Option<Date>,
    pub expiry_date: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: OffsetDateTime,
    pub worker_id: i64,
    pub company_id: i64,
    pub uploaded_by: Option<i64>,
    pub reviewed_by: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub review_date: Option<OffsetDateTime>,
    pub review_comments: Option<String>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            doc_type: doc.doc_type,
            status: doc.status,
            file_path: doc.file_path,
            file_hash: doc.file_hash,
            issue_date: doc.issue_date,
            expiry_date: doc.expiry_date,
            upload_date: doc.upload_date,
            worker_id: doc.worker_id,
            company_id: doc.company_id,
            uploaded_by: doc.uploaded_by,
            reviewed_by: doc.reviewed_by,
            review_date: doc.review_date,
            review_comments: doc.review_comments,
        }
    }
}

/// Metadata for a stored upload, written in the same transaction as its
/// validation observations.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub doc_type: DocumentType,
    pub file_path: String,
    pub file_hash: String,
    pub status: DocumentStatus,
    pub issue_date: Option<Date>,
    pub expiry_date: Option<Date>,
    pub worker_id: i64,
    pub company_id: i64,
    pub uploaded_by: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DocumentReview {
    pub status: Option<DocumentStatus>,
    #[validate(length(max = 4000))]
    pub review_comments: Option<String>,
}
