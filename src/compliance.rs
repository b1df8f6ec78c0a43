//! Compliance derived from document state.
//!
//! Nothing here touches storage: callers fetch aggregates (tallies or
//! snapshots) and these functions turn them into the figures exposed on
//! workers, companies and the company compliance report. Values are always
//! recomputed on read.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{Date, Duration};

use crate::db::{DocumentStatus, DocumentType};

pub const DEFAULT_EXPIRY_HORIZON_DAYS: u32 = 30;

/// `part / whole * 100`, or 0 when there is nothing to measure.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Total and approved document counts for one worker or company.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct DocumentTally {
    pub total: i64,
    pub approved: i64,
}

impl DocumentTally {
    pub fn compliance_percentage(&self) -> f64 {
        percentage(self.approved, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerComplianceStatus {
    NoDocuments,
    Compliant,
    NonCompliant,
}

impl WorkerComplianceStatus {
    pub fn from_tally(tally: DocumentTally) -> Self {
        if tally.total == 0 {
            WorkerComplianceStatus::NoDocuments
        } else if tally.approved == tally.total {
            WorkerComplianceStatus::Compliant
        } else {
            WorkerComplianceStatus::NonCompliant
        }
    }
}

/// The columns of a document the report needs.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct DocumentSnapshot {
    pub status: DocumentStatus,
    #[sqlx(rename = "type")]
    pub doc_type: DocumentType,
    pub expiry_date: Option<Date>,
}

/// Inclusive `[today, today + horizon_days]`.
pub fn expires_within(expiry: Date, today: Date, horizon_days: u32) -> bool {
    let end = today
        .checked_add(Duration::days(i64::from(horizon_days)))
        .unwrap_or(Date::MAX);
    expiry >= today && expiry <= end
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TypeCompliance {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub total: i64,
    pub approved: i64,
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub company_id: i64,
    pub total_workers: i64,
    pub total_documents: i64,
    pub documents_by_status: BTreeMap<DocumentStatus, i64>,
    pub documents_by_type: Vec<TypeCompliance>,
    pub expiring_soon: i64,
    pub overall_compliance: f64,
    pub horizon_days: u32,
    pub generated_on: Date,
}

impl ComplianceReport {
    pub fn build(
        company_id: i64,
        total_workers: i64,
        documents: &[DocumentSnapshot],
        today: Date,
        horizon_days: u32,
    ) -> Self {
        let mut by_status: BTreeMap<DocumentStatus, i64> =
            DocumentStatus::ALL.iter().map(|status| (*status, 0)).collect();
        let mut by_type: BTreeMap<DocumentType, DocumentTally> = BTreeMap::new();
        let mut expiring_soon = 0;

        for doc in documents {
            *by_status.entry(doc.status).or_default() += 1;

            let tally = by_type.entry(doc.doc_type).or_default();
            tally.total += 1;
            if doc.status == DocumentStatus::Approved {
                tally.approved += 1;
            }

            if doc
                .expiry_date
                .is_some_and(|expiry| expires_within(expiry, today, horizon_days))
            {
                expiring_soon += 1;
            }
        }

        let total_documents = documents.len() as i64;
        let approved = by_status
            .get(&DocumentStatus::Approved)
            .copied()
            .unwrap_or_default();

        Self {
            company_id,
            total_workers,
            total_documents,
            documents_by_status: by_status,
            documents_by_type: by_type
                .into_iter()
                .map(|(doc_type, tally)| TypeCompliance {
                    doc_type,
                    total: tally.total,
                    approved: tally.approved,
                    compliance_rate: tally.compliance_percentage(),
                })
                .collect(),
            expiring_soon,
            overall_compliance: percentage(approved, total_documents),
            horizon_days,
            generated_on: today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn snapshot(status: DocumentStatus, doc_type: DocumentType, expiry: Option<Date>) -> DocumentSnapshot {
        DocumentSnapshot {
            status,
            doc_type,
            expiry_date: expiry,
        }
    }

    #[test]
    fn percentage_never_divides_by_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(1, 2), 50.0);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn worker_status_follows_document_state() {
        let status = |total, approved| WorkerComplianceStatus::from_tally(DocumentTally { total, approved });
        assert_eq!(status(0, 0), WorkerComplianceStatus::NoDocuments);
        assert_eq!(status(4, 4), WorkerComplianceStatus::Compliant);
        assert_eq!(status(4, 3), WorkerComplianceStatus::NonCompliant);
        assert_eq!(status(1, 0), WorkerComplianceStatus::NonCompliant);
    }

    #[test]
    fn worker_status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_value(WorkerComplianceStatus::NoDocuments).unwrap(),
            serde_json::json!("no_documents")
        );
    }

    #[test]
    fn expiry_window_is_inclusive_on_both_ends() {
        let today = date!(2024 - 03 - 01);
        assert!(expires_within(today, today, 30));
        assert!(expires_within(date!(2024 - 03 - 31), today, 30));
        assert!(!expires_within(date!(2024 - 04 - 01), today, 30));
        assert!(!expires_within(date!(2024 - 02 - 29), today, 30));
        assert!(expires_within(today, today, 0));
    }

    #[test]
    fn huge_horizon_saturates() {
        let today = date!(2024 - 03 - 01);
        assert!(expires_within(date!(2200 - 01 - 01), today, u32::MAX));
    }

    #[test]
    fn report_breaks_down_status_type_and_expiry() {
        let today = date!(2024 - 06 - 10);
        let docs = [
            snapshot(DocumentStatus::Approved, DocumentType::Contrato, Some(date!(2024 - 06 - 20))),
            snapshot(DocumentStatus::Pending, DocumentType::Contrato, None),
            snapshot(DocumentStatus::Approved, DocumentType::ExamenMedico, Some(date!(2024 - 12 - 01))),
            snapshot(DocumentStatus::Observed, DocumentType::Epp, Some(date!(2024 - 07 - 10))),
        ];

        let report = ComplianceReport::build(9, 3, &docs, today, DEFAULT_EXPIRY_HORIZON_DAYS);

        assert_eq!(report.total_documents, 4);
        assert_eq!(report.overall_compliance, 50.0);
        assert_eq!(report.expiring_soon, 2);
        assert_eq!(report.documents_by_status[&DocumentStatus::Approved], 2);
        assert_eq!(report.documents_by_status[&DocumentStatus::Expired], 0);

        let contrato = report
            .documents_by_type
            .iter()
            .find(|t| t.doc_type == DocumentType::Contrato)
            .expect("contrato row");
        assert_eq!((contrato.total, contrato.approved), (2, 1));
        assert_eq!(contrato.compliance_rate, 50.0);
        assert!(report.documents_by_type.iter().all(|t| t.doc_type != DocumentType::Odi));
    }

    #[test]
    fn empty_company_report_is_all_zero() {
        let report = ComplianceReport::build(1, 0, &[], date!(2024 - 01 - 01), 30);
        assert_eq!(report.total_documents, 0);
        assert_eq!(report.overall_compliance, 0.0);
        assert_eq!(report.expiring_soon, 0);
        assert!(report.documents_by_type.is_empty());
        assert_eq!(report.documents_by_status.len(), 4);
    }

    #[test]
    fn report_status_keys_serialize_as_strings() {
        let report = ComplianceReport::build(1, 0, &[], date!(2024 - 01 - 01), 30);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["documents_by_status"]["approved"], 0);
        assert_eq!(json["generated_on"], "2024-01-01");
    }
}
