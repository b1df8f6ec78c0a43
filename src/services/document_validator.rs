//! Automatic checks run on every upload. A clean result approves the
//! document straight away; each issue becomes an open observation.

use time::Date;

use crate::db::{DocumentType, ObservationType};

/// What the validator gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct UploadedDocument<'a> {
    pub filename: &'a str,
    pub extension: &'a str,
    pub doc_type: DocumentType,
    pub bytes: &'a [u8],
    pub issue_date: Option<Date>,
    pub expiry_date: Option<Date>,
    pub today: Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: ObservationType,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    fn flag(&mut self, kind: ObservationType, title: &str, description: String) {
        self.issues.push(ValidationIssue {
            kind,
            title: title.to_string(),
            description,
        });
    }
}

pub trait DocumentValidator: Send + Sync {
    fn validate(&self, document: &UploadedDocument<'_>) -> ValidationOutcome;
}

/// Checks that the content matches the declared file type and that the
/// dates are usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureValidator;

const PDF_MAGIC: &[u8] = b"%PDF";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

fn signature_for(extension: &str) -> Option<&'static [u8]> {
    match extension {
        "pdf" => Some(PDF_MAGIC),
        "png" => Some(PNG_MAGIC),
        "jpg" | "jpeg" => Some(JPEG_MAGIC),
        _ => None,
    }
}

impl DocumentValidator for SignatureValidator {
    fn validate(&self, doc: &UploadedDocument<'_>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();

        if doc.bytes.is_empty() {
            outcome.flag(
                ObservationType::Incomplete,
                "Empty file",
                format!("{} has no content", doc.filename),
            );
        } else if let Some(magic) = signature_for(doc.extension) {
            if !doc.bytes.starts_with(magic) {
                outcome.flag(
                    ObservationType::FormatError,
                    "Content does not match file type",
                    format!("{} is not a valid .{} file", doc.filename, doc.extension),
                );
            }
        }

        if let Some(expiry) = doc.expiry_date {
            if expiry < doc.today {
                outcome.flag(
                    ObservationType::Expired,
                    "Document already expired",
                    format!("{} expired on {}", doc.doc_type, expiry),
                );
            }
            if doc.issue_date.is_some_and(|issued| issued > expiry) {
                outcome.flag(
                    ObservationType::FormatError,
                    "Inconsistent dates",
                    "issue date is after the expiry date".to_string(),
                );
            }
        }

        outcome
    }
}
