pub mod document_validator;
pub mod file_store;

pub use document_validator::{DocumentValidator, SignatureValidator, UploadedDocument, ValidationOutcome};
pub use file_store::{FileStore, StoredFile, UploadRejected};
