mod company_repository;
mod credential_repository;
mod document_repository;
mod observation_repository;
mod user_repository;
mod worker_repository;

pub use company_repository::{CompanyFilter, CompanyRepository};
pub use credential_repository::{CredentialFilter, CredentialRecord, CredentialRepository};
pub use document_repository::{DocumentFilter, DocumentRepository};
pub use observation_repository::{ObservationFilter, ObservationRecord, ObservationRepository};
pub use user_repository::{UserFilter, UserRecord, UserRepository};
pub use worker_repository::{WorkerFilter, WorkerRepository};
