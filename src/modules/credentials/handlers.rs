use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{authorize, Action, Actor, Target};
use crate::compliance::WorkerComplianceStatus;
use crate::db::repositories::{
    CredentialFilter, CredentialRecord, CredentialRepository, DocumentRepository, WorkerRepository,
};
use crate::db::{Credential, CredentialState, CredentialVerification, NewCredential, Pagination};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct CredentialListQuery {
    pub company_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub active_only: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Payload encoded in the printed QR code.
fn qr_payload(worker_id: i64, token: &str) -> String {
    format!("sso-credential:{}:{}", worker_id, token)
}

pub async fn issue_credential(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<NewCredential>,
) -> AppResult<(StatusCode, Json<Credential>)> {
    let worker = WorkerRepository::get_by_id(&state.db, payload.worker_id)
        .await?
        .filter(|w| w.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Worker {} not found", payload.worker_id)))?;
    authorize(&actor, Action::IssueCredential, Target::Company(worker.company_id))?;

    if payload.valid_until <= OffsetDateTime::now_utc() {
        return Err(AppError::InvalidInput("valid_until must be in the future".to_string()));
    }

    let token = Uuid::new_v4().simple().to_string();
    let qr_code = qr_payload(worker.id, &token);

    let mut tx = state.db.begin().await?;
    let credential = CredentialRepository::create(
        &mut tx,
        &CredentialRecord {
            token: &token,
            qr_code: &qr_code,
            valid_until: payload.valid_until,
            worker_id: worker.id,
            created_by: actor.user_id,
        },
    )
    .await?;
    tx.commit().await?;

    info!(
        credential_id = credential.id,
        worker_id = worker.id,
        issued_by = actor.user_id,
        "Credential issued"
    );

    Ok((StatusCode::CREATED, Json(credential)))
}

pub async fn list_credentials(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<CredentialListQuery>,
) -> AppResult<Json<Vec<Credential>>> {
    let scope = authorize(
        &actor,
        Action::ListCredentials,
        Target::Collection { company_id: query.company_id },
    )?;

    let filter = CredentialFilter {
        scope,
        worker_id: query.worker_id,
        active_only: query.active_only.unwrap_or(false),
    };
    let credentials =
        CredentialRepository::list(&state.db, &filter, Pagination::new(query.skip, query.limit))
            .await?;

    Ok(Json(credentials))
}

/// Gate check: is the credential usable right now, and is its holder
/// compliant?
pub async fn verify_credential(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(token): ApiPath<String>,
) -> AppResult<Json<CredentialVerification>> {
    let credential = CredentialRepository::get_by_token(&state.db, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Credential not found".to_string()))?;
    let worker = WorkerRepository::get_by_id(&state.db, credential.worker_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credential holder not found".to_string()))?;
    authorize(&actor, Action::VerifyCredential, Target::Company(worker.company_id))?;

    let tally = DocumentRepository::tallies_by_worker(&state.db, &[worker.id])
        .await?
        .remove(&worker.id)
        .unwrap_or_default();
    let compliance_status = WorkerComplianceStatus::from_tally(tally);
    let credential_state = credential.state_at(OffsetDateTime::now_utc());

    let access_granted = worker.is_active
        && credential_state == CredentialState::Valid
        && compliance_status == WorkerComplianceStatus::Compliant;

    info!(
        credential_id = credential.id,
        worker_id = worker.id,
        verified_by = actor.user_id,
        state = ?credential_state,
        access_granted,
        "Credential verified"
    );

    Ok(Json(CredentialVerification {
        credential_id: credential.id,
        worker_id: worker.id,
        worker_name: format!("{} {}", worker.first_name, worker.last_name),
        company_id: worker.company_id,
        state: credential_state,
        compliance_status,
        access_granted,
    }))
}

pub async fn revoke_credential(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(credential_id): ApiPath<i64>,
) -> AppResult<Json<Credential>> {
    let (_, owner) = CredentialRepository::get_by_id(&state.db, credential_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Credential {} not found", credential_id)))?;
    authorize(&actor, Action::RevokeCredential, Target::Company(owner))?;

    let mut tx = state.db.begin().await?;
    let credential = CredentialRepository::revoke(&mut tx, credential_id).await?;
    tx.commit().await?;

    info!(credential_id, revoked_by = actor.user_id, "Credential revoked");
    Ok(Json(credential))
}
