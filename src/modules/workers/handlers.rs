use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::{authorize, Action, Actor, Target};
use crate::compliance::DocumentTally;
use crate::db::repositories::{CompanyRepository, DocumentRepository, WorkerFilter, WorkerRepository};
use crate::db::{
    DocumentResponse, DocumentStatus, NewWorker, Pagination, UpdateWorker, Worker, WorkerResponse,
    WorkerWithDocuments,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct WorkerListQuery {
    pub company_id: Option<i64>,
    pub is_active: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

async fn find_worker(state: &AppState, worker_id: i64) -> AppResult<Worker> {
    WorkerRepository::get_by_id(&state.db, worker_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Worker {} not found", worker_id)))
}

async fn worker_tally(state: &AppState, worker_id: i64) -> AppResult<DocumentTally> {
    Ok(DocumentRepository::tallies_by_worker(&state.db, &[worker_id])
        .await?
        .remove(&worker_id)
        .unwrap_or_default())
}

pub async fn create_worker(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<NewWorker>,
) -> AppResult<(StatusCode, Json<WorkerResponse>)> {
    authorize(&actor, Action::CreateWorker, Target::Company(payload.company_id))?;
    payload.validate()?;

    match CompanyRepository::is_active(&state.db, payload.company_id).await? {
        Some(true) => {}
        _ => {
            return Err(AppError::NotFound(format!(
                "Company {} not found",
                payload.company_id
            )))
        }
    }

    let mut tx = state.db.begin().await?;
    let worker = WorkerRepository::create(&mut tx, &payload).await?;
    tx.commit().await?;

    info!(worker_id = worker.id, company_id = worker.company_id, "Worker created");

    Ok((
        StatusCode::CREATED,
        Json(WorkerResponse::project(worker, DocumentTally::default())),
    ))
}

pub async fn list_workers(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<WorkerListQuery>,
) -> AppResult<Json<Vec<WorkerResponse>>> {
    let scope = authorize(
        &actor,
        Action::ListWorkers,
        Target::Collection { company_id: query.company_id },
    )?;

    let filter = WorkerFilter {
        scope,
        is_active: query.is_active.unwrap_or(true),
    };
    let workers =
        WorkerRepository::list(&state.db, &filter, Pagination::new(query.skip, query.limit)).await?;

    let ids: Vec<i64> = workers.iter().map(|w| w.id).collect();
    let tallies = DocumentRepository::tallies_by_worker(&state.db, &ids).await?;

    Ok(Json(
        workers
            .into_iter()
            .map(|worker| {
                let tally = tallies.get(&worker.id).copied().unwrap_or_default();
                WorkerResponse::project(worker, tally)
            })
            .collect(),
    ))
}

pub async fn get_worker(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(worker_id): ApiPath<i64>,
) -> AppResult<Json<WorkerWithDocuments>> {
    let worker = find_worker(&state, worker_id).await?;
    authorize(&actor, Action::ReadWorker, Target::Company(worker.company_id))?;

    let documents = DocumentRepository::list_by_worker(&state.db, worker_id).await?;
    let tally = DocumentTally {
        total: documents.len() as i64,
        approved: documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Approved)
            .count() as i64,
    };

    Ok(Json(WorkerWithDocuments {
        worker: WorkerResponse::project(worker, tally),
        documents: documents.into_iter().map(DocumentResponse::from).collect(),
    }))
}

pub async fn update_worker(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(worker_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateWorker>,
) -> AppResult<Json<WorkerResponse>> {
    let worker = find_worker(&state, worker_id).await?;
    authorize(&actor, Action::UpdateWorker, Target::Company(worker.company_id))?;
    if payload.is_active == Some(false) {
        authorize(&actor, Action::DeactivateWorker, Target::Company(worker.company_id))?;
    }
    payload.validate()?;

    let mut tx = state.db.begin().await?;
    let worker = WorkerRepository::update(&mut tx, worker_id, &payload).await?;
    tx.commit().await?;

    let tally = worker_tally(&state, worker_id).await?;
    Ok(Json(WorkerResponse::project(worker, tally)))
}

pub async fn deactivate_worker(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(worker_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let worker = find_worker(&state, worker_id).await?;
    authorize(&actor, Action::DeactivateWorker, Target::Company(worker.company_id))?;

    let mut tx = state.db.begin().await?;
    WorkerRepository::deactivate(&mut tx, worker_id).await?;
    tx.commit().await?;

    info!(worker_id, deactivated_by = actor.user_id, "Worker deactivated");
    Ok(StatusCode::NO_CONTENT)
}
