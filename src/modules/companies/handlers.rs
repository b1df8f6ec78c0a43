use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::{authorize, Action, Actor, Target};
use crate::compliance::{ComplianceReport, DocumentTally, DEFAULT_EXPIRY_HORIZON_DAYS};
use crate::db::repositories::{CompanyFilter, CompanyRepository, DocumentRepository, WorkerRepository};
use crate::db::{
    CompanyResponse, CompanyWithDetails, NewCompany, Pagination, UpdateCompany, WorkerResponse,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct CompanyListQuery {
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub horizon_days: Option<u32>,
}

pub async fn create_company(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<NewCompany>,
) -> AppResult<(StatusCode, Json<CompanyResponse>)> {
    authorize(&actor, Action::CreateCompany, Target::Unscoped)?;
    payload.validate()?;

    let mut tx = state.db.begin().await?;
    let company = CompanyRepository::create(&mut tx, &payload).await?;
    tx.commit().await?;

    info!(company_id = company.id, created_by = actor.user_id, "Company created");

    Ok((
        StatusCode::CREATED,
        Json(CompanyResponse::project(company, 0, DocumentTally::default())),
    ))
}

pub async fn list_companies(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<CompanyListQuery>,
) -> AppResult<Json<Vec<CompanyResponse>>> {
    let scope = authorize(&actor, Action::ListCompanies, Target::Collection { company_id: None })?;

    let filter = CompanyFilter {
        scope,
        is_active: query.is_active.unwrap_or(true),
        search: query.search,
    };
    let companies =
        CompanyRepository::list(&state.db, &filter, Pagination::new(query.skip, query.limit)).await?;

    let ids: Vec<i64> = companies.iter().map(|c| c.id).collect();
    let worker_counts = CompanyRepository::worker_counts(&state.db, &ids).await?;
    let tallies = DocumentRepository::tallies_by_company(&state.db, &ids).await?;

    let response = companies
        .into_iter()
        .map(|company| {
            let workers = worker_counts.get(&company.id).copied().unwrap_or_default();
            let documents = tallies.get(&company.id).copied().unwrap_or_default();
            CompanyResponse::project(company, workers, documents)
        })
        .collect();

    Ok(Json(response))
}

pub async fn get_company(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(company_id): ApiPath<i64>,
) -> AppResult<Json<CompanyWithDetails>> {
    authorize(&actor, Action::ReadCompany, Target::Company(company_id))?;

    let company = CompanyRepository::get_by_id(&state.db, company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {} not found", company_id)))?;

    let workers = WorkerRepository::list_by_company(&state.db, company_id).await?;
    let worker_ids: Vec<i64> = workers.iter().map(|w| w.id).collect();
    let worker_tallies = DocumentRepository::tallies_by_worker(&state.db, &worker_ids).await?;
    let company_tally = DocumentRepository::tallies_by_company(&state.db, &[company_id])
        .await?
        .remove(&company_id)
        .unwrap_or_default();

    let workers_count = workers.iter().filter(|w| w.is_active).count() as i64;
    let workers = workers
        .into_iter()
        .map(|worker| {
            let tally = worker_tallies.get(&worker.id).copied().unwrap_or_default();
            WorkerResponse::project(worker, tally)
        })
        .collect();

    Ok(Json(CompanyWithDetails {
        company: CompanyResponse::project(company, workers_count, company_tally),
        workers,
    }))
}

pub async fn update_company(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(company_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateCompany>,
) -> AppResult<Json<CompanyResponse>> {
    authorize(&actor, Action::UpdateCompany, Target::Company(company_id))?;
    if payload.is_active == Some(false) {
        authorize(&actor, Action::DeactivateCompany, Target::Company(company_id))?;
    }
    payload.validate()?;

    let mut tx = state.db.begin().await?;
    let company = CompanyRepository::update(&mut tx, company_id, &payload).await?;
    tx.commit().await?;

    let workers = WorkerRepository::count_active(&state.db, company_id).await?;
    let tally = DocumentRepository::tallies_by_company(&state.db, &[company_id])
        .await?
        .remove(&company_id)
        .unwrap_or_default();

    Ok(Json(CompanyResponse::project(company, workers, tally)))
}

pub async fn deactivate_company(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(company_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    authorize(&actor, Action::DeactivateCompany, Target::Company(company_id))?;

    let mut tx = state.db.begin().await?;
    CompanyRepository::deactivate(&mut tx, company_id).await?;
    tx.commit().await?;

    info!(company_id, deactivated_by = actor.user_id, "Company deactivated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn compliance_report(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(company_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> AppResult<Json<ComplianceReport>> {
    authorize(&actor, Action::ReadComplianceReport, Target::Company(company_id))?;

    if CompanyRepository::get_by_id(&state.db, company_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Company {} not found", company_id)));
    }

    let total_workers = WorkerRepository::count_active(&state.db, company_id).await?;
    let documents = DocumentRepository::snapshots_for_company(&state.db, company_id).await?;

    Ok(Json(ComplianceReport::build(
        company_id,
        total_workers,
        &documents,
        OffsetDateTime::now_utc().date(),
        query.horizon_days.unwrap_or(DEFAULT_EXPIRY_HORIZON_DAYS),
    )))
}
