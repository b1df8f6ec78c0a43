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
use crate::db::repositories::{
    DocumentRepository, ObservationFilter, ObservationRecord, ObservationRepository,
};
use crate::db::{
    NewObservation, Observation, ObservationStatus, ObservationType, Pagination, Resolution,
    UpdateObservation,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct ObservationListQuery {
    pub status: Option<ObservationStatus>,
    #[serde(rename = "type")]
    pub obs_type: Option<ObservationType>,
    pub company_id: Option<i64>,
    pub document_id: Option<i64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Observation plus the company that owns its document.
async fn find_observation(state: &AppState, observation_id: i64) -> AppResult<(Observation, i64)> {
    ObservationRepository::get_by_id(&state.db, observation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Observation {} not found", observation_id)))
}

pub async fn create_observation(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<NewObservation>,
) -> AppResult<(StatusCode, Json<Observation>)> {
    payload.validate()?;

    let document = DocumentRepository::get_by_id(&state.db, payload.document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", payload.document_id)))?;
    authorize(&actor, Action::CreateObservation, Target::Company(document.company_id))?;

    let mut tx = state.db.begin().await?;
    let observation = ObservationRepository::create(
        &mut tx,
        &ObservationRecord {
            obs_type: payload.obs_type,
            title: &payload.title,
            description: &payload.description,
            deadline: payload.deadline,
            document_id: document.id,
            created_by: actor.user_id,
        },
    )
    .await?;
    tx.commit().await?;

    info!(
        observation_id = observation.id,
        document_id = document.id,
        created_by = actor.user_id,
        "Observation raised"
    );

    Ok((StatusCode::CREATED, Json(observation)))
}

pub async fn list_observations(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<ObservationListQuery>,
) -> AppResult<Json<Vec<Observation>>> {
    let scope = authorize(
        &actor,
        Action::ListObservations,
        Target::Collection { company_id: query.company_id },
    )?;

    let filter = ObservationFilter {
        scope,
        document_id: query.document_id,
        status: query.status,
        obs_type: query.obs_type,
    };
    let observations =
        ObservationRepository::list(&state.db, &filter, Pagination::new(query.skip, query.limit))
            .await?;

    Ok(Json(observations))
}

pub async fn list_document_observations(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(document_id): ApiPath<i64>,
) -> AppResult<Json<Vec<Observation>>> {
    let document = DocumentRepository::get_by_id(&state.db, document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;
    authorize(&actor, Action::ListObservations, Target::Company(document.company_id))?;

    let observations = ObservationRepository::list_by_document(&state.db, document_id).await?;

    Ok(Json(observations))
}

pub async fn get_observation(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(observation_id): ApiPath<i64>,
) -> AppResult<Json<Observation>> {
    let (observation, owner) = find_observation(&state, observation_id).await?;
    authorize(&actor, Action::ReadObservation, Target::Company(owner))?;
    Ok(Json(observation))
}

pub async fn update_observation(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(observation_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateObservation>,
) -> AppResult<Json<Observation>> {
    payload.validate()?;
    if payload.status.is_none() && payload.resolution_comments.is_none() {
        return Err(AppError::InvalidInput("Nothing to update".to_string()));
    }

    let (observation, owner) = find_observation(&state, observation_id).await?;
    authorize(&actor, Action::UpdateObservation, Target::Company(owner))?;

    let resulting = payload.status.unwrap_or(observation.status);
    if payload.resolution_comments.is_some() && resulting != ObservationStatus::Closed {
        return Err(AppError::InvalidInput(
            "resolution_comments can only be set on a closed observation".to_string(),
        ));
    }
    let resolution = match payload.status {
        Some(to) => observation.status.resolution_on(to),
        None => Resolution::Keep,
    };

    let mut tx = state.db.begin().await?;
    let updated = ObservationRepository::update(
        &mut tx,
        observation_id,
        payload.status,
        resolution,
        payload.resolution_comments.as_deref(),
        actor.user_id,
    )
    .await?;
    tx.commit().await?;

    if updated.status != observation.status {
        info!(
            observation_id,
            changed_by = actor.user_id,
            from = ?observation.status,
            to = ?updated.status,
            "Observation status changed"
        );
    }

    Ok(Json(updated))
}

pub async fn delete_observation(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(observation_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let (_, owner) = find_observation(&state, observation_id).await?;
    authorize(&actor, Action::DeleteObservation, Target::Company(owner))?;

    let mut tx = state.db.begin().await?;
    ObservationRepository::delete(&mut tx, observation_id).await?;
    tx.commit().await?;

    info!(observation_id, deleted_by = actor.user_id, "Observation deleted");
    Ok(StatusCode::NO_CONTENT)
}
