use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, Duration, OffsetDateTime};
use tracing::{info, warn};
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::{authorize, Action, Actor, Target};
use crate::compliance::DEFAULT_EXPIRY_HORIZON_DAYS;
use crate::db::repositories::{
    CompanyRepository, DocumentFilter, DocumentRepository, ObservationRecord, ObservationRepository,
    WorkerRepository,
};
use crate::db::{
    Document, DocumentResponse, DocumentReview, DocumentStatus, DocumentType, NewDocument,
    Observation, Pagination,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::services::file_store::extension_of;
use crate::services::UploadedDocument;

/// Deadline given to observations raised by automatic validation.
const AUTO_OBSERVATION_DEADLINE_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct DocumentListQuery {
    pub company_id: Option<i64>,
    pub worker_id: Option<i64>,
    pub status: Option<DocumentStatus>,
    #[serde(rename = "type")]
    pub doc_type: Option<DocumentType>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<u32>,
    pub company_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub document: DocumentResponse,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    name: Option<String>,
    doc_type: Option<String>,
    worker_id: Option<String>,
    company_id: Option<String>,
    issue_date: Option<String>,
    expiry_date: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().unwrap_or_default().to_string();
            if field_name == "file" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.file = Some((filename, bytes.to_vec()));
                continue;
            }

            let value = field.text().await?;
            let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            match field_name.as_str() {
                "name" => form.name = value,
                "type" => form.doc_type = value,
                "worker_id" => form.worker_id = value,
                "company_id" => form.company_id = value,
                "issue_date" => form.issue_date = value,
                "expiry_date" => form.expiry_date = value,
                _ => {}
            }
        }

        Ok(form)
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput(format!("{} is required", field)))
}

fn parse_id(value: &Option<String>, field: &str) -> AppResult<i64> {
    required(value, field)?
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("{} must be an integer", field)))
}

fn parse_date(value: &Option<String>, field: &str) -> AppResult<Option<Date>> {
    value
        .as_deref()
        .map(|raw| {
            Date::parse(raw, format_description!("[year]-[month]-[day]"))
                .map_err(|_| AppError::InvalidInput(format!("{} must be YYYY-MM-DD", field)))
        })
        .transpose()
}

async fn find_document(state: &AppState, document_id: i64) -> AppResult<Document> {
    DocumentRepository::get_by_id(&state.db, document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))
}

pub async fn upload_document(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let form = UploadForm::read(multipart).await?;

    let company_id = parse_id(&form.company_id, "company_id")?;
    authorize(&actor, Action::UploadDocument, Target::Company(company_id))?;

    let (filename, bytes) = form
        .file
        .as_ref()
        .ok_or_else(|| AppError::InvalidInput("file is required".to_string()))?;
    state.files.check(filename, bytes.len())?;

    let name = required(&form.name, "name")?.to_string();
    let doc_type: DocumentType = required(&form.doc_type, "type")?
        .parse()
        .map_err(AppError::InvalidInput)?;
    let worker_id = parse_id(&form.worker_id, "worker_id")?;
    let issue_date = parse_date(&form.issue_date, "issue_date")?;
    let expiry_date = parse_date(&form.expiry_date, "expiry_date")?;

    if CompanyRepository::is_active(&state.db, company_id).await? != Some(true) {
        return Err(AppError::NotFound(format!("Company {} not found", company_id)));
    }
    let worker = WorkerRepository::get_by_id(&state.db, worker_id)
        .await?
        .filter(|w| w.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Worker {} not found", worker_id)))?;
    if worker.company_id != company_id {
        return Err(AppError::InvalidInput(
            "Worker does not belong to the given company".to_string(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    let extension = extension_of(filename).unwrap_or_default();
    let outcome = state.validator.validate(&UploadedDocument {
        filename,
        extension: &extension,
        doc_type,
        bytes,
        issue_date,
        expiry_date,
        today: now.date(),
    });

    let stored = state
        .files
        .save(company_id, worker_id, filename, bytes)
        .await
        .map_err(|e| AppError::InternalServerError(format!("Failed to store upload: {}", e)))?;

    let new_document = NewDocument {
        name,
        doc_type,
        file_path: stored.path.to_string_lossy().into_owned(),
        file_hash: stored.sha256.clone(),
        status: if outcome.passed() {
            DocumentStatus::Approved
        } else {
            DocumentStatus::Pending
        },
        issue_date,
        expiry_date,
        worker_id,
        company_id,
        uploaded_by: actor.user_id,
    };

    let persisted = async {
        let mut tx = state.db.begin().await?;
        let document = DocumentRepository::create(&mut tx, &new_document).await?;

        let mut observations = Vec::with_capacity(outcome.issues.len());
        for issue in &outcome.issues {
            let observation = ObservationRepository::create(
                &mut tx,
                &ObservationRecord {
                    obs_type: issue.kind,
                    title: &issue.title,
                    description: &issue.description,
                    deadline: now + Duration::days(AUTO_OBSERVATION_DEADLINE_DAYS),
                    document_id: document.id,
                    created_by: actor.user_id,
                },
            )
            .await?;
            observations.push(observation);
        }

        tx.commit().await?;
        Ok::<_, AppError>((document, observations))
    }
    .await;

    let (document, observations) = match persisted {
        Ok(saved) => saved,
        Err(e) => {
            state.files.remove(&stored.path).await;
            return Err(e);
        }
    };

    info!(
        document_id = document.id,
        worker_id,
        company_id,
        uploaded_by = actor.user_id,
        status = ?document.status,
        issues = observations.len(),
        "Document uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document: DocumentResponse::from(document),
            observations,
        }),
    ))
}

pub async fn list_documents(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<DocumentListQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let scope = authorize(
        &actor,
        Action::ListDocuments,
        Target::Collection { company_id: query.company_id },
    )?;

    let filter = DocumentFilter {
        scope,
        worker_id: query.worker_id,
        status: query.status,
        doc_type: query.doc_type,
    };
    let documents =
        DocumentRepository::list(&state.db, &filter, Pagination::new(query.skip, query.limit)).await?;

    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(document_id): ApiPath<i64>,
) -> AppResult<Json<DocumentResponse>> {
    let document = find_document(&state, document_id).await?;
    authorize(&actor, Action::ReadDocument, Target::Company(document.company_id))?;
    Ok(Json(DocumentResponse::from(document)))
}

pub async fn download_document(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(document_id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    let document = find_document(&state, document_id).await?;
    authorize(&actor, Action::ReadDocument, Target::Company(document.company_id))?;

    let path = FsPath::new(&document.file_path);
    let bytes = state.files.read(path).await.map_err(|e| {
        warn!(document_id, path = %document.file_path, "Stored file unreadable: {}", e);
        match e.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound("Stored file not found".to_string()),
            _ => AppError::InternalServerError(e.to_string()),
        }
    })?;

    let content_type = match extension_of(&document.file_path).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    };
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}

pub async fn list_worker_documents(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(worker_id): ApiPath<i64>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let worker = WorkerRepository::get_by_id(&state.db, worker_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Worker {} not found", worker_id)))?;
    authorize(&actor, Action::ListDocuments, Target::Company(worker.company_id))?;

    let documents = DocumentRepository::list_by_worker(&state.db, worker_id).await?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn list_expiring_documents(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<ExpiringQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let scope = authorize(
        &actor,
        Action::ListDocuments,
        Target::Collection { company_id: query.company_id },
    )?;

    let today = OffsetDateTime::now_utc().date();
    let days = query.days.unwrap_or(DEFAULT_EXPIRY_HORIZON_DAYS);
    let until = today
        .checked_add(Duration::days(i64::from(days)))
        .unwrap_or(Date::MAX);

    let documents = DocumentRepository::expiring_between(&state.db, scope, today, until).await?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn review_document(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(document_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<DocumentReview>,
) -> AppResult<Json<DocumentResponse>> {
    payload.validate()?;
    if payload.status.is_none() && payload.review_comments.is_none() {
        return Err(AppError::InvalidInput("Nothing to update".to_string()));
    }

    let document = find_document(&state, document_id).await?;
    authorize(&actor, Action::ReviewDocument, Target::Company(document.company_id))?;

    let status = payload
        .status
        .map(|to| document.status.review_transition(to))
        .transpose()?;

    let mut tx = state.db.begin().await?;
    let reviewed = DocumentRepository::review(
        &mut tx,
        document_id,
        status,
        payload.review_comments.as_deref(),
        actor.user_id,
    )
    .await?;
    tx.commit().await?;

    info!(
        document_id,
        reviewed_by = actor.user_id,
        from = ?document.status,
        to = ?reviewed.status,
        "Document reviewed"
    );

    Ok(Json(DocumentResponse::from(reviewed)))
}
