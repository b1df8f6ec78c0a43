use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::{
    authorize, hash_password, verify_login, Action, Actor, Claims, LoginError, SignedToken, Target,
};
use crate::db::repositories::{CompanyRepository, UserFilter, UserRecord, UserRepository};
use crate::db::{NewUser, Pagination, UpdateProfile, UpdateUserStatus, UserLogin, UserResponse, UserRole};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiForm, ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: SignedToken,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub company_id: Option<i64>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn login(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<UserLogin>,
) -> AppResult<Json<LoginResponse>> {
    let user = UserRepository::get_by_username(&state.db, &form.username).await?;

    let session = verify_login(user.as_ref(), form.password.expose_secret()).inspect_err(|e| {
        warn!(username = %form.username, known = user.is_some(), "Login failed: {}", e);
    })?;
    let Some(user) = user else {
        return Err(LoginError::InvalidCredentials.into());
    };

    UserRepository::record_login(&state.db, session.user_id).await?;
    let token = state.tokens.issue(&session)?;

    info!(user_id = session.user_id, role = %session.role, "User logged in");

    let mut user = UserResponse::from(user);
    user.last_login = Some(OffsetDateTime::now_utc());

    Ok(Json(LoginResponse { token, user }))
}

pub async fn register(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(mut payload): ApiJson<NewUser>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    // Non-admins always register into their own company.
    if actor.role != UserRole::Admin {
        payload.company_id = payload.company_id.or(actor.company_id);
    }
    let target = payload.company_id.map(Target::Company).unwrap_or(Target::Unscoped);
    authorize(&actor, Action::RegisterUser, target)?;

    if payload.role == UserRole::Admin && actor.role != UserRole::Admin {
        return Err(AppError::Forbidden("Only administrators can create administrators".to_string()));
    }
    payload.validate()?;

    if let Some(company_id) = payload.company_id {
        match CompanyRepository::is_active(&state.db, company_id).await? {
            Some(true) => {}
            _ => return Err(AppError::NotFound(format!("Company {} not found", company_id))),
        }
    }

    if UserRepository::identity_taken(&state.db, Some(&payload.username), Some(&payload.email), None).await? {
        return Err(AppError::Conflict("Username or email already registered".to_string()));
    }

    let password_hash = hash_password(payload.password.expose_secret())
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let mut tx = state.db.begin().await?;
    let user = UserRepository::create(
        &mut tx,
        &UserRecord {
            username: &payload.username,
            email: &payload.email,
            password_hash: &password_hash,
            full_name: payload.full_name.as_deref(),
            role: payload.role,
            company_id: payload.company_id,
        },
    )
    .await?;
    tx.commit().await?;

    info!(
        created_by = actor.user_id,
        user_id = user.id,
        role = %user.role,
        company_id = ?user.company_id,
        "User registered"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn me(State(state): State<AppState>, actor: Actor) -> AppResult<Json<UserResponse>> {
    let user = UserRepository::get_by_id(&state.db, actor.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn update_me(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<UpdateProfile>,
) -> AppResult<Json<UserResponse>> {
    payload.validate()?;

    if let Some(email) = payload.email.as_deref() {
        if UserRepository::identity_taken(&state.db, None, Some(email), Some(actor.user_id)).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
    }

    let password_hash = payload
        .password
        .as_ref()
        .map(|password| hash_password(password.expose_secret()))
        .transpose()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let mut tx = state.db.begin().await?;
    let user = UserRepository::update_profile(
        &mut tx,
        actor.user_id,
        payload.email.as_deref(),
        payload.full_name.as_deref(),
        password_hash.as_deref(),
    )
    .await?;
    tx.commit().await?;

    if password_hash.is_some() {
        info!(user_id = actor.user_id, "Password changed");
    }

    Ok(Json(UserResponse::from(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let scope = authorize(
        &actor,
        Action::ListUsers,
        Target::Collection { company_id: query.company_id },
    )?;

    let filter = UserFilter {
        scope,
        role: query.role,
        is_active: query.is_active.unwrap_or(true),
    };
    let users = UserRepository::list(&state.db, &filter, Pagination::new(query.skip, query.limit)).await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn update_user_status(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateUserStatus>,
) -> AppResult<Json<UserResponse>> {
    let target = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    authorize(
        &actor,
        Action::UpdateUserStatus,
        target.company_id.map(Target::Company).unwrap_or(Target::Unscoped),
    )?;

    if target.id == actor.user_id && !payload.is_active {
        return Err(AppError::InvalidInput("You cannot deactivate your own account".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let user = UserRepository::set_active(&mut tx, user_id, payload.is_active).await?;
    tx.commit().await?;

    info!(
        changed_by = actor.user_id,
        user_id,
        is_active = payload.is_active,
        "User status changed"
    );

    Ok(Json(UserResponse::from(user)))
}

/// Re-issue the caller's token. The account must still exist and be active.
pub async fn refresh_token(
    State(state): State<AppState>,
    claims: Claims,
) -> AppResult<Json<LoginResponse>> {
    let user = UserRepository::get_by_id(&state.db, claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

    if !user.is_active {
        warn!(user_id = user.id, "Token refresh refused for inactive user");
        return Err(AppError::InactiveUser);
    }

    let token = state.tokens.refresh(&claims)?;
    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}
