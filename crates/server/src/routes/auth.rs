use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    routing::{get, post},
};
use db::models::user::{LoginUser, NewUser, RegisterUser, UserInfo, UserRole};
use deployment::Deployment;
use serde_json::json;
use services::services::password::{hash_password_async, verify_password_async};
use tower_sessions::Session;
use tracing::info;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AppJson, CurrentUser, USER_ID_KEY},
};

/// POST /api/auth/register
pub async fn register(
    State(deployment): State<DeploymentImpl>,
    session: Session,
    AppJson(payload): AppJson<RegisterUser>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.validate()?;
    if deployment.storage().user_by_email(&payload.email).await?.is_some() {
        return Err(db::StorageError::Conflict(db::storage::EMAIL_TAKEN.to_string()).into());
    }

    let role = if deployment.config().is_admin_email(&payload.email) {
        UserRole::Admin
    } else {
        UserRole::User
    };
    let password_hash = hash_password_async(payload.password).await?;
    let user = deployment
        .storage()
        .create_user(&NewUser {
            email: payload.email,
            username: payload.username,
            password_hash,
            role,
        })
        .await?;

    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.id).await?;
    info!(user_id = %user.id, role = %user.role, "User registered");

    deployment
        .track_if_analytics_allowed(Some(user.id), "user_registered", json!({ "role": user.role }))
        .await;

    Ok((StatusCode::CREATED, ResponseJson(user.to_info())))
}

/// POST /api/auth/login
pub async fn login(
    State(deployment): State<DeploymentImpl>,
    session: Session,
    AppJson(payload): AppJson<LoginUser>,
) -> Result<ResponseJson<UserInfo>, ApiError> {
    let Some(mut user) = deployment.storage().user_by_email(&payload.email).await? else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password_async(payload.password, user.password_hash.clone()).await? {
        return Err(ApiError::InvalidCredentials);
    }

    // Accounts listed in ADMIN_EMAILS are promoted on their next sign-in.
    if !user.is_admin() && deployment.config().is_admin_email(&user.email) {
        if let Some(promoted) = deployment.storage().set_user_role(user.id, UserRole::Admin).await? {
            info!(user_id = %promoted.id, "Promoted configured admin");
            user = promoted;
        }
    }

    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.id).await?;
    Ok(ResponseJson(user.to_info()))
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<StatusCode, ApiError> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> ResponseJson<UserInfo> {
    ResponseJson(user.to_info())
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me)),
    )
}
