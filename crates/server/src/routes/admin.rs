use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::user::{UpdateUserRole, UserInfo};
use deployment::Deployment;
use tracing::info;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AdminUser, AppJson, AppPath},
};

pub async fn list_users(
    State(deployment): State<DeploymentImpl>,
    AdminUser(_admin): AdminUser,
) -> Result<ResponseJson<Vec<UserInfo>>, ApiError> {
    let users = deployment.storage().list_users().await?;
    Ok(ResponseJson(users.iter().map(|user| user.to_info()).collect()))
}

pub async fn set_role(
    State(deployment): State<DeploymentImpl>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRole>,
) -> Result<ResponseJson<UserInfo>, ApiError> {
    let user = deployment
        .storage()
        .set_user_role(id, payload.role)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    info!(admin_id = %admin.id, user_id = %user.id, role = %user.role, "Changed user role");
    Ok(ResponseJson(user.to_info()))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/users", get(list_users))
            .route("/users/{id}/role", put(set_role)),
    )
}
