use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    routing::{get, put},
};
use db::models::saved_gift::{CreateSavedGift, SavedGift, SavedGiftQuery, UpdateSavedGift};
use deployment::Deployment;
use serde_json::json;
use uuid::Uuid;

use super::friends::owned_friend;
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery, CurrentUser},
};

pub async fn list_gifts(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<SavedGiftQuery>,
) -> Result<ResponseJson<Vec<SavedGift>>, ApiError> {
    Ok(ResponseJson(
        deployment
            .storage()
            .list_saved_gifts(user.id, query.friend_id)
            .await?,
    ))
}

pub async fn create_gift(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CreateSavedGift>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.validate()?;
    owned_friend(&deployment, user.id, payload.friend_id).await?;
    let gift = deployment.storage().create_saved_gift(user.id, &payload).await?;

    deployment
        .track_if_analytics_allowed(
            Some(user.id),
            "gift_saved",
            json!({
                "gift_id": gift.id.to_string(),
                "friend_id": gift.friend_id.to_string(),
                "category": gift.category,
            }),
        )
        .await;

    Ok((StatusCode::CREATED, ResponseJson(gift)))
}

pub async fn update_gift(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateSavedGift>,
) -> Result<ResponseJson<SavedGift>, ApiError> {
    let current = deployment
        .storage()
        .saved_gift(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("Gift"))?;
    let gift = deployment
        .storage()
        .update_saved_gift(&current.merge(payload)?)
        .await?
        .ok_or(ApiError::NotFound("Gift"))?;
    Ok(ResponseJson(gift))
}

pub async fn delete_gift(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if deployment.storage().delete_saved_gift(user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Gift"))
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/gifts",
        Router::new()
            .route("/", get(list_gifts).post(create_gift))
            .route("/{id}", put(update_gift).delete(delete_gift)),
    )
}
