//! Request extractors: JSON/query/path wrappers that answer `{"error": ..}`
//! on rejection, and session-backed user lookups.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query},
    http::request::Parts,
};
use db::models::user::User;
use deployment::Deployment;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

pub const USER_ID_KEY: &str = "user_id";

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

async fn session(parts: &mut Parts, state: &DeploymentImpl) -> Result<Session, ApiError> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, message)| ApiError::Internal(message.to_string()))
}

async fn session_user(session: &Session, state: &DeploymentImpl) -> Result<Option<User>, ApiError> {
    let Some(user_id) = session.get::<Uuid>(USER_ID_KEY).await? else {
        return Ok(None);
    };
    let user = state.storage().user_by_id(user_id).await?;
    if user.is_none() {
        // Account vanished under a live session.
        session.flush().await?;
    }
    Ok(user)
}

/// The signed-in user; 401 otherwise.
pub struct CurrentUser(pub User);

impl FromRequestParts<DeploymentImpl> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let session = session(parts, state).await?;
        session_user(&session, state)
            .await?
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// The signed-in user if there is one.
pub struct OptionalUser(pub Option<User>);

impl FromRequestParts<DeploymentImpl> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let session = session(parts, state).await?;
        Ok(OptionalUser(session_user(&session, state).await?))
    }
}

impl OptionalUser {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(User::is_admin)
    }

    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|u| u.id)
    }
}

/// A signed-in admin; 401 without a session, 403 for other users.
pub struct AdminUser(pub User);

impl FromRequestParts<DeploymentImpl> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
