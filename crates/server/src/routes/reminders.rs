use std::collections::HashMap;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    routing::get,
};
use chrono::Utc;
use db::models::gift_reminder::{
    CreateGiftReminder, GiftReminder, UpcomingQuery, UpcomingReminder, UpdateGiftReminder,
};
use deployment::Deployment;
use serde_json::json;
use uuid::Uuid;

use super::friends::owned_friend;
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery, CurrentUser},
};

const DEFAULT_UPCOMING_DAYS: i64 = 30;
const MAX_UPCOMING_DAYS: i64 = 366;

async fn owned_reminder(
    deployment: &DeploymentImpl,
    user_id: Uuid,
    id: Uuid,
) -> Result<GiftReminder, ApiError> {
    deployment
        .storage()
        .reminder(user_id, id)
        .await?
        .ok_or(ApiError::NotFound("Reminder"))
}

pub async fn list_reminders(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
) -> Result<ResponseJson<Vec<GiftReminder>>, ApiError> {
    Ok(ResponseJson(deployment.storage().list_reminders(user.id).await?))
}

pub async fn create_reminder(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CreateGiftReminder>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.validate()?;
    owned_friend(&deployment, user.id, payload.friend_id).await?;
    let reminder = deployment.storage().create_reminder(user.id, &payload).await?;

    deployment
        .track_if_analytics_allowed(
            Some(user.id),
            "reminder_created",
            json!({
                "reminder_id": reminder.id.to_string(),
                "occasion": reminder.occasion,
                "recurring": reminder.recurring,
                "email_notifications": reminder.email_notifications,
            }),
        )
        .await;

    Ok((StatusCode::CREATED, ResponseJson(reminder)))
}

/// Active reminders whose next occurrence falls within `days` of today,
/// soonest first.
pub async fn upcoming_reminders(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppQuery(query): AppQuery<UpcomingQuery>,
) -> Result<ResponseJson<Vec<UpcomingReminder>>, ApiError> {
    let window = query
        .days
        .unwrap_or(DEFAULT_UPCOMING_DAYS)
        .clamp(0, MAX_UPCOMING_DAYS);
    let today = Utc::now().date_naive();

    let storage = deployment.storage();
    let names: HashMap<Uuid, String> = storage
        .list_friends(user.id)
        .await?
        .into_iter()
        .map(|friend| (friend.id, friend.name))
        .collect();

    let mut upcoming: Vec<UpcomingReminder> = storage
        .list_reminders(user.id)
        .await?
        .into_iter()
        .filter(|reminder| reminder.is_active)
        .filter_map(|reminder| {
            let next_occurrence = reminder.next_occurrence(today)?;
            let days_until = (next_occurrence - today).num_days();
            if days_until > window {
                return None;
            }
            Some(UpcomingReminder {
                friend_name: names.get(&reminder.friend_id).cloned().unwrap_or_default(),
                reminder,
                next_occurrence,
                days_until,
            })
        })
        .collect();
    upcoming.sort_by_key(|entry| entry.days_until);

    Ok(ResponseJson(upcoming))
}

pub async fn get_reminder(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<ResponseJson<GiftReminder>, ApiError> {
    Ok(ResponseJson(owned_reminder(&deployment, user.id, id).await?))
}

pub async fn update_reminder(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateGiftReminder>,
) -> Result<ResponseJson<GiftReminder>, ApiError> {
    let merged = owned_reminder(&deployment, user.id, id)
        .await?
        .merge(payload)?;
    let reminder = deployment
        .storage()
        .update_reminder(&merged)
        .await?
        .ok_or(ApiError::NotFound("Reminder"))?;
    Ok(ResponseJson(reminder))
}

pub async fn delete_reminder(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if deployment.storage().delete_reminder(user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Reminder"))
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/reminders",
        Router::new()
            .route("/", get(list_reminders).post(create_reminder))
            .route("/upcoming", get(upcoming_reminders))
            .route(
                "/{id}",
                get(get_reminder)
                    .put(update_reminder)
                    .delete(delete_reminder),
            ),
    )
}
