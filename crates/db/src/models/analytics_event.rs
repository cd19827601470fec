use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, optional_text};

pub const MAX_EVENT_TYPE_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub event_data: Value,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAnalyticsEvent {
    pub event_type: String,
    pub event_data: Option<Value>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalyticsEvent {
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub event_data: Value,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct EventCount {
    pub event_type: String,
    #[ts(type = "number")]
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AnalyticsSummary {
    pub since: DateTime<Utc>,
    #[ts(type = "number")]
    pub total_users: i64,
    #[ts(type = "number")]
    pub total_friends: i64,
    #[ts(type = "number")]
    pub total_saved_gifts: i64,
    #[ts(type = "number")]
    pub total_reminders: i64,
    #[ts(type = "number")]
    pub total_events: i64,
    pub events_by_type: Vec<EventCount>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

pub fn is_valid_event_type(event_type: &str) -> bool {
    !event_type.is_empty()
        && event_type.len() <= MAX_EVENT_TYPE_CHARS
        && event_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | ':' | '-'))
}

impl NewAnalyticsEvent {
    pub fn new(user_id: Option<Uuid>, event_type: &str, event_data: Value) -> Self {
        Self {
            user_id,
            event_type: event_type.to_string(),
            event_data,
            path: None,
        }
    }
}

impl CreateAnalyticsEvent {
    pub fn into_new(self, user_id: Option<Uuid>) -> Result<NewAnalyticsEvent, ValidationError> {
        let event_type = self.event_type.trim().to_string();
        if !is_valid_event_type(&event_type) {
            return Err(ValidationError::new(
                "event_type",
                format!(
                    "event_type must be 1-{MAX_EVENT_TYPE_CHARS} characters of a-z, 0-9, '_', '.', ':' or '-'"
                ),
            ));
        }
        let event_data = match self.event_data {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(data @ Value::Object(_)) => data,
            Some(_) => {
                return Err(ValidationError::new(
                    "event_data",
                    "event_data must be a JSON object",
                ));
            }
        };
        Ok(NewAnalyticsEvent {
            user_id,
            event_type,
            event_data,
            path: optional_text(self.path),
        })
    }
}

impl AnalyticsEvent {
    pub async fn create(pool: &PgPool, data: &NewAnalyticsEvent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AnalyticsEvent>(
            r#"INSERT INTO analytics_events (id, user_id, event_type, event_data, path)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, user_id, event_type, event_data, path, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.user_id)
        .bind(&data.event_type)
        .bind(&data.event_data)
        .bind(&data.path)
        .fetch_one(pool)
        .await
    }

    pub async fn count_by_type_since(
        pool: &PgPool,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventCount>, sqlx::Error> {
        sqlx::query_as::<_, EventCount>(
            r#"SELECT event_type, COUNT(*) AS count
               FROM analytics_events
               WHERE created_at >= $1
               GROUP BY event_type
               ORDER BY count DESC, event_type ASC"#,
        )
        .bind(since)
        .fetch_all(pool)
        .await
    }

    pub async fn summary(pool: &PgPool, since: DateTime<Utc>) -> Result<AnalyticsSummary, sqlx::Error> {
        let (total_users, total_friends, total_saved_gifts, total_reminders, total_events): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"SELECT
                 (SELECT COUNT(*) FROM users),
                 (SELECT COUNT(*) FROM friends),
                 (SELECT COUNT(*) FROM saved_gifts),
                 (SELECT COUNT(*) FROM gift_reminders),
                 (SELECT COUNT(*) FROM analytics_events WHERE created_at >= $1)"#,
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(AnalyticsSummary {
            since,
            total_users,
            total_friends,
            total_saved_gifts,
            total_reminders,
            total_events,
            events_by_type: Self::count_by_type_since(pool, since).await?,
        })
    }
}
