use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, looks_like_email, optional_text, required_text};

pub const DEFAULT_DAYS_BEFORE: i32 = 7;
pub const MAX_DAYS_BEFORE: i32 = 365;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct GiftReminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub friend_id: Uuid,
    pub occasion: String,
    pub occasion_date: NaiveDate,
    pub recurring: bool, // Repeats every year on the same month/day
    pub reminder_days_before: i32,
    pub email_notifications: bool,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_days_before() -> i32 {
    DEFAULT_DAYS_BEFORE
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateGiftReminder {
    pub friend_id: Uuid,
    pub occasion: String,
    pub occasion_date: NaiveDate,
    #[serde(default = "default_true")]
    pub recurring: bool,
    #[serde(default = "default_days_before")]
    pub reminder_days_before: i32,
    #[serde(default)]
    pub email_notifications: bool,
    pub email: Option<String>,
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateGiftReminder {
    pub occasion: Option<String>,
    pub occasion_date: Option<NaiveDate>,
    pub recurring: Option<bool>,
    pub reminder_days_before: Option<i32>,
    pub email_notifications: Option<bool>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

/// A reminder annotated with when it next fires, for the upcoming list.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpcomingReminder {
    #[serde(flatten)]
    #[ts(flatten)]
    pub reminder: GiftReminder,
    pub friend_name: String,
    pub next_occurrence: NaiveDate,
    #[ts(type = "number")]
    pub days_until: i64,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

fn validate_schedule(
    days_before: i32,
    email_notifications: bool,
    email: Option<String>,
) -> Result<Option<String>, ValidationError> {
    if !(0..=MAX_DAYS_BEFORE).contains(&days_before) {
        return Err(ValidationError::new(
            "reminder_days_before",
            format!("reminder_days_before must be between 0 and {MAX_DAYS_BEFORE}"),
        ));
    }
    let email = optional_text(email).map(|e| e.to_lowercase());
    match &email {
        None if email_notifications => Err(ValidationError::new(
            "email",
            "email is required when email notifications are enabled",
        )),
        Some(address) if !looks_like_email(address) => {
            Err(ValidationError::new("email", "Invalid email address"))
        }
        _ => Ok(email),
    }
}

impl CreateGiftReminder {
    pub fn validate(self) -> Result<Self, ValidationError> {
        let email = validate_schedule(
            self.reminder_days_before,
            self.email_notifications,
            self.email,
        )?;
        Ok(Self {
            occasion: required_text("occasion", &self.occasion, 100)?,
            email,
            notes: optional_text(self.notes),
            ..self
        })
    }
}

/// Same month/day in `year`; 29 February falls back to the 28th.
fn anniversary_in(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
}

impl GiftReminder {
    pub fn merge(mut self, update: UpdateGiftReminder) -> Result<Self, ValidationError> {
        if let Some(occasion) = update.occasion {
            self.occasion = required_text("occasion", &occasion, 100)?;
        }
        if let Some(date) = update.occasion_date {
            self.occasion_date = date;
        }
        if let Some(recurring) = update.recurring {
            self.recurring = recurring;
        }
        if let Some(days) = update.reminder_days_before {
            self.reminder_days_before = days;
        }
        if let Some(enabled) = update.email_notifications {
            self.email_notifications = enabled;
        }
        if let Some(email) = update.email {
            self.email = Some(email);
        }
        if let Some(notes) = update.notes {
            self.notes = optional_text(Some(notes));
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        self.email = validate_schedule(
            self.reminder_days_before,
            self.email_notifications,
            self.email.take(),
        )?;
        Ok(self)
    }

    /// The next date (on or after `today`) the occasion happens, if any.
    pub fn next_occurrence(&self, today: NaiveDate) -> Option<NaiveDate> {
        if self.occasion_date >= today {
            return Some(self.occasion_date);
        }
        if !self.recurring {
            return None;
        }
        let this_year = anniversary_in(self.occasion_date, today.year())?;
        if this_year >= today {
            Some(this_year)
        } else {
            anniversary_in(self.occasion_date, today.year() + 1)
        }
    }

    pub fn days_until(&self, today: NaiveDate) -> Option<i64> {
        self.next_occurrence(today)
            .map(|next| (next - today).num_days())
    }

    /// First day a notification may go out for the next occurrence.
    pub fn notify_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.next_occurrence(today)
            .map(|next| next - Duration::days(i64::from(self.reminder_days_before)))
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        if !self.is_active || !self.email_notifications || self.email.is_none() {
            return false;
        }
        let Some(notify_date) = self.notify_date(today) else {
            return false;
        };
        if today < notify_date {
            return false;
        }
        match self.last_notified_at {
            Some(at) => at.date_naive() < notify_date,
            None => true,
        }
    }

    pub async fn find_by_user_id(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, GiftReminder>(
            r#"SELECT id, user_id, friend_id, occasion, occasion_date, recurring, reminder_days_before,
                      email_notifications, email, notes, is_active, last_notified_at, created_at, updated_at
               FROM gift_reminders
               WHERE user_id = $1
               ORDER BY occasion_date ASC, created_at ASC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, GiftReminder>(
            r#"SELECT id, user_id, friend_id, occasion, occasion_date, recurring, reminder_days_before,
                      email_notifications, email, notes, is_active, last_notified_at, created_at, updated_at
               FROM gift_reminders
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Every active reminder with e-mail enabled, across all users.
    pub async fn find_active_with_email(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, GiftReminder>(
            r#"SELECT id, user_id, friend_id, occasion, occasion_date, recurring, reminder_days_before,
                      email_notifications, email, notes, is_active, last_notified_at, created_at, updated_at
               FROM gift_reminders
               WHERE is_active = TRUE
                 AND email_notifications = TRUE
                 AND email IS NOT NULL
               ORDER BY occasion_date ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: &CreateGiftReminder,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, GiftReminder>(
            r#"INSERT INTO gift_reminders (id, user_id, friend_id, occasion, occasion_date, recurring,
                                           reminder_days_before, email_notifications, email, notes, is_active)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING id, user_id, friend_id, occasion, occasion_date, recurring, reminder_days_before,
                         email_notifications, email, notes, is_active, last_notified_at, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(data.friend_id)
        .bind(&data.occasion)
        .bind(data.occasion_date)
        .bind(data.recurring)
        .bind(data.reminder_days_before)
        .bind(data.email_notifications)
        .bind(&data.email)
        .bind(&data.notes)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, reminder: &GiftReminder) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, GiftReminder>(
            r#"UPDATE gift_reminders
               SET occasion = $3, occasion_date = $4, recurring = $5, reminder_days_before = $6,
                   email_notifications = $7, email = $8, notes = $9, is_active = $10,
                   updated_at = NOW()
               WHERE id = $1 AND user_id = $2
               RETURNING id, user_id, friend_id, occasion, occasion_date, recurring, reminder_days_before,
                         email_notifications, email, notes, is_active, last_notified_at, created_at, updated_at"#,
        )
        .bind(reminder.id)
        .bind(reminder.user_id)
        .bind(&reminder.occasion)
        .bind(reminder.occasion_date)
        .bind(reminder.recurring)
        .bind(reminder.reminder_days_before)
        .bind(reminder.email_notifications)
        .bind(&reminder.email)
        .bind(&reminder.notes)
        .bind(reminder.is_active)
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_notified(
        pool: &PgPool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE gift_reminders SET last_notified_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM gift_reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
