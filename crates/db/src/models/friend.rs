use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, optional_text, optional_url, required_text};

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct Friend {
    pub id: Uuid,
    pub user_id: Uuid, // Owner; every query is scoped by it
    pub name: String,
    pub photo_url: Option<String>,
    pub personality_traits: Vec<String>,
    pub interests: Vec<String>,
    pub notes: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateFriend {
    pub name: String,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub personality_traits: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub notes: Option<String>,
    pub birthday: Option<NaiveDate>,
}

/// Partial update. Absent fields are left alone, blank text clears a nullable
/// field and `"birthday": null` clears the birthday.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateFriend {
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub personality_traits: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
    pub notes: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[ts(optional)]
    pub birthday: Option<Option<NaiveDate>>,
}

/// Trims tags, drops blanks and case-insensitive duplicates.
pub fn normalize_tags(field: &'static str, tags: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || !seen.insert(tag.to_lowercase()) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(ValidationError::new(
                field,
                format!("each {field} entry must be at most {MAX_TAG_CHARS} characters"),
            ));
        }
        out.push(tag.to_string());
    }
    if out.len() > MAX_TAGS {
        return Err(ValidationError::new(
            field,
            format!("at most {MAX_TAGS} {field} entries are allowed"),
        ));
    }
    Ok(out)
}

impl CreateFriend {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required_text("name", &self.name, 100)?,
            photo_url: optional_url("photo_url", self.photo_url)?,
            personality_traits: normalize_tags("personality_traits", self.personality_traits)?,
            interests: normalize_tags("interests", self.interests)?,
            notes: optional_text(self.notes),
            birthday: self.birthday,
        })
    }
}

impl Friend {
    /// Applies a partial update and re-validates the result.
    pub fn merge(mut self, update: UpdateFriend) -> Result<Self, ValidationError> {
        if let Some(name) = update.name {
            self.name = required_text("name", &name, 100)?;
        }
        if let Some(photo_url) = update.photo_url {
            self.photo_url = optional_url("photo_url", Some(photo_url))?;
        }
        if let Some(traits) = update.personality_traits {
            self.personality_traits = normalize_tags("personality_traits", traits)?;
        }
        if let Some(interests) = update.interests {
            self.interests = normalize_tags("interests", interests)?;
        }
        if let Some(notes) = update.notes {
            self.notes = optional_text(Some(notes));
        }
        if let Some(birthday) = update.birthday {
            self.birthday = birthday;
        }
        Ok(self)
    }

    pub async fn find_by_user_id(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Friend>(
            r#"SELECT id, user_id, name, photo_url, personality_traits, interests, notes, birthday,
                      created_at, updated_at
               FROM friends
               WHERE user_id = $1
               ORDER BY created_at DESC"#,
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
        sqlx::query_as::<_, Friend>(
            r#"SELECT id, user_id, name, photo_url, personality_traits, interests, notes, birthday,
                      created_at, updated_at
               FROM friends
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: &CreateFriend,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Friend>(
            r#"INSERT INTO friends (id, user_id, name, photo_url, personality_traits, interests, notes, birthday)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, user_id, name, photo_url, personality_traits, interests, notes, birthday,
                         created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&data.name)
        .bind(&data.photo_url)
        .bind(&data.personality_traits)
        .bind(&data.interests)
        .bind(&data.notes)
        .bind(data.birthday)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, friend: &Friend) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Friend>(
            r#"UPDATE friends
               SET name = $3, photo_url = $4, personality_traits = $5, interests = $6,
                   notes = $7, birthday = $8, updated_at = NOW()
               WHERE id = $1 AND user_id = $2
               RETURNING id, user_id, name, photo_url, personality_traits, interests, notes, birthday,
                         created_at, updated_at"#,
        )
        .bind(friend.id)
        .bind(friend.user_id)
        .bind(&friend.name)
        .bind(&friend.photo_url)
        .bind(&friend.personality_traits)
        .bind(&friend.interests)
        .bind(&friend.notes)
        .bind(friend.birthday)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM friends WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
