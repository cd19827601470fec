use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, looks_like_email, required_text};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

/// Stored account. Never serialised directly: handlers return [`UserInfo`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-safe projection of [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RegisterUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateUserRole {
    pub role: UserRole,
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl RegisterUser {
    /// Returns the normalised payload (trimmed username, lower-cased email).
    pub fn validate(self) -> Result<Self, ValidationError> {
        let email = normalize_email(&self.email);
        if !looks_like_email(&email) {
            return Err(ValidationError::new("email", "Invalid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::new(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }
        let username = required_text("username", &self.username, 50)?;
        Ok(Self {
            email,
            username,
            password: self.password,
        })
    }
}

impl User {
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub async fn create(pool: &PgPool, data: &NewUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, username, password_hash, role)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, email, username, password_hash, role, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.email)
        .bind(&data.username)
        .bind(&data.password_hash)
        .bind(data.role)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, password_hash, role, created_at, updated_at
               FROM users
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, password_hash, role, created_at, updated_at
               FROM users
               WHERE email = $1"#,
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, password_hash, role, created_at, updated_at
               FROM users
               ORDER BY created_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn update_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET role = $2, updated_at = NOW()
               WHERE id = $1
               RETURNING id, email, username, password_hash, role, created_at, updated_at"#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }
}
