//! Storage adapter: one trait, an in-memory backend and a PostgreSQL backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strum_macros::Display;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    analytics_event::{AnalyticsEvent, AnalyticsSummary, NewAnalyticsEvent},
    blog_post::{BlogPost, NewBlogPost},
    friend::{CreateFriend, Friend},
    gift_reminder::{CreateGiftReminder, GiftReminder},
    saved_gift::{CreateSavedGift, SavedGift},
    user::{NewUser, User, UserRole},
};

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::{DBService, PgStorage};

pub const EMAIL_TAKEN: &str = "An account with this email already exists";
pub const SLUG_TAKEN: &str = "A blog post with this slug already exists";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Conflict(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Postgres,
}

/// Persistence operations used by the API. Every per-user operation takes the
/// owner id and must never return another user's rows.
#[async_trait]
pub trait Storage: Send + Sync {
    fn kind(&self) -> StorageKind;

    // Users
    async fn create_user(&self, data: &NewUser) -> Result<User, StorageError>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;
    async fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<Option<User>, StorageError>;

    // Friends
    async fn list_friends(&self, user_id: Uuid) -> Result<Vec<Friend>, StorageError>;
    async fn friend(&self, user_id: Uuid, id: Uuid) -> Result<Option<Friend>, StorageError>;
    async fn create_friend(&self, user_id: Uuid, data: &CreateFriend) -> Result<Friend, StorageError>;
    async fn update_friend(&self, friend: &Friend) -> Result<Option<Friend>, StorageError>;
    async fn delete_friend(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError>;

    // Saved gifts
    async fn list_saved_gifts(
        &self,
        user_id: Uuid,
        friend_id: Option<Uuid>,
    ) -> Result<Vec<SavedGift>, StorageError>;
    async fn saved_gift(&self, user_id: Uuid, id: Uuid) -> Result<Option<SavedGift>, StorageError>;
    async fn create_saved_gift(
        &self,
        user_id: Uuid,
        data: &CreateSavedGift,
    ) -> Result<SavedGift, StorageError>;
    async fn update_saved_gift(&self, gift: &SavedGift) -> Result<Option<SavedGift>, StorageError>;
    async fn delete_saved_gift(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError>;

    // Reminders
    async fn list_reminders(&self, user_id: Uuid) -> Result<Vec<GiftReminder>, StorageError>;
    async fn reminder(&self, user_id: Uuid, id: Uuid) -> Result<Option<GiftReminder>, StorageError>;
    async fn create_reminder(
        &self,
        user_id: Uuid,
        data: &CreateGiftReminder,
    ) -> Result<GiftReminder, StorageError>;
    async fn update_reminder(
        &self,
        reminder: &GiftReminder,
    ) -> Result<Option<GiftReminder>, StorageError>;
    async fn delete_reminder(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError>;
    async fn active_email_reminders(&self) -> Result<Vec<GiftReminder>, StorageError>;
    async fn mark_reminder_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StorageError>;

    // Blog
    async fn list_blog_posts(&self, include_drafts: bool) -> Result<Vec<BlogPost>, StorageError>;
    async fn blog_post(&self, id: Uuid) -> Result<Option<BlogPost>, StorageError>;
    async fn blog_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, StorageError>;
    async fn create_blog_post(&self, data: &NewBlogPost) -> Result<BlogPost, StorageError>;
    async fn update_blog_post(&self, post: &BlogPost) -> Result<Option<BlogPost>, StorageError>;
    async fn delete_blog_post(&self, id: Uuid) -> Result<bool, StorageError>;

    // Analytics
    async fn record_event(&self, data: &NewAnalyticsEvent) -> Result<AnalyticsEvent, StorageError>;
    async fn analytics_summary(&self, since: DateTime<Utc>) -> Result<AnalyticsSummary, StorageError>;
}
