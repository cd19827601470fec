use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use super::{EMAIL_TAKEN, SLUG_TAKEN, Storage, StorageError, StorageKind};
use crate::models::{
    analytics_event::{AnalyticsEvent, AnalyticsSummary, NewAnalyticsEvent},
    blog_post::{BlogPost, NewBlogPost},
    friend::{CreateFriend, Friend},
    gift_reminder::{CreateGiftReminder, GiftReminder},
    saved_gift::{CreateSavedGift, SavedGift},
    user::{NewUser, User, UserRole, normalize_email},
};

#[derive(Clone)]
pub struct DBService {
    pub pool: PgPool,
}

impl DBService {
    /// Connects and brings the schema up to date.
    pub async fn new(database_url: &str) -> Result<DBService, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database connected and migrations applied");
        Ok(DBService { pool })
    }
}

/// Client-facing message for a unique violation on `constraint`.
fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => EMAIL_TAKEN,
        Some("blog_posts_slug_key") => SLUG_TAKEN,
        _ => "Record already exists",
    }
}

fn map_err(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::Conflict(conflict_message(db_err.constraint()).to_string());
        }
    }
    StorageError::Database(err)
}

/// PostgreSQL-backed storage. Queries live next to the models.
#[derive(Clone)]
pub struct PgStorage {
    db: DBService,
}

impl PgStorage {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Postgres
    }

    async fn create_user(&self, data: &NewUser) -> Result<User, StorageError> {
        User::create(self.pool(), data).await.map_err(map_err)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(User::find_by_id(self.pool(), id).await?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(User::find_by_email(self.pool(), &normalize_email(email)).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        Ok(User::find_all(self.pool()).await?)
    }

    async fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<Option<User>, StorageError> {
        Ok(User::update_role(self.pool(), id, role).await?)
    }

    async fn list_friends(&self, user_id: Uuid) -> Result<Vec<Friend>, StorageError> {
        Ok(Friend::find_by_user_id(self.pool(), user_id).await?)
    }

    async fn friend(&self, user_id: Uuid, id: Uuid) -> Result<Option<Friend>, StorageError> {
        Ok(Friend::find_by_id(self.pool(), user_id, id).await?)
    }

    async fn create_friend(&self, user_id: Uuid, data: &CreateFriend) -> Result<Friend, StorageError> {
        Friend::create(self.pool(), user_id, data).await.map_err(map_err)
    }

    async fn update_friend(&self, friend: &Friend) -> Result<Option<Friend>, StorageError> {
        Friend::update(self.pool(), friend).await.map_err(map_err)
    }

    async fn delete_friend(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError> {
        Ok(Friend::delete(self.pool(), user_id, id).await? > 0)
    }

    async fn list_saved_gifts(
        &self,
        user_id: Uuid,
        friend_id: Option<Uuid>,
    ) -> Result<Vec<SavedGift>, StorageError> {
        Ok(SavedGift::find_by_user_id(self.pool(), user_id, friend_id).await?)
    }

    async fn saved_gift(&self, user_id: Uuid, id: Uuid) -> Result<Option<SavedGift>, StorageError> {
        Ok(SavedGift::find_by_id(self.pool(), user_id, id).await?)
    }

    async fn create_saved_gift(
        &self,
        user_id: Uuid,
        data: &CreateSavedGift,
    ) -> Result<SavedGift, StorageError> {
        SavedGift::create(self.pool(), user_id, data).await.map_err(map_err)
    }

    async fn update_saved_gift(&self, gift: &SavedGift) -> Result<Option<SavedGift>, StorageError> {
        SavedGift::update(self.pool(), gift).await.map_err(map_err)
    }

    async fn delete_saved_gift(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError> {
        Ok(SavedGift::delete(self.pool(), user_id, id).await? > 0)
    }

    async fn list_reminders(&self, user_id: Uuid) -> Result<Vec<GiftReminder>, StorageError> {
        Ok(GiftReminder::find_by_user_id(self.pool(), user_id).await?)
    }

    async fn reminder(&self, user_id: Uuid, id: Uuid) -> Result<Option<GiftReminder>, StorageError> {
        Ok(GiftReminder::find_by_id(self.pool(), user_id, id).await?)
    }

    async fn create_reminder(
        &self,
        user_id: Uuid,
        data: &CreateGiftReminder,
    ) -> Result<GiftReminder, StorageError> {
        GiftReminder::create(self.pool(), user_id, data).await.map_err(map_err)
    }

    async fn update_reminder(
        &self,
        reminder: &GiftReminder,
    ) -> Result<Option<GiftReminder>, StorageError> {
        GiftReminder::update(self.pool(), reminder).await.map_err(map_err)
    }

    async fn delete_reminder(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError> {
        Ok(GiftReminder::delete(self.pool(), user_id, id).await? > 0)
    }

    async fn active_email_reminders(&self) -> Result<Vec<GiftReminder>, StorageError> {
        Ok(GiftReminder::find_active_with_email(self.pool()).await?)
    }

    async fn mark_reminder_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StorageError> {
        Ok(GiftReminder::mark_notified(self.pool(), id, at).await?)
    }

    async fn list_blog_posts(&self, include_drafts: bool) -> Result<Vec<BlogPost>, StorageError> {
        Ok(BlogPost::find_all(self.pool(), include_drafts).await?)
    }

    async fn blog_post(&self, id: Uuid) -> Result<Option<BlogPost>, StorageError> {
        Ok(BlogPost::find_by_id(self.pool(), id).await?)
    }

    async fn blog_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, StorageError> {
        Ok(BlogPost::find_by_slug(self.pool(), slug).await?)
    }

    async fn create_blog_post(&self, data: &NewBlogPost) -> Result<BlogPost, StorageError> {
        BlogPost::create(self.pool(), data).await.map_err(map_err)
    }

    async fn update_blog_post(&self, post: &BlogPost) -> Result<Option<BlogPost>, StorageError> {
        BlogPost::update(self.pool(), post).await.map_err(map_err)
    }

    async fn delete_blog_post(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(BlogPost::delete(self.pool(), id).await? > 0)
    }

    async fn record_event(&self, data: &NewAnalyticsEvent) -> Result<AnalyticsEvent, StorageError> {
        Ok(AnalyticsEvent::create(self.pool(), data).await?)
    }

    async fn analytics_summary(&self, since: DateTime<Utc>) -> Result<AnalyticsSummary, StorageError> {
        Ok(AnalyticsEvent::summary(self.pool(), since).await?)
    }
}
