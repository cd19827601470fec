use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EMAIL_TAKEN, SLUG_TAKEN, Storage, StorageError, StorageKind};
use crate::models::{
    analytics_event::{AnalyticsEvent, AnalyticsSummary, EventCount, NewAnalyticsEvent},
    blog_post::{BlogPost, NewBlogPost},
    friend::{CreateFriend, Friend},
    gift_reminder::{CreateGiftReminder, GiftReminder},
    saved_gift::{CreateSavedGift, SavedGift},
    user::{NewUser, User, UserRole, normalize_email},
};

/// Rows keyed by id, remembering insertion order so listings are stable.
struct Table<T> {
    rows: HashMap<Uuid, (u64, T)>,
    next_seq: u64,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
            next_seq: 0,
        }
    }

    fn insert(&mut self, id: Uuid, row: T) -> T {
        self.next_seq += 1;
        self.rows.insert(id, (self.next_seq, row.clone()));
        row
    }

    fn get(&self, id: &Uuid) -> Option<&T> {
        self.rows.get(id).map(|(_, row)| row)
    }

    fn get_mut(&mut self, id: &Uuid) -> Option<&mut T> {
        self.rows.get_mut(id).map(|(_, row)| row)
    }

    fn remove(&mut self, id: &Uuid) -> Option<T> {
        self.rows.remove(id).map(|(_, row)| row)
    }

    fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.rows.retain(|_, (_, row)| keep(row));
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    /// Matching rows in insertion order.
    fn select(&self, filter: impl Fn(&T) -> bool) -> Vec<T> {
        let mut rows: Vec<_> = self.rows.values().filter(|(_, row)| filter(row)).collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, row)| row.clone()).collect()
    }
}

struct Tables {
    users: Table<User>,
    friends: Table<Friend>,
    saved_gifts: Table<SavedGift>,
    reminders: Table<GiftReminder>,
    blog_posts: Table<BlogPost>,
    events: Table<AnalyticsEvent>,
}

/// Process-local storage used when no database is configured. Emulates the
/// relational constraints the API relies on: unique e-mail and slug, and
/// cascading deletes from users and friends.
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                users: Table::new(),
                friends: Table::new(),
                saved_gifts: Table::new(),
                reminders: Table::new(),
                blog_posts: Table::new(),
                events: Table::new(),
            }),
        }
    }
}

fn conflict(message: &str) -> StorageError {
    StorageError::Conflict(message.to_string())
}

#[async_trait]
impl Storage for MemoryStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    async fn create_user(&self, data: &NewUser) -> Result<User, StorageError> {
        let mut tables = self.tables.write().await;
        let email = normalize_email(&data.email);
        if !tables.users.select(|u| u.email == email).is_empty() {
            return Err(conflict(EMAIL_TAKEN));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            username: data.username.clone(),
            password_hash: data.password_hash.clone(),
            role: data.role,
            created_at: now,
            updated_at: now,
        };
        Ok(tables.users.insert(user.id, user))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables.users.select(|u| u.email == email).into_iter().next())
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.tables.read().await.users.select(|_| true))
    }

    async fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<Option<User>, StorageError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn list_friends(&self, user_id: Uuid) -> Result<Vec<Friend>, StorageError> {
        let tables = self.tables.read().await;
        let mut friends = tables.friends.select(|f| f.user_id == user_id);
        friends.reverse();
        Ok(friends)
    }

    async fn friend(&self, user_id: Uuid, id: Uuid) -> Result<Option<Friend>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.friends.get(&id).filter(|f| f.user_id == user_id).cloned())
    }

    async fn create_friend(&self, user_id: Uuid, data: &CreateFriend) -> Result<Friend, StorageError> {
        let now = Utc::now();
        let friend = Friend {
            id: Uuid::new_v4(),
            user_id,
            name: data.name.clone(),
            photo_url: data.photo_url.clone(),
            personality_traits: data.personality_traits.clone(),
            interests: data.interests.clone(),
            notes: data.notes.clone(),
            birthday: data.birthday,
            created_at: now,
            updated_at: now,
        };
        Ok(self.tables.write().await.friends.insert(friend.id, friend))
    }

    async fn update_friend(&self, friend: &Friend) -> Result<Option<Friend>, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables
            .friends
            .get_mut(&friend.id)
            .filter(|f| f.user_id == friend.user_id)
        else {
            return Ok(None);
        };
        *stored = Friend {
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..friend.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn delete_friend(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.friend_owned_by(user_id, id).is_none() {
            return Ok(false);
        }
        tables.friends.remove(&id);
        tables.saved_gifts.retain(|g| g.friend_id != id);
        tables.reminders.retain(|r| r.friend_id != id);
        Ok(true)
    }

    async fn list_saved_gifts(
        &self,
        user_id: Uuid,
        friend_id: Option<Uuid>,
    ) -> Result<Vec<SavedGift>, StorageError> {
        let tables = self.tables.read().await;
        let mut gifts = tables.saved_gifts.select(|g| {
            g.user_id == user_id && friend_id.is_none_or(|friend_id| g.friend_id == friend_id)
        });
        gifts.reverse();
        Ok(gifts)
    }

    async fn saved_gift(&self, user_id: Uuid, id: Uuid) -> Result<Option<SavedGift>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.saved_gifts.get(&id).filter(|g| g.user_id == user_id).cloned())
    }

    async fn create_saved_gift(
        &self,
        user_id: Uuid,
        data: &CreateSavedGift,
    ) -> Result<SavedGift, StorageError> {
        let gift = SavedGift {
            id: Uuid::new_v4(),
            user_id,
            friend_id: data.friend_id,
            name: data.name.clone(),
            description: data.description.clone(),
            price: data.price.clone(),
            reasoning: data.reasoning.clone(),
            image_url: data.image_url.clone(),
            purchase_url: data.purchase_url.clone(),
            category: data.category.clone(),
            purchased: false,
            created_at: Utc::now(),
        };
        Ok(self.tables.write().await.saved_gifts.insert(gift.id, gift))
    }

    async fn update_saved_gift(&self, gift: &SavedGift) -> Result<Option<SavedGift>, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables
            .saved_gifts
            .get_mut(&gift.id)
            .filter(|g| g.user_id == gift.user_id)
        else {
            return Ok(None);
        };
        *stored = SavedGift {
            friend_id: stored.friend_id,
            created_at: stored.created_at,
            ..gift.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn delete_saved_gift(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.saved_gifts.get(&id).is_none_or(|g| g.user_id != user_id) {
            return Ok(false);
        }
        Ok(tables.saved_gifts.remove(&id).is_some())
    }

    async fn list_reminders(&self, user_id: Uuid) -> Result<Vec<GiftReminder>, StorageError> {
        let tables = self.tables.read().await;
        let mut reminders = tables.reminders.select(|r| r.user_id == user_id);
        reminders.sort_by_key(|r| r.occasion_date);
        Ok(reminders)
    }

    async fn reminder(&self, user_id: Uuid, id: Uuid) -> Result<Option<GiftReminder>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.reminders.get(&id).filter(|r| r.user_id == user_id).cloned())
    }

    async fn create_reminder(
        &self,
        user_id: Uuid,
        data: &CreateGiftReminder,
    ) -> Result<GiftReminder, StorageError> {
        let now = Utc::now();
        let reminder = GiftReminder {
            id: Uuid::new_v4(),
            user_id,
            friend_id: data.friend_id,
            occasion: data.occasion.clone(),
            occasion_date: data.occasion_date,
            recurring: data.recurring,
            reminder_days_before: data.reminder_days_before,
            email_notifications: data.email_notifications,
            email: data.email.clone(),
            notes: data.notes.clone(),
            is_active: data.is_active,
            last_notified_at: None,
            created_at: now,
            updated_at: now,
        };
        Ok(self.tables.write().await.reminders.insert(reminder.id, reminder))
    }

    async fn update_reminder(
        &self,
        reminder: &GiftReminder,
    ) -> Result<Option<GiftReminder>, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables
            .reminders
            .get_mut(&reminder.id)
            .filter(|r| r.user_id == reminder.user_id)
        else {
            return Ok(None);
        };
        *stored = GiftReminder {
            friend_id: stored.friend_id,
            last_notified_at: stored.last_notified_at,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..reminder.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn delete_reminder(&self, user_id: Uuid, id: Uuid) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.reminders.get(&id).is_none_or(|r| r.user_id != user_id) {
            return Ok(false);
        }
        Ok(tables.reminders.remove(&id).is_some())
    }

    async fn active_email_reminders(&self) -> Result<Vec<GiftReminder>, StorageError> {
        let tables = self.tables.read().await;
        let mut reminders = tables
            .reminders
            .select(|r| r.is_active && r.email_notifications && r.email.is_some());
        reminders.sort_by_key(|r| r.occasion_date);
        Ok(reminders)
    }

    async fn mark_reminder_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StorageError> {
        if let Some(reminder) = self.tables.write().await.reminders.get_mut(&id) {
            reminder.last_notified_at = Some(at);
        }
        Ok(())
    }

    async fn list_blog_posts(&self, include_drafts: bool) -> Result<Vec<BlogPost>, StorageError> {
        let tables = self.tables.read().await;
        let mut posts = tables.blog_posts.select(|p| p.published || include_drafts);
        posts.reverse();
        posts.sort_by_key(|p| std::cmp::Reverse(p.published_at.unwrap_or(p.created_at)));
        Ok(posts)
    }

    async fn blog_post(&self, id: Uuid) -> Result<Option<BlogPost>, StorageError> {
        Ok(self.tables.read().await.blog_posts.get(&id).cloned())
    }

    async fn blog_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.blog_posts.select(|p| p.slug == slug).into_iter().next())
    }

    async fn create_blog_post(&self, data: &NewBlogPost) -> Result<BlogPost, StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.blog_posts.select(|p| p.slug == data.slug).is_empty() {
            return Err(conflict(SLUG_TAKEN));
        }
        let now = Utc::now();
        let post = BlogPost {
            id: Uuid::new_v4(),
            author_id: data.author_id,
            title: data.title.clone(),
            slug: data.slug.clone(),
            excerpt: data.excerpt.clone(),
            content: data.content.clone(),
            featured_image: data.featured_image.clone(),
            published: data.published,
            published_at: data.published_at,
            created_at: now,
            updated_at: now,
        };
        Ok(tables.blog_posts.insert(post.id, post))
    }

    async fn update_blog_post(&self, post: &BlogPost) -> Result<Option<BlogPost>, StorageError> {
        let mut tables = self.tables.write().await;
        if !tables
            .blog_posts
            .select(|p| p.slug == post.slug && p.id != post.id)
            .is_empty()
        {
            return Err(conflict(SLUG_TAKEN));
        }
        let Some(stored) = tables.blog_posts.get_mut(&post.id) else {
            return Ok(None);
        };
        *stored = BlogPost {
            author_id: stored.author_id,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..post.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn delete_blog_post(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.tables.write().await.blog_posts.remove(&id).is_some())
    }

    async fn record_event(&self, data: &NewAnalyticsEvent) -> Result<AnalyticsEvent, StorageError> {
        let event = AnalyticsEvent {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            event_type: data.event_type.clone(),
            event_data: data.event_data.clone(),
            path: data.path.clone(),
            created_at: Utc::now(),
        };
        Ok(self.tables.write().await.events.insert(event.id, event))
    }

    async fn analytics_summary(&self, since: DateTime<Utc>) -> Result<AnalyticsSummary, StorageError> {
        let tables = self.tables.read().await;
        let recent = tables.events.select(|e| e.created_at >= since);

        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for event in &recent {
            *counts.entry(event.event_type.as_str()).or_default() += 1;
        }
        let mut events_by_type: Vec<EventCount> = counts
            .into_iter()
            .map(|(event_type, count)| EventCount {
                event_type: event_type.to_string(),
                count,
            })
            .collect();
        // Stable sort keeps the alphabetical order among equal counts.
        events_by_type.sort_by_key(|c| std::cmp::Reverse(c.count));

        Ok(AnalyticsSummary {
            since,
            total_users: tables.users.len() as i64,
            total_friends: tables.friends.len() as i64,
            total_saved_gifts: tables.saved_gifts.len() as i64,
            total_reminders: tables.reminders.len() as i64,
            total_events: recent.len() as i64,
            events_by_type,
        })
    }
}

impl Tables {
    fn friend_owned_by(&self, user_id: Uuid, id: Uuid) -> Option<&Friend> {
        self.friends.get(&id).filter(|f| f.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    use super::*;
    use crate::models::blog_post::CreateBlogPost;

    async fn user(storage: &MemoryStorage, email: &str) -> User {
        storage
            .create_user(&NewUser {
                email: email.to_string(),
                username: "someone".to_string(),
                password_hash: "hash".to_string(),
                role: UserRole::User,
            })
            .await
            .unwrap()
    }

    async fn friend(storage: &MemoryStorage, user_id: Uuid, name: &str) -> Friend {
        storage
            .create_friend(
                user_id,
                &CreateFriend {
                    name: name.to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    fn reminder_for(friend_id: Uuid, date: NaiveDate) -> CreateGiftReminder {
        CreateGiftReminder {
            friend_id,
            occasion: "Birthday".into(),
            occasion_date: date,
            recurring: true,
            reminder_days_before: 7,
            email_notifications: true,
            email: Some("ada@example.com".into()),
            notes: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() {
        let storage = MemoryStorage::new();
        user(&storage, "ada@example.com").await;
        let err = storage
            .create_user(&NewUser {
                email: "ADA@example.com".into(),
                username: "ada2".into(),
                password_hash: "hash".into(),
                role: UserRole::User,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(msg) if msg == EMAIL_TAKEN));
    }

    #[tokio::test]
    async fn friends_are_scoped_to_owner_and_newest_first() {
        let storage = MemoryStorage::new();
        let ada = user(&storage, "ada@example.com").await;
        let bob = user(&storage, "bob@example.com").await;
        let first = friend(&storage, ada.id, "Maya").await;
        let second = friend(&storage, ada.id, "Leo").await;
        friend(&storage, bob.id, "Zed").await;

        let names: Vec<_> = storage
            .list_friends(ada.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Leo", "Maya"]);
        assert!(storage.friend(bob.id, first.id).await.unwrap().is_none());
        assert!(!storage.delete_friend(bob.id, second.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_by_other_user_is_not_found() {
        let storage = MemoryStorage::new();
        let ada = user(&storage, "ada@example.com").await;
        let maya = friend(&storage, ada.id, "Maya").await;
        let hijacked = Friend {
            user_id: Uuid::new_v4(),
            name: "Stolen".into(),
            ..maya.clone()
        };
        assert!(storage.update_friend(&hijacked).await.unwrap().is_none());
        let stored = storage.friend(ada.id, maya.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Maya");
    }

    #[tokio::test]
    async fn deleting_friend_cascades() {
        let storage = MemoryStorage::new();
        let ada = user(&storage, "ada@example.com").await;
        let maya = friend(&storage, ada.id, "Maya").await;
        let leo = friend(&storage, ada.id, "Leo").await;
        for friend_id in [maya.id, leo.id] {
            storage
                .create_saved_gift(
                    ada.id,
                    &CreateSavedGift {
                        friend_id,
                        name: "Headlamp".into(),
                        description: None,
                        price: None,
                        reasoning: None,
                        image_url: None,
                        purchase_url: None,
                        category: None,
                    },
                )
                .await
                .unwrap();
            storage
                .create_reminder(
                    ada.id,
                    &reminder_for(friend_id, NaiveDate::from_ymd_opt(1990, 6, 15).unwrap()),
                )
                .await
                .unwrap();
        }

        assert!(storage.delete_friend(ada.id, maya.id).await.unwrap());
        let gifts = storage.list_saved_gifts(ada.id, None).await.unwrap();
        assert_eq!(gifts.len(), 1);
        assert_eq!(gifts[0].friend_id, leo.id);
        assert_eq!(storage.list_reminders(ada.id).await.unwrap().len(), 1);
        assert!(storage
            .list_saved_gifts(ada.id, Some(maya.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reminders_sorted_by_date_and_notification_persists() {
        let storage = MemoryStorage::new();
        let ada = user(&storage, "ada@example.com").await;
        let maya = friend(&storage, ada.id, "Maya").await;
        let late = storage
            .create_reminder(ada.id, &reminder_for(maya.id, NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()))
            .await
            .unwrap();
        storage
            .create_reminder(ada.id, &reminder_for(maya.id, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()))
            .await
            .unwrap();

        let dates: Vec<_> = storage
            .list_reminders(ada.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.occasion_date.to_string())
            .collect();
        assert_eq!(dates, vec!["2026-03-01", "2026-12-01"]);

        let at = Utc::now();
        storage.mark_reminder_notified(late.id, at).await.unwrap();
        let updated = storage
            .update_reminder(&GiftReminder {
                occasion: "Anniversary".into(),
                ..late.clone()
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.occasion, "Anniversary");
        assert_eq!(updated.last_notified_at, Some(at));
    }

    #[tokio::test]
    async fn drafts_hidden_and_slugs_unique() {
        let storage = MemoryStorage::new();
        let author = Uuid::new_v4();
        let now = Utc::now();
        let published = CreateBlogPost {
            title: "Gift Guide".into(),
            content: "Picks".into(),
            published: true,
            ..Default::default()
        }
        .into_new(author, now)
        .unwrap();
        storage.create_blog_post(&published).await.unwrap();
        let draft = CreateBlogPost {
            title: "Draft".into(),
            content: "WIP".into(),
            ..Default::default()
        }
        .into_new(author, now)
        .unwrap();
        let draft = storage.create_blog_post(&draft).await.unwrap();

        assert_eq!(storage.list_blog_posts(false).await.unwrap().len(), 1);
        assert_eq!(storage.list_blog_posts(true).await.unwrap().len(), 2);

        let err = storage.create_blog_post(&published).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(msg) if msg == SLUG_TAKEN));

        let renamed = BlogPost {
            slug: "gift-guide".into(),
            ..draft
        };
        assert!(storage.update_blog_post(&renamed).await.is_err());
    }

    #[tokio::test]
    async fn summary_counts_recent_events_by_type() {
        let storage = MemoryStorage::new();
        let ada = user(&storage, "ada@example.com").await;
        for event_type in ["page_view", "gift_saved", "page_view"] {
            storage
                .record_event(&NewAnalyticsEvent::new(Some(ada.id), event_type, json!({})))
                .await
                .unwrap();
        }

        let summary = storage
            .analytics_summary(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(summary.total_users, 1);
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.events_by_type[0].event_type, "page_view");
        assert_eq!(summary.events_by_type[0].count, 2);

        let future = storage
            .analytics_summary(Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(future.total_events, 0);
        assert!(future.events_by_type.is_empty());
    }
}
