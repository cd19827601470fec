use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, optional_text, optional_url, required_text};

/// A recommendation the user kept for a friend.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct SavedGift {
    pub id: Uuid,
    pub user_id: Uuid,
    pub friend_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub reasoning: Option<String>,
    pub image_url: Option<String>,
    pub purchase_url: Option<String>,
    pub category: Option<String>,
    pub purchased: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateSavedGift {
    pub friend_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub reasoning: Option<String>,
    pub image_url: Option<String>,
    pub purchase_url: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateSavedGift {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub reasoning: Option<String>,
    pub image_url: Option<String>,
    pub purchase_url: Option<String>,
    pub category: Option<String>,
    pub purchased: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SavedGiftQuery {
    pub friend_id: Option<Uuid>,
}

impl CreateSavedGift {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            friend_id: self.friend_id,
            name: required_text("name", &self.name, 200)?,
            description: optional_text(self.description),
            price: optional_text(self.price),
            reasoning: optional_text(self.reasoning),
            image_url: optional_url("image_url", self.image_url)?,
            purchase_url: optional_url("purchase_url", self.purchase_url)?,
            category: optional_text(self.category),
        })
    }
}

impl SavedGift {
    pub fn merge(mut self, update: UpdateSavedGift) -> Result<Self, ValidationError> {
        if let Some(name) = update.name {
            self.name = required_text("name", &name, 200)?;
        }
        if let Some(description) = update.description {
            self.description = optional_text(Some(description));
        }
        if let Some(price) = update.price {
            self.price = optional_text(Some(price));
        }
        if let Some(reasoning) = update.reasoning {
            self.reasoning = optional_text(Some(reasoning));
        }
        if let Some(image_url) = update.image_url {
            self.image_url = optional_url("image_url", Some(image_url))?;
        }
        if let Some(purchase_url) = update.purchase_url {
            self.purchase_url = optional_url("purchase_url", Some(purchase_url))?;
        }
        if let Some(category) = update.category {
            self.category = optional_text(Some(category));
        }
        if let Some(purchased) = update.purchased {
            self.purchased = purchased;
        }
        Ok(self)
    }

    pub async fn find_by_user_id(
        pool: &PgPool,
        user_id: Uuid,
        friend_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SavedGift>(
            r#"SELECT id, user_id, friend_id, name, description, price, reasoning, image_url,
                      purchase_url, category, purchased, created_at
               FROM saved_gifts
               WHERE user_id = $1
                 AND ($2::uuid IS NULL OR friend_id = $2)
               ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .bind(friend_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SavedGift>(
            r#"SELECT id, user_id, friend_id, name, description, price, reasoning, image_url,
                      purchase_url, category, purchased, created_at
               FROM saved_gifts
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
        data: &CreateSavedGift,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SavedGift>(
            r#"INSERT INTO saved_gifts (id, user_id, friend_id, name, description, price, reasoning,
                                        image_url, purchase_url, category)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, user_id, friend_id, name, description, price, reasoning, image_url,
                         purchase_url, category, purchased, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(data.friend_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.price)
        .bind(&data.reasoning)
        .bind(&data.image_url)
        .bind(&data.purchase_url)
        .bind(&data.category)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, gift: &SavedGift) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SavedGift>(
            r#"UPDATE saved_gifts
               SET name = $3, description = $4, price = $5, reasoning = $6, image_url = $7,
                   purchase_url = $8, category = $9, purchased = $10
               WHERE id = $1 AND user_id = $2
               RETURNING id, user_id, friend_id, name, description, price, reasoning, image_url,
                         purchase_url, category, purchased, created_at"#,
        )
        .bind(gift.id)
        .bind(gift.user_id)
        .bind(&gift.name)
        .bind(&gift.description)
        .bind(&gift.price)
        .bind(&gift.reasoning)
        .bind(&gift.image_url)
        .bind(&gift.purchase_url)
        .bind(&gift.category)
        .bind(gift.purchased)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM saved_gifts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
