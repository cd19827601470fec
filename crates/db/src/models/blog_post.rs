use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, optional_text, optional_url, required_text};

pub const EXCERPT_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct BlogPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateBlogPost {
    pub title: String,
    pub content: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateBlogPost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct BlogPostQuery {
    #[serde(default)]
    pub include_drafts: bool,
}

/// Fully derived insert payload.
#[derive(Debug, Clone)]
pub struct NewBlogPost {
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub featured_image: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Lower-case ASCII alphanumerics joined by single hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Plain-text preview of markdown content, cut on a word boundary.
pub fn derive_excerpt(content: &str) -> String {
    let plain = content
        .lines()
        .map(|line| line.trim_start_matches(['#', '>', '-', '*', ' ']))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['*', '_', '`'], "");

    if plain.chars().count() <= EXCERPT_CHARS {
        return plain;
    }
    let cut: String = plain.chars().take(EXCERPT_CHARS).collect();
    let cut = match cut.rfind(' ') {
        Some(idx) if idx > EXCERPT_CHARS / 2 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end_matches([',', '.', ';', ':', ' ']))
}

fn validate_slug(slug: Option<String>, title: &str) -> Result<String, ValidationError> {
    let slug = match optional_text(slug) {
        Some(raw) => slugify(&raw),
        None => slugify(title),
    };
    if slug.is_empty() {
        return Err(ValidationError::new(
            "slug",
            "slug must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

impl CreateBlogPost {
    pub fn into_new(self, author_id: Uuid, now: DateTime<Utc>) -> Result<NewBlogPost, ValidationError> {
        let title = required_text("title", &self.title, 200)?;
        let content = required_text("content", &self.content, 100_000)?;
        let slug = validate_slug(self.slug, &title)?;
        let excerpt = optional_text(self.excerpt).unwrap_or_else(|| derive_excerpt(&content));
        Ok(NewBlogPost {
            author_id,
            title,
            slug,
            excerpt,
            content,
            featured_image: optional_url("featured_image", self.featured_image)?,
            published: self.published,
            published_at: self.published.then_some(now),
        })
    }
}

impl BlogPost {
    /// Applies a partial update. The slug is kept stable unless explicitly
    /// supplied; `published_at` is stamped on first publication. An excerpt
    /// that was derived from the old content follows new content; a
    /// hand-written one is kept.
    pub fn merge(mut self, update: UpdateBlogPost, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        if let Some(title) = update.title {
            self.title = required_text("title", &title, 200)?;
        }
        if let Some(content) = update.content {
            let derived = self.excerpt == derive_excerpt(&self.content);
            self.content = required_text("content", &content, 100_000)?;
            if derived && update.excerpt.is_none() {
                self.excerpt = derive_excerpt(&self.content);
            }
        }
        if let Some(slug) = update.slug {
            self.slug = validate_slug(Some(slug), &self.title)?;
        }
        if let Some(excerpt) = update.excerpt {
            self.excerpt = optional_text(Some(excerpt)).unwrap_or_else(|| derive_excerpt(&self.content));
        }
        if let Some(image) = update.featured_image {
            self.featured_image = optional_url("featured_image", Some(image))?;
        }
        if let Some(published) = update.published {
            self.published = published;
            if published && self.published_at.is_none() {
                self.published_at = Some(now);
            }
        }
        Ok(self)
    }

    pub async fn find_all(pool: &PgPool, include_drafts: bool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BlogPost>(
            r#"SELECT id, author_id, title, slug, excerpt, content, featured_image, published,
                      published_at, created_at, updated_at
               FROM blog_posts
               WHERE published = TRUE OR $1
               ORDER BY COALESCE(published_at, created_at) DESC"#,
        )
        .bind(include_drafts)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BlogPost>(
            r#"SELECT id, author_id, title, slug, excerpt, content, featured_image, published,
                      published_at, created_at, updated_at
               FROM blog_posts
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BlogPost>(
            r#"SELECT id, author_id, title, slug, excerpt, content, featured_image, published,
                      published_at, created_at, updated_at
               FROM blog_posts
               WHERE slug = $1"#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, data: &NewBlogPost) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, BlogPost>(
            r#"INSERT INTO blog_posts (id, author_id, title, slug, excerpt, content, featured_image,
                                       published, published_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, author_id, title, slug, excerpt, content, featured_image, published,
                         published_at, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.author_id)
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.excerpt)
        .bind(&data.content)
        .bind(&data.featured_image)
        .bind(data.published)
        .bind(data.published_at)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, post: &BlogPost) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BlogPost>(
            r#"UPDATE blog_posts
               SET title = $2, slug = $3, excerpt = $4, content = $5, featured_image = $6,
                   published = $7, published_at = $8, updated_at = NOW()
               WHERE id = $1
               RETURNING id, author_id, title, slug, excerpt, content, featured_image, published,
                         published_at, created_at, updated_at"#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.featured_image)
        .bind(post.published)
        .bind(post.published_at)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("  10 Gifts for the Outdoorsy Friend!  "), "10-gifts-for-the-outdoorsy-friend");
        assert_eq!(slugify("Café & Co."), "caf-co");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn short_excerpt_is_plain_text() {
        assert_eq!(derive_excerpt("# Hello\n\nSome **bold** text."), "Hello Some bold text.");
    }

    #[test]
    fn long_excerpt_is_cut_on_word_boundary() {
        let content = "word ".repeat(100);
        let excerpt = derive_excerpt(&content);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= EXCERPT_CHARS + 3);
        assert!(!excerpt.contains("wor..."));
    }

    #[test]
    fn create_derives_slug_excerpt_and_publication() {
        let now = Utc::now();
        let post = CreateBlogPost {
            title: "Gift Guide 2026".into(),
            content: "Our favourite picks.".into(),
            published: true,
            ..Default::default()
        }
        .into_new(Uuid::new_v4(), now)
        .unwrap();
        assert_eq!(post.slug, "gift-guide-2026");
        assert_eq!(post.excerpt, "Our favourite picks.");
        assert_eq!(post.published_at, Some(now));
    }

    #[test]
    fn draft_has_no_publication_date() {
        let post = CreateBlogPost {
            title: "Draft".into(),
            content: "WIP".into(),
            ..Default::default()
        }
        .into_new(Uuid::new_v4(), Utc::now())
        .unwrap();
        assert!(!post.published);
        assert!(post.published_at.is_none());
    }

    fn post(content: &str, excerpt: &str) -> BlogPost {
        let created = Utc::now();
        BlogPost {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "Post".into(),
            slug: "post".into(),
            excerpt: excerpt.into(),
            content: content.into(),
            featured_image: None,
            published: true,
            published_at: Some(created),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn derived_excerpt_follows_new_content() {
        let merged = post("old body", "old body")
            .merge(
                UpdateBlogPost {
                    content: Some("brand new body".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(merged.excerpt, "brand new body");
    }

    #[test]
    fn handwritten_excerpt_survives_content_edit() {
        let merged = post("old body", "A teaser")
            .merge(
                UpdateBlogPost {
                    content: Some("brand new body".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(merged.excerpt, "A teaser");
    }

    #[test]
    fn supplied_excerpt_wins_over_derivation() {
        let merged = post("old body", "old body")
            .merge(
                UpdateBlogPost {
                    content: Some("brand new body".into()),
                    excerpt: Some("Custom".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(merged.excerpt, "Custom");
    }

    #[test]
    fn publishing_stamps_date_once() {
        let created = Utc::now();
        let post = BlogPost {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "Draft".into(),
            slug: "draft".into(),
            excerpt: "WIP".into(),
            content: "WIP".into(),
            featured_image: None,
            published: false,
            published_at: None,
            created_at: created,
            updated_at: created,
        };
        let first = created + chrono::Duration::minutes(5);
        let published = post
            .merge(
                UpdateBlogPost {
                    published: Some(true),
                    title: Some("Final title".into()),
                    ..Default::default()
                },
                first,
            )
            .unwrap();
        assert_eq!(published.published_at, Some(first));
        assert_eq!(published.slug, "draft");

        let republished = published
            .clone()
            .merge(
                UpdateBlogPost {
                    published: Some(true),
                    ..Default::default()
                },
                first + chrono::Duration::days(1),
            )
            .unwrap();
        assert_eq!(republished.published_at, Some(first));
    }
}
