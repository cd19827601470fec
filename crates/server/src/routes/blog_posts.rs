use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    routing::get,
};
use chrono::Utc;
use db::models::blog_post::{BlogPost, BlogPostQuery, CreateBlogPost, UpdateBlogPost};
use deployment::Deployment;
use serde_json::json;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AdminUser, AppJson, AppPath, AppQuery, OptionalUser},
};

/// Drafts only exist for admins; everyone else gets a 404.
fn visible_to(post: Option<BlogPost>, viewer: &OptionalUser) -> Result<BlogPost, ApiError> {
    match post {
        Some(post) if post.published || viewer.is_admin() => Ok(post),
        _ => Err(ApiError::NotFound("Blog post")),
    }
}

pub async fn list_posts(
    State(deployment): State<DeploymentImpl>,
    viewer: OptionalUser,
    AppQuery(query): AppQuery<BlogPostQuery>,
) -> Result<ResponseJson<Vec<BlogPost>>, ApiError> {
    let include_drafts = query.include_drafts && viewer.is_admin();
    Ok(ResponseJson(
        deployment.storage().list_blog_posts(include_drafts).await?,
    ))
}

pub async fn get_post_by_slug(
    State(deployment): State<DeploymentImpl>,
    viewer: OptionalUser,
    AppPath(slug): AppPath<String>,
) -> Result<ResponseJson<BlogPost>, ApiError> {
    let post = deployment.storage().blog_post_by_slug(&slug).await?;
    Ok(ResponseJson(visible_to(post, &viewer)?))
}

pub async fn get_post(
    State(deployment): State<DeploymentImpl>,
    viewer: OptionalUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<ResponseJson<BlogPost>, ApiError> {
    let post = deployment.storage().blog_post(id).await?;
    Ok(ResponseJson(visible_to(post, &viewer)?))
}

pub async fn create_post(
    State(deployment): State<DeploymentImpl>,
    AdminUser(admin): AdminUser,
    AppJson(payload): AppJson<CreateBlogPost>,
) -> Result<impl IntoResponse, ApiError> {
    let data = payload.into_new(admin.id, Utc::now())?;
    let post = deployment.storage().create_blog_post(&data).await?;

    deployment
        .track_if_analytics_allowed(
            Some(admin.id),
            "blog_post_created",
            json!({
                "post_id": post.id.to_string(),
                "slug": post.slug,
                "published": post.published,
            }),
        )
        .await;

    Ok((StatusCode::CREATED, ResponseJson(post)))
}

pub async fn update_post(
    State(deployment): State<DeploymentImpl>,
    AdminUser(_admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateBlogPost>,
) -> Result<ResponseJson<BlogPost>, ApiError> {
    let storage = deployment.storage();
    let merged = storage
        .blog_post(id)
        .await?
        .ok_or(ApiError::NotFound("Blog post"))?
        .merge(payload, Utc::now())?;
    let post = storage
        .update_blog_post(&merged)
        .await?
        .ok_or(ApiError::NotFound("Blog post"))?;
    Ok(ResponseJson(post))
}

pub async fn delete_post(
    State(deployment): State<DeploymentImpl>,
    AdminUser(_admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if deployment.storage().delete_blog_post(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Blog post"))
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/blog-posts",
        Router::new()
            .route("/", get(list_posts).post(create_post))
            .route("/by-slug/{slug}", get(get_post_by_slug))
            .route(
                "/{id}",
                get(get_post).put(update_post).delete(delete_post),
            ),
    )
}
