use axum::Router;

use crate::DeploymentImpl;

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod blog_posts;
pub mod friends;
pub mod gifts;
pub mod health;
pub mod product_metadata;
pub mod recommendations;
pub mod reminders;
pub mod uploads;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(auth::router(&deployment))
        .merge(friends::router(&deployment))
        .merge(recommendations::router(&deployment))
        .merge(gifts::router(&deployment))
        .merge(product_metadata::router(&deployment))
        .merge(reminders::router(&deployment))
        .merge(blog_posts::router(&deployment))
        .merge(analytics::router(&deployment))
        .merge(admin::router(&deployment))
        .merge(uploads::router(&deployment));

    Router::new().nest("/api", api).with_state(deployment)
}
