use std::sync::Arc;

use async_trait::async_trait;
use db::{
    DBService, Storage, StorageError,
    models::analytics_event::NewAnalyticsEvent,
};
use serde_json::Value;
use services::services::{
    amazon::AmazonService,
    cloudinary::{CloudinaryError, CloudinaryService},
    email::EmailError,
    gift_recommendation::GiftRecommender,
    openai_api::OpenAiError,
    product_metadata::ProductMetadataService,
};
use thiserror::Error;
use tracing::warn;
use utils::config::{AppConfig, ConfigError};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    OpenAi(#[from] OpenAiError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Cloudinary(#[from] CloudinaryError),
}

/// Everything a request handler may ask the running application for.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new(config: AppConfig) -> Result<Self, DeploymentError>;

    fn config(&self) -> &AppConfig;

    fn storage(&self) -> &Arc<dyn Storage>;

    /// The SQL pool, when running against PostgreSQL.
    fn db(&self) -> Option<&DBService>;

    fn recommender(&self) -> &GiftRecommender;

    fn metadata(&self) -> &ProductMetadataService;

    fn amazon(&self) -> &AmazonService;

    /// `None` when Cloudinary is not configured.
    fn uploads(&self) -> Option<&CloudinaryService>;

    /// Records a server-side analytics event. Failures are logged and swallowed.
    async fn track_if_analytics_allowed(&self, user_id: Option<Uuid>, event_type: &str, data: Value) {
        let event = NewAnalyticsEvent::new(user_id, event_type, data);
        if let Err(e) = self.storage().record_event(&event).await {
            warn!(event_type, error = %e, "Failed to record analytics event");
        }
    }
}
