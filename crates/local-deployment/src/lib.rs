use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use db::{DBService, MemoryStorage, PgStorage, Storage};
use deployment::{Deployment, DeploymentError};
use services::services::{
    amazon::AmazonService,
    cloudinary::CloudinaryService,
    email::EmailService,
    gift_recommendation::GiftRecommender,
    image_search::ImageSearchService,
    openai_api::OpenAiClient,
    product_metadata::ProductMetadataService,
    reminder_scheduler::ReminderScheduler,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use utils::config::AppConfig;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<AppConfig>,
    storage: Arc<dyn Storage>,
    db: Option<DBService>,
    recommender: GiftRecommender,
    metadata: ProductMetadataService,
    amazon: AmazonService,
    uploads: Option<CloudinaryService>,
    email: EmailService,
}

impl LocalDeployment {
    /// Wiring with in-memory storage and no background tasks.
    pub fn in_memory(config: AppConfig) -> Result<Self, DeploymentError> {
        Self::assemble(config, Arc::new(MemoryStorage::new()), None)
    }

    fn assemble(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        db: Option<DBService>,
    ) -> Result<Self, DeploymentError> {
        let openai = config
            .openai_api_key
            .clone()
            .map(|key| OpenAiClient::new(key, Some(config.openai_model.clone())))
            .transpose()?;
        if openai.is_none() {
            info!("OPENAI_API_KEY not set, recommendations use the curated catalog");
        }

        let metadata = ProductMetadataService::new();
        let amazon = AmazonService::new(config.amazon_associate_tag.clone(), metadata.clone());
        let images = ImageSearchService::new(
            config.google_search.clone(),
            config.unsplash_access_key.clone(),
        );
        let recommender = GiftRecommender::new(openai, images, amazon.clone());
        let uploads = config.cloudinary.clone().map(CloudinaryService::new).transpose()?;
        let email = EmailService::new(config.sendgrid.clone())?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            db,
            recommender,
            metadata,
            amazon,
            uploads,
            email,
        })
    }

    /// Starts the reminder sweep unless disabled by configuration.
    pub fn spawn_background_tasks(&self) -> Option<JoinHandle<()>> {
        if self.config.reminder_poll_seconds == 0 {
            info!("Reminder scheduler disabled");
            return None;
        }
        let scheduler = ReminderScheduler::new(
            self.storage.clone(),
            self.email.clone(),
            Duration::from_secs(self.config.reminder_poll_seconds),
            self.config.app_base_url.clone(),
        );
        Some(scheduler.spawn())
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: AppConfig) -> Result<Self, DeploymentError> {
        let (storage, db): (Arc<dyn Storage>, _) = match config.database_url.as_deref() {
            Some(url) => {
                let db = DBService::new(url).await?;
                (Arc::new(PgStorage::new(db.clone())), Some(db))
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory storage (data is lost on restart)");
                (Arc::new(MemoryStorage::new()), None)
            }
        };
        let deployment = Self::assemble(config, storage, db)?;
        info!(storage = %deployment.storage.kind(), "Deployment ready");
        Ok(deployment)
    }

    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn db(&self) -> Option<&DBService> {
        self.db.as_ref()
    }

    fn recommender(&self) -> &GiftRecommender {
        &self.recommender
    }

    fn metadata(&self) -> &ProductMetadataService {
        &self.metadata
    }

    fn amazon(&self) -> &AmazonService {
        &self.amazon
    }

    fn uploads(&self) -> Option<&CloudinaryService> {
        self.uploads.as_ref()
    }
}
