use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use services::services::product_metadata::{ProductMetadata, ProductMetadataQuery};

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AppPath, AppQuery, CurrentUser},
};

/// Scrapes title, image and price from a product page.
pub async fn product_metadata(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(_user): CurrentUser,
    AppQuery(query): AppQuery<ProductMetadataQuery>,
) -> Result<ResponseJson<ProductMetadata>, ApiError> {
    Ok(ResponseJson(deployment.metadata().fetch(&query.url).await?))
}

pub async fn amazon_product(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(_user): CurrentUser,
    AppPath(asin): AppPath<String>,
) -> Result<ResponseJson<ProductMetadata>, ApiError> {
    Ok(ResponseJson(deployment.amazon().lookup(&asin).await?))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/product-metadata", get(product_metadata))
        .route("/amazon/{asin}", get(amazon_product))
}
