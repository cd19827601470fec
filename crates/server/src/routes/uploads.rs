use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use deployment::Deployment;
use services::services::cloudinary::{UploadImageRequest, UploadedImage};
use tracing::info;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AppJson, CurrentUser},
};

pub async fn upload_image(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<UploadImageRequest>,
) -> Result<ResponseJson<UploadedImage>, ApiError> {
    let uploads = deployment
        .uploads()
        .ok_or(ApiError::ServiceUnavailable("Image uploads are not configured"))?;
    let image = uploads.upload(&payload).await?;
    info!(user_id = %user.id, public_id = %image.public_id, "Uploaded image");
    Ok(ResponseJson(image))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/uploads/image", post(upload_image))
}
