use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        db::models::user::UserRole::decl(),
        db::models::user::UserInfo::decl(),
        db::models::user::RegisterUser::decl(),
        db::models::user::LoginUser::decl(),
        db::models::user::UpdateUserRole::decl(),
        db::models::friend::Friend::decl(),
        db::models::friend::CreateFriend::decl(),
        db::models::friend::UpdateFriend::decl(),
        db::models::saved_gift::SavedGift::decl(),
        db::models::saved_gift::CreateSavedGift::decl(),
        db::models::saved_gift::UpdateSavedGift::decl(),
        db::models::saved_gift::SavedGiftQuery::decl(),
        db::models::gift_reminder::GiftReminder::decl(),
        db::models::gift_reminder::CreateGiftReminder::decl(),
        db::models::gift_reminder::UpdateGiftReminder::decl(),
        db::models::gift_reminder::UpcomingReminder::decl(),
        db::models::gift_reminder::UpcomingQuery::decl(),
        db::models::blog_post::BlogPost::decl(),
        db::models::blog_post::CreateBlogPost::decl(),
        db::models::blog_post::UpdateBlogPost::decl(),
        db::models::blog_post::BlogPostQuery::decl(),
        db::models::analytics_event::AnalyticsEvent::decl(),
        db::models::analytics_event::CreateAnalyticsEvent::decl(),
        db::models::analytics_event::EventCount::decl(),
        db::models::analytics_event::AnalyticsSummary::decl(),
        db::models::analytics_event::SummaryQuery::decl(),
        services::services::gift_recommendation::GiftRecommendation::decl(),
        services::services::gift_recommendation::RecommendationSource::decl(),
        services::services::gift_recommendation::RecommendationRequest::decl(),
        services::services::gift_recommendation::RecommendationResponse::decl(),
        services::services::product_metadata::ProductMetadata::decl(),
        services::services::product_metadata::ProductMetadataQuery::decl(),
        services::services::cloudinary::UploadImageRequest::decl(),
        services::services::cloudinary::UploadedImage::decl(),
        server::routes::health::HealthResponse::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {decl}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate-types`. Do not edit.\n\n{body}\n"
    )
}

fn main() {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = Path::new("shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("shared/types.ts is up to date.");
            std::process::exit(0);
        }
        eprintln!("shared/types.ts is stale. Run `cargo run --bin generate-types`.");
        std::process::exit(1);
    }

    if let Err(e) = fs::create_dir_all(shared_path).and_then(|_| fs::write(&types_path, generated)) {
        eprintln!("Failed to write {}: {e}", types_path.display());
        std::process::exit(1);
    }
    println!("Wrote {}", types_path.display());
}
