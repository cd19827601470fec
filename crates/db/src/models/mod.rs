pub mod analytics_event;
pub mod blog_post;
pub mod friend;
pub mod gift_reminder;
pub mod saved_gift;
pub mod user;
pub mod validation;
