pub mod amazon;
pub mod cloudinary;
pub mod email;
pub mod gift_catalog;
pub mod gift_recommendation;
pub mod image_search;
pub mod openai_api;
pub mod password;
pub mod product_metadata;
pub mod reminder_scheduler;
