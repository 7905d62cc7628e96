//! Review ingestion services

pub mod image_store;
pub mod ingest;
pub mod transcoder;

pub use image_store::{to_data_url, ImageStore, StoredImage};
pub use ingest::{delete_review, process_images, submit_review, update_review, ProcessedImage};
pub use transcoder::{transcode_all, ImageUpload, TranscodedImage};
