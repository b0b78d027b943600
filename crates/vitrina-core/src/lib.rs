//! Vitrina Core Library
//!
//! This crate provides the upload-lifecycle domain models, error types, configuration,
//! and upload-policy validation shared by the database, storage, service and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, ReaperConfig, StorageConfig, UploadPolicy};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    DocumentSlot, DocumentType, ModerationDecision, ModerationStatus, OwnerEntityType, OwnerRef,
    UploadRecord, UploadStatus,
};
