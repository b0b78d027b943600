//! Vitrina Storage Library
//!
//! This crate provides the object storage abstraction used by the upload lifecycle:
//! presigned PUT URLs, authoritative metadata (HEAD) lookups and best-effort deletes.
//!
//! # Storage key format
//!
//! `documents/{owner_entity_type}/{owner_entity_id}/{document_type}/{upload_token}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so every caller derives the same key for the same intent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{generate_storage_key, validate_storage_key};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectMetadata, ObjectStorage, StorageError, StorageResult};
