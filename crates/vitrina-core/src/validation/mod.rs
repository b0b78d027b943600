//! Validation modules

pub mod upload;

pub use upload::{
    normalize_etag, normalize_mime_type, parse_document_type, parse_owner_entity_type,
    sanitize_filename, validate_content_type, validate_file_size, validate_owner_compatibility,
    validate_upload_intent, ValidatedIntent,
};
