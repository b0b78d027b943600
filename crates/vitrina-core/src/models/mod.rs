//! Data models for the upload lifecycle
//!
//! `upload_record` holds the persisted entity and its enums; `documents` holds the
//! request/response bodies of the HTTP surface.

pub mod documents;
mod upload_record;

pub use documents::*;
pub use upload_record::*;
