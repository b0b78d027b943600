//! Database repositories for data access layer
//!
//! `upload_record` persists the upload lifecycle entity; every mutation is a conditional
//! update keyed on the record's revision. `owner` answers existence checks against the
//! marketplace tables that own documents.
//
// Upload records (intents, confirmations, version chains, moderation)
pub mod upload_record;
//
// Owner existence checks (commerces, branches, products)
pub mod owner;
//
// Transaction utilities
pub mod transaction;

pub use owner::{OwnerDirectory, PgOwnerDirectory};
pub use upload_record::{
    attempt_ceiling, FailedAttempt, PgUploadRecordRepository, ReplacementLink, UploadRecordStore,
};
