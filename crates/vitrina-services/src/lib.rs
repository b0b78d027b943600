//! Vitrina Services Layer
//!
//! This crate is the **business service layer** of the upload lifecycle: intent issuance,
//! confirmation and failure accounting, version-chain linking, expiry reaping and
//! moderation. Keep lifecycle rules here; keep thin HTTP handling in vitrina-api.

pub mod uploads;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use uploads::{
    ClientReportedMetadata, ExpiryReaper, IssueUploadIntent, IssuedIntent, ModerationService,
    ReaperHandle, SweepReport, TokenIssuer, UploadConfirmer, VersionChain,
};
pub use vitrina_db::{OwnerDirectory, UploadRecordStore};
pub use vitrina_storage::{create_storage, ObjectMetadata, ObjectStorage, StorageError};
