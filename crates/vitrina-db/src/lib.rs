//! Vitrina persistence layer
//!
//! Postgres-backed repositories for upload records and the owner directory,
//! plus the traits the service layer is written against.

pub mod db;

pub use db::{
    attempt_ceiling, FailedAttempt, OwnerDirectory, PgOwnerDirectory, PgUploadRecordRepository,
    ReplacementLink, UploadRecordStore,
};
