//! Vitrina API Library
//!
//! HTTP handlers, middleware and application setup for the document upload service.

mod api_doc;
mod handlers;
mod telemetry;

pub mod auth;
pub mod error;
pub mod middleware;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
