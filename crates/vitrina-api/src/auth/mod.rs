//! Caller identity
//!
//! Authentication happens upstream; the gateway forwards the authenticated user id in
//! `X-User-Id`. This module only turns that header into a `CallerContext`.

pub mod middleware;
pub mod models;

pub use middleware::{caller_identity_middleware, USER_ID_HEADER};
pub use models::CallerContext;
