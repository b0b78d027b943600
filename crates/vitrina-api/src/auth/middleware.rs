use crate::auth::models::CallerContext;
use crate::error::HttpAppError;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use vitrina_core::AppError;

pub const USER_ID_HEADER: &str = "X-User-Id";

fn parse_user_id(request: &Request) -> Result<i64, AppError> {
    let raw = request
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("{} header is required", USER_ID_HEADER)))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("{} header is not valid text", USER_ID_HEADER)))?;

    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Unauthorized(format!(
            "{} must be a positive integer",
            USER_ID_HEADER
        ))),
    }
}

/// Reject requests without a caller identity; attach `CallerContext` otherwise.
pub async fn caller_identity_middleware(mut request: Request, next: Next) -> Response {
    match parse_user_id(&request) {
        Ok(user_id) => {
            request.extensions_mut().insert(CallerContext { user_id });
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
