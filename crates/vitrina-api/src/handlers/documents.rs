//! Document upload lifecycle endpoints

use crate::auth::CallerContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
use vitrina_core::models::{
    ConfirmDocumentRequest, ConfirmDocumentResponse, CurrentDocumentQuery, DocumentResponse,
    ModerateDocumentRequest, PresignDocumentRequest, PresignDocumentResponse,
    ReplaceDocumentRequest,
};
use vitrina_core::validation::{parse_document_type, parse_owner_entity_type};
use vitrina_core::{AppError, DocumentSlot, OwnerRef, UploadStatus};
use vitrina_services::{ClientReportedMetadata, IssueUploadIntent};

/// Open an upload intent and return a presigned PUT URL
#[utoipa::path(
    post,
    path = "/documents/presign",
    tag = "documents",
    request_body = PresignDocumentRequest,
    params(("X-User-Id" = i64, Header, description = "Authenticated caller")),
    responses(
        (status = 201, description = "Upload intent created", body = PresignDocumentResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Owner entity not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Object storage misconfigured", body = ErrorResponse),
        (status = 503, description = "Object storage unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(
        user_id = caller.user_id,
        owner_type = %request.owner_entity_type,
        owner_id = request.owner_entity_id,
        document_type = %request.document_type,
        operation = "presign_document"
    )
)]
pub async fn presign_document(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PresignDocumentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;

    let issued = state
        .issuer
        .issue(IssueUploadIntent {
            owner_entity_type: request.owner_entity_type,
            owner_entity_id: request.owner_entity_id,
            document_type: request.document_type,
            file_name: request.file_name,
            mime_type: request.mime_type,
            size_bytes: request.file_size_bytes,
            requested_by_user_id: caller.user_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PresignDocumentResponse {
            upload_token: issued.record.upload_token,
            presigned_url: issued.presigned_url,
            expires_at: issued.record.expires_at,
            upload_url_expires_at: issued.upload_url_expires_at,
            storage_key: issued.record.storage_key,
        }),
    ))
}

/// Verify a finished upload against object storage
///
/// Verification outcomes render as `ConfirmDocumentResponse` so clients always see the
/// status and how many attempts remain; other failures use the common error body.
#[utoipa::path(
    post,
    path = "/documents/confirm",
    tag = "documents",
    request_body = ConfirmDocumentRequest,
    params(("X-User-Id" = i64, Header, description = "Authenticated caller")),
    responses(
        (status = 200, description = "Upload confirmed", body = ConfirmDocumentResponse),
        (status = 404, description = "Unknown upload token", body = ErrorResponse),
        (status = 409, description = "Verification failed or conflicting ETag", body = ConfirmDocumentResponse),
        (status = 410, description = "Upload orphaned or out of attempts", body = ConfirmDocumentResponse),
        (status = 503, description = "Object storage unavailable, retry", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(user_id = caller.user_id, operation = "confirm_document"))]
pub async fn confirm_document(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ConfirmDocumentRequest>,
) -> Result<Response, HttpAppError> {
    request.validate()?;

    let reported = ClientReportedMetadata {
        etag: request.s3_metadata.etag,
        size: request.s3_metadata.size,
        last_modified: request.s3_metadata.last_modified,
    };

    match state
        .confirmer
        .confirm(&request.upload_token, &reported)
        .await
    {
        Ok(record) => Ok((
            StatusCode::OK,
            Json(ConfirmDocumentResponse {
                status: record.status,
                attempts_remaining: None,
                message: None,
                document: Some(record.into()),
            }),
        )
            .into_response()),
        Err(AppError::VerificationMismatch {
            attempts_remaining,
            terminal,
            reason,
        }) => {
            let message = if terminal {
                format!("{}; no attempts remaining", reason)
            } else {
                reason
            };
            Ok((
                StatusCode::CONFLICT,
                Json(ConfirmDocumentResponse {
                    status: UploadStatus::Failed,
                    attempts_remaining: Some(attempts_remaining),
                    message: Some(message),
                    document: None,
                }),
            )
                .into_response())
        }
        Err(AppError::UploadGone {
            status,
            attempts_remaining,
        }) => {
            tracing::debug!(status = %status, "Confirmation refused, upload is terminal");
            Ok((
                StatusCode::GONE,
                Json(ConfirmDocumentResponse {
                    status,
                    attempts_remaining: (status == UploadStatus::Failed)
                        .then_some(attempts_remaining),
                    message: Some(format!("Upload is {} and can no longer be confirmed", status)),
                    document: None,
                }),
            )
                .into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// Link a confirmed upload as the next version of an existing document
#[utoipa::path(
    post,
    path = "/documents/{id}/replace",
    tag = "documents",
    request_body = ReplaceDocumentRequest,
    params(
        ("id" = Uuid, Path, description = "Document being replaced"),
        ("X-User-Id" = i64, Header, description = "Authenticated caller")
    ),
    responses(
        (status = 200, description = "New version linked", body = DocumentResponse),
        (status = 404, description = "Document or upload token not found", body = ErrorResponse),
        (status = 409, description = "Already replaced or not replaceable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(user_id = caller.user_id, operation = "replace_document"))]
pub async fn replace_document(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReplaceDocumentRequest>,
) -> Result<Json<DocumentResponse>, HttpAppError> {
    request.validate()?;
    let record = state
        .versions
        .replace(id, &request.new_upload_token)
        .await?;
    Ok(Json(record.into()))
}

/// Current version of a document slot
#[utoipa::path(
    get,
    path = "/documents/current",
    tag = "documents",
    params(
        ("owner_entity_type" = String, Query, description = "commerce, commerce_branch or product"),
        ("owner_entity_id" = i64, Query, description = "Owner id"),
        ("document_type" = String, Query, description = "Document type"),
        ("X-User-Id" = i64, Header, description = "Authenticated caller")
    ),
    responses(
        (status = 200, description = "Current document", body = DocumentResponse),
        (status = 404, description = "No confirmed document for this slot", body = ErrorResponse),
        (status = 422, description = "Invalid slot", body = ErrorResponse)
    )
)]
pub async fn current_document(
    _caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CurrentDocumentQuery>,
) -> Result<Json<DocumentResponse>, HttpAppError> {
    query.validate()?;
    let slot = DocumentSlot {
        owner: OwnerRef {
            entity_type: parse_owner_entity_type(&query.owner_entity_type)?,
            entity_id: query.owner_entity_id,
        },
        document_type: parse_document_type(&query.document_type)?,
    };
    let record = state.versions.current(&slot).await?;
    Ok(Json(record.into()))
}

/// Every version in the chain a document belongs to, oldest first
#[utoipa::path(
    get,
    path = "/documents/{id}/history",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Any document in the chain"),
        ("X-User-Id" = i64, Header, description = "Authenticated caller")
    ),
    responses(
        (status = 200, description = "Version history", body = [DocumentResponse]),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
pub async fn document_history(
    _caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentResponse>>, HttpAppError> {
    let chain = state.versions.history(id).await?;
    Ok(Json(chain.into_iter().map(DocumentResponse::from).collect()))
}

/// Record a moderation decision on a confirmed document
#[utoipa::path(
    post,
    path = "/documents/{id}/moderation",
    tag = "documents",
    request_body = ModerateDocumentRequest,
    params(
        ("id" = Uuid, Path, description = "Document under review"),
        ("X-User-Id" = i64, Header, description = "Reviewer")
    ),
    responses(
        (status = 200, description = "Decision recorded", body = DocumentResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 409, description = "Document is not confirmed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(user_id = caller.user_id, operation = "moderate_document"))]
pub async fn moderate_document(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ModerateDocumentRequest>,
) -> Result<Json<DocumentResponse>, HttpAppError> {
    let record = state
        .moderation
        .review(id, caller.user_id, request.decision)
        .await?;
    Ok(Json(record.into()))
}
