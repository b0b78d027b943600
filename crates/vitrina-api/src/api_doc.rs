//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vitrina_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vitrina Documents API",
        version = "0.1.0",
        description = "Direct-to-storage upload lifecycle for commerce, branch and product documents: presigned upload intents, server-side confirmation, version chains and moderation."
    ),
    paths(
        handlers::documents::presign_document,
        handlers::documents::confirm_document,
        handlers::documents::replace_document,
        handlers::documents::current_document,
        handlers::documents::document_history,
        handlers::documents::moderate_document,
        handlers::health::health_check,
        handlers::health::liveness_check,
    ),
    components(schemas(
        models::PresignDocumentRequest,
        models::PresignDocumentResponse,
        models::ReportedObjectMetadata,
        models::ConfirmDocumentRequest,
        models::ConfirmDocumentResponse,
        models::ReplaceDocumentRequest,
        models::ModerateDocumentRequest,
        models::DocumentResponse,
        models::OwnerEntityType,
        models::DocumentType,
        models::UploadStatus,
        models::ModerationStatus,
        models::ModerationDecision,
        error::ErrorResponse,
        handlers::health::HealthCheckResponse,
    )),
    tags(
        (name = "documents", description = "Document upload lifecycle"),
        (name = "health", description = "Liveness and health probes")
    )
)]
pub struct ApiDoc;
