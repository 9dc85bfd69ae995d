//! Document Handlers

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use crate::application::dto::request::{CreateDocumentRequest, UpdateDocumentRequest};
use crate::application::dto::response::DeletedResponse;
use crate::application::services::{DocumentService, DocumentSummary, RevisionSummary};
use crate::domain::{Document, DocumentRevision};
use crate::presentation::http::extractors::{IdPairPath, IdPath};
use crate::presentation::http::services::document_service;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::response::{created, ApiResponse};
use crate::shared::validation::validate;
use crate::startup::AppState;

fn version_number(raw: i64) -> Result<i32, AppError> {
    i32::try_from(raw).map_err(|_| AppError::BadRequest(format!("Invalid version: {}", raw)))
}

/// Create a document (version 1)
pub async fn create_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
    Json(body): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, ApiResponse<Document>), AppError> {
    validate(&body)?;

    let document = document_service(&state)
        .create_document(community_id, auth.user_id, body.into())
        .await?;

    Ok(created(document))
}

/// List a community's documents
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(community_id): IdPath,
) -> Result<ApiResponse<Vec<DocumentSummary>>, AppError> {
    let documents = document_service(&state)
        .list_documents(community_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(documents))
}

/// Get a document at its current version
pub async fn get_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(document_id): IdPath,
) -> Result<ApiResponse<Document>, AppError> {
    let document = document_service(&state)
        .get_document(document_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(document))
}

/// Save a new version
pub async fn update_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(document_id): IdPath,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<ApiResponse<Document>, AppError> {
    validate(&body)?;

    let document = document_service(&state)
        .update_document(document_id, auth.user_id, body.into())
        .await?;

    Ok(ApiResponse::ok(document))
}

/// Delete a document
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(document_id): IdPath,
) -> Result<ApiResponse<DeletedResponse>, AppError> {
    document_service(&state)
        .delete_document(document_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(DeletedResponse::new(document_id)))
}

/// Revision history, newest first
pub async fn list_revisions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPath(document_id): IdPath,
) -> Result<ApiResponse<Vec<RevisionSummary>>, AppError> {
    let revisions = document_service(&state)
        .list_revisions(document_id, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(revisions))
}

/// One stored revision
pub async fn get_revision(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPairPath(document_id, version): IdPairPath,
) -> Result<ApiResponse<DocumentRevision>, AppError> {
    let revision = document_service(&state)
        .get_revision(document_id, version_number(version)?, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(revision))
}

/// Restore an old revision as the newest version
pub async fn restore_revision(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    IdPairPath(document_id, version): IdPairPath,
) -> Result<ApiResponse<Document>, AppError> {
    let document = document_service(&state)
        .restore_revision(document_id, version_number(version)?, auth.user_id)
        .await?;
    Ok(ApiResponse::ok(document))
}
