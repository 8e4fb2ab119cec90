//! Master table API endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::{CreatePersonRequest, Person, Role, RevisionQuery};
use crate::AppState;

/// GET /api/people - List everyone in the master table.
pub async fn list_people(State(state): State<AppState>) -> ApiResult<Vec<Person>> {
    let revision_id = state.repo.get_revision_id().await;
    success(state.repo.list_people().await, revision_id)
}

/// GET /api/people/:id - Get a single person.
pub async fn get_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Person> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.get_person(&id).await {
        Some(person) => success(person, revision_id),
        None => error(
            AppError::NotFound(format!("Person {} not found", id)),
            revision_id,
        ),
    }
}

/// POST /api/people - Add a person.
pub async fn create_person(
    State(state): State<AppState>,
    Json(request): Json<CreatePersonRequest>,
) -> ApiResult<Person> {
    let revision_id = state.repo.get_revision_id().await;

    // Validate required fields
    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Name is required".to_string()),
            revision_id,
        );
    }
    if request.group.trim().is_empty() {
        return error(
            AppError::Validation("Group is required".to_string()),
            revision_id,
        );
    }
    if let Role::Other(label) = &request.role {
        if label.is_empty() {
            return error(
                AppError::Validation("Role is required".to_string()),
                revision_id,
            );
        }
    }

    match state.repo.create_person(&request).await {
        Ok(person) => success(person, state.repo.get_revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/people/:id - Remove a person.
pub async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RevisionQuery>,
) -> ApiResult<Person> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.delete_person(&id, query.expected_revision).await {
        Ok(person) => success(person, state.repo.get_revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/people - Replace the whole table with the CSV request body.
pub async fn import_people(
    State(state): State<AppState>,
    Query(query): Query<RevisionQuery>,
    body: Bytes,
) -> ApiResult<Vec<Person>> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.replace_table(&body, query.expected_revision).await {
        Ok(_) => success(
            state.repo.list_people().await,
            state.repo.get_revision_id().await,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/people/export - Download the table as CSV.
pub async fn export_people(
    State(state): State<AppState>,
) -> Result<Response, AppErrorWithRevision> {
    let revision_id = state.repo.get_revision_id().await;

    let csv = state
        .repo
        .export_table()
        .await
        .map_err(|e| AppErrorWithRevision {
            error: e,
            revision_id,
        })?;

    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}
