//! Lookup endpoints for building roster requests.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::models::{CategoryInfo, ServiceCategory};
use crate::AppState;

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub people: usize,
}

/// GET /api/categories - List service categories with their sizes.
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<CategoryInfo>> {
    let revision_id = state.repo.get_revision_id().await;
    let categories: Vec<CategoryInfo> = ServiceCategory::ALL
        .into_iter()
        .map(CategoryInfo::from)
        .collect();
    success(categories, revision_id)
}

/// GET /api/groups - List groups, ending with the "no preference" entry.
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let revision_id = state.repo.get_revision_id().await;
    success(state.repo.list_groups().await, revision_id)
}

/// GET /api/revision - Get the current revision info.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    let revision_id = state.repo.get_revision_id().await;
    let people = state.repo.list_people().await.len();
    success(
        RevisionInfo {
            revision_id,
            people,
        },
        revision_id,
    )
}
