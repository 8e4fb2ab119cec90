//! Roster API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::models::{
    ConfirmRosterRequest, ConfirmedRoster, Person, ReplaceMemberRequest, Roster, RosterProposal,
    RosterRequest, RosterSummary,
};
use crate::reaper::ReapReport;
use crate::AppState;

/// POST /api/rosters/preview - Suggest a roster without saving it.
pub async fn preview_roster(
    State(state): State<AppState>,
    Json(request): Json<RosterRequest>,
) -> ApiResult<RosterProposal> {
    let revision_id = state.repo.get_revision_id().await;
    success(state.repo.preview_roster(&request).await, revision_id)
}

/// POST /api/rosters - Confirm a roster and count participation.
pub async fn confirm_roster(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRosterRequest>,
) -> ApiResult<ConfirmedRoster> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.confirm_roster(&request).await {
        Ok(confirmed) => success(confirmed, state.repo.get_revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/rosters - List stored rosters.
pub async fn list_rosters(State(state): State<AppState>) -> ApiResult<Vec<RosterSummary>> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.list_rosters().await {
        Ok(rosters) => success(rosters, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/rosters/:name - Load one roster.
pub async fn get_roster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Roster> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.get_roster(&name).await {
        Ok(roster) => success(roster, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/rosters/:name/candidates - People who could join the roster.
pub async fn list_candidates(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<Person>> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.replacement_candidates(&name).await {
        Ok(candidates) => success(candidates, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/rosters/:name/replace - Swap one member for another.
pub async fn replace_member(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<ReplaceMemberRequest>,
) -> ApiResult<Roster> {
    let revision_id = state.repo.get_revision_id().await;

    match state.repo.replace_member(&name, &request).await {
        Ok(roster) => success(roster, state.repo.get_revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/rosters/reap - Delete rosters whose date has passed.
pub async fn reap_rosters(State(state): State<AppState>) -> ApiResult<ReapReport> {
    let revision_id = state.repo.get_revision_id().await;
    let today = chrono::Local::now().date_naive();

    match state.repo.reap_stale_rosters(today).await {
        Ok(report) => success(report, revision_id),
        Err(e) => error(e, revision_id),
    }
}
