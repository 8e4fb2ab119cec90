//! Removal of roster snapshots whose service date has passed.

use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{file_name_of, is_roster_file, parse_service_date, ROSTER_PREFIX};
use crate::store::BlobStore;

/// What a reaper run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReapReport {
    pub deleted: Vec<String>,
    /// Keys whose file name carries no readable date
    pub skipped: Vec<String>,
    pub kept: usize,
}

/// Delete every snapshot dated strictly before `today`.
///
/// Unreadable dates are logged and left alone. Store failures abort the run.
pub async fn reap_stale_rosters(
    store: &dyn BlobStore,
    today: NaiveDate,
) -> Result<ReapReport, AppError> {
    let mut report = ReapReport::default();

    for key in store.list(ROSTER_PREFIX).await? {
        let file_name = file_name_of(&key);
        if !is_roster_file(file_name) {
            continue;
        }
        match parse_service_date(file_name) {
            Ok(date) if date < today => {
                store.delete(&key).await?;
                tracing::info!("Deleted old roster: {}", key);
                report.deleted.push(key);
            }
            Ok(_) => report.kept += 1,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", file_name, e.message());
                report.skipped.push(key);
            }
        }
    }

    Ok(report)
}
