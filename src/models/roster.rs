//! Roster model: one service occurrence and the people assigned to it.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

use super::Person;

/// Blob key prefix shared by all roster snapshots.
pub const ROSTER_PREFIX: &str = "rosters/";

/// File name prefix of a roster snapshot.
pub const ROSTER_FILE_PREFIX: &str = "misdinar_";

const ROSTER_FILE_SUFFIX: &str = ".csv";

/// Date layout embedded in roster keys, e.g. "Saturday, 08 March 2025".
pub const SERVICE_DATE_FORMAT: &str = "%A, %d %B %Y";

/// Kind of mass or devotion, each with a fixed number of servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceCategory {
    JumatPertama,
    SabtuSore,
    MingguPagiPertama,
    MingguSorePertama,
    MingguPagiBiasa,
    MingguSoreBiasa,
    JalanSalib,
    HariRaya,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 8] = [
        ServiceCategory::JumatPertama,
        ServiceCategory::SabtuSore,
        ServiceCategory::MingguPagiPertama,
        ServiceCategory::MingguSorePertama,
        ServiceCategory::MingguPagiBiasa,
        ServiceCategory::MingguSoreBiasa,
        ServiceCategory::JalanSalib,
        ServiceCategory::HariRaya,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ServiceCategory::JumatPertama => "Jumat Pertama",
            ServiceCategory::SabtuSore => "Sabtu Sore",
            ServiceCategory::MingguPagiPertama => "Minggu Pagi Pertama",
            ServiceCategory::MingguSorePertama => "Minggu Sore Pertama",
            ServiceCategory::MingguPagiBiasa => "Minggu Pagi Biasa",
            ServiceCategory::MingguSoreBiasa => "Minggu Sore Biasa",
            ServiceCategory::JalanSalib => "Jalan Salib",
            ServiceCategory::HariRaya => "Hari Raya",
        }
    }

    /// Number of altar servers the service needs.
    pub fn required_count(&self) -> usize {
        match self {
            ServiceCategory::JumatPertama => 4,
            ServiceCategory::SabtuSore => 6,
            ServiceCategory::MingguPagiPertama | ServiceCategory::MingguSorePertama => 11,
            ServiceCategory::MingguPagiBiasa | ServiceCategory::MingguSoreBiasa => 8,
            ServiceCategory::JalanSalib => 3,
            ServiceCategory::HariRaya => 11,
        }
    }

    /// Parse a label, also accepting it without spaces ("SabtuSore").
    pub fn from_label(label: &str) -> Option<Self> {
        let compact: String = label.split_whitespace().collect();
        Self::ALL.into_iter().find(|category| {
            let own: String = category.label().split_whitespace().collect();
            own.eq_ignore_ascii_case(&compact)
        })
    }
}

impl TryFrom<String> for ServiceCategory {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        ServiceCategory::from_label(&label)
            .ok_or_else(|| format!("unknown service category {:?}", label))
    }
}

impl From<ServiceCategory> for String {
    fn from(category: ServiceCategory) -> Self {
        category.label().to_string()
    }
}

/// Catalog entry for a service category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub id: ServiceCategory,
    pub label: &'static str,
    pub required_count: usize,
}

impl From<ServiceCategory> for CategoryInfo {
    fn from(category: ServiceCategory) -> Self {
        Self {
            id: category,
            label: category.label(),
            required_count: category.required_count(),
        }
    }
}

/// Render a service date the way roster keys embed it.
pub fn format_service_date(date: NaiveDate) -> String {
    date.format(SERVICE_DATE_FORMAT).to_string()
}

/// File name of the snapshot for a service.
pub fn roster_file_name(category: ServiceCategory, date: NaiveDate) -> String {
    format!(
        "{}{}_{}{}",
        ROSTER_FILE_PREFIX,
        category.label(),
        format_service_date(date),
        ROSTER_FILE_SUFFIX
    )
}

/// Full blob key of the snapshot for a service.
pub fn roster_key(category: ServiceCategory, date: NaiveDate) -> String {
    format!("{}{}", ROSTER_PREFIX, roster_file_name(category, date))
}

/// Last path segment of a blob key.
pub fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Whether a file name follows the roster snapshot naming scheme.
pub fn is_roster_file(file_name: &str) -> bool {
    file_name.starts_with(ROSTER_FILE_PREFIX) && file_name.ends_with(ROSTER_FILE_SUFFIX)
}

fn file_stem(file_name: &str) -> &str {
    file_name
        .strip_suffix(ROSTER_FILE_SUFFIX)
        .unwrap_or(file_name)
}

/// Parse the service date embedded after the last underscore of a roster file name.
///
/// The weekday must be a weekday name but is not checked against the date.
pub fn parse_service_date(file_name: &str) -> Result<NaiveDate, AppError> {
    let stem = file_stem(file_name);
    let date_part = stem.rsplit_once('_').map(|(_, date)| date).unwrap_or(stem);
    let failure = |reason: &str| {
        AppError::DateParseFailure(format!(
            "Cannot read service date from {:?}: {}",
            file_name, reason
        ))
    };

    let (weekday, rest) = date_part
        .split_once(", ")
        .ok_or_else(|| failure("missing weekday"))?;
    weekday
        .trim()
        .parse::<Weekday>()
        .map_err(|_| failure("unknown weekday"))?;
    NaiveDate::parse_from_str(rest.trim(), "%d %B %Y").map_err(|e| failure(&e.to_string()))
}

/// Parse the category label between the prefix and the date of a roster file name.
pub fn parse_category(file_name: &str) -> Option<ServiceCategory> {
    let stem = file_stem(file_name).strip_prefix(ROSTER_FILE_PREFIX)?;
    let (label, _) = stem.rsplit_once('_')?;
    ServiceCategory::from_label(label)
}

/// A confirmed roster snapshot.
///
/// Members are copies taken when the roster was written; later edits to the
/// master table do not reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub key: String,
    pub category: ServiceCategory,
    pub service_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_group: Option<String>,
    pub members: Vec<Person>,
}

impl Roster {
    pub fn new(
        category: ServiceCategory,
        service_date: NaiveDate,
        preferred_group: Option<String>,
        members: Vec<Person>,
    ) -> Self {
        Self {
            key: roster_key(category, service_date),
            category,
            service_date,
            preferred_group,
            members,
        }
    }

    pub fn file_name(&self) -> &str {
        file_name_of(&self.key)
    }

    pub fn contains(&self, person_id: &str) -> bool {
        self.members.iter().any(|m| m.id == person_id)
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    /// Plain-text announcement for sharing with the servers.
    pub fn announcement(&self) -> String {
        let mut text = format!(
            "Jadwal Misdinar - {}\n{}\n\nNama - Lingkungan\n",
            self.category.label(),
            format_service_date(self.service_date)
        );
        let lines: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("{} - {}", m.name, m.group))
            .collect();
        text.push_str(&lines.join("\n"));
        text
    }
}

/// Stored roster as listed for selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub key: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ServiceCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_date: Option<NaiveDate>,
    /// "<category> - <formatted date>"
    pub label: String,
}

impl RosterSummary {
    pub fn from_key(key: &str) -> Self {
        let file_name = file_name_of(key);
        let label = file_stem(file_name)
            .strip_prefix(ROSTER_FILE_PREFIX)
            .unwrap_or(file_stem(file_name))
            .replace('_', " - ");
        Self {
            key: key.to_string(),
            file_name: file_name.to_string(),
            category: parse_category(file_name),
            service_date: parse_service_date(file_name).ok(),
            label,
        }
    }
}

/// Inputs for building a roster.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRequest {
    pub category: ServiceCategory,
    pub date: NaiveDate,
    /// Group on choir duty; absent or "Lainnya" widens to everyone
    #[serde(default)]
    pub preferred_group: Option<String>,
}

/// Request body for confirming a roster.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRosterRequest {
    pub category: ServiceCategory,
    pub date: NaiveDate,
    #[serde(default)]
    pub preferred_group: Option<String>,
    /// Exact people to confirm, typically from a preview; recomputed when absent
    #[serde(default)]
    pub member_ids: Option<Vec<String>>,
    /// Expected table revision for optimistic concurrency control
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

impl ConfirmRosterRequest {
    pub fn selection(&self) -> RosterRequest {
        RosterRequest {
            category: self.category,
            date: self.date,
            preferred_group: self.preferred_group.clone(),
        }
    }
}

/// Request body for swapping one roster member for another.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceMemberRequest {
    pub removed_id: String,
    pub added_id: String,
    /// Expected table revision for optimistic concurrency control
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

/// Unsaved roster suggestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterProposal {
    pub key: String,
    pub category: ServiceCategory,
    pub service_date: NaiveDate,
    pub formatted_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_group: Option<String>,
    pub required_count: usize,
    pub special_needed: usize,
    /// Servers missing because the pool was too small
    pub shortfall: usize,
    /// Selected servers followed by the organist
    pub members: Vec<Person>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organist: Option<Person>,
}

/// Result of confirming a roster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedRoster {
    pub roster: Roster,
    pub announcement: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_key_embeds_label_and_long_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        assert_eq!(
            roster_key(ServiceCategory::SabtuSore, date),
            "rosters/misdinar_Sabtu Sore_Saturday, 08 March 2025.csv"
        );
    }

    #[test]
    fn test_parse_service_date() {
        let date = parse_service_date("misdinar_Sabtu Sore_Saturday, 08 March 2025.csv").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
    }

    #[test]
    fn test_parse_service_date_ignores_weekday_mismatch() {
        // 1 January 2999 is a Tuesday.
        let date = parse_service_date("misdinar_Hari Raya_Friday, 01 January 2999.csv").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2999, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_service_date_failures() {
        for name in [
            "misdinar_Sabtu Sore_8 Maret 2025.csv",
            "misdinar_Sabtu Sore_Sabtu, 08 Maret 2025.csv",
            "misdinar_Sabtu Sore_2025-03-08.csv",
        ] {
            assert!(
                matches!(parse_service_date(name), Err(AppError::DateParseFailure(_))),
                "{} should not parse",
                name
            );
        }
    }

    #[test]
    fn test_parse_category() {
        assert_eq!(
            parse_category("misdinar_Minggu Pagi Biasa_Sunday, 09 March 2025.csv"),
            Some(ServiceCategory::MingguPagiBiasa)
        );
        assert_eq!(parse_category("misdinar_Unknown_Sunday, 09 March 2025.csv"), None);
    }

    #[test]
    fn test_category_labels_round_trip() {
        for category in ServiceCategory::ALL {
            assert_eq!(ServiceCategory::from_label(category.label()), Some(category));
        }
        assert_eq!(
            ServiceCategory::from_label("SabtuSore"),
            Some(ServiceCategory::SabtuSore)
        );
        let parsed: ServiceCategory =
            serde_json::from_value(serde_json::json!("Jalan Salib")).unwrap();
        assert_eq!(parsed.required_count(), 3);
    }

    #[test]
    fn test_summary_label() {
        let summary =
            RosterSummary::from_key("rosters/misdinar_Sabtu Sore_Saturday, 08 March 2025.csv");
        assert_eq!(summary.label, "Sabtu Sore - Saturday, 08 March 2025");
        assert_eq!(summary.category, Some(ServiceCategory::SabtuSore));
        assert_eq!(
            summary.service_date,
            NaiveDate::from_ymd_opt(2025, 3, 8)
        );
    }

    #[test]
    fn test_announcement() {
        let roster = Roster::new(
            ServiceCategory::JalanSalib,
            NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
            None,
            vec![],
        );
        assert_eq!(
            roster.announcement(),
            "Jadwal Misdinar - Jalan Salib\nFriday, 07 March 2025\n\nNama - Lingkungan\n"
        );
    }
}
