//! Person record as stored in the master table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Duty a person can be rostered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Altar server ("Misdinar")
    Server,
    /// Organist ("Organis")
    Organist,
    /// Any other role found in the data file, kept verbatim and never selected
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Server => "Misdinar",
            Role::Organist => "Organis",
            Role::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Misdinar" => Role::Server,
            "Organis" => Role::Organist,
            other => Role::Other(other.to_string()),
        }
    }

    /// Whether the role can be put on a roster.
    pub fn is_rosterable(&self) -> bool {
        matches!(self, Role::Server | Role::Organist)
    }
}

impl From<String> for Role {
    fn from(label: String) -> Self {
        Role::from_label(&label)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A volunteer in the master table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Stable identifier assigned once at creation
    pub id: String,
    pub name: String,
    /// Home congregation unit ("Lingkungan")
    pub group: String,
    pub role: Role,
    pub participation_count: u32,
    /// Accommodation note; a non-empty note marks the person as special-needs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Additional data-file columns, round-tripped untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Person {
    pub fn is_special_needs(&self) -> bool {
        self.notes
            .as_deref()
            .is_some_and(|note| !note.trim().is_empty())
    }

    /// One-line description used in logs.
    pub fn describe(&self) -> String {
        format!(
            "{} - {} - {}",
            self.name,
            self.group,
            self.role.as_str()
        )
    }
}

/// Request body for adding a person to the master table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonRequest {
    pub name: String,
    pub group: String,
    pub role: Role,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Expected table revision for optimistic concurrency control
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

/// Query string carrying an optional expected revision.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionQuery {
    #[serde(default)]
    pub expected_revision: Option<i64>,
}
