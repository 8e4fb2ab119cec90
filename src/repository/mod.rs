//! Roster repository.
//!
//! Owns the in-memory master table for the running process and keeps it in
//! step with the blob store. Every mutation works on a copy of the table and
//! only replaces the in-memory table after all writes have succeeded, so a
//! failed write leaves the last persisted state in place.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::codec;
use crate::errors::AppError;
use crate::ledger;
use crate::models::{
    file_name_of, format_service_date, is_roster_file, roster_key, ConfirmRosterRequest,
    ConfirmedRoster, CreatePersonRequest, MasterTable, Person, ReplaceMemberRequest, Role,
    Roster, RosterProposal, RosterRequest, RosterSummary, ROSTER_PREFIX,
};
use crate::reaper::{self, ReapReport};
use crate::selector::{self, SelectionRules, OTHER_GROUP};
use crate::store::BlobStore;

/// Mutable state guarded by the repository lock.
struct Session {
    table: MasterTable,
    /// Bumped after every persisted mutation
    revision_id: i64,
}

impl Session {
    fn check_revision(&self, expected: Option<i64>) -> Result<(), AppError> {
        match expected {
            Some(expected) if expected != self.revision_id => Err(AppError::Conflict {
                message: format!(
                    "Revision mismatch: expected {}, current {}",
                    expected, self.revision_id
                ),
                current_version: self.revision_id,
            }),
            _ => Ok(()),
        }
    }

    fn commit(&mut self, table: MasterTable) -> i64 {
        self.table = table;
        self.revision_id += 1;
        self.revision_id
    }
}

/// Repository for the master table and roster snapshots.
pub struct Repository {
    store: Arc<dyn BlobStore>,
    data_file: String,
    rules: SelectionRules,
    session: Mutex<Session>,
}

impl Repository {
    /// Load the master table from the store; a missing table starts empty.
    pub async fn open(
        store: Arc<dyn BlobStore>,
        data_file: impl Into<String>,
        rules: SelectionRules,
    ) -> Result<Self, AppError> {
        let data_file = data_file.into();
        let table = match store.get(&data_file).await? {
            Some(bytes) => codec::decode_table(&bytes).await?,
            None => MasterTable::default(),
        };
        if table.is_empty() {
            tracing::warn!("Master table {} has no people", data_file);
        } else {
            tracing::info!("Loaded {} people from {}", table.len(), data_file);
        }

        Ok(Self {
            store,
            data_file,
            rules,
            session: Mutex::new(Session {
                table,
                revision_id: 0,
            }),
        })
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> i64 {
        self.session.lock().await.revision_id
    }

    async fn persist_table(&self, table: &MasterTable) -> Result<(), AppError> {
        let body = codec::encode_table(table).await?;
        self.store.put(&self.data_file, body).await
    }

    /// Put `body` under `key`, returning what was there before.
    async fn put_snapshot(&self, key: &str, body: Bytes) -> Result<Option<Bytes>, AppError> {
        let previous = self.store.get(key).await?;
        self.store.put(key, body).await?;
        Ok(previous)
    }

    /// Undo a snapshot write after a later write failed.
    async fn restore_snapshot(&self, key: &str, previous: Option<Bytes>) {
        let result = match previous {
            Some(body) => self.store.put(key, body).await,
            None => self.store.delete(key).await,
        };
        if let Err(e) = result {
            tracing::error!("Failed to roll back roster snapshot {}: {}", key, e);
        }
    }

    // ==================== PEOPLE ====================

    /// List all people in table order.
    pub async fn list_people(&self) -> Vec<Person> {
        self.session.lock().await.table.people.clone()
    }

    /// Get a person by ID.
    pub async fn get_person(&self, id: &str) -> Option<Person> {
        self.session.lock().await.table.get(id).cloned()
    }

    /// Distinct groups followed by the "no preference" entry.
    pub async fn list_groups(&self) -> Vec<String> {
        let mut groups = self.session.lock().await.table.groups();
        groups.push(OTHER_GROUP.to_string());
        groups
    }

    /// Add a person with a fresh ID and no participation.
    pub async fn create_person(&self, request: &CreatePersonRequest) -> Result<Person, AppError> {
        let mut session = self.session.lock().await;
        session.check_revision(request.expected_revision)?;

        let person = Person {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            group: request.group.trim().to_string(),
            role: request.role.clone(),
            participation_count: 0,
            notes: request
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            extra: request.extra.clone(),
        };

        let mut table = session.table.clone();
        table.insert(person.clone())?;
        table.sort_by_group_name_role();
        self.persist_table(&table).await?;

        session.commit(table);
        tracing::info!("Added {} ({})", person.describe(), person.id);
        Ok(person)
    }

    /// Remove a person from the master table. Saved rosters keep their copy.
    pub async fn delete_person(
        &self,
        id: &str,
        expected_revision: Option<i64>,
    ) -> Result<Person, AppError> {
        let mut session = self.session.lock().await;
        session.check_revision(expected_revision)?;

        let mut table = session.table.clone();
        let removed = table
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("Person {} not found", id)))?;
        table.sort_by_role_group_name();
        self.persist_table(&table).await?;

        session.commit(table);
        tracing::info!("Removed {} ({})", removed.describe(), removed.id);
        Ok(removed)
    }

    /// Replace the whole master table with uploaded CSV.
    pub async fn replace_table(
        &self,
        csv: &[u8],
        expected_revision: Option<i64>,
    ) -> Result<usize, AppError> {
        let table = codec::decode_table(csv).await?;
        let mut session = self.session.lock().await;
        session.check_revision(expected_revision)?;

        self.persist_table(&table).await?;
        let count = table.len();
        session.commit(table);
        tracing::info!("Master table replaced with {} people", count);
        Ok(count)
    }

    /// Master table as CSV text.
    pub async fn export_table(&self) -> Result<Bytes, AppError> {
        let session = self.session.lock().await;
        codec::encode_table(&session.table).await
    }

    // ==================== ROSTERS ====================

    /// Suggest a roster without saving anything.
    pub async fn preview_roster(&self, request: &RosterRequest) -> RosterProposal {
        let session = self.session.lock().await;
        self.propose(&session.table, request)
    }

    fn propose(&self, table: &MasterTable, request: &RosterRequest) -> RosterProposal {
        let required_count = request.category.required_count();
        let preferred_group = selector::group_filter(request.preferred_group.as_deref());

        let servers = table.pool(&Role::Server);
        let selection =
            selector::select_roster(&servers, required_count, preferred_group, &self.rules);
        tracing::debug!(
            "Selected {} servers for {} ({} with special needs)",
            selection.members.len(),
            request.category.label(),
            selection.special_count()
        );
        if selection.shortfall > 0 {
            tracing::warn!(
                "Only {} of {} servers available for {}",
                selection.members.len(),
                required_count,
                request.category.label()
            );
        }

        let organists = table.pool(&Role::Organist);
        let organist = selector::select_organist(&organists, preferred_group).cloned();
        if organist.is_none() {
            tracing::warn!("No organist available for {}", request.category.label());
        }

        let mut members: Vec<Person> = selection.members.iter().map(|p| (*p).clone()).collect();
        members.extend(organist.clone());

        RosterProposal {
            key: roster_key(request.category, request.date),
            category: request.category,
            service_date: request.date,
            formatted_date: format_service_date(request.date),
            preferred_group: preferred_group.map(str::to_string),
            required_count,
            special_needed: selection.special_needed,
            shortfall: selection.shortfall,
            members,
            organist,
        }
    }

    /// Save a roster and count one participation for each member.
    pub async fn confirm_roster(
        &self,
        request: &ConfirmRosterRequest,
    ) -> Result<ConfirmedRoster, AppError> {
        let mut session = self.session.lock().await;
        session.check_revision(request.expected_revision)?;

        let selection = request.selection();
        let key = roster_key(selection.category, selection.date);
        if self.store.get(&key).await?.is_some() {
            return Err(AppError::Validation(format!(
                "Roster {} already exists; replace members instead",
                file_name_of(&key)
            )));
        }

        let members = match &request.member_ids {
            Some(ids) => ids
                .iter()
                .map(|id| -> Result<Person, AppError> {
                    let person = session
                        .table
                        .get(id)
                        .ok_or_else(|| AppError::NotFound(format!("Person {} not found", id)))?;
                    if !person.role.is_rosterable() {
                        return Err(AppError::Validation(format!(
                            "{} cannot serve as {}",
                            person.name,
                            person.role.as_str()
                        )));
                    }
                    Ok(person.clone())
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => self.propose(&session.table, &selection).members,
        };
        if members.is_empty() {
            return Err(AppError::Validation(
                "A roster needs at least one member".to_string(),
            ));
        }

        let roster = Roster::new(
            selection.category,
            selection.date,
            selector::group_filter(selection.preferred_group.as_deref()).map(str::to_string),
            members,
        );

        let mut table = session.table.clone();
        ledger::apply_roster_confirmation(&mut table, &roster.member_ids())?;

        let snapshot = codec::encode_roster(&roster).await?;
        let previous = self.put_snapshot(&roster.key, snapshot).await?;
        if let Err(e) = self.persist_table(&table).await {
            self.restore_snapshot(&roster.key, previous).await;
            return Err(e);
        }

        let total = table.total_participation();
        session.commit(table);
        tracing::info!(
            "Confirmed roster {} with {} members ({} participations recorded in total)",
            roster.file_name(),
            roster.members.len(),
            total
        );
        let announcement = roster.announcement();
        Ok(ConfirmedRoster {
            roster,
            announcement,
        })
    }

    /// Stored rosters, sorted by key.
    pub async fn list_rosters(&self) -> Result<Vec<RosterSummary>, AppError> {
        let keys = self.store.list(ROSTER_PREFIX).await?;
        Ok(keys
            .iter()
            .filter(|key| is_roster_file(file_name_of(key)))
            .map(|key| RosterSummary::from_key(key))
            .collect())
    }

    fn key_for(file_name: &str) -> Result<String, AppError> {
        if !is_roster_file(file_name) || file_name.contains('/') {
            return Err(AppError::BadRequest(format!(
                "Invalid roster name {:?}",
                file_name
            )));
        }
        Ok(format!("{}{}", ROSTER_PREFIX, file_name))
    }

    async fn load_roster(&self, key: &str) -> Result<Roster, AppError> {
        let bytes = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Roster {} not found", file_name_of(key))))?;
        codec::decode_roster(key, &bytes).await
    }

    /// Load one roster by file name.
    pub async fn get_roster(&self, file_name: &str) -> Result<Roster, AppError> {
        self.load_roster(&Self::key_for(file_name)?).await
    }

    /// Servers and organists who could take a place on the roster.
    pub async fn replacement_candidates(&self, file_name: &str) -> Result<Vec<Person>, AppError> {
        let roster = self.get_roster(file_name).await?;
        let session = self.session.lock().await;

        let mut candidates: Vec<Person> = session
            .table
            .people
            .iter()
            .filter(|p| p.role.is_rosterable() && !roster.contains(&p.id))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            (a.role.as_str(), a.group.as_str(), a.name.as_str()).cmp(&(
                b.role.as_str(),
                b.group.as_str(),
                b.name.as_str(),
            ))
        });
        Ok(candidates)
    }

    /// Swap one roster member for another and move one participation with them.
    pub async fn replace_member(
        &self,
        file_name: &str,
        request: &ReplaceMemberRequest,
    ) -> Result<Roster, AppError> {
        let key = Self::key_for(file_name)?;
        let mut session = self.session.lock().await;
        session.check_revision(request.expected_revision)?;

        let mut roster = self.load_roster(&key).await?;
        if !roster.contains(&request.removed_id) {
            return Err(AppError::Validation(format!(
                "Person {} is not on roster {}",
                request.removed_id, file_name
            )));
        }
        if roster.contains(&request.added_id) {
            return Err(AppError::Validation(format!(
                "Person {} is already on roster {}",
                request.added_id, file_name
            )));
        }
        let added = session
            .table
            .get(&request.added_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Person {} not found", request.added_id)))?;
        if !added.role.is_rosterable() {
            return Err(AppError::Validation(format!(
                "{} cannot serve as {}",
                added.name,
                added.role.as_str()
            )));
        }

        let mut table = session.table.clone();
        ledger::apply_replacement(&mut table, &request.removed_id, &request.added_id)?;

        roster.members.retain(|m| m.id != request.removed_id);
        roster.members.push(added);

        let snapshot = codec::encode_roster(&roster).await?;
        let previous = self.put_snapshot(&key, snapshot).await?;
        if let Err(e) = self.persist_table(&table).await {
            self.restore_snapshot(&key, previous).await;
            return Err(e);
        }

        session.commit(table);
        tracing::info!(
            "Replaced {} with {} on {}",
            request.removed_id,
            request.added_id,
            file_name
        );
        Ok(roster)
    }

    /// Delete rosters dated before `today`.
    pub async fn reap_stale_rosters(&self, today: NaiveDate) -> Result<ReapReport, AppError> {
        let _session = self.session.lock().await;
        reaper::reap_stale_rosters(self.store.as_ref(), today).await
    }
}
