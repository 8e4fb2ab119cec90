//! Participation ledger.
//!
//! Keeps per-person participation counts in step with roster changes. Every
//! operation validates its IDs before touching a count, so a failed call
//! leaves the table unchanged. Someone replaced off a roster after leaving the
//! master table has no count left to decrement.

use std::collections::HashSet;

use crate::errors::AppError;
use crate::models::MasterTable;

fn require(table: &MasterTable, id: &str) -> Result<(), AppError> {
    if table.contains(id) {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Person {} not found", id)))
    }
}

/// Add one participation for every roster member.
pub fn apply_roster_confirmation(
    table: &mut MasterTable,
    member_ids: &[String],
) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for id in member_ids {
        require(table, id)?;
        if !seen.insert(id.as_str()) {
            return Err(AppError::Validation(format!(
                "Person {} appears twice in the roster",
                id
            )));
        }
    }

    for id in member_ids {
        if let Some(person) = table.get_mut(id) {
            person.participation_count = person.participation_count.saturating_add(1);
        }
    }
    Ok(())
}

/// Move one participation from `removed_id` to `added_id`.
pub fn apply_replacement(
    table: &mut MasterTable,
    removed_id: &str,
    added_id: &str,
) -> Result<(), AppError> {
    if removed_id == added_id {
        return Err(AppError::Validation(
            "Replacement must be a different person".to_string(),
        ));
    }
    require(table, added_id)?;

    match table.get_mut(removed_id) {
        None => tracing::warn!(
            "Person {} is no longer in the master table; not decrementing",
            removed_id
        ),
        Some(removed) => {
            if removed.participation_count == 0 {
                tracing::warn!(
                    "Participation count of {} is already zero; not decrementing",
                    removed.describe()
                );
            }
            removed.participation_count = removed.participation_count.saturating_sub(1);
        }
    }
    if let Some(added) = table.get_mut(added_id) {
        added.participation_count = added.participation_count.saturating_add(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Person, Role};
    use std::collections::BTreeMap;

    fn table(counts: &[(&str, u32)]) -> MasterTable {
        let people = counts
            .iter()
            .map(|(id, count)| Person {
                id: id.to_string(),
                name: format!("Person {}", id),
                group: "Maria".to_string(),
                role: Role::Server,
                participation_count: *count,
                notes: None,
                extra: BTreeMap::new(),
            })
            .collect();
        MasterTable::new(vec![], people).unwrap()
    }

    fn count(table: &MasterTable, id: &str) -> u32 {
        table.get(id).unwrap().participation_count
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_confirmation_increments_each_member_once() {
        let mut table = table(&[("a", 0), ("b", 3), ("c", 1)]);
        let before = table.total_participation();

        apply_roster_confirmation(&mut table, &ids(&["a", "b"])).unwrap();

        assert_eq!(count(&table, "a"), 1);
        assert_eq!(count(&table, "b"), 4);
        assert_eq!(count(&table, "c"), 1);
        assert_eq!(table.total_participation(), before + 2);
    }

    #[test]
    fn test_confirmation_with_unknown_member_changes_nothing() {
        let mut table = table(&[("a", 0), ("b", 3)]);
        let snapshot = table.clone();

        let err = apply_roster_confirmation(&mut table, &ids(&["a", "ghost"])).unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(table, snapshot);
    }

    #[test]
    fn test_confirmation_rejects_duplicates() {
        let mut table = table(&[("a", 0)]);
        let err = apply_roster_confirmation(&mut table, &ids(&["a", "a"])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(count(&table, "a"), 0);
    }

    #[test]
    fn test_replacement_nets_to_zero() {
        let mut table = table(&[("x", 2), ("y", 5)]);
        let before = table.total_participation();

        apply_replacement(&mut table, "x", "y").unwrap();

        assert_eq!(count(&table, "x"), 1);
        assert_eq!(count(&table, "y"), 6);
        assert_eq!(table.total_participation(), before);
    }

    #[test]
    fn test_confirmation_then_replacement() {
        let mut table = table(&[("a", 0), ("b", 0), ("x", 0), ("y", 0)]);

        apply_roster_confirmation(&mut table, &ids(&["a", "b", "x"])).unwrap();
        apply_replacement(&mut table, "x", "y").unwrap();

        assert_eq!(count(&table, "a"), 1);
        assert_eq!(count(&table, "b"), 1);
        assert_eq!(count(&table, "x"), 0);
        assert_eq!(count(&table, "y"), 1);
    }

    #[test]
    fn test_replacement_validation() {
        let mut table = table(&[("x", 1)]);
        assert!(matches!(
            apply_replacement(&mut table, "x", "x"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            apply_replacement(&mut table, "x", "ghost"),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(count(&table, "x"), 1);
    }

    #[test]
    fn test_replacing_departed_person_only_increments() {
        let mut table = table(&[("y", 2)]);

        apply_replacement(&mut table, "gone", "y").unwrap();

        assert_eq!(count(&table, "y"), 3);
        assert!(!table.contains("gone"));
    }

    #[test]
    fn test_replacement_never_goes_negative() {
        let mut table = table(&[("x", 0), ("y", 0)]);
        apply_replacement(&mut table, "x", "y").unwrap();
        assert_eq!(count(&table, "x"), 0);
        assert_eq!(count(&table, "y"), 1);
    }
}
