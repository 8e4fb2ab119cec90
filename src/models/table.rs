//! The master table: every person the parish can roster.

use std::collections::HashSet;

use crate::errors::AppError;

use super::{Person, Role};

/// In-memory copy of the stored master table.
///
/// Owned by the repository session; the selector and the ledger borrow it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterTable {
    /// Names of data-file columns beyond the fixed header, in file order
    pub extra_columns: Vec<String>,
    pub people: Vec<Person>,
}

impl MasterTable {
    /// Build a table, rejecting duplicate IDs.
    pub fn new(extra_columns: Vec<String>, people: Vec<Person>) -> Result<Self, AppError> {
        let mut seen = HashSet::new();
        for person in &people {
            if !seen.insert(person.id.as_str()) {
                return Err(AppError::MalformedRecord(format!(
                    "Duplicate person ID {}",
                    person.id
                )));
            }
        }
        Ok(Self {
            extra_columns,
            people,
        })
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Person> {
        self.people.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Everyone holding `role`, in table order.
    pub fn pool(&self, role: &Role) -> Vec<&Person> {
        self.people.iter().filter(|p| &p.role == role).collect()
    }

    /// Distinct groups in order of first appearance.
    pub fn groups(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.people
            .iter()
            .filter(|p| seen.insert(p.group.as_str()))
            .map(|p| p.group.clone())
            .collect()
    }

    /// Append a person, registering any extra columns it introduces.
    pub fn insert(&mut self, person: Person) -> Result<(), AppError> {
        if self.contains(&person.id) {
            return Err(AppError::Validation(format!(
                "Person {} already exists",
                person.id
            )));
        }
        for column in person.extra.keys() {
            if !self.extra_columns.contains(column) {
                self.extra_columns.push(column.clone());
            }
        }
        self.people.push(person);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Person> {
        let index = self.people.iter().position(|p| p.id == id)?;
        Some(self.people.remove(index))
    }

    /// Order used after adding a person.
    pub fn sort_by_group_name_role(&mut self) {
        self.people.sort_by(|a, b| {
            (a.group.as_str(), a.name.as_str(), a.role.as_str()).cmp(&(
                b.group.as_str(),
                b.name.as_str(),
                b.role.as_str(),
            ))
        });
    }

    /// Order used after removing a person.
    pub fn sort_by_role_group_name(&mut self) {
        self.people.sort_by(|a, b| {
            (a.role.as_str(), a.group.as_str(), a.name.as_str()).cmp(&(
                b.role.as_str(),
                b.group.as_str(),
                b.name.as_str(),
            ))
        });
    }

    /// Sum of all participation counts.
    pub fn total_participation(&self) -> u64 {
        self.people
            .iter()
            .map(|p| u64::from(p.participation_count))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn person(id: &str, name: &str, group: &str, role: Role) -> Person {
        Person {
            id: id.to_string(),
            name: name.to_string(),
            group: group.to_string(),
            role,
            participation_count: 0,
            notes: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_duplicate_ids_are_malformed() {
        let result = MasterTable::new(
            vec![],
            vec![
                person("1", "Agnes", "A", Role::Server),
                person("1", "Benedikta", "B", Role::Server),
            ],
        );
        assert!(matches!(result, Err(AppError::MalformedRecord(_))));
    }

    #[test]
    fn test_groups_keep_first_appearance_order() {
        let table = MasterTable::new(
            vec![],
            vec![
                person("1", "Agnes", "Yosef", Role::Server),
                person("2", "Benedikta", "Maria", Role::Server),
                person("3", "Cecilia", "Yosef", Role::Organist),
            ],
        )
        .unwrap();
        assert_eq!(table.groups(), vec!["Yosef", "Maria"]);
        assert_eq!(table.pool(&Role::Organist).len(), 1);
    }

    #[test]
    fn test_insert_registers_extra_columns_and_rejects_duplicates() {
        let mut table = MasterTable::default();
        let mut with_phone = person("1", "Agnes", "A", Role::Server);
        with_phone
            .extra
            .insert("Telepon".to_string(), "0812".to_string());
        table.insert(with_phone).unwrap();
        assert_eq!(table.extra_columns, vec!["Telepon"]);

        let err = table
            .insert(person("1", "Other", "B", Role::Server))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_sort_orders() {
        let mut table = MasterTable::new(
            vec![],
            vec![
                person("1", "Zita", "B", Role::Server),
                person("2", "Ana", "B", Role::Organist),
                person("3", "Maria", "A", Role::Server),
            ],
        )
        .unwrap();

        table.sort_by_group_name_role();
        let ids: Vec<&str> = table.people.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);

        table.sort_by_role_group_name();
        let ids: Vec<&str> = table.people.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }
}
