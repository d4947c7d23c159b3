//! Users present in the group

use crate::utils::RosterError;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One roster line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: Option<String>,
}

impl RosterEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(anon)")
    }
}

#[derive(Debug, Default)]
pub struct Roster {
    users: HashMap<String, Option<String>>,
    /// Ids in arrival order, used to keep anonymous users stable
    arrival: Vec<String>,
}

/// Case-insensitive order, ties broken case-sensitively
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn normalize(name: Option<&str>) -> Option<String> {
    name.filter(|n| !n.is_empty()).map(str::to_string)
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str, name: Option<&str>) -> Result<(), RosterError> {
        if self.users.contains_key(id) {
            return Err(RosterError::DuplicateUser(id.to_string()));
        }
        self.users.insert(id.to_string(), normalize(name));
        self.arrival.push(id.to_string());
        Ok(())
    }

    pub fn remove(&mut self, id: &str, name: Option<&str>) -> Result<(), RosterError> {
        let known = self
            .users
            .get(id)
            .ok_or_else(|| RosterError::UnknownUser(id.to_string()))?;
        if *known != normalize(name) {
            return Err(RosterError::InconsistentName(id.to_string()));
        }
        self.users.remove(id);
        self.arrival.retain(|i| i != id);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.users.clear();
        self.arrival.clear();
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Display order: named users sorted by name, then anonymous users in
    /// arrival order
    pub fn entries(&self) -> Vec<RosterEntry> {
        let mut entries: Vec<RosterEntry> = self
            .arrival
            .iter()
            .map(|id| RosterEntry {
                id: id.clone(),
                name: self.users.get(id).cloned().flatten(),
            })
            .collect();

        entries.sort_by(|a, b| match (&a.name, &b.name) {
            (Some(x), Some(y)) => compare_names(x, y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        entries
    }
}
