use crate::data::panel::Panel;
use serde::Serialize;
use std::collections::HashMap;

/// Bijection between country names and dense 1-based unit ids. Ids follow
/// alphabetical order of the names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitIndex {
    names: Vec<String>,
    #[serde(skip)]
    ids: HashMap<String, usize>,
}

impl UnitIndex {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        let ids = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i + 1))
            .collect();
        Self { names, ids }
    }

    pub fn from_panel(panel: &Panel) -> Self {
        Self::new(panel.countries())
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        id.checked_sub(1)
            .and_then(|idx| self.names.get(idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// (id, name) pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (i + 1, name.as_str()))
    }

    /// Every id except `treated`, ascending.
    pub fn controls_for(&self, treated: usize) -> Vec<usize> {
        self.iter()
            .map(|(id, _)| id)
            .filter(|&id| id != treated)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_alphabetical_and_dense() {
        let units = UnitIndex::new(["Spain", "Austria", "Germany", "Austria"]);
        assert_eq!(units.len(), 3);
        assert_eq!(units.id("Austria"), Some(1));
        assert_eq!(units.id("Germany"), Some(2));
        assert_eq!(units.id("Spain"), Some(3));
        assert_eq!(units.id("France"), None);
    }

    #[test]
    fn test_lookup_is_bidirectional() {
        let units = UnitIndex::new(["Italy", "Greece", "Finland"]);
        for (id, name) in units.iter() {
            assert_eq!(units.id(name), Some(id));
            assert_eq!(units.name(id), Some(name));
        }
        assert_eq!(units.name(0), None);
        assert_eq!(units.name(4), None);
    }

    #[test]
    fn test_controls_exclude_treated() {
        let units = UnitIndex::new(["Austria", "France", "Germany", "Italy"]);
        let treated = units.id("Germany").unwrap();
        let controls = units.controls_for(treated);

        assert_eq!(controls, vec![1, 2, 4]);
        assert!(!controls.contains(&treated));
        assert_eq!(controls.len() + 1, units.len());
    }
}
