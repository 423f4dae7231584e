// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Processors with no dependencies: the first level of the runtime graph.
///
/// ```
/// use the_lattice::config::EntryPoints;
///
/// let mut entry_points = EntryPoints::new();
/// entry_points.add("mesh".to_string());
/// entry_points.add("fetch_inputs".to_string());
///
/// assert_eq!(entry_points.len(), 2);
/// assert!(entry_points.contains("mesh"));
/// let ids: Vec<String> = entry_points.into();
/// assert_eq!(ids[1], "fetch_inputs");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPoints(pub Vec<String>);

impl EntryPoints {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn add(&mut self, processor_id: String) {
        self.0.push(processor_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn contains(&self, processor_id: &str) -> bool {
        self.0.iter().any(|id| id == processor_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for EntryPoints {
    fn from(entry_points: Vec<String>) -> Self {
        Self(entry_points)
    }
}

impl From<EntryPoints> for Vec<String> {
    fn from(value: EntryPoints) -> Self {
        value.0
    }
}
