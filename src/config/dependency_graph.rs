// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::config::{Config, EntryPoints};

/// Forward edges of the processor graph: processor id to the ids that
/// depend on it. Also remembers declaration order so that every listing is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    dependents: HashMap<String, Vec<String>>,
    in_degree: HashMap<String, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a validated config.
    pub fn from_config(config: &Config) -> Self {
        let mut graph = Self::new();
        for processor in &config.processors {
            graph.add_processor(&processor.id);
        }
        for processor in &config.processors {
            for dependency in &processor.depends_on {
                graph.add_dependency(dependency, &processor.id);
            }
        }
        graph
    }

    pub fn add_processor(&mut self, id: &str) {
        if !self.dependents.contains_key(id) {
            self.order.push(id.to_string());
            self.dependents.insert(id.to_string(), Vec::new());
            self.in_degree.insert(id.to_string(), 0);
        }
    }

    /// Record that `dependent` must run after `dependency`.
    pub fn add_dependency(&mut self, dependency: &str, dependent: &str) {
        self.add_processor(dependency);
        self.add_processor(dependent);
        if let Some(list) = self.dependents.get_mut(dependency) {
            if !list.iter().any(|d| d == dependent) {
                list.push(dependent.to_string());
                *self.in_degree.entry(dependent.to_string()).or_default() += 1;
            }
        }
    }

    pub fn get_dependents(&self, processor_id: &str) -> Option<&Vec<String>> {
        self.dependents.get(processor_id)
    }

    /// Processor ids in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Processors with no dependencies, in declaration order.
    pub fn entry_points(&self) -> EntryPoints {
        self.order
            .iter()
            .filter(|id| self.in_degree.get(*id).copied().unwrap_or(0) == 0)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Kahn's algorithm, one level at a time. Every processor of a level
    /// depends only on processors of earlier levels. Within a level the
    /// declaration order is kept. Processors caught in a cycle are left out.
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut remaining = self.in_degree.clone();
        let mut current: Vec<String> = self.entry_points().into();
        let mut levels = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                for dependent in self.dependents.get(id).into_iter().flatten() {
                    if let Some(degree) = remaining.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }
            let position = |id: &String| self.order.iter().position(|o| o == id);
            next.sort_by_key(position);
            levels.push(std::mem::replace(&mut current, next));
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for id in ["a", "b", "c", "d"] {
            graph.add_processor(id);
        }
        graph.add_dependency("a", "b");
        graph.add_dependency("a", "c");
        graph.add_dependency("b", "d");
        graph.add_dependency("c", "d");
        graph
    }

    #[test]
    fn diamond_has_three_levels() {
        assert_eq!(
            diamond().levels(),
            vec![
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["d".to_string()]
            ]
        );
    }

    #[test]
    fn independent_processors_share_the_first_level() {
        let mut graph = DependencyGraph::new();
        graph.add_processor("x");
        graph.add_processor("y");
        let entries: Vec<String> = graph.entry_points().into();
        assert_eq!(entries, vec!["x", "y"]);
        assert_eq!(graph.levels().len(), 1);
    }

    #[test]
    fn repeated_edges_count_once() {
        let mut graph = diamond();
        graph.add_dependency("a", "b");
        assert_eq!(graph.levels().len(), 3);
        assert_eq!(graph.get_dependents("a").unwrap().len(), 2);
    }

    #[test]
    fn cyclic_processors_are_left_out() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");
        graph.add_processor("free");
        assert_eq!(graph.levels(), vec![vec!["free".to_string()]]);
    }
}
