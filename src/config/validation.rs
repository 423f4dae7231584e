// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Checks run in this order and accumulate every error they find:
//!
//! 1. processor ids are unique
//! 2. every `depends_on` names an existing processor
//! 3. the processor graph is acyclic (DFS with a recursion stack; skipped
//!    when step 2 failed, since it needs a well-formed graph)
//! 4. every command processor names a program
//! 5. dimension (name, group) keys are unique
//! 6. the sweep section only names declared dimensions
//!
//! ```
//! use the_lattice::config::{parse_config, validate_config, ConfigFormat};
//! use the_lattice::errors::ValidationError;
//!
//! let config = parse_config(
//!     "processors:\n  - id: a\n    program: run\n    depends_on: [missing]\n",
//!     ConfigFormat::Yaml,
//! ).unwrap();
//! let errors = validate_config(&config).unwrap_err();
//! assert!(matches!(errors[0], ValidationError::UnresolvedDependency { .. }));
//! ```

use std::collections::{HashMap, HashSet};

use crate::config::{Config, ProcessorKind};
use crate::errors::ValidationError;

pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(found) = validate_unique_processor_ids(config) {
        errors.extend(found);
    }

    match validate_dependency_references(config) {
        Ok(()) => {
            if let Err(cycle) = detect_cycles(config) {
                errors.push(cycle);
            }
        }
        Err(found) => errors.extend(found),
    }

    for processor in &config.processors {
        let has_program = processor
            .program
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if processor.kind == ProcessorKind::Command && !has_program {
            errors.push(ValidationError::MissingProgram {
                processor_id: processor.id.clone(),
            });
        }
    }

    if let Err(found) = validate_dimensions(config) {
        errors.extend(found);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_unique_processor_ids(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut errors = Vec::new();

    for processor in &config.processors {
        if !seen.insert(processor.id.as_str()) && reported.insert(processor.id.as_str()) {
            errors.push(ValidationError::DuplicateProcessorId {
                processor_id: processor.id.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_dependency_references(config: &Config) -> Result<(), Vec<ValidationError>> {
    let ids: HashSet<&str> = config.processors.iter().map(|p| p.id.as_str()).collect();
    let errors: Vec<ValidationError> = config
        .processors
        .iter()
        .flat_map(|processor| {
            processor
                .depends_on
                .iter()
                .filter(|dependency| !ids.contains(dependency.as_str()))
                .map(|dependency| ValidationError::UnresolvedDependency {
                    processor_id: processor.id.clone(),
                    missing_dependency: dependency.clone(),
                })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Report the first cycle found, as the path that closes it.
fn detect_cycles(config: &Config) -> Result<(), ValidationError> {
    let edges: HashMap<&str, Vec<&str>> = config
        .processors
        .iter()
        .map(|p| (p.id.as_str(), p.depends_on.iter().map(String::as_str).collect()))
        .collect();
    let mut marks: HashMap<&str, Mark> = edges.keys().map(|id| (*id, Mark::Unvisited)).collect();

    for processor in &config.processors {
        let mut path = Vec::new();
        if let Some(cycle) = visit(processor.id.as_str(), &edges, &mut marks, &mut path) {
            return Err(ValidationError::CyclicDependency { cycle });
        }
    }
    Ok(())
}

fn visit<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    match marks.get(node).copied().unwrap_or(Mark::Done) {
        Mark::Done => return None,
        Mark::InProgress => {
            let start = path.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        Mark::Unvisited => {}
    }

    marks.insert(node, Mark::InProgress);
    path.push(node);
    for next in edges.get(node).into_iter().flatten() {
        if let Some(cycle) = visit(*next, edges, marks, path) {
            return Some(cycle);
        }
    }
    path.pop();
    marks.insert(node, Mark::Done);
    None
}

fn validate_dimensions(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut keys = HashSet::new();
    for dimension in &config.space.dimensions {
        if !keys.insert((dimension.name.as_str(), dimension.group.as_str())) {
            errors.push(ValidationError::DuplicateDimension {
                name: dimension.name.clone(),
                group: dimension.group.clone(),
            });
        }
    }

    for name in &config.sweep.dimensions {
        let (group, bare) = match name.rsplit_once('/') {
            Some((group, bare)) => (Some(group), bare),
            None => (None, name.as_str()),
        };
        let declared = config
            .space
            .dimensions
            .iter()
            .any(|d| d.name == bare && group.map_or(true, |g| d.group == g));
        if !declared {
            errors.push(ValidationError::UnknownSweepDimension { name: name.clone() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ConfigFormat};

    fn config(yaml: &str) -> Config {
        parse_config(yaml, ConfigFormat::Yaml).unwrap()
    }

    #[test]
    fn valid_chain_passes() {
        let cfg = config(
            r#"
processors:
  - { id: a, program: x }
  - { id: b, program: x, depends_on: [a] }
  - { id: c, program: x, depends_on: [a, b] }
"#,
        );
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn duplicate_ids_are_reported_once() {
        let cfg = config(
            r#"
processors:
  - { id: a, program: x }
  - { id: a, program: x }
  - { id: a, program: x }
"#,
        );
        let errors = validate_config(&cfg).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateProcessorId {
                processor_id: "a".to_string()
            }]
        );
    }

    #[test]
    fn cycle_path_is_reported() {
        let cfg = config(
            r#"
processors:
  - { id: a, program: x, depends_on: [c] }
  - { id: b, program: x, depends_on: [a] }
  - { id: c, program: x, depends_on: [b] }
"#,
        );
        let errors = validate_config(&cfg).unwrap_err();
        match &errors[0] {
            ValidationError::CyclicDependency { cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let cfg = config("processors:\n  - { id: a, program: x, depends_on: [a] }\n");
        assert!(matches!(
            validate_config(&cfg).unwrap_err()[0],
            ValidationError::CyclicDependency { .. }
        ));
    }

    #[test]
    fn cycle_detection_waits_for_valid_references() {
        let cfg = config(
            r#"
processors:
  - { id: a, program: x, depends_on: [b, ghost] }
  - { id: b, program: x, depends_on: [a] }
"#,
        );
        let errors = validate_config(&cfg).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::UnresolvedDependency { .. }));
    }

    #[test]
    fn missing_program_is_reported() {
        let cfg = config("processors:\n  - { id: a, program: \"  \" }\n");
        assert_eq!(
            validate_config(&cfg).unwrap_err(),
            vec![ValidationError::MissingProgram {
                processor_id: "a".to_string()
            }]
        );
    }

    #[test]
    fn dimension_problems_are_reported() {
        let cfg = config(
            r#"
space:
  dimensions:
    - { name: x, values: [1.0] }
    - { name: x, values: [2.0] }
    - { name: x, group: other, values: [3.0] }
sweep:
  dimensions: [x, other/x, y, missing/x]
"#,
        );
        let errors = validate_config(&cfg).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateDimension {
                    name: "x".to_string(),
                    group: String::new()
                },
                ValidationError::UnknownSweepDimension { name: "y".to_string() },
                ValidationError::UnknownSweepDimension {
                    name: "missing/x".to_string()
                },
            ]
        );
    }
}
