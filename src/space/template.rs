// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `%%token%%` path templates.
//!
//! A token is one of:
//!
//! ```text
//! %%name%%             current coordinate in the dimension's own representation
//! %%name:INDEX%%       forced representation (VALUE, INDEX or ID)
//! %%group/name%%       dimension addressed by group as well as name
//! %%nameA,nameB%%      the single id shared by every listed dimension
//! ```
//!
//! Unresolvable tokens are left in the output verbatim and the expansion is
//! reported as failed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::observability::messages::space::TemplateTokenUnresolved;
use crate::observability::messages::StructuredLog;
use crate::space::dimension::{Dimension, DimensionKey, Representation};

const DELIMITER: &str = "%%";

/// Per-dimension index overrides, keyed by name and group. Dimensions
/// without an entry use their current index.
pub type IndexOverrides = HashMap<DimensionKey, usize>;

/// Replace every `%%token%%` in `text` using `resolve`. Returns the expanded
/// text and whether every token resolved.
pub fn expand<F>(text: &str, mut resolve: F) -> (String, bool)
where
    F: FnMut(&str) -> Result<String, String>,
{
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    let mut complete = true;

    while let Some(start) = rest.find(DELIMITER) {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + DELIMITER.len()..];
        let Some(end) = after_open.find(DELIMITER) else {
            output.push_str(&rest[start..]);
            return (output, complete);
        };
        let token = &after_open[..end];
        match resolve(token) {
            Ok(replacement) => output.push_str(&replacement),
            Err(reason) => {
                TemplateTokenUnresolved {
                    template: text,
                    token,
                    reason: &reason,
                }
                .log();
                complete = false;
                output.push_str(DELIMITER);
                output.push_str(token);
                output.push_str(DELIMITER);
            }
        }
        rest = &after_open[end + DELIMITER.len()..];
    }
    output.push_str(rest);
    (output, complete)
}

/// Resolve one token against a set of dimensions.
pub fn resolve_token(
    dimensions: &[Arc<Dimension>],
    token: &str,
    overrides: &IndexOverrides,
) -> Result<String, String> {
    let token = token.trim();
    if token.is_empty() {
        return Err("empty token".to_string());
    }

    let (names, forced) = match token.split_once(':') {
        Some((names, suffix)) => {
            let representation = Representation::from_token(suffix)
                .ok_or_else(|| format!("unknown representation '{}'", suffix))?;
            (names, Some(representation))
        }
        None => (token, None),
    };

    if names.contains(',') {
        if forced.is_some() {
            return Err("a representation cannot be forced on a common id".to_string());
        }
        return common_id(dimensions, names, overrides);
    }

    let dimension = find(dimensions, names).ok_or_else(|| format!("no dimension named '{}'", names))?;
    let index = index_for(&dimension, overrides);
    let representation = forced.unwrap_or_else(|| dimension.representation());
    dimension
        .template_text(index, representation)
        .ok_or_else(|| format!("'{}' has no {:?} at index {}", names, representation, index))
}

/// The one id that every listed dimension maps its (current or overridden)
/// value to.
fn common_id(dimensions: &[Arc<Dimension>], names: &str, overrides: &IndexOverrides) -> Result<String, String> {
    let mut survivors: Option<BTreeSet<String>> = None;
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let dimension = find(dimensions, name).ok_or_else(|| format!("no dimension named '{}'", name))?;
        let candidates: BTreeSet<String> = dimension
            .ids_for_index(index_for(&dimension, overrides))
            .into_iter()
            .collect();
        survivors = Some(match survivors {
            None => candidates,
            Some(current) => current.intersection(&candidates).cloned().collect(),
        });
    }

    let survivors = survivors.unwrap_or_default();
    let mut iter = survivors.iter();
    match (iter.next(), iter.next()) {
        (Some(id), None) => Ok(id.clone()),
        (None, _) => Err(format!("no common id for '{}'", names)),
        (Some(_), Some(_)) => Err(format!(
            "common id for '{}' is ambiguous between {} candidates",
            names,
            survivors.len()
        )),
    }
}

fn find(dimensions: &[Arc<Dimension>], name: &str) -> Option<Arc<Dimension>> {
    let (group, name) = match name.rsplit_once('/') {
        Some((group, name)) => (Some(group), name),
        None => (None, name),
    };
    dimensions
        .iter()
        .find(|d| d.name() == name && group.map_or(true, |g| d.group() == g))
        .cloned()
}

fn index_for(dimension: &Dimension, overrides: &IndexOverrides) -> usize {
    overrides
        .get(dimension.key())
        .copied()
        .unwrap_or_else(|| dimension.current_index())
}
