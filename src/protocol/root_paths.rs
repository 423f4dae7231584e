// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use crate::config::RootPathMapping;

/// Prefix translation between this node's filesystem and its peers'.
///
/// Root paths leave the node through [`to_remote`](RootPathMap::to_remote)
/// and arrive through [`to_local`](RootPathMap::to_local). The first mapping
/// whose prefix matches wins; unmatched paths pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootPathMap {
    mappings: Vec<(PathBuf, PathBuf)>,
}

impl RootPathMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(mappings: &[RootPathMapping]) -> Self {
        let mut map = Self::new();
        for mapping in mappings {
            map.add(&mapping.local, &mapping.remote);
        }
        map
    }

    pub fn add(&mut self, local: impl Into<PathBuf>, remote: impl Into<PathBuf>) {
        self.mappings.push((local.into(), remote.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn to_remote(&self, path: &Path) -> PathBuf {
        self.mappings
            .iter()
            .find_map(|(local, remote)| path.strip_prefix(local).ok().map(|rest| join(remote, rest)))
            .unwrap_or_else(|| path.to_path_buf())
    }

    pub fn to_local(&self, path: &Path) -> PathBuf {
        self.mappings
            .iter()
            .find_map(|(local, remote)| path.strip_prefix(remote).ok().map(|rest| join(local, rest)))
            .unwrap_or_else(|| path.to_path_buf())
    }
}

fn join(prefix: &Path, rest: &Path) -> PathBuf {
    if rest.as_os_str().is_empty() {
        prefix.to_path_buf()
    } else {
        prefix.join(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_swapped_in_both_directions() {
        let mut map = RootPathMap::new();
        map.add("/mnt/cluster/data", "/data");

        assert_eq!(map.to_remote(Path::new("/mnt/cluster/data/runs")), PathBuf::from("/data/runs"));
        assert_eq!(map.to_local(Path::new("/data/runs/a_1")), PathBuf::from("/mnt/cluster/data/runs/a_1"));
        assert_eq!(map.to_local(Path::new("/data")), PathBuf::from("/mnt/cluster/data"));
    }

    #[test]
    fn unmatched_paths_pass_through() {
        let map = RootPathMap::from_config(&[RootPathMapping {
            local: "/home/me".into(),
            remote: "/srv".into(),
        }]);
        assert_eq!(map.to_remote(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
        assert_eq!(map.to_local(Path::new("/srvices")), PathBuf::from("/srvices"));
    }
}
