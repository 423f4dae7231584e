// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `<output>.meta.json` sidecars recording what produced an output file.
//!
//! Before a non-forced run the recorded metadata is compared against what the
//! run would use now; if every output exists and nothing differs the run is
//! skipped. Anything unreadable counts as stale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::consts::RUN_METADATA_VERSION;
use crate::errors::ProcessorError;
use crate::traits::RunContext;
use crate::utils::files::{modified_timestamp, write_atomic};

const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub metadata_version: u32,
    /// Input path → modification time.
    pub input_files: BTreeMap<String, String>,
    pub output_files: Vec<String>,
    pub configuration: serde_json::Value,
}

impl RunMetadata {
    pub fn capture(context: &RunContext) -> Self {
        let input_files = context
            .input_paths()
            .into_iter()
            .map(|path| {
                let modified = modified_timestamp(&path).unwrap_or_default();
                (path.to_string_lossy().into_owned(), modified)
            })
            .collect();
        Self {
            metadata_version: RUN_METADATA_VERSION,
            input_files,
            output_files: context.output_files.clone(),
            configuration: serde_json::to_value(&context.configuration)
                .unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn sidecar_path(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_os_string();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Write the sidecar for `output`. Missing outputs are skipped.
    pub fn write_for(&self, output: &Path) -> Result<(), ProcessorError> {
        if !output.exists() {
            return Ok(());
        }
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(&Self::sidecar_path(output), &json)?;
        Ok(())
    }

    pub fn read_for(output: &Path) -> Result<Self, ProcessorError> {
        let bytes = std::fs::read(Self::sidecar_path(output))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// True unless every declared output exists with matching metadata.
pub fn needs_rerun(context: &RunContext) -> bool {
    if context.output_files.is_empty() {
        return true;
    }
    let current = RunMetadata::capture(context);
    context.output_paths().iter().any(|output| {
        if !output.exists() {
            return true;
        }
        match RunMetadata::read_for(output) {
            Ok(recorded) => recorded != current,
            Err(error) => {
                tracing::debug!(output = %output.display(), %error, "run metadata unusable, rerunning");
                true
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Configuration;
    use tempfile::TempDir;

    fn context(dir: &Path, configuration: Configuration) -> RunContext {
        RunContext {
            processor_id: "p".to_string(),
            configuration,
            running_directory: dir.to_path_buf(),
            input_directory: dir.to_path_buf(),
            output_directory: dir.to_path_buf(),
            input_files: Vec::new(),
            output_files: vec!["out.txt".to_string()],
            force: false,
        }
    }

    #[test]
    fn matching_metadata_skips_rerun() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), Configuration::new().with("x", 1.0));
        std::fs::write(dir.path().join("out.txt"), "data").unwrap();

        assert!(needs_rerun(&ctx));
        RunMetadata::capture(&ctx)
            .write_for(&dir.path().join("out.txt"))
            .unwrap();
        assert!(!needs_rerun(&ctx));
    }

    #[test]
    fn changed_configuration_forces_rerun() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), Configuration::new().with("x", 1.0));
        std::fs::write(dir.path().join("out.txt"), "data").unwrap();
        RunMetadata::capture(&ctx)
            .write_for(&dir.path().join("out.txt"))
            .unwrap();

        let changed = context(dir.path(), Configuration::new().with("x", 2.0));
        assert!(needs_rerun(&changed));
    }

    #[test]
    fn malformed_metadata_forces_rerun() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), Configuration::new());
        let output = dir.path().join("out.txt");
        std::fs::write(&output, "data").unwrap();
        std::fs::write(RunMetadata::sidecar_path(&output), "{not json").unwrap();

        assert!(needs_rerun(&ctx));
    }
}
