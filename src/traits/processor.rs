// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use crate::engine::{self, Configuration, ProcessorCore};

/// A unit of computation run at one point of a parameter space.
///
/// Implementors provide [`run`](Processor::run) and expose their shared state
/// through [`core`](Processor::core). The lifecycle around `run` (start and
/// done observers, the prepare step, the enabled flag and the staleness check)
/// is supplied by [`process_with`](Processor::process_with) and should not be
/// reimplemented.
///
/// Failures are reported as `false` plus a logged diagnostic; a processor
/// never panics across this boundary for a failed run.
pub trait Processor: Send + Sync {
    fn core(&self) -> &ProcessorCore;

    /// Short type name, recorded in cache fingerprints.
    fn type_name(&self) -> &str;

    fn id(&self) -> &str {
        self.core().id()
    }

    /// Do the work. Called only when the processor is enabled and its outputs
    /// are stale or the run is forced.
    fn run(&self, context: &RunContext) -> bool;

    /// Optional step before the staleness check. Returning false aborts the
    /// run and reports failure.
    fn prepare(&self, _context: &RunContext) -> bool {
        true
    }

    /// Whether the outputs for `context` must be recomputed. The default
    /// compares the per-run metadata written next to each output.
    fn needs_rerun(&self, context: &RunContext) -> bool {
        engine::run_metadata::needs_rerun(context)
    }

    /// Text identifying how the processor would be invoked for
    /// `configuration`. Part of the cache fingerprint.
    fn command_line(&self, _configuration: &Configuration) -> String {
        String::new()
    }

    /// Run with the processor's own directories and configuration.
    fn process(&self, force_recompute: bool) -> bool {
        self.process_with(RunRequest::new().forced(force_recompute))
    }

    /// Run with per-call overrides.
    fn process_with(&self, request: RunRequest) -> bool {
        engine::execute(self, request)
    }

    /// Advisory probe; the answer may be stale by the time it is read.
    fn is_running(&self) -> bool {
        self.core().is_running()
    }
}

/// Overrides for a single run. Unset fields fall back to the processor's own
/// settings.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub configuration: Option<Configuration>,
    pub running_directory: Option<PathBuf>,
    pub input_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub input_files: Option<Vec<String>>,
    pub force: bool,
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn with_running_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.running_directory = Some(directory.into());
        self
    }

    pub fn with_input_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.input_directory = Some(directory.into());
        self
    }

    pub fn with_output_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(directory.into());
        self
    }

    pub fn with_input_files(mut self, files: Vec<String>) -> Self {
        self.input_files = Some(files);
        self
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub processor_id: String,
    pub configuration: Configuration,
    pub running_directory: PathBuf,
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub input_files: Vec<String>,
    pub output_files: Vec<String>,
    pub force: bool,
}

impl RunContext {
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.input_files
            .iter()
            .map(|name| self.input_directory.join(name))
            .collect()
    }

    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.output_files
            .iter()
            .map(|name| self.output_directory.join(name))
            .collect()
    }
}
