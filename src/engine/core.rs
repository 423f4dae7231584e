// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! State shared by every processor and the lifecycle that wraps `run`.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::engine::configuration::Configuration;
use crate::engine::run_metadata::RunMetadata;
use crate::observability::messages::processor::{
    MetadataWriteFailed, ProcessorCompleted, ProcessorSkipped, ProcessorStarted,
};
use crate::observability::messages::StructuredLog;
use crate::space::{Dimension, VariantValue};
use crate::traits::{Processor, RunContext, RunRequest};
use crate::utils::{Observers, Origin, SubscriptionId};

/// Emitted before a run's prepare step.
#[derive(Debug, Clone)]
pub struct StartEvent {
    pub processor_id: String,
}

/// Emitted after every run attempt, including skipped and failed ones.
#[derive(Debug, Clone)]
pub struct DoneEvent {
    pub processor_id: String,
    pub success: bool,
}

/// A replicated setting changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorField {
    InputDirectory(PathBuf),
    OutputDirectory(PathBuf),
    RunningDirectory(PathBuf),
    Enabled(bool),
    ConfigurationValue(String, VariantValue),
}

#[derive(Debug, Clone)]
pub struct ProcessorChange {
    pub processor_id: String,
    pub field: ProcessorField,
    pub origin: Origin,
}

#[derive(Debug, Clone, Default)]
struct Settings {
    input_directory: PathBuf,
    output_directory: PathBuf,
    running_directory: PathBuf,
    input_files: Vec<String>,
    output_files: Vec<String>,
    configuration: Configuration,
}

/// Directories, files, configuration and observers of one processor.
pub struct ProcessorCore {
    id: String,
    settings: RwLock<Settings>,
    dependencies: RwLock<Vec<Arc<Dimension>>>,
    enabled: AtomicBool,
    ignore_fail: AtomicBool,
    running: AtomicUsize,
    started: Observers<StartEvent>,
    done: Observers<DoneEvent>,
    changes: Observers<ProcessorChange>,
}

impl ProcessorCore {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            settings: RwLock::new(Settings::default()),
            dependencies: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
            ignore_fail: AtomicBool::new(false),
            running: AtomicUsize::new(0),
            started: Observers::new(),
            done: Observers::new(),
            changes: Observers::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input_directory(&self) -> PathBuf {
        self.settings.read().input_directory.clone()
    }

    pub fn output_directory(&self) -> PathBuf {
        self.settings.read().output_directory.clone()
    }

    pub fn running_directory(&self) -> PathBuf {
        self.settings.read().running_directory.clone()
    }

    pub fn input_files(&self) -> Vec<String> {
        self.settings.read().input_files.clone()
    }

    pub fn output_files(&self) -> Vec<String> {
        self.settings.read().output_files.clone()
    }

    pub fn configuration(&self) -> Configuration {
        self.settings.read().configuration.clone()
    }

    pub fn set_input_directory(&self, directory: impl Into<PathBuf>) {
        self.set_input_directory_from(directory, Origin::Local)
    }

    pub fn set_input_directory_from(&self, directory: impl Into<PathBuf>, origin: Origin) {
        let directory = directory.into();
        self.settings.write().input_directory = directory.clone();
        self.emit(ProcessorField::InputDirectory(directory), origin);
    }

    pub fn set_output_directory(&self, directory: impl Into<PathBuf>) {
        self.set_output_directory_from(directory, Origin::Local)
    }

    pub fn set_output_directory_from(&self, directory: impl Into<PathBuf>, origin: Origin) {
        let directory = directory.into();
        self.settings.write().output_directory = directory.clone();
        self.emit(ProcessorField::OutputDirectory(directory), origin);
    }

    pub fn set_running_directory(&self, directory: impl Into<PathBuf>) {
        self.set_running_directory_from(directory, Origin::Local)
    }

    pub fn set_running_directory_from(&self, directory: impl Into<PathBuf>, origin: Origin) {
        let directory = directory.into();
        self.settings.write().running_directory = directory.clone();
        self.emit(ProcessorField::RunningDirectory(directory), origin);
    }

    pub fn set_input_files(&self, files: Vec<String>) {
        self.settings.write().input_files = files;
    }

    pub fn set_output_files(&self, files: Vec<String>) {
        self.settings.write().output_files = files;
    }

    pub fn set_configuration_value(&self, key: impl Into<String>, value: impl Into<VariantValue>) {
        self.set_configuration_value_from(key, value, Origin::Local)
    }

    pub fn set_configuration_value_from(
        &self,
        key: impl Into<String>,
        value: impl Into<VariantValue>,
        origin: Origin,
    ) {
        let key = key.into();
        let value = value.into();
        self.settings.write().configuration.set(key.clone(), value.clone());
        self.emit(ProcessorField::ConfigurationValue(key, value), origin);
    }

    /// Replace the whole default configuration.
    pub fn set_configuration(&self, configuration: Configuration) {
        self.settings.write().configuration = configuration;
    }

    /// Register a dimension whose current value influences results without
    /// triggering runs.
    pub fn register_dependency(&self, dimension: Arc<Dimension>) {
        let mut dependencies = self.dependencies.write();
        if !dependencies.iter().any(|d| Arc::ptr_eq(d, &dimension)) {
            dependencies.push(dimension);
        }
    }

    pub fn dependencies(&self) -> Vec<Arc<Dimension>> {
        self.dependencies.read().clone()
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.set_enabled_from(enabled, Origin::Local)
    }

    pub fn set_enabled_from(&self, enabled: bool, origin: Origin) {
        if self.enabled.swap(enabled, Ordering::SeqCst) != enabled {
            self.emit(ProcessorField::Enabled(enabled), origin);
        }
    }

    pub fn ignore_fail(&self) -> bool {
        self.ignore_fail.load(Ordering::SeqCst)
    }

    pub fn set_ignore_fail(&self, ignore: bool) {
        self.ignore_fail.store(ignore, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) > 0
    }

    pub fn subscribe_start<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StartEvent) + Send + Sync + 'static,
    {
        self.started.subscribe(callback)
    }

    pub fn subscribe_done<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DoneEvent) + Send + Sync + 'static,
    {
        self.done.subscribe(callback)
    }

    pub fn subscribe_changes<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ProcessorChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.started.unsubscribe(id) || self.done.unsubscribe(id) || self.changes.unsubscribe(id)
    }

    /// Resolve a request against this processor's settings.
    pub fn context_for(&self, request: RunRequest) -> RunContext {
        let settings = self.settings.read();
        RunContext {
            processor_id: self.id.clone(),
            configuration: request
                .configuration
                .unwrap_or_else(|| settings.configuration.clone()),
            running_directory: request
                .running_directory
                .unwrap_or_else(|| settings.running_directory.clone()),
            input_directory: request
                .input_directory
                .unwrap_or_else(|| settings.input_directory.clone()),
            output_directory: request
                .output_directory
                .unwrap_or_else(|| settings.output_directory.clone()),
            input_files: request
                .input_files
                .unwrap_or_else(|| settings.input_files.clone()),
            output_files: settings.output_files.clone(),
            force: request.force,
        }
    }

    fn emit(&self, field: ProcessorField, origin: Origin) {
        self.changes.notify(&ProcessorChange {
            processor_id: self.id.clone(),
            field,
            origin,
        });
    }
}

impl std::fmt::Debug for ProcessorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorCore")
            .field("id", &self.id)
            .field("enabled", &self.enabled())
            .field("ignore_fail", &self.ignore_fail())
            .field("running", &self.is_running())
            .finish()
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The processing lifecycle: start observers, prepare, enabled check,
/// staleness check, run, metadata, done observers.
pub fn execute<P: Processor + ?Sized>(processor: &P, request: RunRequest) -> bool {
    let core = processor.core();
    let _running = RunningGuard::enter(&core.running);
    let context = core.context_for(request);
    let id = core.id();

    core.started.notify(&StartEvent {
        processor_id: id.to_string(),
    });

    let success = run_stages(processor, &context);

    core.done.notify(&DoneEvent {
        processor_id: id.to_string(),
        success,
    });
    success
}

fn run_stages<P: Processor + ?Sized>(processor: &P, context: &RunContext) -> bool {
    let core = processor.core();
    let id = core.id();

    if !processor.prepare(context) {
        ProcessorSkipped {
            processor_id: id,
            reason: "prepare step failed",
        }
        .log();
        return false;
    }

    if !core.enabled() {
        ProcessorSkipped {
            processor_id: id,
            reason: "disabled",
        }
        .log();
        return true;
    }

    if !context.force && !processor.needs_rerun(context) {
        ProcessorSkipped {
            processor_id: id,
            reason: "outputs are up to date",
        }
        .log();
        return true;
    }

    let message = ProcessorStarted {
        processor_id: id,
        processor_type: processor.type_name(),
        output_directory: &context.output_directory,
    };
    let span = message.span("run");
    let _entered = span.enter();
    message.log();

    let started = Instant::now();
    let success = processor.run(context);
    ProcessorCompleted {
        processor_id: id,
        success,
        duration: started.elapsed(),
    }
    .log();

    if success {
        let metadata = RunMetadata::capture(context);
        for output in context.output_paths() {
            if let Err(error) = metadata.write_for(&output) {
                MetadataWriteFailed {
                    processor_id: id,
                    output: &output,
                    error: &error,
                }
                .log();
            }
        }
    }
    success
}
