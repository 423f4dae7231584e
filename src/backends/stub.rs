// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test processors that record what they were asked to do.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use crate::engine::ProcessorCore;
use crate::traits::{Processor, RunContext};

/// Shared record of processor ids in the order their runs started.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct StubProcessor {
    core: ProcessorCore,
    fail: bool,
    gate: Option<Arc<Barrier>>,
    delay: Option<Duration>,
    journal: Option<Journal>,
    runs: AtomicUsize,
    completed: AtomicUsize,
    contexts: Mutex<Vec<RunContext>>,
}

impl StubProcessor {
    pub fn new(id: &str) -> Self {
        Self {
            core: ProcessorCore::new(id),
            fail: false,
            gate: None,
            delay: None,
            journal: None,
            runs: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Every run fails.
    pub fn failing(id: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(id)
        }
    }

    /// Every run waits on `gate` before finishing.
    pub fn gated(id: &str, gate: Arc<Barrier>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(id)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Declare output files; each run writes the run configuration into them.
    pub fn with_outputs(self, files: &[&str]) -> Self {
        self.core
            .set_output_files(files.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<RunContext> {
        self.contexts.lock().clone()
    }
}

impl Processor for StubProcessor {
    fn core(&self) -> &ProcessorCore {
        &self.core
    }

    fn type_name(&self) -> &str {
        "stub"
    }

    fn run(&self, context: &RunContext) -> bool {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.lock().push(self.core.id().to_string());
        }
        self.contexts.lock().push(context.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(gate) = &self.gate {
            gate.wait();
        }

        let mut success = !self.fail;
        if success {
            let contents = context.configuration.to_plain_json().to_string();
            for output in context.output_paths() {
                if let Some(parent) = output.parent() {
                    success &= std::fs::create_dir_all(parent).is_ok();
                }
                success &= std::fs::write(&output, &contents).is_ok();
            }
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        success
    }
}
