// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::engine::{Configuration, ProcessorCore};
use crate::traits::{Processor, RunContext};

type ComputeFn = Box<dyn Fn(&RunContext) -> bool + Send + Sync>;
type CommandLineFn = Box<dyn Fn(&Configuration) -> String + Send + Sync>;

/// In-process processor backed by a closure.
///
/// ```
/// use the_lattice::backends::ComputeProcessor;
/// use the_lattice::traits::Processor;
///
/// let square = ComputeProcessor::new("square", |ctx| {
///     ctx.configuration.get_as::<f64>("x").is_some()
/// });
/// square.core().set_configuration_value("x", 3.0);
/// assert!(square.process(true));
/// ```
pub struct ComputeProcessor {
    core: ProcessorCore,
    compute: ComputeFn,
    command_line: Option<CommandLineFn>,
}

impl ComputeProcessor {
    pub fn new<F>(id: &str, compute: F) -> Self
    where
        F: Fn(&RunContext) -> bool + Send + Sync + 'static,
    {
        Self {
            core: ProcessorCore::new(id),
            compute: Box::new(compute),
            command_line: None,
        }
    }

    /// Describe the computation for cache fingerprints. Two closures that
    /// compute different things under the same id should describe
    /// themselves differently.
    pub fn with_command_line<F>(mut self, describe: F) -> Self
    where
        F: Fn(&Configuration) -> String + Send + Sync + 'static,
    {
        self.command_line = Some(Box::new(describe));
        self
    }
}

impl fmt::Debug for ComputeProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeProcessor")
            .field("id", &self.core.id())
            .finish()
    }
}

impl Processor for ComputeProcessor {
    fn core(&self) -> &ProcessorCore {
        &self.core
    }

    fn type_name(&self) -> &str {
        "compute"
    }

    fn command_line(&self, configuration: &Configuration) -> String {
        self.command_line
            .as_ref()
            .map(|describe| describe(configuration))
            .unwrap_or_default()
    }

    fn run(&self, context: &RunContext) -> bool {
        (self.compute)(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn closure_sees_the_run_configuration() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = seen.clone();
        let processor = ComputeProcessor::new("c", move |ctx| {
            sink.store(ctx.configuration.get_as::<usize>("n").unwrap_or(0), Ordering::SeqCst);
            true
        });
        processor.core().set_configuration_value("n", 7u64);

        assert!(processor.process(true));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn command_line_defaults_to_empty() {
        let plain = ComputeProcessor::new("c", |_| true);
        assert_eq!(plain.command_line(&Configuration::new()), "");

        let described = ComputeProcessor::new("c", |_| true).with_command_line(|cfg| format!("v1 {}", cfg.len()));
        assert_eq!(described.command_line(&Configuration::new().with("a", 1i32)), "v1 1");
    }
}
