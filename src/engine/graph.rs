// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Composite processors.
//!
//! A [`ProcessorGraph`] runs an ordered list of children either one after the
//! other on the calling thread ([`GraphMode::Serial`]) or all at once on
//! per-child worker threads ([`GraphMode::Async`]). Graphs are processors
//! themselves, so fan-out/fan-in shapes are built by nesting:
//!
//! ```text
//! Serial[ prepare, Async[ branch_a, branch_b ], merge ]
//! ```

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::engine::async_wrapper::AsyncWrapper;
use crate::engine::core::ProcessorCore;
use crate::observability::messages::processor::{GraphChildFailed, GraphHalted, ProcessorFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::{Processor, RunContext, RunRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphMode {
    #[default]
    Serial,
    Async,
}

struct GraphChild {
    processor: Arc<dyn Processor>,
    /// Feed the previous child's outputs in as this child's inputs.
    connect: bool,
    wrapper: OnceLock<Option<AsyncWrapper>>,
}

impl GraphChild {
    fn wrapper(&self) -> Option<&AsyncWrapper> {
        self.wrapper
            .get_or_init(|| match AsyncWrapper::new(self.processor.clone()) {
                Ok(wrapper) => Some(wrapper),
                Err(error) => {
                    ProcessorFailed {
                        processor_id: self.processor.id(),
                        reason: &format!("could not start worker thread: {}", error),
                    }
                    .log();
                    None
                }
            })
            .as_ref()
    }
}

pub struct ProcessorGraph {
    core: ProcessorCore,
    mode: GraphMode,
    children: RwLock<Vec<Arc<GraphChild>>>,
}

impl ProcessorGraph {
    pub fn new(id: impl Into<String>, mode: GraphMode) -> Self {
        Self {
            core: ProcessorCore::new(id),
            mode,
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn serial(id: impl Into<String>) -> Self {
        Self::new(id, GraphMode::Serial)
    }

    pub fn parallel(id: impl Into<String>) -> Self {
        Self::new(id, GraphMode::Async)
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    /// Append a child. With `connect` set, the child reads the previous
    /// child's output directory and files.
    pub fn add(&self, processor: Arc<dyn Processor>, connect: bool) {
        self.children.write().push(Arc::new(GraphChild {
            processor,
            connect,
            wrapper: OnceLock::new(),
        }));
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut children = self.children.write();
        let before = children.len();
        children.retain(|child| child.processor.id() != id);
        children.len() != before
    }

    pub fn children(&self) -> Vec<Arc<dyn Processor>> {
        self.children
            .read()
            .iter()
            .map(|child| child.processor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.children.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<GraphChild>> {
        self.children.read().clone()
    }

    /// A child without an output directory of its own writes into the
    /// graph run's output directory.
    fn output_directory_of(processor: &Arc<dyn Processor>, context: &RunContext) -> PathBuf {
        let own = processor.core().output_directory();
        if own.as_os_str().is_empty() {
            context.output_directory.clone()
        } else {
            own
        }
    }

    fn request_for(
        child: &GraphChild,
        context: &RunContext,
        previous: Option<&Arc<dyn Processor>>,
    ) -> RunRequest {
        let mut request = RunRequest::new()
            .with_configuration(context.configuration.clone())
            .with_running_directory(context.running_directory.clone())
            .with_output_directory(Self::output_directory_of(&child.processor, context))
            .forced(context.force);
        if let (true, Some(previous)) = (child.connect, previous) {
            request = request
                .with_input_directory(Self::output_directory_of(previous, context))
                .with_input_files(previous.core().output_files());
        }
        request
    }

    fn run_serial(&self, context: &RunContext) -> bool {
        let children = self.snapshot();
        let mut success = true;
        let mut previous: Option<&Arc<dyn Processor>> = None;

        for (position, child) in children.iter().enumerate() {
            let request = Self::request_for(child, context, previous);
            let result = child.processor.process_with(request);
            if !result {
                let ignored = child.processor.core().ignore_fail();
                GraphChildFailed {
                    graph_id: self.core.id(),
                    child_id: child.processor.id(),
                    ignored,
                }
                .log();
                if !ignored {
                    GraphHalted {
                        graph_id: self.core.id(),
                        failed_child: child.processor.id(),
                        skipped: children.len() - position - 1,
                    }
                    .log();
                    return false;
                }
            }
            success &= result || child.processor.core().ignore_fail();
            previous = Some(&child.processor);
        }
        success
    }

    fn run_async(&self, context: &RunContext) -> bool {
        let children = self.snapshot();
        let mut started = Vec::with_capacity(children.len());
        let mut success = true;
        let mut previous: Option<&Arc<dyn Processor>> = None;

        for child in &children {
            let request = Self::request_for(child, context, previous);
            previous = Some(&child.processor);
            match child.wrapper() {
                Some(wrapper) if wrapper.process_with(request) => started.push(child),
                _ => {
                    let ignored = child.processor.core().ignore_fail();
                    GraphChildFailed {
                        graph_id: self.core.id(),
                        child_id: child.processor.id(),
                        ignored,
                    }
                    .log();
                    success &= ignored;
                }
            }
        }

        for child in started {
            let Some(wrapper) = child.wrapper() else {
                continue;
            };
            if !wrapper.wait_until_done() {
                let ignored = child.processor.core().ignore_fail();
                GraphChildFailed {
                    graph_id: self.core.id(),
                    child_id: child.processor.id(),
                    ignored,
                }
                .log();
                success &= ignored;
            }
        }
        success
    }
}

impl Processor for ProcessorGraph {
    fn core(&self) -> &ProcessorCore {
        &self.core
    }

    fn type_name(&self) -> &str {
        match self.mode {
            GraphMode::Serial => "serial_graph",
            GraphMode::Async => "async_graph",
        }
    }

    /// Children decide for themselves whether they are stale.
    fn needs_rerun(&self, _context: &RunContext) -> bool {
        true
    }

    fn command_line(&self, configuration: &crate::engine::Configuration) -> String {
        self.snapshot()
            .iter()
            .map(|child| child.processor.command_line(configuration))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" && ")
    }

    fn run(&self, context: &RunContext) -> bool {
        match self.mode {
            GraphMode::Serial => self.run_serial(context),
            GraphMode::Async => self.run_async(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{Journal, StubProcessor};
    use parking_lot::Mutex;

    #[test]
    fn serial_failure_halts_the_chain() {
        let a = Arc::new(StubProcessor::failing("a"));
        let b = Arc::new(StubProcessor::new("b"));
        let graph = ProcessorGraph::serial("g");
        graph.add(a.clone(), false);
        graph.add(b.clone(), false);

        assert!(!graph.process(false));
        assert_eq!(a.runs(), 1);
        assert_eq!(b.runs(), 0);
    }

    #[test]
    fn serial_ignored_failure_continues() {
        let a = Arc::new(StubProcessor::failing("a"));
        a.core().set_ignore_fail(true);
        let b = Arc::new(StubProcessor::new("b"));
        let graph = ProcessorGraph::serial("g");
        graph.add(a.clone(), false);
        graph.add(b.clone(), false);

        assert!(graph.process(false));
        assert_eq!(b.runs(), 1);
    }

    #[test]
    fn async_runs_every_child_despite_failure() {
        let a = Arc::new(StubProcessor::failing("a"));
        let b = Arc::new(StubProcessor::new("b"));
        let graph = ProcessorGraph::parallel("g");
        graph.add(a.clone(), false);
        graph.add(b.clone(), false);

        assert!(!graph.process(false));
        assert_eq!(a.runs(), 1);
        assert_eq!(b.runs(), 1);
    }

    #[test]
    fn serial_children_run_in_order() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let graph = ProcessorGraph::serial("g");
        for id in ["first", "second", "third"] {
            graph.add(Arc::new(StubProcessor::new(id).with_journal(journal.clone())), false);
        }

        assert!(graph.process(false));
        assert_eq!(*journal.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn connected_child_reads_previous_outputs() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = Arc::new(StubProcessor::new("a").with_outputs(&["a.out"]));
        a.core().set_output_directory(dir.path());
        let b = Arc::new(StubProcessor::new("b"));
        let graph = ProcessorGraph::serial("g");
        graph.add(a.clone(), false);
        graph.add(b.clone(), true);

        assert!(graph.process(true));

        let context = &b.contexts()[0];
        assert_eq!(context.input_directory, dir.path().to_path_buf());
        assert_eq!(context.input_files, vec!["a.out".to_string()]);
    }

    #[test]
    fn children_without_an_output_directory_inherit_the_run_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let elsewhere = tempfile::TempDir::new().unwrap();
        let inherits = Arc::new(StubProcessor::new("inherits"));
        let own = Arc::new(StubProcessor::new("own"));
        own.core().set_output_directory(elsewhere.path());
        let graph = ProcessorGraph::serial("g");
        graph.add(inherits.clone(), false);
        graph.add(own.clone(), false);

        assert!(graph.process_with(RunRequest::new().with_output_directory(dir.path())));
        assert_eq!(inherits.contexts()[0].output_directory, dir.path().to_path_buf());
        assert_eq!(own.contexts()[0].output_directory, elsewhere.path().to_path_buf());
    }

    #[test]
    fn configuration_is_propagated_to_children() {
        let child = Arc::new(StubProcessor::new("child"));
        let graph = ProcessorGraph::serial("g");
        graph.add(child.clone(), false);
        graph.core().set_configuration_value("dim1", 0.3);

        assert!(graph.process(false));
        assert_eq!(child.contexts()[0].configuration.get_as::<f64>("dim1"), Some(0.3));
    }

    #[test]
    fn fan_out_fan_in_through_nesting() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let branches = Arc::new(ProcessorGraph::parallel("branches"));
        branches.add(Arc::new(StubProcessor::new("left").with_journal(journal.clone())), false);
        branches.add(Arc::new(StubProcessor::new("right").with_journal(journal.clone())), false);

        let outer = ProcessorGraph::serial("outer");
        outer.add(Arc::new(StubProcessor::new("source").with_journal(journal.clone())), false);
        outer.add(branches, false);
        outer.add(Arc::new(StubProcessor::new("merge").with_journal(journal.clone())), false);

        assert!(outer.process(false));
        let order = journal.lock().clone();
        assert_eq!(order.len(), 4);
        assert_eq!(order.first().map(String::as_str), Some("source"));
        assert_eq!(order.last().map(String::as_str), Some("merge"));
    }
}
