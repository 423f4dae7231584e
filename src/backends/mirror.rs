// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::ProcessorCore;
use crate::observability::messages::processor::ProcessorFailed;
use crate::observability::messages::StructuredLog;
use crate::traits::{Processor, RunContext};

/// Local stand-in for a processor registered by a remote node.
///
/// Settings (directories, configuration values, enabled flag) are kept in
/// sync over the protocol. The work itself happens on the remote node, so a
/// local run always fails.
pub struct MirrorProcessor {
    core: ProcessorCore,
    remote_type: String,
}

impl MirrorProcessor {
    pub fn new(id: &str, remote_type: impl Into<String>) -> Self {
        Self {
            core: ProcessorCore::new(id),
            remote_type: remote_type.into(),
        }
    }
}

impl Processor for MirrorProcessor {
    fn core(&self) -> &ProcessorCore {
        &self.core
    }

    fn type_name(&self) -> &str {
        &self.remote_type
    }

    fn run(&self, _context: &RunContext) -> bool {
        ProcessorFailed {
            processor_id: self.core.id(),
            reason: "processor is owned by a remote node",
        }
        .log();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_report_the_remote_type_and_never_run_locally() {
        let mirror = MirrorProcessor::new("remote", "command");
        assert_eq!(mirror.type_name(), "command");
        assert!(!mirror.process(true));
    }
}
