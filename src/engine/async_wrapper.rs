// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runs a processor on a dedicated worker thread.
//!
//! [`AsyncWrapper::process_with`] hands the request to the worker and returns
//! as soon as the worker has picked it up; [`AsyncWrapper::wait_until_done`]
//! collects the result. A graph can therefore start all of its children
//! before joining any of them.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::traits::{Processor, RunRequest};

pub struct AsyncWrapper {
    processor: Arc<dyn Processor>,
    jobs: Option<Sender<RunRequest>>,
    started: Receiver<()>,
    results: Receiver<bool>,
    /// Results not yet collected, and the last collected one.
    outstanding: Mutex<(usize, bool)>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncWrapper {
    pub fn new(processor: Arc<dyn Processor>) -> std::io::Result<Self> {
        let (jobs_tx, jobs_rx) = unbounded::<RunRequest>();
        let (started_tx, started_rx) = bounded::<()>(1);
        let (results_tx, results_rx) = unbounded::<bool>();

        let worker_processor = processor.clone();
        let worker = std::thread::Builder::new()
            .name(format!("async-{}", processor.id()))
            .spawn(move || {
                for request in jobs_rx {
                    if started_tx.send(()).is_err() {
                        break;
                    }
                    let success = worker_processor.process_with(request);
                    if results_tx.send(success).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            processor,
            jobs: Some(jobs_tx),
            started: started_rx,
            results: results_rx,
            outstanding: Mutex::new((0, true)),
            worker: Some(worker),
        })
    }

    pub fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    pub fn process(&self, force_recompute: bool) -> bool {
        self.process_with(RunRequest::new().forced(force_recompute))
    }

    /// Queue a run and block until the worker has started it. Returns false
    /// if the worker is gone.
    pub fn process_with(&self, request: RunRequest) -> bool {
        let Some(jobs) = self.jobs.as_ref() else {
            return false;
        };
        if jobs.send(request).is_err() {
            return false;
        }
        if self.started.recv().is_err() {
            return false;
        }
        self.outstanding.lock().0 += 1;
        true
    }

    /// Block until every started run has finished. Returns the AND of their
    /// results, or the last result when nothing is outstanding.
    pub fn wait_until_done(&self) -> bool {
        let mut outstanding = self.outstanding.lock();
        if outstanding.0 == 0 {
            return outstanding.1;
        }
        let mut success = true;
        while outstanding.0 > 0 {
            match self.results.recv() {
                Ok(result) => success &= result,
                Err(_) => success = false,
            }
            outstanding.0 -= 1;
        }
        outstanding.1 = success;
        success
    }

    pub fn is_running(&self) -> bool {
        self.processor.is_running()
    }
}

impl Drop for AsyncWrapper {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::StubProcessor;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn process_returns_before_the_run_finishes() {
        let gate = Arc::new(Barrier::new(2));
        let stub = Arc::new(StubProcessor::gated("slow", gate.clone()));
        let wrapper = AsyncWrapper::new(stub.clone()).unwrap();

        assert!(wrapper.process(false));
        // The run is blocked on the gate, so it cannot have completed yet.
        assert_eq!(stub.completed(), 0);
        gate.wait();

        assert!(wrapper.wait_until_done());
        assert_eq!(stub.completed(), 1);
    }

    #[test]
    fn failure_is_reported_by_wait() {
        let stub = Arc::new(StubProcessor::failing("bad"));
        let wrapper = AsyncWrapper::new(stub).unwrap();
        assert!(wrapper.process(false));
        assert!(!wrapper.wait_until_done());
    }

    #[test]
    fn wait_without_work_returns_immediately() {
        let stub = Arc::new(StubProcessor::new("idle"));
        let wrapper = AsyncWrapper::new(stub).unwrap();
        let started = std::time::Instant::now();
        assert!(wrapper.wait_until_done());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
