// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cartesian-product sweeps over a parameter space.
//!
//! Points are visited in odometer order: the first swept dimension advances
//! fastest (by its stride) and carries into the next one when it wraps. When
//! no dimensions are named, every registered dimension is swept in
//! registration order.
//!
//! ```text
//! dim1 = [a, b], dim2 = [x, y]   =>   (a,x) (b,x) (a,y) (b,y)
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::cache::SourceInfo;
use crate::engine::Configuration;
use crate::observability::messages::cache::{CacheHit, CacheMiss, CacheUnavailable};
use crate::observability::messages::processor::ProcessorFailed;
use crate::observability::messages::space::{SweepCompleted, SweepRejected, SweepStarted};
use crate::observability::messages::StructuredLog;
use crate::space::dimension::Dimension;
use crate::space::parameter_space::ParameterSpace;
use crate::traits::{Processor, RunRequest};
use crate::utils::Observers;

/// Reported after every sweep point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    pub processed: usize,
    pub total: usize,
}

impl SweepProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Index tuples of a strided Cartesian product, first position fastest.
#[derive(Debug, Clone)]
pub struct Odometer {
    sizes: Vec<usize>,
    strides: Vec<usize>,
    indices: Vec<usize>,
    exhausted: bool,
}

impl Odometer {
    pub fn new(sizes: Vec<usize>, strides: Vec<usize>) -> Self {
        let exhausted = sizes.iter().any(|size| *size == 0);
        let indices = vec![0; sizes.len()];
        Self {
            strides: strides.into_iter().map(|s| s.max(1)).collect(),
            sizes,
            indices,
            exhausted,
        }
    }

    /// Number of tuples the odometer yields.
    pub fn total(&self) -> usize {
        self.sizes
            .iter()
            .zip(&self.strides)
            .map(|(size, stride)| size.div_ceil(*stride))
            .product()
    }

    fn advance(&mut self) {
        for position in 0..self.indices.len() {
            self.indices[position] += self.strides[position];
            if self.indices[position] < self.sizes[position] {
                return;
            }
            self.indices[position] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for Odometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let current = self.indices.clone();
        self.advance();
        Some(current)
    }
}

struct ActiveSweep {
    workers: Vec<JoinHandle<bool>>,
    processed: Arc<AtomicUsize>,
    total: usize,
    started: Instant,
}

/// Stop flag and worker threads of the space's current sweep.
#[derive(Default)]
pub struct SweepControl {
    stop: Arc<AtomicBool>,
    active: Mutex<Option<ActiveSweep>>,
}

struct Partition<'a> {
    worker: usize,
    workers: usize,
    total: usize,
    processed: &'a AtomicUsize,
    progress: &'a Observers<SweepProgress>,
    stop: &'a AtomicBool,
}

impl ParameterSpace {
    /// Run `processor` at every point of the named dimensions on the calling
    /// thread. Current indices are restored afterwards.
    pub fn sweep(
        &self,
        processor: &Arc<dyn Processor>,
        dimensions: &[&str],
        dependencies: &[Arc<Dimension>],
        recompute: bool,
    ) -> bool {
        if self.is_sweeping() {
            SweepRejected {
                space_id: self.id(),
                reason: "an asynchronous sweep is still running",
            }
            .log();
            return false;
        }
        let swept = match self.sweep_dimensions(dimensions) {
            Ok(swept) => swept,
            Err(reason) => {
                SweepRejected {
                    space_id: self.id(),
                    reason: &reason,
                }
                .log();
                return false;
            }
        };
        self.control.stop.store(false, Ordering::SeqCst);

        let total = odometer_for(&swept).total();
        let names: Vec<String> = swept.iter().map(|d| d.key().to_string()).collect();
        let started = SweepStarted {
            space_id: self.id(),
            processor_id: processor.id(),
            dimensions: &names,
            total,
            threads: 1,
        };
        let span = started.span("sweep");
        let _entered = span.enter();
        started.log();

        let saved: Vec<usize> = swept.iter().map(|d| d.current_index()).collect();
        let processed = AtomicUsize::new(0);
        let timer = Instant::now();
        let success = self.sweep_partition(
            processor,
            &swept,
            dependencies,
            recompute,
            Partition {
                worker: 0,
                workers: 1,
                total,
                processed: &processed,
                progress: &self.progress,
                stop: &self.control.stop,
            },
        );
        for (dimension, index) in swept.iter().zip(saved) {
            dimension.set_current_index(index);
        }

        SweepCompleted {
            space_id: self.id(),
            processed: processed.load(Ordering::SeqCst),
            total,
            success,
            stopped: self.control.stop.load(Ordering::SeqCst),
            duration: timer.elapsed(),
        }
        .log();
        success
    }

    /// Start a sweep on `threads` worker threads, each working on its own
    /// deep copy of the space. Worker `w` handles the points whose linear
    /// index `i` satisfies `i % threads == w`. Returns once the workers are
    /// started; use [`wait_for_sweep`](Self::wait_for_sweep) to join them.
    pub fn sweep_async(
        &self,
        processor: &Arc<dyn Processor>,
        dimensions: &[&str],
        dependencies: &[Arc<Dimension>],
        recompute: bool,
        threads: usize,
    ) -> bool {
        let mut active = self.control.active.lock();
        if active.is_some() {
            SweepRejected {
                space_id: self.id(),
                reason: "a sweep is already running",
            }
            .log();
            return false;
        }
        let swept = match self.sweep_dimensions(dimensions) {
            Ok(swept) => swept,
            Err(reason) => {
                SweepRejected {
                    space_id: self.id(),
                    reason: &reason,
                }
                .log();
                return false;
            }
        };
        self.control.stop.store(false, Ordering::SeqCst);

        let workers = threads.max(1);
        let total = odometer_for(&swept).total();
        let names: Vec<String> = swept.iter().map(|d| d.key().to_string()).collect();
        SweepStarted {
            space_id: self.id(),
            processor_id: processor.id(),
            dimensions: &names,
            total,
            threads: workers,
        }
        .log();

        let processed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let copy = self.deep_copy();
            let swept: Vec<Arc<Dimension>> = swept
                .iter()
                .filter_map(|d| copy.get_dimension(d.name(), d.group()))
                .collect();
            let dependencies: Vec<Arc<Dimension>> = dependencies
                .iter()
                .map(|d| copy.get_dimension(d.name(), d.group()).unwrap_or_else(|| d.clone()))
                .collect();
            let processor = processor.clone();
            let processed = processed.clone();
            let progress = self.progress.clone();
            let stop = self.control.stop.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("sweep-{}-{}", self.id(), worker))
                .spawn(move || {
                    copy.sweep_partition(
                        &processor,
                        &swept,
                        &dependencies,
                        recompute,
                        Partition {
                            worker,
                            workers,
                            total,
                            processed: &processed,
                            progress: &progress,
                            stop: &stop,
                        },
                    )
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    SweepRejected {
                        space_id: self.id(),
                        reason: &format!("could not start worker {}: {}", worker, error),
                    }
                    .log();
                    self.control.stop.store(true, Ordering::SeqCst);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return false;
                }
            }
        }

        *active = Some(ActiveSweep {
            workers: handles,
            processed,
            total,
            started: Instant::now(),
        });
        true
    }

    /// Join the workers of an asynchronous sweep. Returns the AND of their
    /// results, or true when no sweep is running.
    pub fn wait_for_sweep(&self) -> bool {
        let Some(active) = self.control.active.lock().take() else {
            return true;
        };
        let mut success = true;
        for worker in active.workers {
            success &= worker.join().unwrap_or(false);
        }
        SweepCompleted {
            space_id: self.id(),
            processed: active.processed.load(Ordering::SeqCst),
            total: active.total,
            success,
            stopped: self.control.stop.load(Ordering::SeqCst),
            duration: active.started.elapsed(),
        }
        .log();
        success
    }

    /// Ask the running sweep to stop after its current point and join it.
    /// Work already started is not interrupted.
    pub fn stop_sweep(&self) -> bool {
        self.control.stop.store(true, Ordering::SeqCst);
        self.wait_for_sweep()
    }

    pub fn is_sweeping(&self) -> bool {
        self.control.active.lock().is_some()
    }

    /// Run `processor` once with `configuration`, consulting the cache
    /// manager when one is attached. On a cache hit the cached outputs are
    /// copied into the run directory and the processor is not run.
    pub fn run_process(
        &self,
        processor: &Arc<dyn Processor>,
        configuration: &Configuration,
        dependencies: &[Arc<Dimension>],
        recompute: bool,
    ) -> bool {
        let mut request = RunRequest::new()
            .with_configuration(configuration.clone())
            .forced(recompute);
        if self.has_run_paths() {
            match self.current_run_directory() {
                Some(directory) => request = request.with_output_directory(directory),
                None => {
                    ProcessorFailed {
                        processor_id: processor.id(),
                        reason: "run path template did not resolve",
                    }
                    .log();
                    return false;
                }
            }
        }

        let cache = match self.cache_manager() {
            Some(cache) if processor.core().enabled() => cache,
            _ => return processor.process_with(request),
        };

        let context = processor.core().context_for(request.clone());
        let mut all_dependencies = dependencies.to_vec();
        all_dependencies.extend(processor.core().dependencies());
        let source = SourceInfo::new(processor.type_name(), processor.id())
            .with_arguments(configuration)
            .with_dependencies(&all_dependencies)
            .with_command_line(processor.command_line(configuration))
            .with_working_path(&context.running_directory)
            .with_input_files(&context.input_paths());
        let fingerprint = source.fingerprint();

        if !recompute {
            if let Some(hit) = cache.find_cache(&source, Some(&context.output_directory)) {
                match hit.restore_into(&context.output_directory) {
                    Ok(restored) => {
                        CacheHit {
                            processor_id: processor.id(),
                            fingerprint,
                            files: restored.len(),
                        }
                        .log();
                        return true;
                    }
                    Err(error) => CacheUnavailable {
                        operation: "restore",
                        error: &error,
                    }
                    .log(),
                }
            } else {
                CacheMiss {
                    processor_id: processor.id(),
                    fingerprint,
                }
                .log();
            }
        }

        // The cache decided this point must be computed; the per-run
        // metadata check is not consulted again.
        let started = Utc::now();
        let success = processor.process_with(request.forced(true));
        if success {
            if let Err(error) = cache.store(&source, &context.output_paths(), started, Utc::now()) {
                CacheUnavailable {
                    operation: "store",
                    error: &error,
                }
                .log();
            }
        }
        success
    }

    fn sweep_dimensions(&self, names: &[&str]) -> Result<Vec<Arc<Dimension>>, String> {
        if names.is_empty() {
            return Ok(self.dimensions());
        }
        names
            .iter()
            .map(|name| {
                self.find_dimension(name)
                    .ok_or_else(|| format!("unknown dimension '{}'", name))
            })
            .collect()
    }

    fn point_configuration(&self, processor: &Arc<dyn Processor>, dependencies: &[Arc<Dimension>]) -> Configuration {
        let mut configuration = processor.core().configuration();
        configuration.merge(&self.configuration());
        for dependency in dependencies {
            if let Some(value) = dependency.current_representation() {
                configuration.set(dependency.name(), value);
            }
        }
        configuration
    }

    fn sweep_partition(
        &self,
        processor: &Arc<dyn Processor>,
        swept: &[Arc<Dimension>],
        dependencies: &[Arc<Dimension>],
        recompute: bool,
        partition: Partition<'_>,
    ) -> bool {
        let mut success = true;
        for (linear, coordinate) in odometer_for(swept).enumerate() {
            if linear % partition.workers != partition.worker {
                continue;
            }
            if partition.stop.load(Ordering::SeqCst) {
                break;
            }
            for (dimension, index) in swept.iter().zip(&coordinate) {
                dimension.set_current_index(*index);
            }
            let configuration = self.point_configuration(processor, dependencies);
            success &= self.run_process(processor, &configuration, dependencies, recompute);

            let processed = partition.processed.fetch_add(1, Ordering::SeqCst) + 1;
            partition.progress.notify(&SweepProgress {
                processed,
                total: partition.total,
            });
        }
        success
    }
}

fn odometer_for(dimensions: &[Arc<Dimension>]) -> Odometer {
    Odometer::new(
        dimensions.iter().map(|d| d.size()).collect(),
        dimensions.iter().map(|d| d.stride()).collect(),
    )
}
