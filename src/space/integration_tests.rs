// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::stub::StubProcessor;
use crate::cache::CacheManager;
use crate::space::{ParameterSpace, Representation, SweepProgress, ValueType, VariantValue};
use crate::traits::Processor;

fn grid(space: &ParameterSpace, sizes: &[(&str, usize)]) {
    for (name, size) in sizes {
        let dim = space.new_dimension(name, "", ValueType::Double);
        dim.set_values((0..*size).map(|i| VariantValue::Double(i as f64 / 10.0)).collect())
            .unwrap();
    }
}

fn point(stub: &StubProcessor, run: usize) -> (String, String) {
    let config = &stub.contexts()[run].configuration;
    (
        config.get("dim1").unwrap().to_string(),
        config.get("dim2").unwrap().to_string(),
    )
}

#[test]
fn sweep_visits_every_point_and_reports_progress() {
    let space = ParameterSpace::new("grid");
    grid(&space, &[("dim1", 5), ("dim2", 4)]);
    space.find_dimension("dim1").unwrap().set_current_index(3);

    let reports: Arc<Mutex<Vec<SweepProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    space.subscribe_progress(move |progress| sink.lock().push(*progress));

    let stub = Arc::new(StubProcessor::new("p"));
    let processor: Arc<dyn Processor> = stub.clone();
    assert!(space.sweep(&processor, &["dim1", "dim2"], &[], false));

    assert_eq!(stub.runs(), 20);
    let distinct: HashSet<(String, String)> = (0..20).map(|run| point(&stub, run)).collect();
    assert_eq!(distinct.len(), 20);

    let reports = reports.lock();
    assert_eq!(reports.len(), 20);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.processed, i + 1);
        assert_eq!(report.total, 20);
    }

    assert_eq!(space.find_dimension("dim1").unwrap().current_index(), 3);
    assert_eq!(space.find_dimension("dim2").unwrap().current_index(), 0);
}

#[test]
fn first_swept_dimension_moves_fastest() {
    let space = ParameterSpace::new("order");
    grid(&space, &[("dim1", 2), ("dim2", 2)]);
    let stub = Arc::new(StubProcessor::new("p"));
    let processor: Arc<dyn Processor> = stub.clone();

    assert!(space.sweep(&processor, &[], &[], false));

    let visited: Vec<(String, String)> = (0..4).map(|run| point(&stub, run)).collect();
    assert_eq!(visited[0], ("0".to_string(), "0".to_string()));
    assert_eq!(visited[1], ("0.1".to_string(), "0".to_string()));
    assert_eq!(visited[2], ("0".to_string(), "0.1".to_string()));
}

#[test]
fn sweeping_an_unknown_dimension_is_rejected() {
    let space = ParameterSpace::new("s");
    grid(&space, &[("dim1", 2)]);
    let stub = Arc::new(StubProcessor::new("p"));
    let processor: Arc<dyn Processor> = stub.clone();

    assert!(!space.sweep(&processor, &["nope"], &[], false));
    assert_eq!(stub.runs(), 0);
}

#[test]
fn failed_points_fail_the_sweep_without_stopping_it() {
    let space = ParameterSpace::new("s");
    grid(&space, &[("dim1", 3)]);
    let stub = Arc::new(StubProcessor::failing("p"));
    let processor: Arc<dyn Processor> = stub.clone();

    assert!(!space.sweep(&processor, &[], &[], false));
    assert_eq!(stub.runs(), 3);
}

#[test]
fn async_sweep_partitions_points_across_workers() {
    let space = ParameterSpace::new("async");
    grid(&space, &[("dim1", 5), ("dim2", 4)]);
    let stub = Arc::new(StubProcessor::new("p"));
    let processor: Arc<dyn Processor> = stub.clone();

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    space.subscribe_progress(move |progress: &SweepProgress| sink.lock().push(progress.processed));

    assert!(space.sweep_async(&processor, &[], &[], false, 3));
    assert!(space.wait_for_sweep());
    assert!(!space.is_sweeping());

    assert_eq!(stub.runs(), 20);
    let distinct: HashSet<(String, String)> = (0..20).map(|run| point(&stub, run)).collect();
    assert_eq!(distinct.len(), 20);

    let mut processed = reports.lock().clone();
    processed.sort_unstable();
    assert_eq!(processed, (1..=20).collect::<Vec<_>>());
    assert_eq!(space.find_dimension("dim1").unwrap().current_index(), 0);
}

#[test]
fn stop_sweep_halts_remaining_points() {
    let space = ParameterSpace::new("stop");
    grid(&space, &[("dim1", 50)]);
    let stub = Arc::new(StubProcessor::new("p").with_delay(Duration::from_millis(20)));
    let processor: Arc<dyn Processor> = stub.clone();

    assert!(space.sweep_async(&processor, &[], &[], false, 1));
    std::thread::sleep(Duration::from_millis(50));
    space.stop_sweep();

    assert!(stub.runs() < 50);
    assert_eq!(stub.runs(), stub.completed());
}

#[test]
fn persisted_space_reloads_identically() {
    let space = ParameterSpace::new("s");
    let dim1 = space.new_dimension("dim1", "", ValueType::Double);
    dim1.set_values((1..=5).map(|i| VariantValue::Double(i as f64 / 10.0)).collect())
        .unwrap();
    dim1.set_ids(["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect())
        .unwrap();
    dim1.set_representation(Representation::Id);
    dim1.set_current_index(2);
    let count = space.new_dimension("count", "solver", ValueType::Int32);
    count.set_values(vec![VariantValue::Int32(10), VariantValue::Int32(20)]).unwrap();
    count.set_representation(Representation::Index);
    count.set_stride(2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("space.json");
    assert!(space.write_to_file(&path));

    let reloaded = ParameterSpace::new("reloaded");
    assert!(reloaded.read_from_file(&path));
    assert_eq!(reloaded.len(), 2);

    let back = reloaded.get_dimension("dim1", "").unwrap();
    assert_eq!(back.values(), dim1.values());
    assert_eq!(back.ids(), dim1.ids());
    assert_eq!(back.representation(), Representation::Id);
    assert_eq!(back.current_id().as_deref(), Some("C"));
    assert_eq!(back.current_value(), Some(VariantValue::Double(0.3)));

    let back = reloaded.get_dimension("count", "solver").unwrap();
    assert_eq!(back.values(), count.values());
    assert_eq!(back.representation(), Representation::Index);
    assert_eq!(back.stride(), 2);
}

#[test]
fn cached_points_are_not_recomputed() {
    let runs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();

    let space = ParameterSpace::new("cached");
    space.set_root_path(runs.path());
    space.set_path_template("run_%%dim1%%");
    grid(&space, &[("dim1", 2)]);
    let cache = Arc::new(CacheManager::open(cache_dir.path()).unwrap());
    cache.set_validate_hash(true);
    space.set_cache_manager(Some(cache.clone()));

    let stub = Arc::new(StubProcessor::new("p").with_outputs(&["result.json"]));
    let processor: Arc<dyn Processor> = stub.clone();

    assert!(space.sweep(&processor, &[], &[], false));
    assert_eq!(stub.runs(), 2);
    assert_eq!(cache.len(), 2);
    let output = runs.path().join("run_0.1").join("result.json");
    let first = fs::read_to_string(&output).unwrap();

    assert!(space.sweep(&processor, &[], &[], false));
    assert_eq!(stub.runs(), 2);
    assert_eq!(cache.len(), 2);
    assert_eq!(fs::read_to_string(&output).unwrap(), first);

    fs::write(&output, "tampered").unwrap();
    assert!(space.sweep(&processor, &[], &[], false));
    assert_eq!(stub.runs(), 3);
    assert_eq!(fs::read_to_string(&output).unwrap(), first);
}

#[test]
fn recompute_bypasses_the_cache() {
    let runs = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();

    let space = ParameterSpace::new("forced");
    space.set_root_path(runs.path());
    space.set_path_template("%%dim1:INDEX%%");
    grid(&space, &[("dim1", 1)]);
    space.set_cache_manager(Some(Arc::new(CacheManager::open(cache_dir.path()).unwrap())));

    let stub = Arc::new(StubProcessor::new("p").with_outputs(&["out.txt"]));
    let processor: Arc<dyn Processor> = stub.clone();

    assert!(space.sweep(&processor, &[], &[], false));
    assert!(space.sweep(&processor, &[], &[], true));
    assert_eq!(stub.runs(), 2);
}

#[test]
fn unresolvable_run_path_fails_the_point() {
    let space = ParameterSpace::new("s");
    space.set_path_template("%%missing%%");
    grid(&space, &[("dim1", 2)]);
    let stub = Arc::new(StubProcessor::new("p"));
    let processor: Arc<dyn Processor> = stub.clone();

    assert!(!space.sweep(&processor, &[], &[], false));
    assert_eq!(stub.runs(), 0);
}

#[test]
fn dependencies_are_added_to_the_configuration() {
    let space = ParameterSpace::new("s");
    grid(&space, &[("dim1", 2)]);
    let other = ParameterSpace::new("other");
    let seed = other.new_dimension("seed", "", ValueType::Int32);
    seed.set_values(vec![VariantValue::Int32(42)]).unwrap();

    let stub = Arc::new(StubProcessor::new("p"));
    let processor: Arc<dyn Processor> = stub.clone();
    assert!(space.sweep(&processor, &["dim1"], &[seed], false));

    for context in stub.contexts() {
        assert_eq!(context.configuration.get_as::<i32>("seed"), Some(42));
    }
}
