// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::ProcessorFactory;
use crate::cache::CacheManager;
use crate::config::{validate_config, Config, DependencyGraph, SpaceConfig, SweepConfig};
use crate::engine::ProcessorGraph;
use crate::errors::ConfigError;
use crate::space::{Dimension, ParameterSpace};
use crate::traits::Processor;

/// Builds a ready-to-run [`Runtime`] from a validated configuration.
///
/// Processors are laid out by dependency level: the root is a serial graph
/// of levels, and a level holding several independent processors becomes an
/// asynchronous sub-graph.
///
/// ```text
/// a -> b, a -> c, (b, c) -> d   =>   Serial[ a, Async[ b, c ], d ]
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    pub fn from_config(config: &Config) -> Result<Runtime, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let space = Arc::new(Self::build_space(&config.space)?);

        let mut processors: Vec<Arc<dyn Processor>> = Vec::with_capacity(config.processors.len());
        for processor_config in &config.processors {
            processors.push(ProcessorFactory::create_processor(processor_config)?);
        }
        let by_id: HashMap<&str, (&Arc<dyn Processor>, bool)> = config
            .processors
            .iter()
            .zip(&processors)
            .map(|(cfg, processor)| (cfg.id.as_str(), (processor, cfg.connect)))
            .collect();

        let graph = Arc::new(ProcessorGraph::serial(format!("{}_pipeline", config.space.id)));
        for (level_index, level) in DependencyGraph::from_config(config).levels().iter().enumerate() {
            let members: Vec<(&Arc<dyn Processor>, bool)> = level
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();
            match members.as_slice() {
                [] => {}
                [(processor, connect)] => graph.add(Arc::clone(processor), *connect),
                _ => {
                    let parallel = ProcessorGraph::parallel(format!("level_{}", level_index));
                    for (processor, _) in &members {
                        parallel.add(Arc::clone(processor), false);
                    }
                    graph.add(Arc::new(parallel), false);
                }
            }
        }

        // Outputs written into the per-point run directory are what the
        // cache keeps for the whole pipeline.
        let mut outputs: Vec<String> = Vec::new();
        for processor in &processors {
            let core = processor.core();
            if core.output_directory().as_os_str().is_empty() {
                for file in core.output_files() {
                    if !outputs.contains(&file) {
                        outputs.push(file);
                    }
                }
            }
        }
        graph.core().set_output_files(outputs);

        Ok(Runtime {
            space,
            graph,
            processors,
            sweep: config.sweep.clone(),
        })
    }

    pub fn build_space(config: &SpaceConfig) -> Result<ParameterSpace, ConfigError> {
        let space = ParameterSpace::new(config.id.clone());
        space.set_root_path(config.root_path.clone());
        space.set_path_template(config.path_template.clone());
        if let Some(directory) = &config.cache_dir {
            let cache = CacheManager::open(directory)?;
            cache.set_validate_hash(config.validate_cache);
            space.set_cache_manager(Some(Arc::new(cache)));
        }

        for entry in &config.dimensions {
            let dimension = Dimension::new(entry.name.clone(), entry.group.clone(), entry.value_type);
            dimension.set_values(entry.typed_values()?)?;
            if !entry.ids.is_empty() {
                dimension.set_ids(entry.ids.clone())?;
            }
            dimension.set_representation(entry.representation);
            dimension.set_stride(entry.stride);
            dimension.set_current_index(entry.current_index);
            space.register_dimension(Arc::new(dimension))?;
        }
        Ok(space)
    }
}

/// A parameter space, the processors built for it and the pipeline graph
/// that runs them at each point.
pub struct Runtime {
    space: Arc<ParameterSpace>,
    graph: Arc<ProcessorGraph>,
    processors: Vec<Arc<dyn Processor>>,
    sweep: SweepConfig,
}

impl Runtime {
    pub fn space(&self) -> &Arc<ParameterSpace> {
        &self.space
    }

    pub fn graph(&self) -> &Arc<ProcessorGraph> {
        &self.graph
    }

    pub fn processors(&self) -> &[Arc<dyn Processor>] {
        &self.processors
    }

    pub fn processor(&self, id: &str) -> Option<&Arc<dyn Processor>> {
        self.processors.iter().find(|p| p.id() == id)
    }

    pub fn sweep_config(&self) -> &SweepConfig {
        &self.sweep
    }

    /// Run the pipeline once at the space's current coordinate.
    pub fn run_once(&self, recompute: bool) -> bool {
        let pipeline: Arc<dyn Processor> = self.graph.clone();
        let mut configuration = self.graph.core().configuration();
        configuration.merge(&self.space.configuration());
        self.space.run_process(&pipeline, &configuration, &[], recompute)
    }

    /// Sweep the pipeline as the sweep section describes and wait for it.
    pub fn run_sweep(&self) -> bool {
        let pipeline: Arc<dyn Processor> = self.graph.clone();
        let dimensions: Vec<&str> = self.sweep.dimensions.iter().map(String::as_str).collect();
        if self.sweep.threads > 1 {
            self.space.sweep_async(
                &pipeline,
                &dimensions,
                &[],
                self.sweep.recompute,
                self.sweep.threads,
            ) && self.space.wait_for_sweep()
        } else {
            self.space.sweep(&pipeline, &dimensions, &[], self.sweep.recompute)
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("space", &self.space)
            .field("processors", &self.processors.iter().map(|p| p.id()).collect::<Vec<_>>())
            .field("sweep", &self.sweep)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ConfigFormat};
    use crate::engine::GraphMode;
    use crate::space::Representation;

    const DIAMOND: &str = r#"
space:
  id: study
  dimensions:
    - name: dim1
      type: double
      values: [0.1, 0.2, 0.3]
      ids: [A, B, C]
      representation: id
      current_index: 1
processors:
  - { id: a, program: "true" }
  - { id: b, program: "true", depends_on: [a] }
  - { id: c, program: "true", depends_on: [a] }
  - { id: d, program: "true", depends_on: [b, c] }
"#;

    #[test]
    fn levels_become_serial_and_async_graphs() {
        let config = parse_config(DIAMOND, ConfigFormat::Yaml).unwrap();
        let runtime = RuntimeBuilder::from_config(&config).unwrap();

        let children = runtime.graph().children();
        let ids: Vec<&str> = children.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["a", "level_1", "d"]);
        assert_eq!(children[1].type_name(), "async_graph");
        assert_eq!(runtime.graph().mode(), GraphMode::Serial);
        assert_eq!(runtime.processors().len(), 4);
    }

    #[test]
    fn space_is_built_from_the_dimensions_section() {
        let config = parse_config(DIAMOND, ConfigFormat::Yaml).unwrap();
        let runtime = RuntimeBuilder::from_config(&config).unwrap();

        let dim1 = runtime.space().find_dimension("dim1").unwrap();
        assert_eq!(dim1.size(), 3);
        assert_eq!(dim1.representation(), Representation::Id);
        assert_eq!(dim1.current_id().as_deref(), Some("B"));
        assert_eq!(runtime.space().id(), "study");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let config = parse_config(
            "processors:\n  - { id: a, program: x, depends_on: [zzz] }\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert!(matches!(
            RuntimeBuilder::from_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
