// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use crate::backends::command::CommandProcessor;
use crate::config::{ProcessorConfig, ProcessorKind};
use crate::errors::{ConfigError, ValidationError};
use crate::traits::Processor;

/// Creates processors from their configuration entries.
pub struct ProcessorFactory;

impl ProcessorFactory {
    /// Build the processor described by `config` and apply its directories,
    /// files, flags and fixed configuration values.
    pub fn create_processor(config: &ProcessorConfig) -> Result<Arc<dyn Processor>, ConfigError> {
        let processor: Arc<dyn Processor> = match config.kind {
            ProcessorKind::Command => {
                let program = config
                    .program
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::Validation(vec![ValidationError::MissingProgram {
                            processor_id: config.id.clone(),
                        }])
                    })?;
                let mut command = CommandProcessor::new(&config.id, program).with_args(config.args.iter().cloned());
                if let Some(timeout) = config.timeout_ms {
                    command = command.with_timeout(Duration::from_millis(timeout));
                }
                Arc::new(command)
            }
        };

        let core = processor.core();
        if let Some(directory) = &config.input_directory {
            core.set_input_directory(directory.clone());
        }
        if let Some(directory) = &config.output_directory {
            core.set_output_directory(directory.clone());
        }
        if let Some(directory) = &config.running_directory {
            core.set_running_directory(directory.clone());
        }
        core.set_input_files(config.input_files.clone());
        core.set_output_files(config.output_files.clone());
        core.set_enabled(config.enabled);
        core.set_ignore_fail(config.ignore_fail);
        core.set_configuration(config.configuration()?);
        Ok(processor)
    }

    pub fn list_available_types() -> Vec<&'static str> {
        vec!["command"]
    }

    pub fn is_type_available(name: &str) -> bool {
        Self::list_available_types().contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ConfigFormat};
    use crate::space::VariantValue;
    use std::path::PathBuf;

    #[test]
    fn command_processor_is_configured_from_the_entry() {
        let config = parse_config(
            r#"
processors:
  - id: solve
    type: command
    program: ./solver
    args: ["-c", "%%config_file%%"]
    output_directory: out
    output_files: [result.json]
    ignore_fail: true
    enabled: false
    options:
      steps: 5
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        let processor = ProcessorFactory::create_processor(&config.processors[0]).unwrap();
        assert_eq!(processor.type_name(), "command");
        assert_eq!(processor.id(), "solve");
        let core = processor.core();
        assert_eq!(core.output_directory(), PathBuf::from("out"));
        assert_eq!(core.output_files(), vec!["result.json".to_string()]);
        assert!(core.ignore_fail());
        assert!(!core.enabled());
        assert_eq!(core.configuration().get("steps"), Some(&VariantValue::Int64(5)));
    }

    #[test]
    fn command_without_program_is_rejected() {
        let config = parse_config("processors:\n  - id: x\n", ConfigFormat::Yaml).unwrap();
        assert!(matches!(
            ProcessorFactory::create_processor(&config.processors[0]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn available_types() {
        assert!(ProcessorFactory::is_type_available("command"));
        assert!(!ProcessorFactory::is_type_available("wasm"));
    }
}
