// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runs an external program once per processor run.
//!
//! Arguments may contain `%%token%%` placeholders. A token names either a key
//! of the run configuration or one of the run locations:
//!
//! ```text
//! %%config_file%%         <output_directory>/<processor id>_config.json
//! %%output_directory%%    %%input_directory%%    %%running_directory%%
//! ```
//!
//! Before the program starts the run configuration is written as a plain JSON
//! object to the config file. Program output goes to `<processor id>.log` in
//! the output directory.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::config::consts::DEFAULT_PROGRAM_TIMEOUT_MS;
use crate::engine::{Configuration, ProcessorCore};
use crate::errors::ProcessorError;
use crate::observability::messages::processor::{CommandLaunched, ProcessorFailed};
use crate::observability::messages::StructuredLog;
use crate::space::template;
use crate::traits::{Processor, RunContext, RunRequest};

const WAIT_POLL: Duration = Duration::from_millis(10);

pub struct CommandProcessor {
    core: ProcessorCore,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProcessor {
    pub fn new(id: &str, program: impl Into<String>) -> Self {
        Self {
            core: ProcessorCore::new(id),
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_millis(DEFAULT_PROGRAM_TIMEOUT_MS),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn config_file(&self, output_directory: &Path) -> PathBuf {
        output_directory.join(format!("{}_config.json", self.core.id()))
    }

    /// Arguments with every placeholder resolved against `context`.
    pub fn resolved_args(&self, context: &RunContext) -> Vec<String> {
        let config_file = self.config_file(&context.output_directory);
        self.args
            .iter()
            .map(|arg| {
                let (resolved, _) = template::expand(arg, |token| match token.trim() {
                    "config_file" => Ok(config_file.display().to_string()),
                    "output_directory" => Ok(context.output_directory.display().to_string()),
                    "input_directory" => Ok(context.input_directory.display().to_string()),
                    "running_directory" => Ok(context.running_directory.display().to_string()),
                    key => context
                        .configuration
                        .get(key)
                        .map(|value| value.to_string())
                        .ok_or_else(|| format!("no configuration value '{}'", key)),
                });
                resolved
            })
            .collect()
    }

    fn execute(&self, context: &RunContext) -> Result<(), ProcessorError> {
        fs::create_dir_all(&context.output_directory)?;
        let config_file = self.config_file(&context.output_directory);
        fs::write(
            &config_file,
            serde_json::to_vec_pretty(&context.configuration.to_plain_json())?,
        )?;

        let args = self.resolved_args(context);
        let working_directory = if context.running_directory.as_os_str().is_empty() {
            context.output_directory.clone()
        } else {
            context.running_directory.clone()
        };
        let log = File::create(
            context
                .output_directory
                .join(format!("{}.log", self.core.id())),
        )?;

        CommandLaunched {
            processor_id: self.core.id(),
            command_line: &render(&self.program, &args),
            working_directory: &working_directory,
        }
        .log();

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(&working_directory)
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log)
            .spawn()
            .map_err(|source| ProcessorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessorError::Timeout {
                    program: self.program.clone(),
                    after: self.timeout,
                });
            }
            std::thread::sleep(WAIT_POLL);
        };

        if !status.success() {
            return Err(ProcessorError::ExitStatus {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }

        for output in context.output_paths() {
            if !output.exists() {
                return Err(ProcessorError::MissingOutput(output.display().to_string()));
            }
        }
        Ok(())
    }
}

fn render(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Processor for CommandProcessor {
    fn core(&self) -> &ProcessorCore {
        &self.core
    }

    fn type_name(&self) -> &str {
        "command"
    }

    fn command_line(&self, configuration: &Configuration) -> String {
        let context = self
            .core
            .context_for(RunRequest::new().with_configuration(configuration.clone()));
        render(&self.program, &self.resolved_args(&context))
    }

    fn run(&self, context: &RunContext) -> bool {
        match self.execute(context) {
            Ok(()) => true,
            Err(error) => {
                ProcessorFailed {
                    processor_id: self.core.id(),
                    reason: &error.to_string(),
                }
                .log();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(output: &Path, configuration: Configuration) -> RunContext {
        let processor = CommandProcessor::new("cmd", "true");
        processor.core().context_for(
            RunRequest::new()
                .with_configuration(configuration)
                .with_output_directory(output),
        )
    }

    #[test]
    fn arguments_resolve_configuration_and_locations() {
        let dir = tempfile::tempdir().unwrap();
        let processor =
            CommandProcessor::new("cmd", "solver").with_args(["--alpha=%%alpha%%", "%%config_file%%", "%%nope%%"]);
        let ctx = context(dir.path(), Configuration::new().with("alpha", 0.5));

        let args = processor.resolved_args(&ctx);
        assert_eq!(args[0], "--alpha=0.5");
        assert_eq!(args[1], dir.path().join("cmd_config.json").display().to_string());
        assert_eq!(args[2], "%%nope%%");
    }

    #[test]
    fn command_line_reflects_the_configuration() {
        let processor = CommandProcessor::new("cmd", "solver").with_args(["-n", "%%n%%"]);
        let a = processor.command_line(&Configuration::new().with("n", 1i32));
        let b = processor.command_line(&Configuration::new().with("n", 2i32));
        assert_eq!(a, "solver -n 1");
        assert_ne!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn runs_the_program_and_writes_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let processor = CommandProcessor::new("cmd", "sh")
            .with_args(["-c", "cp %%config_file%% result.json"]);
        processor.core().set_output_directory(dir.path());
        processor.core().set_output_files(vec!["result.json".to_string()]);
        processor
            .core()
            .set_configuration(Configuration::new().with("alpha", 0.25));

        assert!(processor.process(true));

        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("result.json")).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!({"alpha": 0.25}));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let processor = CommandProcessor::new("cmd", "sh").with_args(["-c", "exit 3"]);
        processor.core().set_output_directory(dir.path());
        assert!(!processor.process(true));
    }

    #[cfg(unix)]
    #[test]
    fn missing_declared_output_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let processor = CommandProcessor::new("cmd", "true");
        processor.core().set_output_directory(dir.path());
        processor.core().set_output_files(vec!["never.txt".to_string()]);
        assert!(!processor.process(true));
    }

    #[cfg(unix)]
    #[test]
    fn slow_programs_time_out() {
        let dir = tempfile::tempdir().unwrap();
        let processor = CommandProcessor::new("cmd", "sleep")
            .with_args(["5"])
            .with_timeout(Duration::from_millis(50));
        processor.core().set_output_directory(dir.path());

        let started = Instant::now();
        assert!(!processor.process(true));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn unknown_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let processor = CommandProcessor::new("cmd", "definitely-not-a-real-program-xyz");
        processor.core().set_output_directory(dir.path());
        assert!(!processor.process(true));
    }
}
