// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::consts::{DEFAULT_BARRIER_TIMEOUT_MS, DEFAULT_PORT, DEFAULT_SWEEP_THREADS};
use crate::engine::Configuration;
use crate::errors::ConfigError;
use crate::space::{Representation, ValueType, VariantValue};

/// Runtime configuration of a lattice node.
///
/// Every section is optional. A file with only a `space` and `processors`
/// section describes a standalone sweep.
///
/// # Example
/// ```yaml
/// node:
///   role: server
///   address: 0.0.0.0
///   port: 7400
/// space:
///   id: study
///   root_path: runs
///   path_template: "%%dim1%%/%%dim2:ID%%"
///   cache_dir: cache
///   dimensions:
///     - name: dim1
///       type: double
///       values: [0.1, 0.2, 0.3]
///     - name: dim2
///       type: int32
///       values: [1, 2]
///       ids: [coarse, fine]
///       representation: id
/// processors:
///   - id: solve
///     type: command
///     program: ./solver
///     args: ["--config", "%%config_file%%"]
///     output_files: [result.json]
/// sweep:
///   dimensions: [dim1, dim2]
///   threads: 2
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub space: SpaceConfig,
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Whether this process listens for peers, connects to one, or runs alone.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    #[default]
    Standalone,
    Server,
    Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub role: NodeRole,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_barrier_timeout_ms")]
    pub barrier_timeout_ms: u64,
    /// Root path prefixes rewritten when root paths cross the wire.
    #[serde(default)]
    pub root_path_map: Vec<RootPathMapping>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: NodeRole::default(),
            address: default_address(),
            port: default_port(),
            barrier_timeout_ms: default_barrier_timeout_ms(),
            root_path_map: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// `local` on this node corresponds to `remote` on the peer.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RootPathMapping {
    pub local: String,
    pub remote: String,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_barrier_timeout_ms() -> u64 {
    DEFAULT_BARRIER_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_space_id() -> String {
    "space".to_string()
}

fn default_stride() -> usize {
    1
}

fn default_threads() -> usize {
    DEFAULT_SWEEP_THREADS
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceConfig {
    #[serde(default = "default_space_id")]
    pub id: String,
    #[serde(default)]
    pub root_path: PathBuf,
    #[serde(default)]
    pub path_template: String,
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub validate_cache: bool,
    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            id: default_space_id(),
            root_path: PathBuf::new(),
            path_template: String::new(),
            cache_dir: None,
            validate_cache: true,
            dimensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DimensionConfig {
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub values: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub representation: Representation,
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default)]
    pub current_index: usize,
}

impl DimensionConfig {
    /// Values converted to the declared type.
    pub fn typed_values(&self) -> Result<Vec<VariantValue>, ConfigError> {
        self.values
            .iter()
            .map(|raw| {
                let invalid = || ConfigError::InvalidValue {
                    dimension: self.name.clone(),
                    expected: self.value_type.as_str().to_string(),
                    value: format!("{:?}", raw),
                };
                let json = serde_json::to_value(raw).map_err(|_| invalid())?;
                VariantValue::from_json(self.value_type, &json).ok_or_else(invalid)
            })
            .collect()
    }
}

/// Processor implementation selected by the `type` key.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    #[default]
    Command,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ProcessorKind,
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default)]
    pub output_files: Vec<String>,
    pub input_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub running_directory: Option<PathBuf>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Take the previous processor's outputs as inputs.
    #[serde(default)]
    pub connect: bool,
    #[serde(default)]
    pub ignore_fail: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub timeout_ms: Option<u64>,
    /// Fixed run configuration values, merged under the swept values.
    #[serde(default)]
    pub options: serde_yaml::Mapping,
}

impl ProcessorConfig {
    /// `options` as a run configuration. Value types are inferred from the
    /// file: booleans, integers (int64), floats (double), strings and lists of
    /// numbers (float vectors).
    pub fn configuration(&self) -> Result<Configuration, ConfigError> {
        let mut configuration = Configuration::new();
        for (key, raw) in &self.options {
            let key = match key {
                serde_yaml::Value::String(key) => key.clone(),
                other => format!("{:?}", other),
            };
            let value = serde_json::to_value(raw)
                .ok()
                .and_then(|json| infer_value(&json))
                .ok_or_else(|| ConfigError::InvalidValue {
                    dimension: format!("{}.{}", self.id, key),
                    expected: "scalar or list of numbers".to_string(),
                    value: format!("{:?}", raw),
                })?;
            configuration.set(key, value);
        }
        Ok(configuration)
    }
}

fn infer_value(json: &serde_json::Value) -> Option<VariantValue> {
    use serde_json::Value;
    match json {
        Value::Bool(b) => Some(VariantValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(VariantValue::Int64)
            .or_else(|| n.as_f64().map(VariantValue::Double)),
        Value::String(s) => Some(VariantValue::String(s.clone())),
        Value::Array(_) => VariantValue::from_json(ValueType::FloatVec, json),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Dimensions to sweep; empty sweeps every dimension of the space.
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub recompute: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            dimensions: Vec::new(),
            threads: default_threads(),
            recompute: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

pub fn parse_config(text: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        ConfigFormat::Toml => toml::from_str(text)?,
    };
    Ok(config)
}

/// Load a config file; the format follows the file extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_config(&content, ConfigFormat::from_path(path))
}

/// Load a config file and reject it when validation finds any problem.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = load_config(path)?;
    crate::config::validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_yaml_config() {
        let yaml = r#"
node:
  role: client
  port: 9000
space:
  id: study
  path_template: "%%dim1%%"
  dimensions:
    - name: dim1
      type: double
      values: [0.1, 0.2]
    - name: label
      group: meta
      type: string
      values: [a, b, c]
      ids: [x, y, z]
      representation: id
processors:
  - id: solve
    program: ./solver
    args: ["%%config_file%%"]
    options:
      tolerance: 0.001
      steps: 10
  - id: report
    program: ./report
    depends_on: [solve]
    ignore_fail: true
sweep:
  dimensions: [dim1]
  threads: 4
"#;
        let config = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.node.role, NodeRole::Client);
        assert_eq!(config.node.socket_address(), "127.0.0.1:9000");
        assert_eq!(config.space.dimensions.len(), 2);
        assert_eq!(config.space.dimensions[1].representation, Representation::Id);
        assert_eq!(config.processors[1].depends_on, vec!["solve"]);
        assert!(config.processors[1].ignore_fail);
        assert!(config.processors[0].enabled);
        assert_eq!(config.sweep.threads, 4);

        let values = config.space.dimensions[0].typed_values().unwrap();
        assert_eq!(values, vec![VariantValue::Double(0.1), VariantValue::Double(0.2)]);

        let options = config.processors[0].configuration().unwrap();
        assert_eq!(options.keys().collect::<Vec<_>>(), vec!["tolerance", "steps"]);
        assert_eq!(options.get("steps"), Some(&VariantValue::Int64(10)));
    }

    #[test]
    fn parse_toml_config() {
        let text = r#"
[space]
id = "t"

[[space.dimensions]]
name = "n"
type = "int32"
values = [1, 2, 3]

[[processors]]
id = "run"
type = "command"
program = "true"
"#;
        let config = parse_config(text, ConfigFormat::Toml).unwrap();
        assert_eq!(config.space.id, "t");
        assert_eq!(config.node.role, NodeRole::Standalone);
        assert_eq!(
            config.space.dimensions[0].typed_values().unwrap(),
            vec![VariantValue::Int32(1), VariantValue::Int32(2), VariantValue::Int32(3)]
        );
        assert_eq!(config.processors[0].kind, ProcessorKind::Command);
    }

    #[test]
    fn values_must_match_the_declared_type() {
        let yaml = r#"
space:
  dimensions:
    - name: n
      type: int32
      values: [1, "two"]
"#;
        let config = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert!(matches!(
            config.space.dimensions[0].typed_values(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn format_follows_the_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a")), ConfigFormat::Yaml);
    }

    #[test]
    fn load_and_validate_rejects_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyclic.yaml");
        fs::write(
            &path,
            r#"
processors:
  - id: a
    program: "true"
    depends_on: [b]
  - id: b
    program: "true"
    depends_on: [a]
"#,
        )
        .unwrap();

        let error = load_and_validate_config(&path).unwrap_err();
        assert!(error.to_string().contains("Cyclic dependency detected"));
    }
}
