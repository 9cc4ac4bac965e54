use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;
use utoipa::ToSchema;

use crate::request::EvaluationMode;

/// Runner script passed to `python3 -c` by the default interpreter configuration.
pub const PYTHON_RUNNER: &str = include_str!("../runner/python_runner.py");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which evaluation path a deployment uses.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    Default,
    PartialEq,
    Eq,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Subprocess,
    Fallback,
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub default_mode: EvaluationMode,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    /// Answer with the fallback evaluator when the interpreter cannot be started.
    #[serde(default)]
    pub fallback_on_unavailable: bool,

    #[serde(default)]
    pub relay: RelayConfig,

    /// Upper bound, in characters, of any diagnostic `detail` sent to callers.
    #[serde(default = "default_detail_limit")]
    pub detail_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            default_mode: EvaluationMode::default(),
            interpreter: InterpreterConfig::default(),
            fallback_on_unavailable: false,
            relay: RelayConfig::default(),
            detail_limit: default_detail_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default = "default_timeout", with = "duration_ms")]
    pub timeout: Duration,

    /// Time the output drains get to finish after the child was killed.
    #[serde(default = "default_kill_grace", with = "duration_ms")]
    pub kill_grace: Duration,

    /// Per-stream cap on captured output.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    #[serde(default = "default_result_marker")]
    pub result_marker: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            env: HashMap::new(),
            working_dir: None,
            timeout: default_timeout(),
            kill_grace: default_kill_grace(),
            max_output_bytes: default_max_output_bytes(),
            result_marker: default_result_marker(),
        }
    }
}

impl InterpreterConfig {
    /// Configuration for an arbitrary program that reads the source from stdin.
    pub fn command<S: Into<String>>(program: S, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Applies command line overrides. Arguments are only replaced when some
    /// are given, so a bare program override still receives the runner arguments.
    pub fn override_command(&mut self, program: Option<&str>, args: &[String]) {
        if let Some(program) = program {
            self.program = program.to_string();
        }
        if !args.is_empty() {
            self.args = args.to_vec();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_relay_timeout", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_relay_endpoint(),
            timeout: default_relay_timeout(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let config: Self = from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.detail_limit < 4 {
            return Err(ConfigError::Invalid(format!(
                "detail_limit must be at least 4, got {}",
                self.detail_limit
            )));
        }
        match self.backend {
            BackendKind::Subprocess if self.interpreter.program.trim().is_empty() => Err(
                ConfigError::Invalid("interpreter.program must not be empty".to_string()),
            ),
            BackendKind::Subprocess if self.interpreter.result_marker.is_empty() => Err(
                ConfigError::Invalid("interpreter.result_marker must not be empty".to_string()),
            ),
            BackendKind::Relay if !self.relay.endpoint.starts_with("http") => {
                Err(ConfigError::Invalid(format!(
                    "relay.endpoint must be an http(s) URL, got {:?}",
                    self.relay.endpoint
                )))
            }
            _ => Ok(()),
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> ConfigResult<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConfigError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> ConfigResult<T> {
    Ok(serde_json::from_str(s)?)
}

fn default_detail_limit() -> usize {
    200
}
fn default_program() -> String {
    "python3".to_string()
}
fn default_args() -> Vec<String> {
    vec!["-c".to_string(), PYTHON_RUNNER.to_string()]
}
fn default_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_kill_grace() -> Duration {
    Duration::from_millis(500)
}
fn default_max_output_bytes() -> usize {
    1024 * 1024
}
fn default_result_marker() -> String {
    "__RESULT__:".to_string()
}
fn default_relay_endpoint() -> String {
    "http://127.0.0.1:3001/api/evaluate".to_string()
}
fn default_relay_timeout() -> Duration {
    Duration::from_secs(30)
}

pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
