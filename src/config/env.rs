//! Environment variable and config file support for [`BatonConfig`].
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `BATON_WORKER_THREAD_NAME` | `String` | `worker_thread_name` |
//! | `BATON_UNIT_THREAD_PREFIX` | `String` | `unit_thread_prefix` |
//! | `BATON_STACK_SIZE` | `usize` | `stack_size` |
//! | `BATON_IDLE_SPINS` | `u32` | `idle_spins` |
//! | `BATON_IDLE_BACKOFF_US` | `u64` | `idle_backoff` (microseconds) |
//! | `BATON_DEFAULT_TERMINATE` | `kill` / `join` | `default_terminate` |

use std::time::Duration;

use crate::config::BatonConfig;
use crate::error::Error;
use crate::handoff::TerminateMethod;

/// Environment variable name for the worker thread name.
pub const ENV_WORKER_THREAD_NAME: &str = "BATON_WORKER_THREAD_NAME";
/// Environment variable name for the unit thread name prefix.
pub const ENV_UNIT_THREAD_PREFIX: &str = "BATON_UNIT_THREAD_PREFIX";
/// Environment variable name for the unit stack size.
pub const ENV_STACK_SIZE: &str = "BATON_STACK_SIZE";
/// Environment variable name for the idle spin count.
pub const ENV_IDLE_SPINS: &str = "BATON_IDLE_SPINS";
/// Environment variable name for the idle backoff, in microseconds.
pub const ENV_IDLE_BACKOFF_US: &str = "BATON_IDLE_BACKOFF_US";
/// Environment variable name for the default terminate method.
pub const ENV_DEFAULT_TERMINATE: &str = "BATON_DEFAULT_TERMINATE";

/// Error raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable or key holds a value of the wrong shape.
    #[error("invalid value for {key}: expected {expected}, got {value:?}")]
    InvalidValue {
        /// Variable or key name.
        key: String,
        /// Description of the accepted values.
        expected: &'static str,
        /// The rejected value.
        value: String,
    },
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for this schema.
    #[cfg(feature = "config-file")]
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::config(e.to_string()).with_source(e)
    }
}

/// Apply environment variable overrides to a [`BatonConfig`].
///
/// Only variables that are set are applied. Returns an error if a variable is
/// set but holds an unparseable value.
pub fn apply_env_overrides(config: &mut BatonConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup`, using the `BATON_*` names.
pub fn apply_overrides_from<F>(config: &mut BatonConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_WORKER_THREAD_NAME) {
        config.worker_thread_name = val;
    }
    if let Some(val) = lookup(ENV_UNIT_THREAD_PREFIX) {
        config.unit_thread_prefix = val;
    }
    if let Some(val) = lookup(ENV_STACK_SIZE) {
        config.stack_size = Some(parse_number(ENV_STACK_SIZE, &val)?);
    }
    if let Some(val) = lookup(ENV_IDLE_SPINS) {
        config.idle_spins = parse_number(ENV_IDLE_SPINS, &val)?;
    }
    if let Some(val) = lookup(ENV_IDLE_BACKOFF_US) {
        config.idle_backoff = Duration::from_micros(parse_number(ENV_IDLE_BACKOFF_US, &val)?);
    }
    if let Some(val) = lookup(ENV_DEFAULT_TERMINATE) {
        config.default_terminate = parse_terminate(ENV_DEFAULT_TERMINATE, &val)?;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            expected: "unsigned integer",
            value: val.to_string(),
        })
}

fn parse_terminate(key: &str, val: &str) -> Result<TerminateMethod, ConfigError> {
    val.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        expected: "kill or join",
        value: val.to_string(),
    })
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable configuration.
///
/// ```toml
/// [worker]
/// thread_name = "my-worker"
/// idle_spins = 16
/// idle_backoff_us = 100
///
/// [units]
/// thread_prefix = "my-test"
/// stack_size = 2097152
/// default_terminate = "join"
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct BatonTomlConfig {
    /// Worker settings.
    #[serde(default)]
    pub worker: WorkerToml,
    /// Unit settings.
    #[serde(default)]
    pub units: UnitsToml,
}

/// Worker section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct WorkerToml {
    /// OS thread name of the worker.
    pub thread_name: Option<String>,
    /// Yields before the idle worker sleeps.
    pub idle_spins: Option<u32>,
    /// Idle sleep in microseconds.
    pub idle_backoff_us: Option<u64>,
}

/// Units section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct UnitsToml {
    /// Thread name prefix of units.
    pub thread_prefix: Option<String>,
    /// Stack size of unit threads in bytes.
    pub stack_size: Option<usize>,
    /// Terminate method used on drop.
    pub default_terminate: Option<TerminateMethod>,
}

/// Apply a parsed TOML config to a [`BatonConfig`].
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut BatonConfig, toml: &BatonTomlConfig) {
    if let Some(name) = &toml.worker.thread_name {
        config.worker_thread_name.clone_from(name);
    }
    if let Some(spins) = toml.worker.idle_spins {
        config.idle_spins = spins;
    }
    if let Some(us) = toml.worker.idle_backoff_us {
        config.idle_backoff = Duration::from_micros(us);
    }
    if let Some(prefix) = &toml.units.thread_prefix {
        config.unit_thread_prefix.clone_from(prefix);
    }
    if let Some(bytes) = toml.units.stack_size {
        config.stack_size = Some(bytes);
    }
    if let Some(method) = toml.units.default_terminate {
        config.default_terminate = method;
    }
}

/// Parse a TOML string into a [`BatonTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(contents: &str) -> Result<BatonTomlConfig, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Load a configuration: defaults, then the TOML file, then `BATON_*` variables.
#[cfg(feature = "config-file")]
pub fn load_toml_file(path: impl AsRef<std::path::Path>) -> Result<BatonConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let mut config = BatonConfig::new();
    apply_toml_config(&mut config, &parse_toml_str(&contents)?);
    apply_env_overrides(&mut config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn unset_variables_leave_defaults() {
        let mut config = BatonConfig::new();
        apply_overrides_from(&mut config, lookup(&[])).expect("no overrides");
        assert_eq!(config, BatonConfig::new());
    }

    #[test]
    fn every_variable_is_applied() {
        let mut config = BatonConfig::new();
        apply_overrides_from(
            &mut config,
            lookup(&[
                (ENV_WORKER_THREAD_NAME, "w"),
                (ENV_UNIT_THREAD_PREFIX, "u"),
                (ENV_STACK_SIZE, " 65536 "),
                (ENV_IDLE_SPINS, "3"),
                (ENV_IDLE_BACKOFF_US, "250"),
                (ENV_DEFAULT_TERMINATE, "JOIN"),
            ]),
        )
        .expect("valid overrides");
        assert_eq!(config.worker_thread_name, "w");
        assert_eq!(config.unit_thread_prefix, "u");
        assert_eq!(config.stack_size, Some(65_536));
        assert_eq!(config.idle_spins, 3);
        assert_eq!(config.idle_backoff, Duration::from_micros(250));
        assert_eq!(config.default_terminate, TerminateMethod::Join);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = BatonConfig::new();
        let err = apply_overrides_from(&mut config, lookup(&[(ENV_IDLE_SPINS, "lots")]))
            .expect_err("invalid spins");
        assert_eq!(
            err.to_string(),
            "invalid value for BATON_IDLE_SPINS: expected unsigned integer, got \"lots\""
        );

        let err = apply_overrides_from(&mut config, lookup(&[(ENV_DEFAULT_TERMINATE, "nuke")]))
            .expect_err("invalid method");
        let err: Error = err.into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_sections_are_applied() {
        let parsed = parse_toml_str(
            r#"
            [worker]
            thread_name = "toml-worker"
            idle_backoff_us = 10

            [units]
            default_terminate = "join"
            "#,
        )
        .expect("valid toml");
        let mut config = BatonConfig::new();
        apply_toml_config(&mut config, &parsed);
        assert_eq!(config.worker_thread_name, "toml-worker");
        assert_eq!(config.idle_backoff, Duration::from_micros(10));
        assert_eq!(config.default_terminate, TerminateMethod::Join);
        assert_eq!(config.idle_spins, crate::config::DEFAULT_IDLE_SPINS);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_rejects_unknown_keys() {
        assert!(parse_toml_str("[worker]\nthreads = 4\n").is_err());
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn environment_overrides_the_toml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            "[worker]\nthread_name = \"toml-worker\"\nidle_spins = 3\n"
        )
        .expect("write config");

        let _guard = crate::test_utils::env_lock();
        std::env::set_var(ENV_IDLE_SPINS, "9");
        let loaded = load_toml_file(file.path());
        std::env::remove_var(ENV_IDLE_SPINS);

        let config = loaded.expect("valid config file");
        assert_eq!(config.idle_spins, 9);
        assert_eq!(config.worker_thread_name, "toml-worker");
        assert_eq!(config.idle_backoff, crate::config::DEFAULT_IDLE_BACKOFF);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn missing_config_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = load_toml_file(dir.path().join("absent.toml")).expect_err("no file");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
