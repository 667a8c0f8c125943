//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::records::{CheckType, ConfigMeta, DataType, Record, RecordType, RecordValue, UpdateType};

/// Longest path a Unix socket address can carry (`sun_path`).
pub const MAX_SOCKET_PATH_LEN: usize = 108;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// RPC engine and transport settings.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Records the store starts with.
    #[serde(default)]
    pub records: Vec<RecordSeed>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let transport = &self.rpc.transport;
        let sock_len = transport.sock_path.as_os_str().len();
        if sock_len == 0 {
            return Err(validation("rpc.transport.sock_path must not be empty"));
        }
        if sock_len > MAX_SOCKET_PATH_LEN {
            return Err(validation(format!(
                "rpc.transport.sock_path is {sock_len} bytes long, the limit is {MAX_SOCKET_PATH_LEN}"
            )));
        }
        if transport.backlog == 0 {
            return Err(validation("rpc.transport.backlog must be at least 1"));
        }
        if transport.max_message_size == 0 {
            return Err(validation("rpc.transport.max_message_size must be at least 1"));
        }
        if transport.read_timeout_ms == 0 {
            return Err(validation("rpc.transport.read_timeout_ms must be at least 1"));
        }

        let mut names = HashSet::new();
        for seed in &self.records {
            if !names.insert(seed.name.as_str()) {
                return Err(validation(format!("duplicate record '{}'", seed.name)));
            }
        }
        Ok(())
    }

    /// Converts the record seeds into store records.
    ///
    /// # Errors
    ///
    /// Returns an error if a seed value does not match its data type.
    pub fn seed_records(&self) -> Result<Vec<Record>, ConfigError> {
        self.records.iter().map(RecordSeed::to_record).collect()
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

/// RPC engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcConfig {
    /// Serve the control plane at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Reject messages without a `"jsonrpc": "2.0"` member.
    #[serde(default)]
    pub require_version: bool,

    /// Socket transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            require_version: false,
            transport: TransportConfig::default(),
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Local socket transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Unix socket path.
    /// Default: `/tmp/proxy-admin-rpc.sock`
    #[serde(default = "default_sock_path")]
    pub sock_path: PathBuf,

    /// Lock file guarding the socket. Default: `<sock_path>.lock`
    #[serde(default)]
    pub lock_path: Option<PathBuf>,

    /// Connections served at once; further accepted connections wait.
    #[serde(default = "default_backlog")]
    pub backlog: usize,

    /// Consecutive transient accept failures tolerated before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries_on_transient_errors: u32,

    /// Largest request, in bytes, read from a connection.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// How long a single read may wait for more bytes, in milliseconds.
    /// A request still incomplete after that is answered as is.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Gate restricted handlers on the peer's credentials.
    #[serde(default = "default_true")]
    pub restricted_api: bool,
}

impl TransportConfig {
    /// The lock file path, derived from the socket path when not set.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.lock_path.clone().unwrap_or_else(|| {
            let mut path = self.sock_path.clone().into_os_string();
            path.push(".lock");
            PathBuf::from(path)
        })
    }

    /// The per-read deadline on an accepted connection.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sock_path: default_sock_path(),
            lock_path: None,
            backlog: default_backlog(),
            max_retries_on_transient_errors: default_max_retries(),
            max_message_size: default_max_message_size(),
            read_timeout_ms: default_read_timeout_ms(),
            restricted_api: default_true(),
        }
    }
}

fn default_sock_path() -> PathBuf {
    PathBuf::from("/tmp/proxy-admin-rpc.sock")
}

const fn default_backlog() -> usize {
    5
}

const fn default_max_retries() -> u32 {
    64
}

const fn default_max_message_size() -> usize {
    32_000
}

const fn default_read_timeout_ms() -> u64 {
    1_000
}

/// Record class as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordClass {
    /// Configuration setting.
    Config,
    /// Node-local configuration setting.
    Local,
    /// Process metric.
    Process,
    /// Node metric.
    Node,
    /// Plugin metric.
    Plugin,
}

impl From<RecordClass> for RecordType {
    fn from(class: RecordClass) -> Self {
        match class {
            RecordClass::Config => Self::CONFIG,
            RecordClass::Local => Self::LOCAL,
            RecordClass::Process => Self::PROCESS,
            RecordClass::Node => Self::NODE,
            RecordClass::Plugin => Self::PLUGIN,
        }
    }
}

/// An initial record.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSeed {
    /// Dotted record name.
    pub name: String,

    /// Record class. Default: `config`
    #[serde(rename = "type", default = "default_record_class")]
    pub class: RecordClass,

    /// Value type.
    pub data_type: DataType,

    /// Initial value, a number or a string.
    pub value: Value,

    /// What it takes for a change to take effect.
    #[serde(default)]
    pub update_type: UpdateType,

    /// How new values are validated.
    #[serde(default)]
    pub check_type: CheckType,

    /// Expression used by the check.
    #[serde(default)]
    pub check_expr: Option<String>,
}

const fn default_record_class() -> RecordClass {
    RecordClass::Config
}

impl RecordSeed {
    /// Builds the store record.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not fit `data_type`.
    pub fn to_record(&self) -> Result<Record, ConfigError> {
        let text = match &self.value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(validation(format!(
                    "record '{}' has unsupported value {other}",
                    self.name
                )))
            }
        };
        let value = RecordValue::parse(self.data_type, &text).map_err(|_| {
            validation(format!(
                "record '{}' value '{text}' is not a valid {:?}",
                self.name, self.data_type
            ))
        })?;

        let record_type = RecordType::from(self.class);
        let mut record = if record_type.is_config() {
            Record::config(
                self.name.clone(),
                record_type,
                value,
                ConfigMeta {
                    update_type: self.update_type,
                    check_type: self.check_type,
                    check_expr: self.check_expr.clone(),
                },
            )
        } else {
            Record::metric(self.name.clone(), record_type, self.data_type, value)
        };
        record.data_type = self.data_type;
        Ok(record)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
