//! Record store consumed by the admin handlers.
//!
//! A record is a named, typed value: a configuration setting or a metric.
//! The dispatch core never touches records directly; handlers in
//! [`crate::handlers`] reach them through the [`RecordStore`] trait and turn
//! [`RecordError`]s into errata.
//!
//! # Record Classes
//!
//! | Class   | Mask bit  | Settable through RPC |
//! |---------|-----------|----------------------|
//! | Config  | `CONFIG`  | yes                  |
//! | Local   | `LOCAL`   | yes (node-local configuration) |
//! | Process | `PROCESS` | no (metric)          |
//! | Node    | `NODE`    | no (metric)          |
//! | Plugin  | `PLUGIN`  | no (metric)          |

mod memory;
pub mod validity;

pub use memory::MemoryRecordStore;

use bitflags::bitflags;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use crate::error::RecordError;

bitflags! {
    /// Record class mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RecordType: u32 {
        /// Configuration setting.
        const CONFIG = 0x01;
        /// Process-wide metric.
        const PROCESS = 0x02;
        /// Node-wide metric.
        const NODE = 0x04;
        /// Node-local configuration setting.
        const LOCAL = 0x10;
        /// Plugin metric.
        const PLUGIN = 0x20;
    }
}

impl RecordType {
    /// Classes the configuration handlers operate on.
    pub const CONFIG_CLASSES: Self = Self::CONFIG.union(Self::LOCAL);

    /// Returns `true` for configuration records.
    #[must_use]
    pub const fn is_config(self) -> bool {
        self.intersects(Self::CONFIG_CLASSES)
    }

    /// Returns `true` for metric records.
    #[must_use]
    pub const fn is_metric(self) -> bool {
        self.intersects(Self::PROCESS.union(Self::NODE).union(Self::PLUGIN))
    }
}

/// Data type of a record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Signed integer.
    Int,
    /// Floating point number.
    Float,
    /// Free-form string.
    String,
    /// Monotonic 64-bit counter.
    Counter,
}

/// What it takes for a configuration change to become effective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// No update semantics.
    #[default]
    Null,
    /// Applied immediately.
    Dynamic,
    /// Requires a server restart.
    RestartTs,
    /// Requires a manager restart.
    RestartTm,
}

impl UpdateType {
    /// Numeric form reported as `update_status`.
    #[must_use]
    pub const fn status(self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Dynamic => 1,
            Self::RestartTs => 2,
            Self::RestartTm => 3,
        }
    }
}

/// How a new value is validated before it is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// No check.
    #[default]
    Null,
    /// The value must match the regular expression in `check_expr`.
    Str,
    /// The value must be a decimal integer inside the `[lo-hi]` range.
    Int,
    /// The value must be a dotted quad whose octets fall inside the ranges
    /// of `check_expr`, or empty.
    Ip,
}

/// A typed record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// `Int` and `Counter` records.
    Int(i64),
    /// `Float` records.
    Float(f64),
    /// `String` records.
    String(String),
}

impl RecordValue {
    /// Parses `raw` according to `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::GeneralError`] if `raw` is not a number of the
    /// expected kind.
    pub fn parse(data_type: DataType, raw: &str) -> Result<Self, RecordError> {
        match data_type {
            DataType::Int | DataType::Counter => raw
                .trim()
                .parse()
                .map(Self::Int)
                .map_err(|_| RecordError::GeneralError),
            DataType::Float => raw
                .trim()
                .parse()
                .map(Self::Float)
                .map_err(|_| RecordError::GeneralError),
            DataType::String => Ok(Self::String(raw.to_string())),
        }
    }
}

impl std::fmt::Display for RecordValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Validation and update metadata, present on configuration records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMeta {
    /// What it takes for a change to take effect.
    pub update_type: UpdateType,
    /// How new values are validated.
    pub check_type: CheckType,
    /// Expression used by the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_expr: Option<String>,
}

/// A named record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Dotted record name.
    pub name: String,
    /// Record class.
    pub record_type: RecordType,
    /// Value type.
    pub data_type: DataType,
    /// Current value.
    pub current_value: RecordValue,
    /// Value the record was created with.
    pub default_value: RecordValue,
    /// Present for configuration records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_meta: Option<ConfigMeta>,
}

impl Record {
    /// Creates a configuration record whose current value is its default.
    #[must_use]
    pub fn config(
        name: impl Into<String>,
        record_type: RecordType,
        value: RecordValue,
        meta: ConfigMeta,
    ) -> Self {
        let data_type = match value {
            RecordValue::Int(_) => DataType::Int,
            RecordValue::Float(_) => DataType::Float,
            RecordValue::String(_) => DataType::String,
        };
        Self {
            name: name.into(),
            record_type,
            data_type,
            current_value: value.clone(),
            default_value: value,
            config_meta: Some(meta),
        }
    }

    /// Creates a metric record.
    #[must_use]
    pub fn metric(
        name: impl Into<String>,
        record_type: RecordType,
        data_type: DataType,
        value: RecordValue,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            data_type,
            current_value: value.clone(),
            default_value: value,
            config_meta: None,
        }
    }
}

/// Access to the process record table.
///
/// Implementations must be usable from many threads at once; handlers run
/// concurrently on the blocking pool.
pub trait RecordStore: Send + Sync {
    /// Looks a record up by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::RecordNotFound`] if no record has that name.
    fn lookup(&self, name: &str) -> Result<Record, RecordError>;

    /// Returns every record whose class intersects `mask` and whose name
    /// matches `pattern`, in registration order.
    fn matching(&self, mask: RecordType, pattern: &Regex) -> Vec<Record>;

    /// Validates and stores a new value given in its textual form.
    ///
    /// # Errors
    ///
    /// - [`RecordError::RecordNotFound`] for an unknown name
    /// - [`RecordError::RecordNotConfig`] for a metric
    /// - [`RecordError::ValidityCheckError`] if the record's check rejects the value
    /// - [`RecordError::GeneralError`] if a numeric value does not parse
    fn set(&self, name: &str, value: &str) -> Result<UpdateType, RecordError>;
}
