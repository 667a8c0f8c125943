//! In-memory record table.

use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use super::validity;
use super::{Record, RecordError, RecordStore, RecordType, RecordValue, UpdateType};

/// Record table held in process memory, seeded from configuration.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<IndexMap<String, Record>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, replacing any previous record of the same name.
    pub fn insert(&self, record: Record) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.name.clone(), record);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Record> for MemoryRecordStore {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

impl RecordStore for MemoryRecordStore {
    fn lookup(&self, name: &str) -> Result<Record, RecordError> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or(RecordError::RecordNotFound)
    }

    fn matching(&self, mask: RecordType, pattern: &Regex) -> Vec<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.record_type.intersects(mask) && pattern.is_match(&r.name))
            .cloned()
            .collect()
    }

    fn set(&self, name: &str, value: &str) -> Result<UpdateType, RecordError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records.get_mut(name).ok_or(RecordError::RecordNotFound)?;
        let Some(meta) = record.config_meta.as_ref() else {
            return Err(RecordError::RecordNotConfig);
        };

        if let Some(expr) = meta.check_expr.as_deref() {
            if !validity::check(meta.check_type, expr, value) {
                return Err(RecordError::ValidityCheckError);
            }
        }

        let update_type = meta.update_type;
        record.current_value = RecordValue::parse(record.data_type, value)?;
        debug!(record = name, value, "Record updated");
        Ok(update_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CheckType, ConfigMeta, DataType};

    fn store() -> MemoryRecordStore {
        [
            Record::config(
                "proxy.config.diags.debug.enabled",
                RecordType::CONFIG,
                RecordValue::Int(0),
                ConfigMeta {
                    update_type: UpdateType::Dynamic,
                    check_type: CheckType::Int,
                    check_expr: Some("[0-1]".to_string()),
                },
            ),
            Record::config(
                "proxy.config.diags.debug.tags",
                RecordType::CONFIG,
                RecordValue::String("http".to_string()),
                ConfigMeta::default(),
            ),
            Record::metric(
                "proxy.process.http.total_requests",
                RecordType::PROCESS,
                DataType::Counter,
                RecordValue::Int(7),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn lookup_by_name() {
        let store = store();
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.lookup("proxy.config.diags.debug.tags").unwrap().current_value,
            RecordValue::String("http".to_string())
        );
        assert_eq!(store.lookup("nope").unwrap_err(), RecordError::RecordNotFound);
    }

    #[test]
    fn matching_filters_by_class_and_name() {
        let store = store();
        let all = Regex::new(".*").unwrap();
        assert_eq!(store.matching(RecordType::CONFIG_CLASSES, &all).len(), 2);
        assert_eq!(store.matching(RecordType::all(), &all).len(), 3);

        let debug = Regex::new(r"debug\.enabled$").unwrap();
        let found = store.matching(RecordType::CONFIG, &debug);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "proxy.config.diags.debug.enabled");
    }

    #[test]
    fn set_validates_and_reports_update_type() {
        let store = store();
        assert_eq!(
            store.set("proxy.config.diags.debug.enabled", "1"),
            Ok(UpdateType::Dynamic)
        );
        assert_eq!(
            store.lookup("proxy.config.diags.debug.enabled").unwrap().current_value,
            RecordValue::Int(1)
        );
        assert_eq!(
            store.set("proxy.config.diags.debug.enabled", "2"),
            Err(RecordError::ValidityCheckError)
        );
    }

    #[test]
    fn set_rejects_metrics_and_unknown_names() {
        let store = store();
        assert_eq!(
            store.set("proxy.process.http.total_requests", "1"),
            Err(RecordError::RecordNotConfig)
        );
        assert_eq!(store.set("missing", "1"), Err(RecordError::RecordNotFound));
    }

    #[test]
    fn unchecked_string_accepts_anything() {
        let store = store();
        assert_eq!(
            store.set("proxy.config.diags.debug.tags", "http|dns"),
            Ok(UpdateType::Null)
        );
    }
}
