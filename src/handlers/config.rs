//! Configuration record handlers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{invalid_params, string_params, to_value};
use crate::records::{RecordError, RecordStore, RecordType};
use crate::rpc::{Errata, HandlerResult};

/// `admin_config_get_records`: configuration records by exact name.
pub fn get_records(store: &dyn RecordStore, params: &Value) -> HandlerResult {
    let mut found = Vec::new();
    for name in string_params(params)? {
        let record = store.lookup(name)?;
        if !record.record_type.is_config() {
            return Err(RecordError::RecordNotConfig.into());
        }
        found.push(record);
    }
    to_value(&found)
}

/// `admin_config_get_records_regex`: configuration records matching any of
/// the patterns, pattern by pattern.
pub fn get_records_regex(store: &dyn RecordStore, params: &Value) -> HandlerResult {
    let mut found = Vec::new();
    for pattern in string_params(params)? {
        let regex = Regex::new(pattern).map_err(|_| Errata::from(RecordError::InvalidRecordName))?;
        found.extend(store.matching(RecordType::CONFIG_CLASSES, &regex));
    }
    to_value(&found)
}

/// `admin_config_get_all_records`: every configuration record. Params are ignored.
pub fn get_all_records(store: &dyn RecordStore, _params: &Value) -> HandlerResult {
    let all = Regex::new(".*").map_err(|_| Errata::from(RecordError::GeneralError))?;
    to_value(&store.matching(RecordType::CONFIG_CLASSES, &all))
}

#[derive(Debug, Deserialize)]
struct SetRecord {
    record_name: String,
    new_value: String,
}

#[derive(Debug, Serialize)]
struct SetOutcome {
    record_name: String,
    update_status: u8,
}

/// `admin_config_set_records`: validates and stores new values, one record at
/// a time, stopping at the first failure.
pub fn set_records(store: &dyn RecordStore, params: &Value) -> HandlerResult {
    let requests: Vec<SetRecord> = serde_json::from_value(params.clone())
        .map_err(|_| invalid_params("expected [{\"record_name\", \"new_value\"}, ...]"))?;

    let mut outcomes = Vec::with_capacity(requests.len());
    for SetRecord {
        record_name,
        new_value,
    } in requests
    {
        let update_type = store.set(&record_name, &new_value)?;
        info!(record = %record_name, value = %new_value, "Configuration record set");
        outcomes.push(SetOutcome {
            record_name,
            update_status: update_type.status(),
        });
    }
    to_value(&outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        CheckType, ConfigMeta, DataType, MemoryRecordStore, Record, RecordValue, UpdateType,
    };
    use serde_json::json;

    fn store() -> MemoryRecordStore {
        [
            Record::config(
                "proxy.config.http.server_ports",
                RecordType::CONFIG,
                RecordValue::String("8080".to_string()),
                ConfigMeta {
                    update_type: UpdateType::RestartTs,
                    check_type: CheckType::Str,
                    check_expr: Some("^[0-9 ]+$".to_string()),
                },
            ),
            Record::config(
                "proxy.local.incoming_ip_to_bind",
                RecordType::LOCAL,
                RecordValue::String(String::new()),
                ConfigMeta::default(),
            ),
            Record::metric(
                "proxy.process.http.completed_requests",
                RecordType::PROCESS,
                DataType::Counter,
                RecordValue::Int(3),
            ),
        ]
        .into_iter()
        .collect()
    }

    fn first_code(errata: &Errata) -> i32 {
        errata.iter().next().map(|a| a.code).unwrap_or_default()
    }

    #[test]
    fn get_records_by_name() {
        let result = get_records(&store(), &json!(["proxy.config.http.server_ports"])).unwrap();
        assert_eq!(result[0]["name"], "proxy.config.http.server_ports");
        assert_eq!(result[0]["current_value"], "8080");
    }

    #[test]
    fn get_records_stops_on_metric() {
        let errata = get_records(
            &store(),
            &json!(["proxy.config.http.server_ports", "proxy.process.http.completed_requests"]),
        )
        .unwrap_err();
        assert_eq!(first_code(&errata), RecordError::RecordNotConfig.code());
    }

    #[test]
    fn get_records_unknown_name() {
        let errata = get_records(&store(), &json!(["nope"])).unwrap_err();
        assert_eq!(first_code(&errata), RecordError::RecordNotFound.code());
    }

    #[test]
    fn regex_and_all_skip_metrics() {
        let store = store();
        let result = get_records_regex(&store, &json!(["^proxy\\.local"])).unwrap();
        assert_eq!(result.as_array().map(Vec::len), Some(1));

        let all = get_all_records(&store, &Value::Null).unwrap();
        assert_eq!(all.as_array().map(Vec::len), Some(2));

        let errata = get_records_regex(&store, &json!(["("])).unwrap_err();
        assert_eq!(first_code(&errata), RecordError::InvalidRecordName.code());
    }

    #[test]
    fn set_reports_update_status() {
        let store = store();
        let result = set_records(
            &store,
            &json!([{"record_name": "proxy.config.http.server_ports", "new_value": "8081 8082"}]),
        )
        .unwrap();
        assert_eq!(
            result,
            json!([{"record_name": "proxy.config.http.server_ports", "update_status": 2}])
        );
    }

    #[test]
    fn set_failures() {
        let store = store();
        let errata = set_records(
            &store,
            &json!([{"record_name": "proxy.config.http.server_ports", "new_value": "http"}]),
        )
        .unwrap_err();
        assert_eq!(first_code(&errata), RecordError::ValidityCheckError.code());

        let errata = set_records(&store, &json!([{"record_name": "x", "new_value": "1"}])).unwrap_err();
        assert_eq!(first_code(&errata), RecordError::RecordNotFound.code());

        let errata = set_records(&store, &json!(["not an object"])).unwrap_err();
        assert_eq!(first_code(&errata), -32602);
    }
}
