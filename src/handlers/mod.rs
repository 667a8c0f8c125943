//! Administrative handlers served over the control plane.
//!
//! | Method                           | Params                               | Result                      |
//! |----------------------------------|--------------------------------------|-----------------------------|
//! | `admin_config_get_records`       | `["name", ...]`                      | config records              |
//! | `admin_config_get_records_regex` | `["regex", ...]`                     | matching config records     |
//! | `admin_config_get_all_records`   | none                                 | every config record         |
//! | `admin_config_set_records`       | `[{"record_name", "new_value"}, ...]`| `[{record_name, update_status}]` |
//! | `admin_record_get_records_info`  | `["name", ...]`                      | records of any class        |
//!
//! All of them are restricted. A failure stops processing of the remaining
//! params and is reported through the errata of an `ExecutionError`.

mod config;
mod records;

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::records::RecordStore;
use crate::rpc::{Engine, Errata, RequestId, RpcErrorCode};

/// Registers the built-in introspection method and every admin handler.
///
/// Returns the number of handlers that could not be registered because their
/// name was already taken.
pub fn register_admin_handlers(engine: &Engine, store: Arc<dyn RecordStore>) -> usize {
    type Handler = fn(&dyn RecordStore, &Value) -> crate::rpc::HandlerResult;

    let table: [(&str, Handler); 5] = [
        ("admin_config_get_records", config::get_records),
        ("admin_config_get_records_regex", config::get_records_regex),
        ("admin_config_get_all_records", config::get_all_records),
        ("admin_config_set_records", config::set_records),
        ("admin_record_get_records_info", records::get_records_info),
    ];

    let mut rejected = usize::from(!engine.register_internal_api());
    for (name, handler) in table {
        let store = Arc::clone(&store);
        let added = engine.add_method_handler(name, move |_id: &RequestId, params: &Value| {
            handler(store.as_ref(), params)
        });
        if !added {
            warn!(method = name, "Admin handler not registered, name already in use");
            rejected += 1;
        }
    }
    rejected
}

/// Reads params shaped as an array of strings.
fn string_params(params: &Value) -> Result<Vec<&str>, Errata> {
    let Some(items) = params.as_array() else {
        return Err(invalid_params("expected an array of strings"));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| invalid_params("expected an array of strings"))
        })
        .collect()
}

fn invalid_params(detail: &str) -> Errata {
    Errata::single(
        RpcErrorCode::InvalidParams.code(),
        format!("{}: {detail}", RpcErrorCode::InvalidParams.message()),
    )
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, Errata> {
    serde_json::to_value(value).map_err(|_| crate::records::RecordError::GeneralError.into())
}
