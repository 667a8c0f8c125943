//! Record introspection handlers.

use serde_json::Value;

use super::{string_params, to_value};
use crate::records::RecordStore;
use crate::rpc::HandlerResult;

/// `admin_record_get_records_info`: records of any class by exact name.
pub fn get_records_info(store: &dyn RecordStore, params: &Value) -> HandlerResult {
    let records = string_params(params)?
        .into_iter()
        .map(|name| store.lookup(name))
        .collect::<Result<Vec<_>, _>>()?;
    to_value(&records)
}
