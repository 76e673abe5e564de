use serde_json::Value;
use uuid::Uuid;

use crate::pipeline::{value_as_text, Transaction};

/// Give every record a `transaction_id`.
///
/// Existing ids are kept. Otherwise `Customer_ID` is used, and failing that a
/// random 8-character id.
pub fn ensure_transaction_ids(records: &mut [Transaction]) {
    let mut assigned = 0usize;
    for record in records.iter_mut() {
        if non_blank(record.get("transaction_id")).is_some() {
            continue;
        }
        let id = non_blank(record.get("Customer_ID")).unwrap_or_else(short_id);
        record.insert("transaction_id".into(), Value::String(id));
        assigned += 1;
    }
    if assigned > 0 {
        tracing::debug!(assigned, "Assigned transaction ids");
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .map(value_as_text)
        .filter(|s| !s.trim().is_empty())
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
