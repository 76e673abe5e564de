//! Batched LLM verdicts on transactions.

use std::collections::HashMap;

use serde_json::Value;

use super::concurrency::map_ordered;
use super::llm::{chat_with_retry, ChatRequest, LlmClient};
use super::prompt::{build_anomaly_prompt, ANOMALY_SYSTEM_PROMPT};
use super::repair::{parse_items_lenient, parse_llm_json, value_to_list};
use super::types::{value_as_text, Transaction, Verdict};
use super::{PipelineError, PipelineSettings};

const ANOMALY_TEMPERATURE: f32 = 0.0;

/// Identity used to match verdicts to records: `transaction_id`, or the
/// 1-based row position when a record carries none.
pub fn record_id(record: &Transaction, index: usize) -> String {
    record
        .get("transaction_id")
        .map(|id| value_as_text(id).trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("#{}", index + 1))
}

/// Classify every transaction as ANOMALY / NORMAL / ERROR against `rules`.
///
/// The output holds exactly one verdict per input record, in input order.
/// A batch whose call or parse fails contributes ERROR verdicts.
pub fn detect_anomalies(
    llm: &dyn LlmClient,
    settings: &PipelineSettings,
    rules: &Value,
    transactions: &[Transaction],
) -> Result<Vec<Verdict>, PipelineError> {
    if transactions.is_empty() {
        return Ok(vec![]);
    }

    let batch_size = settings.batch_size.max(1);
    let batches: Vec<(&[Transaction], Vec<String>)> = transactions
        .chunks(batch_size)
        .enumerate()
        .map(|(batch_index, batch)| {
            let offset = batch_index * batch_size;
            let ids = batch
                .iter()
                .enumerate()
                .map(|(i, record)| record_id(record, offset + i))
                .collect();
            (batch, ids)
        })
        .collect();
    tracing::info!(
        transactions = transactions.len(),
        batches = batches.len(),
        model = %settings.anomaly_model,
        "Running anomaly detection"
    );

    let outcomes = map_ordered(&batches, settings.max_concurrency, |index, (batch, ids)| {
        run_batch(llm, settings, rules, batch, ids).inspect_err(|e| {
            tracing::warn!(batch = index + 1, error = %e, "Anomaly batch failed");
        })
    })?;

    let mut verdicts = Vec::with_capacity(transactions.len());
    for ((_, ids), outcome) in batches.iter().zip(outcomes) {
        match outcome {
            Ok(returned) => verdicts.extend(match_verdicts(ids, returned)),
            Err(e) => {
                let reason = match e {
                    PipelineError::JsonParsing(_) => "Invalid response from LLM",
                    _ => "API request failed",
                };
                verdicts.extend(ids.iter().map(|id| Verdict::error(id, reason)));
            }
        }
    }

    let flagged = verdicts.iter().filter(|v| v.is_anomaly()).count();
    tracing::info!(flagged, total = verdicts.len(), "Anomaly detection complete");
    Ok(verdicts)
}

fn run_batch(
    llm: &dyn LlmClient,
    settings: &PipelineSettings,
    rules: &Value,
    batch: &[Transaction],
    ids: &[String],
) -> Result<Vec<Verdict>, PipelineError> {
    // The model must echo the ids verdicts are matched on, including the
    // positional ones of records that arrived without an id.
    let labelled: Vec<Transaction> = batch
        .iter()
        .zip(ids)
        .map(|(record, id)| {
            let mut record = record.clone();
            record.insert("transaction_id".into(), Value::String(id.clone()));
            record
        })
        .collect();
    let request = ChatRequest::with_system(
        &settings.anomaly_model,
        ANOMALY_SYSTEM_PROMPT,
        build_anomaly_prompt(rules, &labelled),
    )
    .temperature(ANOMALY_TEMPERATURE);
    let response = chat_with_retry(llm, &request, settings.max_retries)?;
    let value = parse_llm_json(&response)?;
    Ok(parse_items_lenient(value_to_list(value, "results")))
}

/// One verdict per id in `ids` order; unknown ids are dropped.
fn match_verdicts(ids: &[String], returned: Vec<Verdict>) -> Vec<Verdict> {
    let mut by_id: HashMap<String, Verdict> = HashMap::new();
    for verdict in returned {
        let key = verdict.transaction_id.trim().to_string();
        by_id.entry(key).or_insert(verdict);
    }

    let unknown = by_id
        .keys()
        .filter(|k| !ids.iter().any(|id| id == *k))
        .count();
    if unknown > 0 {
        tracing::debug!(unknown, "Dropped verdicts for ids not in the batch");
    }

    ids.iter()
        .map(|id| match by_id.get(id.as_str()) {
            Some(v) => Verdict {
                transaction_id: id.clone(),
                ..v.clone()
            },
            None => Verdict::error(id, "No verdict returned"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{LlmError, MockLlmClient};
    use crate::pipeline::types::VerdictStatus;
    use serde_json::json;

    fn settings(batch_size: usize) -> PipelineSettings {
        PipelineSettings {
            batch_size,
            max_retries: 0,
            max_concurrency: 2,
            ..PipelineSettings::default()
        }
    }

    fn tx(id: &str, amount: i64) -> Transaction {
        let mut t = Transaction::new();
        t.insert("transaction_id".into(), json!(id));
        t.insert("Amount".into(), json!(amount));
        t
    }

    /// Flags every transaction whose Amount exceeds 1000, reading the batch
    /// back out of the prompt.
    fn threshold_model() -> MockLlmClient {
        MockLlmClient::with_responder(|req, _| {
            let prompt = req.user_prompt().unwrap_or_default();
            let start = prompt.find("### Transactions to Analyze:").unwrap_or(0);
            let section = &prompt[start..];
            let array_start = section.find('[').unwrap_or(0);
            let array_end = section.find("\n]").map(|i| i + 2).unwrap_or(section.len());
            let batch: Vec<Transaction> =
                serde_json::from_str(&section[array_start..array_end]).unwrap_or_default();
            let results: Vec<Value> = batch
                .iter()
                .map(|t| {
                    if t["Amount"].as_i64().unwrap_or(0) > 1000 {
                        json!({"transaction_id": t["transaction_id"], "status": "ANOMALY",
                               "reasons": ["Amount above limit"]})
                    } else {
                        json!({"transaction_id": t["transaction_id"], "status": "NORMAL"})
                    }
                })
                .collect();
            Ok(json!({ "results": results }).to_string())
        })
    }

    #[test]
    fn verdicts_follow_input_order_across_batches() {
        let txs: Vec<_> = (0..5).map(|i| tx(&format!("T{i}"), i * 600)).collect();
        let llm = threshold_model();
        let verdicts = detect_anomalies(&llm, &settings(2), &json!({}), &txs).unwrap();

        assert_eq!(llm.call_count(), 3);
        let ids: Vec<_> = verdicts.iter().map(|v| v.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["T0", "T1", "T2", "T3", "T4"]);
        let flagged: Vec<_> = verdicts.iter().filter(|v| v.is_anomaly()).map(|v| v.transaction_id.as_str()).collect();
        assert_eq!(flagged, vec!["T2", "T3", "T4"]);
        assert_eq!(verdicts[2].reasons, vec!["Amount above limit"]);
    }

    #[test]
    fn request_uses_anomaly_model_and_zero_temperature() {
        let llm = MockLlmClient::new(r#"[{"transaction_id": "A", "status": "NORMAL"}]"#);
        let s = settings(10);
        detect_anomalies(&llm, &s, &json!({"rules": []}), &[tx("A", 1)]).unwrap();
        let sent = &llm.requests()[0];
        assert_eq!(sent.model, s.anomaly_model);
        assert_eq!(sent.temperature, 0.0);
        assert_eq!(sent.messages[0].content, "You are a financial anomaly detection AI.");
    }

    #[test]
    fn missing_and_unknown_ids_are_reconciled() {
        let llm = MockLlmClient::new(
            r#"[{"transaction_id": "A", "status": "ANOMALY", "reason": "bad country"},
               {"transaction_id": "ZZZ", "status": "ANOMALY"}]"#,
        );
        let verdicts =
            detect_anomalies(&llm, &settings(10), &json!({}), &[tx("A", 1), tx("B", 2)]).unwrap();

        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].status, VerdictStatus::Anomaly);
        assert_eq!(verdicts[0].reasons, vec!["bad country"]);
        assert_eq!(verdicts[1], Verdict::error("B", "No verdict returned"));
    }

    #[test]
    fn failed_batch_yields_error_verdicts() {
        let llm = MockLlmClient::with_responder(|_, i| {
            if i == 0 {
                Err(LlmError::Api {
                    status: 400,
                    body: "nope".into(),
                })
            } else {
                Ok("no json here".into())
            }
        });
        let s = PipelineSettings {
            max_concurrency: 1,
            ..settings(1)
        };
        let verdicts = detect_anomalies(&llm, &s, &json!({}), &[tx("A", 1), tx("B", 2)]).unwrap();
        assert_eq!(verdicts[0], Verdict::error("A", "API request failed"));
        assert_eq!(verdicts[1], Verdict::error("B", "Invalid response from LLM"));
    }

    #[test]
    fn numeric_ids_match_string_ids() {
        let llm = MockLlmClient::new(r#"{"results": [{"transaction_id": 1001, "status": "NORMAL"}]}"#);
        let verdicts = detect_anomalies(&llm, &settings(10), &json!({}), &[tx("1001", 5)]).unwrap();
        assert_eq!(verdicts[0].status, VerdictStatus::Normal);
    }

    #[test]
    fn records_without_id_use_row_position() {
        let mut t = Transaction::new();
        t.insert("Amount".into(), json!(1));
        assert_eq!(record_id(&t, 4), "#5");
        assert_eq!(record_id(&tx("X", 1), 0), "X");
        assert_eq!(record_id(&tx("  X ", 1), 0), "X");
    }

    #[test]
    fn positional_ids_reach_the_prompt_and_match() {
        let mut unnamed = Transaction::new();
        unnamed.insert("Amount".into(), json!(5000));
        let llm = threshold_model();
        let verdicts =
            detect_anomalies(&llm, &settings(10), &json!({}), &[tx(" P1 ", 10), unnamed]).unwrap();

        let prompt = llm.requests()[0].user_prompt().unwrap_or_default().to_string();
        assert!(prompt.contains("\"transaction_id\": \"#2\""));
        assert_eq!(verdicts[0].transaction_id, "P1");
        assert_eq!(verdicts[0].status, VerdictStatus::Normal);
        assert_eq!(verdicts[1].transaction_id, "#2");
        assert!(verdicts[1].is_anomaly());
    }

    #[test]
    fn empty_input_makes_no_calls() {
        let llm = MockLlmClient::new("[]");
        assert!(detect_anomalies(&llm, &settings(10), &json!({}), &[]).unwrap().is_empty());
        assert_eq!(llm.call_count(), 0);
    }
}
