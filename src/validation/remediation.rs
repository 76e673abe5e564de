use serde::Serialize;

use super::validator::ValidationResult;

pub const NO_ACTION: &str = "No action required";

/// Suggested follow-up for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationAction {
    pub transaction_id: String,
    pub issues: Vec<String>,
    pub actions: Vec<String>,
    pub documentation_required: bool,
}

/// Keyword-driven actions for each violation, deduplicated in order.
pub fn remediate(result: &ValidationResult) -> RemediationAction {
    let mut actions: Vec<String> = Vec::new();
    let mut documentation_required = false;

    let mut push = |action: String, needs_docs: bool| {
        documentation_required |= needs_docs;
        if !actions.contains(&action) {
            actions.push(action);
        }
    };

    for issue in &result.violations {
        let lower = issue.to_lowercase();
        if lower.contains("missing") {
            push("Provide missing field data".into(), true);
        }
        if lower.contains("invalid") {
            push(format!("Correct {} value", invalid_field(issue)), true);
        }
        if lower.contains("anomal") {
            push("Review for potential data issues".into(), true);
        }
        if issue.contains("Amount") {
            push("Verify amount with source documentation".into(), true);
        }
        if issue.contains("Balance") {
            push("Check account type for overdraft authorization".into(), false);
        }
    }

    if actions.is_empty() {
        actions.push(NO_ACTION.to_string());
    }

    RemediationAction {
        transaction_id: result.transaction_id.clone(),
        issues: result.violations.clone(),
        actions,
        documentation_required,
    }
}

/// Field named by an `Invalid <field>: <reason>` message.
fn invalid_field(issue: &str) -> &str {
    issue
        .strip_prefix("Invalid ")
        .and_then(|rest| rest.split_once(':'))
        .map(|(field, _)| field.trim())
        .filter(|field| !field.is_empty())
        .unwrap_or("field")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(violations: &[&str]) -> ValidationResult {
        ValidationResult {
            transaction_id: "T9".into(),
            fields_checked: vec![],
            violations: violations.iter().map(|v| v.to_string()).collect(),
            anomaly_score: if violations.is_empty() { -1.0 } else { 1.0 },
            statistical_outlier: false,
            llm_verdict: None,
        }
    }

    #[test]
    fn clean_result_needs_nothing() {
        let action = remediate(&result(&[]));
        assert_eq!(action.actions, vec![NO_ACTION]);
        assert!(!action.documentation_required);
        assert_eq!(action.transaction_id, "T9");
    }

    #[test]
    fn keywords_map_to_actions() {
        let action = remediate(&result(&[
            "Missing required field: Country",
            "Invalid Amount: must be non-negative",
            "Missing required field: Currency",
        ]));
        assert_eq!(
            action.actions,
            vec![
                "Provide missing field data",
                "Correct Amount value",
                "Verify amount with source documentation",
            ]
        );
        assert!(action.documentation_required);
        assert_eq!(action.issues.len(), 3);
    }

    #[test]
    fn balance_alone_needs_no_documents() {
        let action = remediate(&result(&["Account_Balance below zero"]));
        assert_eq!(
            action.actions,
            vec!["Check account type for overdraft authorization"]
        );
        assert!(!action.documentation_required);
    }

    #[test]
    fn anomalies_ask_for_review() {
        let action = remediate(&result(&["Statistical anomaly detected"]));
        assert_eq!(action.actions, vec!["Review for potential data issues"]);
    }
}
