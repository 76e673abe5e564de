//! Prompt templates for every LLM-backed stage.
//!
//! Each stage has a fixed instruction block plus a builder that splices in the
//! document text or JSON payload. Document text is fenced in `<document>` tags.

use serde::Serialize;
use serde_json::Value;

use super::types::{ProfilingRule, Requirement, Transaction};

// ═══════════════════════════════════════════════════════════
// Requirements
// ═══════════════════════════════════════════════════════════

pub fn build_requirements_prompt(regulation_text: &str) -> String {
    format!(
        r#"Extract all regulatory requirements from the following banking regulation text.
For each requirement, identify:
1. The data fields involved
2. The validation rules
3. Any exceptions or special cases
4. The response must be strictly parsable, valid JSON

Format the output as a JSON list where each item has:
- "requirement": description of the requirement
- "fields": list of data fields involved
- "rule": the validation rule
- "exceptions": list of exceptions to the rule (empty list if none)

<document>
{}
</document>

JSON Output:"#,
        fence_document(regulation_text)
    )
}

// ═══════════════════════════════════════════════════════════
// Profiling rules and validation code
// ═══════════════════════════════════════════════════════════

pub fn build_rules_prompt(requirements: &[Requirement]) -> String {
    format!(
        r#"### STRICT INSTRUCTIONS ###
1. Respond ONLY with valid JSON
2. Ensure all strings are properly quoted and escaped
3. Do not include any text outside the JSON structure
4. Ensure all brackets and braces are properly closed

Convert these requirements into data profiling rules. Format as:
{{
    "rules": [
        {{
            "description": "rule description",
            "fields": ["field1", "field2"],
            "validation_logic": "python-like validation code",
            "parameters": {{"param": "default"}}
        }}
    ]
}}

Where a rule restricts values, put the limits in "parameters" using the keys
"allowed_values" (list), "min", "max" or "max_length".

Requirements:
{}"#,
        pretty_json(requirements)
    )
}

pub fn build_validation_code_prompt(rules: &[ProfilingRule]) -> String {
    format!(
        r#"### CODE GENERATION INSTRUCTIONS ###
1. Respond ONLY with the Python code
2. Do not include markdown formatting
3. Ensure all quotes are properly escaped
4. The code must be syntactically valid

Create a validate_transaction function implementing these rules:
{}"#,
        pretty_json(rules)
    )
}

// ═══════════════════════════════════════════════════════════
// Rolling summary
// ═══════════════════════════════════════════════════════════

pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a financial analyst expert. Your task is to extract and summarize key financial rules, \
regulations, policies, and important financial information from the provided text.

Instructions:
1. Focus on extracting rules, policies, thresholds, limits, requirements, and compliance information.
2. Organize the information in a clear, structured manner.
3. Maintain context between different sections of the document.
4. For each rule, include the relevant context that explains its purpose or application.
5. If you encounter numerical values, percentages, or financial thresholds, pay special attention to them.
6. Output should be in Markdown format with clear headings and bullet points.

Extraction is done in chunks. The summary of the previous chunk is provided for continuity.";

/// `chunk_number` is 1-based.
pub fn build_chunk_summary_prompt(chunk_number: usize, chunk: &str, previous: Option<&str>) -> String {
    let context = match previous {
        Some(summary) if !summary.trim().is_empty() => {
            format!("Here is the summary from previous chunks for context:\n{summary}")
        }
        _ => "This is the first chunk of the document.".to_string(),
    };
    format!(
        "Here is chunk {chunk_number} of the document:\n<document>\n{}\n</document>\n\n{context}\n\n\
         Please extract any new financial rules or information from this chunk, \
         integrating it with the previous context if available.",
        fence_document(chunk)
    )
}

pub fn build_consolidation_prompt(full_summary: &str) -> String {
    format!(
        "Here is the complete extracted financial information from all chunks:\n{full_summary}\n\n\
         Please consolidate this into a final, well-organized set of financial rules and policies:\n\
         - Remove any duplicates\n\
         - Organize by topic/category\n\
         - Ensure consistent formatting\n\
         - Add headings and subheadings as needed\n\
         - Include any important context for each rule"
    )
}

// ═══════════════════════════════════════════════════════════
// Anomaly detection
// ═══════════════════════════════════════════════════════════

pub const ANOMALY_SYSTEM_PROMPT: &str = "You are a financial anomaly detection AI.";

pub fn build_anomaly_prompt(rules: &Value, batch: &[Transaction]) -> String {
    format!(
        r#"You are an AI-powered anomaly detection system analyzing financial transactions against compliance rules.

### Rules:
{}

### Transactions to Analyze:
{}

For each transaction, determine if any field violates any rule.
Return only valid JSON in this format:
{{
    "results": [
        {{
            "transaction_id": "<ID>",
            "status": "ANOMALY",
            "reasons": ["<violation description>"]
        }},
        {{
            "transaction_id": "<ID>",
            "status": "NORMAL"
        }}
    ]
}}
Use the transaction_id values exactly as given."#,
        pretty_json(rules),
        pretty_json(batch)
    )
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}

/// Stop document text from closing the `<document>` fence early.
fn fence_document(text: &str) -> String {
    text.replace("</document>", "&lt;/document&gt;")
        .replace("<document>", "&lt;document&gt;")
}
