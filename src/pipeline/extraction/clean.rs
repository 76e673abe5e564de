use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Page \d+ of \d+").unwrap());

/// Normalize text pulled out of a PDF page.
///
/// Whitespace runs (newlines and form feeds included) collapse to one space,
/// `Page N of M` footers are removed and stray control characters dropped.
pub fn clean_extracted_text(raw: &str) -> String {
    let printable: String = raw
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    let collapsed = WHITESPACE.replace_all(&printable, " ");
    let unmarked = PAGE_MARKER.replace_all(collapsed.trim(), "");
    WHITESPACE.replace_all(unmarked.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            clean_extracted_text("Loans   over\n\n$10,000\tmust\r\nbe reported"),
            "Loans over $10,000 must be reported"
        );
    }

    #[test]
    fn removes_page_markers() {
        let raw = "Section 4210 Page 3 of 12 Margin Requirements";
        assert_eq!(
            clean_extracted_text(raw),
            "Section 4210 Margin Requirements"
        );
    }

    #[test]
    fn strips_form_feeds_and_controls() {
        let raw = "Rule\x0c 3110\x00 Supervision\x07";
        let clean = clean_extracted_text(raw);
        assert_eq!(clean, "Rule 3110 Supervision");
    }

    #[test]
    fn blank_input_cleans_to_empty() {
        assert_eq!(clean_extracted_text(" \n\x0c\t "), "");
    }
}
