use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Input document kinds recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Csv,
    /// Recognised so callers get a clear refusal; never parsed.
    Excel,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "csv" => Ok(Self::Csv),
            "xlsx" | "xls" => Ok(Self::Excel),
            "" => Err(ExtractionError::UnsupportedFormat("(no extension)".into())),
            other => Err(ExtractionError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
            Self::Excel => "excel",
        }
    }
}

/// Raw text of one PDF page, before cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
}

/// A run of tabular lines found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub page_number: usize,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// Compact single-line rendering: `|` between cells, ` ; ` between rows.
    pub fn render(&self) -> String {
        let body = self
            .rows
            .iter()
            .map(|row| row.join("|"))
            .collect::<Vec<_>>()
            .join(" ; ");
        format!("**Table from Page {}:**\n{}", self.page_number, body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub file_type: String,
    pub page_count: usize,
    #[serde(default)]
    pub tables: Vec<ExtractedTable>,
}

impl ExtractedDocument {
    /// Body text followed by the rendered tables, as fed to rule extraction.
    pub fn text_with_tables(&self) -> String {
        format!(
            "{}\n\n{}",
            self.text.trim(),
            super::table_detect::render_tables(&self.tables)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub include_tables: bool,
    /// Pages beyond this are ignored; 0 means no limit.
    pub max_pages: usize,
    pub max_workers: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_tables: false,
            max_pages: 50,
            max_workers: 4,
        }
    }
}

/// PDF text extraction abstraction
pub trait PdfExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("FINRA.PDF")).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("loans.csv")).unwrap(),
            DocumentFormat::Csv
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("book.xlsx")).unwrap(),
            DocumentFormat::Excel
        );
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = DocumentFormat::from_path(Path::new("notes.docx")).unwrap_err();
        assert!(err.to_string().contains(".docx"));
        assert!(DocumentFormat::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn table_render_format() {
        let table = ExtractedTable {
            page_number: 3,
            rows: vec![
                vec!["Field".into(), "Format".into()],
                vec!["Amount".into(), "numeric".into()],
            ],
        };
        assert_eq!(
            table.render(),
            "**Table from Page 3:**\nField|Format ; Amount|numeric"
        );
    }

    #[test]
    fn text_with_tables_notes_absence() {
        let doc = ExtractedDocument {
            text: "Body".into(),
            file_type: "pdf".into(),
            page_count: 1,
            tables: vec![],
        };
        assert_eq!(doc.text_with_tables(), "Body\n\nNo relevant tables found.");
    }
}
