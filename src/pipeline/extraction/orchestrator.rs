use std::path::Path;

use super::clean::clean_extracted_text;
use super::pdf::PdfTextExtractor;
use super::table_detect::detect_tables;
use super::tabular::summarize_csv;
use super::types::{
    DocumentFormat, ExtractOptions, ExtractedDocument, ExtractedTable, PageExtraction,
    PdfExtractor,
};
use super::ExtractionError;
use crate::pipeline::concurrency::map_ordered;

/// Turns an uploaded or local document into text (and optionally tables).
/// The PDF backend is injected so tests can run without real PDFs.
pub struct DocumentExtractor {
    pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new(Box::new(PdfTextExtractor))
    }
}

impl DocumentExtractor {
    pub fn new(pdf_extractor: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        Self { pdf_extractor }
    }

    pub fn extract(
        &self,
        path: &Path,
        options: &ExtractOptions,
    ) -> Result<ExtractedDocument, ExtractionError> {
        if !path.is_file() {
            return Err(ExtractionError::FileNotFound(path.to_path_buf()));
        }

        let format = DocumentFormat::from_path(path)?;
        tracing::info!(
            path = %path.display(),
            format = format.as_str(),
            include_tables = options.include_tables,
            "Starting text extraction"
        );

        match format {
            DocumentFormat::Pdf => {
                let bytes = std::fs::read(path)?;
                self.extract_pdf(&bytes, options)
            }
            DocumentFormat::Csv => {
                let bytes = std::fs::read(path)?;
                Ok(ExtractedDocument {
                    text: summarize_csv(&bytes)?,
                    file_type: format.as_str().to_string(),
                    page_count: 1,
                    tables: vec![],
                })
            }
            DocumentFormat::Excel => Err(ExtractionError::UnsupportedFormat(
                "Excel workbooks (export to CSV first)".into(),
            )),
        }
    }

    /// Clean and scan each page on its own worker; page order is preserved.
    pub fn extract_pdf(
        &self,
        bytes: &[u8],
        options: &ExtractOptions,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let mut pages = self.pdf_extractor.extract_pages(bytes)?;
        let page_count = pages.len();
        if options.max_pages > 0 && pages.len() > options.max_pages {
            tracing::warn!(
                page_count,
                max_pages = options.max_pages,
                "PDF exceeds page limit, extra pages ignored"
            );
            pages.truncate(options.max_pages);
        }

        let processed = map_ordered(&pages, options.max_workers, |_, page| {
            process_page(page, options.include_tables)
        })
        .map_err(|_| ExtractionError::WorkerPanicked)?;

        let mut texts = Vec::with_capacity(processed.len());
        let mut tables = Vec::new();
        for (text, page_tables) in processed {
            if !text.is_empty() {
                texts.push(text);
            }
            tables.extend(page_tables);
        }

        let text = texts.join("\n\n");
        if text.trim().is_empty() {
            return Err(ExtractionError::NoTextExtracted);
        }

        tracing::info!(
            page_count,
            chars = text.len(),
            tables = tables.len(),
            "PDF text extracted"
        );

        Ok(ExtractedDocument {
            text,
            file_type: DocumentFormat::Pdf.as_str().to_string(),
            page_count,
            tables,
        })
    }
}

fn process_page(page: &PageExtraction, include_tables: bool) -> (String, Vec<ExtractedTable>) {
    let tables = if include_tables {
        detect_tables(page.page_number, &page.text)
    } else {
        vec![]
    };
    (clean_extracted_text(&page.text), tables)
}

/// Extract with the default PDF backend.
pub fn extract_document(
    path: &Path,
    options: &ExtractOptions,
) -> Result<ExtractedDocument, ExtractionError> {
    DocumentExtractor::default().extract(path, options)
}
