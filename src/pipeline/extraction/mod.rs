pub mod clean;
pub mod orchestrator;
pub mod pdf;
pub mod table_detect;
pub mod tabular;
pub mod types;

pub use clean::*;
pub use orchestrator::*;
pub use pdf::*;
pub use table_detect::*;
pub use tabular::*;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("No text could be extracted - document may be scanned/image-based")]
    NoTextExtracted,

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Page worker panicked")]
    WorkerPanicked,
}
