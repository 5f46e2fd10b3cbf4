//! Plain-text extraction from the profile PDF.
//!
//! Pages are read one at a time. A page that fails to parse, or that yields
//! only whitespace, is skipped; the text of every other page is concatenated in
//! page order.

use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

pub type PageError = Box<dyn StdError + Send + Sync>;

/// A paged document that can produce text for each page independently.
pub trait PageSource {
    /// Page numbers in reading order.
    fn page_numbers(&self) -> Vec<u32>;

    fn page_text(&self, page: u32) -> Result<String, PageError>;
}

impl PageSource for lopdf::Document {
    fn page_numbers(&self) -> Vec<u32> {
        self.get_pages().keys().copied().collect()
    }

    fn page_text(&self, page: u32) -> Result<String, PageError> {
        self.extract_text(&[page]).map_err(|err| err.to_string().into())
    }
}

pub fn collect_page_text(source: &impl PageSource) -> String {
    let mut text = String::new();
    for page in source.page_numbers() {
        match source.page_text(page) {
            Ok(page_text) if !page_text.trim().is_empty() => text.push_str(&page_text),
            Ok(_) => debug!(page, "skipping empty page"),
            Err(err) => debug!(page, error = %err, "skipping unparsable page"),
        }
    }
    text
}

#[derive(Debug)]
pub struct DocumentError {
    pub path: PathBuf,
    source: lopdf::Error,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to open PDF {}: {}", self.path.display(), self.source)
    }
}

impl StdError for DocumentError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

/// Opens the PDF at `path` and returns the text of every readable page.
///
/// Only a document that cannot be opened at all is an error.
pub fn extract_pdf_text(path: &Path) -> Result<String, DocumentError> {
    let document = lopdf::Document::load(path).map_err(|source| DocumentError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(collect_page_text(&document))
}
