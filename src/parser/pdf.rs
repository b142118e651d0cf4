//! PDF text extraction
//!
//! Uses `pdf-extract`, which separates pages with form-feed characters.
//! Pages are re-joined with explicit page-boundary markers.

use crate::error::{NotetionError, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};

const PDF_MAGIC: &[u8] = b"%PDF";

pub(super) fn extract(raw: &[u8]) -> Result<String> {
    if !raw.starts_with(PDF_MAGIC) {
        return Err(NotetionError::UnsupportedContent(
            "Document does not start with a PDF header".to_string(),
        )
        .into());
    }

    // pdf-extract panics on some malformed documents
    let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(raw)))
        .map_err(|_| {
            NotetionError::UnsupportedContent("PDF extraction aborted on corrupt document".into())
        })?
        .map_err(|e| {
            tracing::warn!("PDF extraction failed: {}", e);
            NotetionError::UnsupportedContent(format!("PDF extraction failed: {}", e))
        })?;

    let text = join_pages(&extracted);
    if text.is_empty() {
        return Err(NotetionError::UnsupportedContent(
            "PDF has no extractable text (image-only pages?)".to_string(),
        )
        .into());
    }
    Ok(text)
}

/// Joins form-feed separated page text with `--- Page N ---` markers
///
/// Pages without any text are skipped, but page numbers keep counting so
/// the markers match the physical pages. Returns an empty string when no
/// page has text.
///
/// # Examples
///
/// ```
/// use notetion::parser::join_pages;
///
/// let joined = join_pages("intro\x0c\x0cconclusion");
/// assert_eq!(joined, "--- Page 1 ---\nintro\n\n--- Page 3 ---\nconclusion");
/// ```
pub fn join_pages(extracted: &str) -> String {
    extracted
        .split('\x0C')
        .enumerate()
        .filter_map(|(idx, page)| {
            let page = page.trim();
            if page.is_empty() {
                None
            } else {
                Some(format!("--- Page {} ---\n{}", idx + 1, page))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_pages_single_page_without_feed() {
        assert_eq!(join_pages("  only page \n"), "--- Page 1 ---\nonly page");
    }

    #[test]
    fn test_join_pages_all_blank() {
        assert_eq!(join_pages("\x0c \x0c\n"), "");
    }

    #[test]
    fn test_extract_rejects_missing_header() {
        let err = extract(b"plain text pretending").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NotetionError>(),
            Some(NotetionError::UnsupportedContent(_))
        ));
    }
}
