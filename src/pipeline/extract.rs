//! Text extraction: pull page text and metadata out of a PDF via pdfium.
//!
//! pdfium is a C++ library with thread-local state, so every call runs
//! inside `tokio::task::spawn_blocking` and builds its own `Pdfium`
//! instance rather than sharing one across tasks.

use crate::document::{Document, DocumentMetadata};
use crate::error::SummarizeError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bind to a pdfium shared library.
///
/// Searches, in order:
/// 1. `PDFIUM_LIB_PATH` (the library file or its directory)
/// 2. the current directory
/// 3. system library paths
pub fn bind_pdfium() -> Result<Pdfium, SummarizeError> {
    let local = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(p) => {
            let p = PathBuf::from(p);
            if p.is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&p))
            } else {
                p
            }
        }
        None => PathBuf::from(Pdfium::pdfium_platform_library_name_at_path("./")),
    };

    let bindings = Pdfium::bind_to_library(&local)
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| SummarizeError::PdfiumBindingFailed(format!("{:?}", e)))?;

    debug!("Bound pdfium (tried {} first)", local.display());
    Ok(Pdfium::new(bindings))
}

/// Extract every page's text plus document metadata.
///
/// # Errors
/// * [`SummarizeError::PasswordRequired`] / [`SummarizeError::WrongPassword`]
///   for encrypted files.
/// * [`SummarizeError::CorruptPdf`] when pdfium cannot parse the file.
/// * [`SummarizeError::NoExtractableText`] when no page has a text layer.
pub async fn extract_document(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Document, SummarizeError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    let (pages, metadata) =
        tokio::task::spawn_blocking(move || extract_blocking(&path, pwd.as_deref()))
            .await
            .map_err(|e| SummarizeError::Internal(format!("Extraction task panicked: {}", e)))??;

    let doc = Document::from_pages(pages)
        .with_metadata(metadata)
        .with_source(pdf_path);

    if doc.is_blank() {
        return Err(SummarizeError::NoExtractableText {
            path: pdf_path.to_path_buf(),
            pages: doc.page_count(),
        });
    }

    info!(
        "Extracted {} chars from {} pages, {} sections detected",
        doc.char_len(),
        doc.page_count(),
        doc.sections.len()
    );
    Ok(doc)
}

/// Blocking implementation of text extraction.
fn extract_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<(Vec<String>, DocumentMetadata), SummarizeError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let metadata = read_metadata(&document);

    let mut pages = Vec::with_capacity(metadata.page_count);
    for (idx, page) in document.pages().iter().enumerate() {
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("Page {}: no text layer ({:?})", idx + 1, e);
                String::new()
            }
        };
        debug!("Page {}: {} chars", idx + 1, text.chars().count());
        pages.push(text);
    }

    Ok((pages, metadata))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, SummarizeError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                SummarizeError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                SummarizeError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            SummarizeError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}
