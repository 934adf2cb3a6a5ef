//! Input validation: make sure a path names a readable, non-empty PDF.
//!
//! pdfium reports a missing file, a directory, a text file and a truncated
//! download all as the same opaque load error. Checking the file ourselves
//! first (existence, read permission, size, `%PDF` magic bytes) lets every
//! one of those cases surface as a distinct [`SummarizeError`].

use crate::error::SummarizeError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local PDF path and return it as an owned `PathBuf`.
pub fn validate_pdf_path(path: impl AsRef<Path>) -> Result<PathBuf, SummarizeError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(SummarizeError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SummarizeError::PermissionDenied { path });
        }
        Err(_) => return Err(SummarizeError::FileNotFound { path }),
    };

    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(SummarizeError::EmptyFile { path });
    }

    // Verify PDF magic bytes; short files are padded with zeros.
    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(SummarizeError::PermissionDenied { path });
            }
            Err(e) => {
                return Err(SummarizeError::CorruptPdf {
                    path,
                    detail: e.to_string(),
                })
            }
        }
    }
    if &magic != b"%PDF" {
        return Err(SummarizeError::NotAPdf { path, magic });
    }

    debug!("Validated PDF input: {} ({} bytes)", path.display(), len);
    Ok(path)
}

/// File stem used to name outputs, e.g. `report` for `docs/report.pdf`.
pub fn output_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn missing_file() {
        let err = validate_pdf_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, SummarizeError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_pdf_path(dir.path()).unwrap_err();
        assert!(matches!(err, SummarizeError::FileNotFound { .. }));
    }

    #[test]
    fn empty_file() {
        let f = write_tmp(b"");
        let err = validate_pdf_path(f.path()).unwrap_err();
        assert!(matches!(err, SummarizeError::EmptyFile { .. }));
    }

    #[test]
    fn text_file_is_not_a_pdf() {
        let f = write_tmp(b"hello world");
        match validate_pdf_path(f.path()).unwrap_err() {
            SummarizeError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn short_file_is_padded() {
        let f = write_tmp(b"%P");
        match validate_pdf_path(f.path()).unwrap_err() {
            SummarizeError::NotAPdf { magic, .. } => assert_eq!(magic, [b'%', b'P', 0, 0]),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn pdf_magic_accepted() {
        let f = write_tmp(b"%PDF-1.7\n...");
        assert_eq!(validate_pdf_path(f.path()).unwrap(), f.path());
    }

    #[test]
    fn stem_from_path() {
        assert_eq!(output_stem(Path::new("docs/report.pdf")), "report");
        assert_eq!(output_stem(Path::new("/")), "document");
    }
}
