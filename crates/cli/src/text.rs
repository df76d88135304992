//! Document text acquisition: PDFs through `pdftotext`, anything else read
//! as already-extracted text. Pages are separated by form feeds either way.

use std::path::Path;
use std::process::Command;

use comparables_recon::SourceDocument;
use log::{debug, warn};

use crate::exit_codes::EXIT_IO;
use crate::CliError;

const PAGE_BREAK: char = '\x0c';

/// Load one document as per-page text, named by its file name.
pub fn load_document(path: &Path) -> Result<SourceDocument, CliError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    let text = if is_pdf {
        run_pdftotext(path)?
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let pages = split_pages(&text);
    if pages.iter().all(|p| p.trim().is_empty()) {
        warn!("{name}: no text layer (scanned document?)");
    }
    debug!("{name}: {} page(s)", pages.len());
    Ok(SourceDocument::new(name, pages))
}

pub fn load_documents(paths: &[std::path::PathBuf]) -> Result<Vec<SourceDocument>, CliError> {
    paths.iter().map(|p| load_document(p)).collect()
}

/// Split on form feeds. `pdftotext` ends every page with one, so a trailing
/// blank page is dropped.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Run `pdftotext -layout <file> -` and capture stdout.
fn run_pdftotext(file: &Path) -> Result<String, CliError> {
    which::which("pdftotext").map_err(|_| CliError {
        code: EXIT_IO,
        message: "pdftotext not installed (poppler-utils)".to_string(),
        hint: Some("Install with: apt install poppler-utils / brew install poppler".to_string()),
    })?;

    let file_str = file
        .to_str()
        .ok_or_else(|| CliError::args(format!("invalid file path: {}", file.display())))?;

    let output = Command::new("pdftotext")
        .args(["-layout", file_str, "-"])
        .output()
        .map_err(|e| CliError::io(format!("failed to run pdftotext: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CliError::io(format!(
            "pdftotext failed on {} (exit {}): {}",
            file.display(),
            output.status.code().unwrap_or(-1),
            stderr.trim(),
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_form_feed_dropped() {
        assert_eq!(split_pages("a\x0cb\x0c"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn single_page_kept_even_if_blank() {
        assert_eq!(split_pages(""), vec![String::new()]);
    }

    #[test]
    fn missing_text_file_is_io_error() {
        let err = load_document(Path::new("/nonexistent/listing.txt")).unwrap_err();
        assert_eq!(err.code, EXIT_IO);
    }
}
