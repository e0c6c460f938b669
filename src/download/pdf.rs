//! Content sniffing for fetched documents.

use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::debug;

use super::constants::{PDF_MAGIC, PDF_SNIFF_WINDOW};

/// Returns whether the file at `path` starts with the PDF magic bytes.
///
/// Leading ASCII whitespace is tolerated; some servers prepend a newline.
///
/// # Errors
///
/// Returns the IO error if the file cannot be opened or read.
pub async fn sniff_pdf(path: &Path) -> Result<bool, std::io::Error> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = vec![0_u8; PDF_SNIFF_WINDOW];
    let mut filled = 0;
    while filled < head.len() {
        let read = file.read(&mut head[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    head.truncate(filled);
    Ok(looks_like_pdf(&head))
}

fn looks_like_pdf(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(head.len());
    head[start..].starts_with(PDF_MAGIC)
}

/// Deletes a partially written destination, ignoring a file that is already gone.
pub async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => debug!(path = %path.display(), error = %error, "failed to remove partial file"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_pdf_accepts_magic_after_whitespace() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(looks_like_pdf(b"\r\n  %PDF-1.4"));
    }

    #[test]
    fn test_looks_like_pdf_rejects_html_and_empty() {
        assert!(!looks_like_pdf(b"<!DOCTYPE html><html>"));
        assert!(!looks_like_pdf(b""));
        assert!(!looks_like_pdf(b"%PD"));
    }

    #[tokio::test]
    async fn test_sniff_pdf_reads_file_head() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        let html = dir.path().join("b.pdf");
        tokio::fs::write(&pdf, b"%PDF-1.5 body").await.unwrap();
        tokio::fs::write(&html, b"<html>login</html>").await.unwrap();
        assert!(sniff_pdf(&pdf).await.unwrap());
        assert!(!sniff_pdf(&html).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_partial_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.pdf");
        remove_partial(&path).await;
        tokio::fs::write(&path, b"x").await.unwrap();
        remove_partial(&path).await;
        assert!(!path.exists());
    }
}
