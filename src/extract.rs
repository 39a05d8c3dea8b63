//! Text extraction for corpus files.
//!
//! `docs add` and the folder sync accept plain-text files and PDFs. PDFs
//! go through `pdf-extract`; everything else must be valid UTF-8 text.
//! Failures come back as errors so callers can skip the file instead of
//! storing garbage.

use anyhow::{Context, Result};
use std::path::Path;

/// Read a file's text content, extracting from PDF when the extension
/// says so.
pub fn read_document(path: &Path) -> Result<String> {
    if is_pdf(path) {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        return pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
            anyhow::anyhow!("Failed to extract PDF text from {}: {}", path.display(), e)
        });
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod testdata {
    /// Minimal valid PDF containing `phrase`, with a correct xref table so
    /// `pdf-extract` can parse it.
    pub fn pdf_with_phrase(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
        let objects = [
            "1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n".to_string(),
            "2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n".to_string(),
            "3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n"
                .to_string(),
            format!(
                "4 0 obj << /Length {} >> stream\n{}endstream endobj\n",
                stream.len(),
                stream
            ),
            "5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n".to_string(),
        ];

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = Vec::new();
        for obj in &objects {
            offsets.push(out.len());
            out.extend_from_slice(obj.as_bytes());
        }

        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for off in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                offsets.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }
}
