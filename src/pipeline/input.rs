//! Input resolution: load a user-supplied path or URL as PDF bytes.
//!
//! Text extraction works on an in-memory buffer, so both local files and
//! downloads end up as a [`LoadedDocument`]. The `%PDF` magic bytes and the
//! size limit are checked here so later stages never see a non-PDF.

use crate::error::PitchMatchError;
use std::path::PathBuf;
use tracing::{debug, info};

/// A document ready for text extraction.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Path or URL the bytes came from, for log and error messages.
    pub source_name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// URLs are downloaded with `timeout_secs`; local paths are read from disk.
/// Reading stops as soon as `max_bytes` is exceeded, and the result is then
/// checked for the PDF magic.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<LoadedDocument, PitchMatchError> {
    if input.trim().is_empty() {
        return Err(PitchMatchError::InvalidInput {
            input: input.to_string(),
        });
    }
    let doc = if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await?
    } else {
        read_local(input, max_bytes).await?
    };
    validate_document(&doc, max_bytes)?;
    Ok(doc)
}

/// Check size and PDF magic bytes of an already loaded document.
pub fn validate_document(doc: &LoadedDocument, max_bytes: u64) -> Result<(), PitchMatchError> {
    let size = doc.bytes.len() as u64;
    if size > max_bytes {
        return Err(PitchMatchError::FileTooLarge {
            source_name: doc.source_name.clone(),
            size,
            limit: max_bytes,
        });
    }
    if !doc.bytes.starts_with(b"%PDF") {
        let mut magic = [0u8; 4];
        let n = doc.bytes.len().min(4);
        magic[..n].copy_from_slice(&doc.bytes[..n]);
        return Err(PitchMatchError::NotAPdf {
            source_name: doc.source_name.clone(),
            magic,
        });
    }
    Ok(())
}

fn too_large(source_name: &str, size: u64, limit: u64) -> PitchMatchError {
    PitchMatchError::FileTooLarge {
        source_name: source_name.to_string(),
        size,
        limit,
    }
}

async fn read_local(path_str: &str, max_bytes: u64) -> Result<LoadedDocument, PitchMatchError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(PitchMatchError::FileNotFound { path });
    }
    if let Ok(meta) = tokio::fs::metadata(&path).await {
        if meta.len() > max_bytes {
            return Err(too_large(path_str, meta.len(), max_bytes));
        }
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PitchMatchError::PermissionDenied { path });
        }
        Err(_) => return Err(PitchMatchError::FileNotFound { path }),
    };

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedDocument {
        source_name: path.display().to_string(),
        bytes,
    })
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<LoadedDocument, PitchMatchError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PitchMatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let mut response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PitchMatchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PitchMatchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PitchMatchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length().filter(|&len| len > max_bytes) {
        return Err(too_large(url, len, max_bytes));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| PitchMatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
    {
        bytes.extend_from_slice(&chunk);
        if bytes.len() as u64 > max_bytes {
            return Err(too_large(url, bytes.len() as u64, max_bytes));
        }
    }

    info!("Downloaded {} bytes", bytes.len());
    Ok(LoadedDocument {
        source_name: url.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/deck.pdf"));
        assert!(is_url("http://example.com/deck.pdf"));
        assert!(!is_url("/tmp/deck.pdf"));
        assert!(!is_url("deck.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn rejects_non_pdf_magic() {
        let doc = LoadedDocument {
            source_name: "notes.txt".into(),
            bytes: b"hello world".to_vec(),
        };
        let err = validate_document(&doc, 1024).unwrap_err();
        assert!(matches!(err, PitchMatchError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn rejects_oversized() {
        let doc = LoadedDocument {
            source_name: "deck.pdf".into(),
            bytes: b"%PDF-1.7 padding".to_vec(),
        };
        let err = validate_document(&doc, 8).unwrap_err();
        assert!(matches!(err, PitchMatchError::FileTooLarge { size: 16, limit: 8, .. }));
    }

    #[test]
    fn rejects_too_short_for_magic() {
        for bytes in [&b""[..], b"%P", b"%PD"] {
            let doc = LoadedDocument {
                source_name: "stub.pdf".into(),
                bytes: bytes.to_vec(),
            };
            let err = validate_document(&doc, 1024).unwrap_err();
            assert!(matches!(err, PitchMatchError::NotAPdf { .. }), "{bytes:?}");
        }
    }

    #[tokio::test]
    async fn oversized_local_file_is_rejected_before_reading() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.4\n").unwrap();
        tmp.write_all(&[b' '; 64]).unwrap();
        let path = tmp.path().to_string_lossy().to_string();

        let err = resolve_input(&path, 5, 16).await.unwrap_err();
        assert!(matches!(err, PitchMatchError::FileTooLarge { size: 73, limit: 16, .. }));
    }

    #[tokio::test]
    async fn download_stops_past_the_limit() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            // Chunked, so no Content-Length is announced up front.
            let body = format!("%PDF-1.4 {}", "x".repeat(200));
            let reply = format!(
                "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n\
                 {:x}\r\n{body}\r\n0\r\n\r\n",
                body.len()
            );
            let _ = socket.write_all(reply.as_bytes()).await;
        });

        let url = format!("http://{addr}/deck.pdf");
        let err = resolve_input(&url, 5, 64).await.unwrap_err();
        assert!(matches!(err, PitchMatchError::FileTooLarge { limit: 64, .. }), "{err}");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, PitchMatchError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5, 1024).await.unwrap_err();
        assert!(matches!(err, PitchMatchError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn reads_local_pdf_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.4\n%%EOF").unwrap();
        let path = tmp.path().to_string_lossy().to_string();

        let doc = resolve_input(&path, 5, 1024).await.unwrap();
        assert!(doc.bytes.starts_with(b"%PDF"));
        assert_eq!(doc.source_name, path);
    }
}
