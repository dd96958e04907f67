//! Input resolution: normalise a user-supplied path or URL to a local PDF.
//!
//! ## Why download to a temp file?
//!
//! pdfium opens documents from the file system. Downloading into a `TempDir`
//! gives it a path while guaranteeing cleanup when [`ResolvedInput`] is
//! dropped. Size and `%PDF` magic are checked here, before pdfium sees the
//! file, so callers get a precise error instead of a generic parse failure.

use crate::error::AnalysisError;
use chrono::NaiveDate;
use percent_encoding::percent_decode_str;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A validated local PDF, possibly backed by a temporary download.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    size: u64,
    /// Last path segment of the file or URL, before any decoding.
    source_name: String,
    /// Keeps a downloaded file alive until processing completes.
    _temp_dir: Option<TempDir>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn is_downloaded(&self) -> bool {
        self._temp_dir.is_some()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a validated local PDF.
///
/// URLs are downloaded to a temporary directory; local paths must exist,
/// be readable, fit within `max_file_size` and start with `%PDF`.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    max_file_size: u64,
) -> Result<ResolvedInput, AnalysisError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_file_size).await
    } else {
        resolve_local(input, max_file_size)
    }
}

fn resolve_local(path_str: &str, max_file_size: u64) -> Result<ResolvedInput, AnalysisError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(AnalysisError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AnalysisError::PermissionDenied { path });
        }
        Err(_) => return Err(AnalysisError::FileNotFound { path }),
    };

    let size = file
        .metadata()
        .map_err(|e| AnalysisError::Internal(format!("stat {}: {}", path.display(), e)))?
        .len();
    check_size(&path, size, max_file_size)?;

    let mut magic = [0u8; 4];
    let read = file.read(&mut magic).unwrap_or(0);
    check_magic(&path, &magic[..read])?;

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!("Resolved local PDF: {} ({} bytes)", path.display(), size);
    Ok(ResolvedInput {
        path,
        size,
        source_name,
        _temp_dir: None,
    })
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_file_size: u64,
) -> Result<ResolvedInput, AnalysisError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalysisError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| AnalysisError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    // Reject early when the server announces an oversized body.
    if let Some(announced) = response.content_length() {
        check_size(&file_path, announced, max_file_size)?;
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let size = bytes.len() as u64;
    check_size(&file_path, size, max_file_size)?;
    check_magic(&file_path, &bytes[..bytes.len().min(4)])?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| AnalysisError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", size, file_path.display());

    Ok(ResolvedInput {
        path: file_path,
        size,
        source_name: filename,
        _temp_dir: Some(temp_dir),
    })
}

fn check_size(path: &Path, size: u64, limit: u64) -> Result<(), AnalysisError> {
    if size > limit {
        return Err(AnalysisError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Files shorter than four bytes are left for pdfium to reject as corrupt.
fn check_magic(path: &Path, head: &[u8]) -> Result<(), AnalysisError> {
    if head.len() == 4 && head != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(head);
        return Err(AnalysisError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Last URL path segment when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

/// Human-readable name for a document.
///
/// Uploaded names often arrive percent-encoded. The name is decoded when the
/// decoded bytes are valid UTF-8 and kept raw otherwise. Names shorter than
/// three characters after trimming are replaced by `analysis_YYYY-MM-DD.pdf`.
pub fn display_filename(raw: &str, today: NaiveDate) -> String {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let trimmed = decoded.trim();
    if trimmed.chars().count() < 3 {
        return format!("analysis_{}.pdf", today.format("%Y-%m-%d"));
    }
    trimmed.to_string()
}
