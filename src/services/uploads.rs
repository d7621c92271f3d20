//! Cover image storage on the local filesystem

use std::path::{Path, PathBuf};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::{
    config::UploadsConfig,
    error::{AppError, AppResult},
};

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));

const COVERS_DIR: &str = "covers";

/// Make a client-supplied filename safe to store.
///
/// Directories are dropped, the stem is NFKD-normalized and reduced to
/// `[a-z0-9_.-]` with single dashes, and the extension is lower-cased.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let path = Path::new(base);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| UNSAFE_CHARS.replace_all(e, "").to_lowercase())
        .filter(|e| !e.is_empty());
    let stem = match ext {
        Some(_) => path.file_stem().and_then(|s| s.to_str()).unwrap_or(base),
        None => base,
    };

    let normalized: String = stem.nfkd().collect();
    let replaced = UNSAFE_CHARS.replace_all(&normalized, "-");
    let collapsed = DASH_RUNS.replace_all(&replaced, "-");
    let mut name = collapsed.trim_matches('-').to_lowercase();
    if name.is_empty() {
        name = "file".to_string();
    }

    match ext {
        Some(ext) => format!("{}.{}", name, ext),
        None => name,
    }
}

#[derive(Debug, Clone)]
pub struct CoverStorage {
    root: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl CoverStorage {
    pub fn new(config: &UploadsConfig) -> Self {
        Self {
            root: PathBuf::from(&config.dir),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
            max_bytes: config.max_file_bytes,
        }
    }

    /// Store an uploaded cover and return its public URL
    pub async fn store(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<String> {
        if !content_type.is_some_and(|ct| ct.starts_with("image/")) {
            return Err(AppError::Validation("Only image files are allowed".to_string()));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the {} bytes limit",
                self.max_bytes
            )));
        }

        let dir = self.root.join(COVERS_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot create upload directory: {}", e)))?;

        let stored_name = format!("{}-{}", Utc::now().timestamp_millis(), sanitize_filename(filename));
        tokio::fs::write(dir.join(&stored_name), bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot write uploaded file: {}", e)))?;

        tracing::info!("Stored cover image {}", stored_name);
        Ok(format!("{}/{}/{}", self.public_prefix, COVERS_DIR, stored_name))
    }
}
