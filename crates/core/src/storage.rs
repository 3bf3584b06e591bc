//! Per-user storage namespace for uploads and generated variations.
//!
//! Layout:
//!
//! ```text
//! <uploads_root>/<user_id>/<file>
//! <variations_root>/<user_id>/<job>_<file>
//! ```
//!
//! Directories are created lazily and never removed by this crate.

use std::io;
use std::path::{Path, PathBuf};

use crate::types::DbId;

/// Roots of the upload and variation trees.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    uploads_root: PathBuf,
    variations_root: PathBuf,
}

impl StorageLayout {
    pub fn new(uploads_root: impl Into<PathBuf>, variations_root: impl Into<PathBuf>) -> Self {
        Self {
            uploads_root: uploads_root.into(),
            variations_root: variations_root.into(),
        }
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    pub fn variations_root(&self) -> &Path {
        &self.variations_root
    }

    pub fn user_upload_dir(&self, user_id: DbId) -> PathBuf {
        self.uploads_root.join(user_id.to_string())
    }

    pub fn user_variation_dir(&self, user_id: DbId) -> PathBuf {
        self.variations_root.join(user_id.to_string())
    }

    /// Where an uploaded file is stored. `filename` must already be sanitised.
    pub fn upload_path(&self, user_id: DbId, filename: &str) -> PathBuf {
        self.user_upload_dir(user_id).join(filename)
    }

    /// Output path of repetition `job` (1-based) for `filename`.
    pub fn variation_path(&self, user_id: DbId, job: u32, filename: &str) -> PathBuf {
        self.user_variation_dir(user_id)
            .join(format!("{job}_{filename}"))
    }

    /// Create the user's upload and variation directories if absent.
    ///
    /// Idempotent; concurrent callers for the same user are safe.
    pub async fn ensure_user_dirs(&self, user_id: DbId) -> io::Result<()> {
        tokio::fs::create_dir_all(self.user_upload_dir(user_id)).await?;
        tokio::fs::create_dir_all(self.user_variation_dir(user_id)).await?;
        Ok(())
    }
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory components are dropped, whitespace becomes `_`, and anything
/// other than ASCII alphanumerics, `.`, `-` and `_` is removed. Leading dots
/// are stripped so the result can never be hidden or `..`. Returns `None`
/// when nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);

    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.').trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variation_path_prefixes_job_index() {
        let layout = StorageLayout::new("uploads", "variations");
        assert_eq!(
            layout.variation_path(7, 3, "song.mid"),
            PathBuf::from("variations/7/3_song.mid")
        );
        assert_eq!(
            layout.upload_path(7, "song.mid"),
            PathBuf::from("uploads/7/song.mid")
        );
    }

    #[tokio::test]
    async fn ensure_user_dirs_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(root.path().join("up"), root.path().join("var"));

        layout.ensure_user_dirs(42).await.unwrap();
        layout.ensure_user_dirs(42).await.unwrap();

        assert!(layout.user_upload_dir(42).is_dir());
        assert!(layout.user_variation_dir(42).is_dir());
    }

    #[test]
    fn sanitize_strips_directories_and_specials() {
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\music\\my song.mid").as_deref(), Some("my_song.mid"));
        assert_eq!(sanitize_filename("tune (v2).midi").as_deref(), Some("tune_v2.midi"));
        assert_eq!(sanitize_filename(".hidden.mid").as_deref(), Some("hidden.mid"));
    }

    #[test]
    fn sanitize_rejects_empty_results() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("???"), None);
    }
}
