//! Per-job disk layout.
//!
//! Every job owns a directory tree under the coordinator's data dir:
//!
//! ```text
//! <data_dir>/uploads/<id>/<sanitized filename>   the submitted document
//! <data_dir>/outputs/<id>/...                    whatever the converter emits
//! ```
//!
//! Keying by job id means two uploads with the same filename never collide,
//! and cleanup is a pair of `remove_dir_all` calls.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

/// Handle on one job's upload and output directories.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    input_path: PathBuf,
}

impl JobWorkspace {
    /// Lay out directories for `id` and stage `payload` as the input file.
    pub async fn stage(
        data_dir: &Path,
        id: Uuid,
        filename: &str,
        payload: &[u8],
    ) -> io::Result<Self> {
        let upload_dir = data_dir.join("uploads").join(id.to_string());
        let output_dir = data_dir.join("outputs").join(id.to_string());
        fs::create_dir_all(&upload_dir).await?;
        fs::create_dir_all(&output_dir).await?;

        let input_path = upload_dir.join(sanitize_filename(filename));
        fs::write(&input_path, payload).await?;

        Ok(Self {
            upload_dir,
            output_dir,
            input_path,
        })
    }

    /// Reconstruct the handle for an existing job (cleanup paths).
    pub fn locate(data_dir: &Path, id: Uuid, input_ref: &Path) -> Self {
        Self {
            upload_dir: data_dir.join("uploads").join(id.to_string()),
            output_dir: data_dir.join("outputs").join(id.to_string()),
            input_path: input_ref.to_path_buf(),
        }
    }

    /// Path of the staged input document.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Directory the converter writes into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Remove both directories. Absent directories are fine; callers run
    /// this from cleanup paths that may race each other.
    pub async fn remove(&self) -> io::Result<()> {
        for dir in [&self.upload_dir, &self.output_dir] {
            match fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Strips any path components, then drops everything but alphanumerics,
/// `.`, `-`, and `_`. An empty survivor becomes `upload.pdf`.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_filename("C:\\docs\\q3 report.pdf"), "q3report.pdf");
        assert_eq!(sanitize_filename("...."), "upload.pdf");
        assert_eq!(sanitize_filename(""), "upload.pdf");
    }

    #[tokio::test]
    async fn stage_writes_input_and_remove_cleans_up() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let ws = JobWorkspace::stage(dir.path(), id, "doc.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        assert_eq!(fs::read(ws.input_path()).await.unwrap(), b"%PDF-1.4");
        assert!(ws.output_dir().is_dir());

        ws.remove().await.unwrap();
        assert!(!ws.input_path().exists());
        assert!(!ws.output_dir().exists());
        // removing again is a no-op
        ws.remove().await.unwrap();
    }
}
