//! The conversion collaborator boundary.
//!
//! Everything slow and fallible about turning a document into text lives
//! behind [`Converter`]. The production implementation,
//! [`MarkerCommand`], shells out to the `marker_single` executable; tests
//! substitute fakes with scripted delays and outcomes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::error::ConvertError;
use crate::options::{ConvertOptions, EnhancementCredential};

/// Longest stderr excerpt carried into a job's error message.
const STDERR_TAIL_LIMIT: usize = 500;

/// A request for one conversion.
#[derive(Debug)]
pub struct Conversion<'a> {
    /// Staged input document.
    pub input: &'a Path,
    /// Directory the converter may write into.
    pub output_dir: &'a Path,
    /// Caller options.
    pub options: &'a ConvertOptions,
    /// Enhancement credential, present only when the caller opted in.
    pub credential: Option<&'a EnhancementCredential>,
}

/// Something that can turn a staged document into output text.
#[async_trait]
pub trait Converter: Send + Sync + 'static {
    /// Run one conversion to completion and return the produced text.
    async fn convert(&self, req: Conversion<'_>) -> Result<String, ConvertError>;
}

/// Converter that spawns the `marker_single` command-line tool.
#[derive(Debug, Clone)]
pub struct MarkerCommand {
    program: String,
}

impl MarkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn build_command(&self, req: &Conversion<'_>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(req.input)
            .arg("--output_dir")
            .arg(req.output_dir)
            .arg("--output_format")
            .arg(req.options.output_format.as_arg());

        if let Some(hints) = &req.options.language_hints {
            cmd.arg("--langs").arg(hints.join(","));
        }
        if req.options.paginate {
            cmd.arg("--paginate_output");
        }
        if req.options.strip_inline_formatting {
            cmd.arg("--format_lines");
        }
        if req.options.suppress_embedded_assets {
            cmd.arg("--disable_image_extraction");
        }
        if req.options.reprocess_math {
            cmd.arg("--redo_inline_math");
        }
        if req.options.use_enhancement {
            cmd.arg("--use_llm");
        }

        // The credential travels only in the child's environment, never in
        // argv (argv is world-readable on most systems) and never in the
        // coordinator's own environment.
        if let Some(credential) = req.credential {
            cmd.env("GEMINI_API_KEY", credential.expose());
        }

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Converter for MarkerCommand {
    async fn convert(&self, req: Conversion<'_>) -> Result<String, ConvertError> {
        let mut cmd = self.build_command(&req);
        debug!(program = %self.program, input = %req.input.display(), "spawning converter");

        let output = cmd.output().await.map_err(|source| ConvertError::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Failed {
                status: output
                    .status
                    .code()
                    .map_or_else(|| "killed by signal".to_string(), |c| format!("exit {c}")),
                detail: tail(&stderr, STDERR_TAIL_LIMIT),
            });
        }

        read_output(req.output_dir, req.options.output_format.extension()).await
    }
}

/// Find and read the produced output file anywhere under `output_dir`.
///
/// `marker_single` nests its output in a subdirectory named after the
/// input file, so this walks one directory level at a time.
async fn read_output(output_dir: &Path, extension: &str) -> Result<String, ConvertError> {
    let Some(path) = find_by_extension(output_dir, extension).await else {
        return Err(ConvertError::MissingOutput {
            format: extension.to_string(),
        });
    };
    fs::read_to_string(&path)
        .await
        .map_err(|source| ConvertError::OutputUnreadable { path, source })
}

async fn find_by_extension(root: &Path, extension: &str) -> Option<PathBuf> {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                return Some(path);
            }
        }
    }
    None
}

/// Last `limit` bytes of `text`, trimmed to a char boundary.
fn tail(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - limit;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
