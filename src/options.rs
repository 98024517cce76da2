//! Caller-supplied conversion options.
//!
//! [`ConvertOptions`] is the immutable snapshot captured at submission time:
//! once a job record is created, later changes to server state can never
//! affect an in-flight conversion. The snapshot is what gets persisted, so
//! the enhancement credential deliberately lives *outside* it — see
//! [`EnhancementCredential`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format requested from the conversion collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown text (default).
    #[default]
    Markdown,
    /// Structured JSON document tree.
    Json,
    /// HTML.
    Html,
}

impl OutputFormat {
    /// File extension the collaborator writes for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
        }
    }

    /// Value passed to the collaborator's `--output_format` flag.
    pub fn as_arg(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            other => Err(format!(
                "unknown output format '{other}' (expected markdown, json, or html)"
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Immutable per-job conversion options, captured at submission.
///
/// Serialised into the persisted job record. Intentionally does NOT carry the
/// enhancement credential: that is passed separately to exactly one runner
/// invocation and discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Requested output format. Default: markdown.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Optional OCR language hints (e.g. `["en", "es"]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hints: Option<Vec<String>>,

    /// Insert page separators in the output.
    #[serde(default)]
    pub paginate: bool,

    /// Re-format extracted lines, stripping inline formatting noise.
    #[serde(default)]
    pub strip_inline_formatting: bool,

    /// Run the LLM enhancement pass. Requires a credential at submission.
    #[serde(default)]
    pub use_enhancement: bool,

    /// Skip extraction of embedded images/assets.
    #[serde(default)]
    pub suppress_embedded_assets: bool,

    /// Re-run inline math recognition.
    #[serde(default)]
    pub reprocess_math: bool,
}

impl ConvertOptions {
    /// Parse comma-separated language hints from a form field.
    ///
    /// Empty segments are dropped; an all-empty string yields `None`.
    pub fn parse_language_hints(raw: &str) -> Option<Vec<String>> {
        let hints: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if hints.is_empty() {
            None
        } else {
            Some(hints)
        }
    }
}

/// Parse a boolean form field the way the upload clients send them.
///
/// Accepts `true`, `1`, `yes`, `on` (case-insensitive); everything else,
/// including the empty string, is false.
pub fn parse_form_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// A caller-supplied API credential for the enhancement pass.
///
/// Wrapped so it can never leak by accident: no `Serialize`, and `Debug`
/// prints a redaction marker. The inner value is reachable only through
/// [`EnhancementCredential::expose`], which the runner calls once per
/// conversion.
#[derive(Clone)]
pub struct EnhancementCredential(String);

impl EnhancementCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Access the secret value. Call sites should hand it straight to the
    /// collaborator invocation and drop it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EnhancementCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnhancementCredential(****)")
    }
}
