//! Error types for the md2pdf library.
//!
//! Every failure in the conversion lifecycle is a [`Md2PdfError`]. The
//! variants line up with how the HTTP layer answers a client:
//!
//! * **Validation**: the request itself is unusable (no files, malformed
//!   configuration JSON). Reported before any workspace is created.
//! * **Io / Conversion / Timeout / ConverterUnavailable**: something went
//!   wrong after the workspace was allocated. The workspace is always torn
//!   down before the error reaches the caller.
//! * **NotFound**: an artifact lookup missed. Never a server fault.
//!
//! Nothing in the pipeline is retried; each variant is terminal for the
//! request that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The request was rejected before any work started.
    #[error("Invalid request: {0}")]
    Validation(String),

    // ── Workspace / filesystem errors ────────────────────────────────────
    /// A filesystem operation failed while preparing or collecting a conversion.
    #[error("{context} '{path}': {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The external converter ran but did not produce a usable document.
    #[error("Conversion failed ({status}): {diagnostics}")]
    Conversion { status: String, diagnostics: String },

    /// The converter did not finish within the configured bound and was killed.
    #[error("Conversion timed out after {secs}s; the converter process was terminated")]
    Timeout { secs: u64 },

    /// The converter could not be started at all.
    #[error("Converter '{program}' could not be started: {reason}\nIs it installed and on PATH?")]
    ConverterUnavailable { program: String, reason: String },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// No artifact is stored under the given identifier.
    #[error("Artifact '{id}' not found")]
    NotFound { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// Wrap an I/O error with the operation and path that produced it.
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Md2PdfError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Md2PdfError::Validation(_) | Md2PdfError::NotFound { .. }
        )
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Md2PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_display_carries_diagnostics() {
        let e = Md2PdfError::Conversion {
            status: "exit status: 43".into(),
            diagnostics: "Error producing PDF.\n! Undefined control sequence.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit status: 43"), "got: {msg}");
        assert!(msg.contains("Undefined control sequence"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = Md2PdfError::Timeout { secs: 300 };
        assert!(e.to_string().contains("300s"));
    }

    #[test]
    fn io_display_names_path_and_context() {
        let e = Md2PdfError::io(
            "Failed to write input file",
            "/tmp/ws/docs/intro.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = e.to_string();
        assert!(msg.contains("Failed to write input file"));
        assert!(msg.contains("intro.md"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(Md2PdfError::Validation("No files provided".into()).is_client_error());
        assert!(Md2PdfError::NotFound { id: "x".into() }.is_client_error());
        assert!(!Md2PdfError::Timeout { secs: 1 }.is_client_error());
        assert!(!Md2PdfError::Internal("boom".into()).is_client_error());
    }
}
