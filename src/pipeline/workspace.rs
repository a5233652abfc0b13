//! Workspace management: one private directory tree per conversion.
//!
//! ## Layout
//!
//! ```text
//! <workspace_root>/<uuid>/
//!   ├─ docs/           uploaded Markdown, sanitised names
//!   ├─ output/         where the converter writes the PDF
//!   ├─ pandoc.yaml     defaults document
//!   └─ eisvogel.yaml   metadata document
//! ```
//!
//! The directory is held by a [`TempDir`], so it is removed when the
//! [`Workspace`] is dropped even if the request future is cancelled or a
//! later stage panics. [`Workspace::destroy`] is the explicit, logged path
//! used on normal completion; it consumes the handle so it cannot run twice.

use crate::error::Md2PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// Subdirectory holding the uploaded sources.
pub const DOCS_DIR: &str = "docs";
/// Subdirectory the converter writes into.
pub const OUTPUT_DIR: &str = "output";
/// File name of the defaults document.
pub const DEFAULTS_FILE: &str = "pandoc.yaml";
/// File name of the metadata document.
pub const METADATA_FILE: &str = "eisvogel.yaml";

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Path separators never survive, so the result is always a single path
/// component. Names that would still resolve to the directory itself or its
/// parent (`""`, `"."`, `".."`) become `"_"`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = RE_UNSAFE_CHARS.replace_all(name, "_").into_owned();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// An exclusively-owned per-request directory tree.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    dir: TempDir,
}

impl Workspace {
    /// Allocate a fresh workspace under `root`, creating `root` if needed.
    pub async fn create(root: &Path) -> Result<Self, Md2PdfError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| Md2PdfError::io("Failed to create workspace root", root, e))?;

        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&id.to_string())
            .rand_bytes(0)
            .tempdir_in(root)
            .map_err(|e| Md2PdfError::io("Failed to create workspace", root.join(id.to_string()), e))?;

        for sub in [DOCS_DIR, OUTPUT_DIR] {
            let path = dir.path().join(sub);
            tokio::fs::create_dir(&path)
                .await
                .map_err(|e| Md2PdfError::io("Failed to create workspace directory", path, e))?;
        }

        debug!("Created workspace {} at {}", id, dir.path().display());
        Ok(Self { id, dir })
    }

    /// Unique identifier, also the directory name.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Root of the workspace on the host.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.path().join(DOCS_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join(OUTPUT_DIR)
    }

    pub fn defaults_path(&self) -> PathBuf {
        self.path().join(DEFAULTS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path().join(METADATA_FILE)
    }

    /// Host path of an output file produced by the converter.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir().join(file_name)
    }

    /// Write one uploaded file into `docs/` and return the sanitised name it
    /// was stored under.
    pub async fn write_input_file(&self, name: &str, bytes: &[u8]) -> Result<String, Md2PdfError> {
        let safe = sanitize_filename(name);
        let path = self.docs_dir().join(&safe);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Md2PdfError::io("Failed to write input file", &path, e))?;
        if safe != name {
            debug!("Stored input '{}' as '{}'", name, safe);
        }
        Ok(safe)
    }

    /// Remove the workspace. Failures are logged and otherwise ignored.
    pub fn destroy(self) {
        let id = self.id;
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed workspace {}", id),
            Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
        }
    }
}
