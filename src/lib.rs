//! # md2pdf
//!
//! Turn uploaded Markdown files into a styled PDF by driving pandoc with the
//! eisvogel LaTeX template, and serve the result over HTTP.
//!
//! The crate does not render anything itself. Its job is orchestration:
//! give each request a private workspace, translate the client's options into
//! the two YAML documents pandoc reads, run the converter under a deadline,
//! keep the PDF in an artifact store and hand out an identifier for it.
//!
//! ## Request Lifecycle
//!
//! ```text
//! files + options
//!  │
//!  ├─ 1. Workspace  fresh <root>/<uuid>/ with docs/ and output/
//!  ├─ 2. Compile    pandoc.yaml (defaults) + eisvogel.yaml (metadata)
//!  ├─ 3. Invoke     pandoc locally, via `docker run`, or via `docker exec`
//!  ├─ 4. Store      PDF copied into the artifact store under a new UUID
//!  └─ 5. Cleanup    workspace removed, success or failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{ConversionRequest, DocumentMetadata, InputFile, Md2Pdf, PandocOptions, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Md2Pdf::from_config(ServiceConfig::default()).await?;
//!     let request = ConversionRequest::new(
//!         vec![InputFile::new("intro.md", "# Hello")],
//!         PandocOptions::default(),
//!         DocumentMetadata::default(),
//!     )?;
//!     let artifact = engine.convert(&request).await?;
//!     println!("stored {} ({} bytes)", artifact.id, artifact.size);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding the service in another application:
//! ```toml
//! md2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Converter Mode
//!
//! | Mode | Needs | Best for |
//! |------|-------|----------|
//! | `docker-run` | docker, network access to pull `pandoc/extra` | Default. No host TeX install |
//! | `docker-exec` | a running pandoc sidecar sharing the workspace volume | Compose deployments, no per-request container start |
//! | `local` | pandoc + a TeX distribution + eisvogel on the host | Development, CI images with TeX |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterMode, ServiceConfig, ServiceConfigBuilder};
pub use convert::{Md2Pdf, RenderedPdf};
pub use error::Md2PdfError;
pub use options::{ConversionRequest, DocumentMetadata, InputFile, PandocOptions};
pub use pipeline::invoke::{Converter, ConverterView, Invocation, ProcessConverter, ProcessOutput};
pub use store::{ArtifactRecord, ArtifactStore, FilesystemStore, MemoryStore};
