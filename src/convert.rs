//! The conversion request lifecycle.
//!
//! [`Md2Pdf`] owns everything a conversion needs (configuration, converter,
//! artifact store, concurrency bound) and runs one request end to end:
//!
//! ```text
//! create workspace ─▶ write inputs ─▶ compile ─▶ invoke ─▶ store artifact
//!        │                                                      │
//!        └──────────────── destroy workspace ◀──────────────────┘
//! ```
//!
//! The workspace is destroyed on every path out of [`Md2Pdf::convert`],
//! including errors. If the request future is dropped mid-flight the
//! workspace handle's `Drop` removes the directory instead.

use crate::config::ServiceConfig;
use crate::error::Md2PdfError;
use crate::options::ConversionRequest;
use crate::pipeline::compile::compile;
use crate::pipeline::invoke::{invoke, Converter, ProcessConverter};
use crate::pipeline::workspace::Workspace;
use crate::store::{self, ArtifactRecord, ArtifactStore, FilesystemStore};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A PDF produced by a conversion but not (yet) stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPdf {
    /// Sanitised output file name.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The conversion engine.
///
/// Cheap to share: wrap it in an [`Arc`] and hand it to every request task.
pub struct Md2Pdf {
    config: ServiceConfig,
    converter: Arc<dyn Converter>,
    store: Arc<dyn ArtifactStore>,
    permits: Semaphore,
}

impl Md2Pdf {
    /// Assemble an engine from explicit parts.
    pub fn new(
        config: ServiceConfig,
        converter: Arc<dyn Converter>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let permits = Semaphore::new(config.max_concurrent_conversions);
        Self {
            config,
            converter,
            store,
            permits,
        }
    }

    /// Production wiring: a [`ProcessConverter`] and a [`FilesystemStore`]
    /// under `config.artifact_dir`.
    pub async fn from_config(config: ServiceConfig) -> Result<Self, Md2PdfError> {
        let store = FilesystemStore::open(&config.artifact_dir).await?;
        let converter = ProcessConverter::from_config(&config);
        Ok(Self::new(config, Arc::new(converter), Arc::new(store)))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Convert a request and store the result.
    ///
    /// # Errors
    /// * [`Md2PdfError::Io`]: workspace, input or artifact write failed
    /// * [`Md2PdfError::Conversion`]: the converter failed or produced nothing
    /// * [`Md2PdfError::Timeout`]: the converter exceeded the configured bound
    /// * [`Md2PdfError::ConverterUnavailable`]: the converter could not start
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ArtifactRecord, Md2PdfError> {
        let start = Instant::now();
        let _permit = self.acquire().await?;
        let workspace = Workspace::create(&self.config.workspace_root).await?;
        info!(
            "Starting conversion {} ({} file(s))",
            workspace.id(),
            request.files().len()
        );

        let result = match self.run_in(&workspace, request).await {
            Ok(pdf) => self.store.store(&pdf.bytes, &pdf.filename).await,
            Err(e) => Err(e),
        };
        let workspace_id = workspace.id();
        workspace.destroy();

        if let Ok(ref record) = result {
            info!(
                "Conversion {} complete: artifact {} ({} bytes) in {}ms",
                workspace_id,
                record.id,
                record.size,
                start.elapsed().as_millis()
            );
        }
        result
    }

    /// Convert a request and return the PDF without storing it.
    pub async fn render(&self, request: &ConversionRequest) -> Result<RenderedPdf, Md2PdfError> {
        let _permit = self.acquire().await?;
        let workspace = Workspace::create(&self.config.workspace_root).await?;
        let result = self.run_in(&workspace, request).await;
        workspace.destroy();
        result
    }

    /// Convert a request and write the PDF to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    /// Returns the number of bytes written.
    pub async fn render_to_file(
        &self,
        request: &ConversionRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<u64, Md2PdfError> {
        let pdf = self.render(request).await?;
        let path = output_path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Md2PdfError::io("Failed to create output directory", parent, e))?;
        }

        let tmp_path = path.with_extension("pdf.tmp");
        tokio::fs::write(&tmp_path, &pdf.bytes)
            .await
            .map_err(|e| Md2PdfError::io("Failed to write output", &tmp_path, e))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| Md2PdfError::io("Failed to write output", path, e))?;

        Ok(pdf.bytes.len() as u64)
    }

    /// Fetch a stored artifact.
    pub async fn retrieve(&self, id: &str) -> Result<Vec<u8>, Md2PdfError> {
        self.store.retrieve(id).await
    }

    /// Report the converter version.
    pub async fn probe(&self) -> Result<String, Md2PdfError> {
        self.converter.probe().await
    }

    /// Start the background retention sweep, unless retention is disabled.
    pub fn spawn_retention_sweeper(&self) -> Option<JoinHandle<()>> {
        let ttl = self.config.artifact_ttl()?;
        Some(store::spawn_retention_sweeper(
            self.store.clone(),
            ttl,
            Duration::from_secs(self.config.sweep_interval_secs),
        ))
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, Md2PdfError> {
        if self.permits.available_permits() == 0 {
            debug!("All conversion slots busy; waiting");
        }
        self.permits
            .acquire()
            .await
            .map_err(|_| Md2PdfError::Internal("conversion semaphore closed".into()))
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        request: &ConversionRequest,
    ) -> Result<RenderedPdf, Md2PdfError> {
        let mut input_names = Vec::with_capacity(request.files().len());
        for file in request.files() {
            input_names.push(workspace.write_input_file(&file.name, &file.content).await?);
        }

        let view = self.converter.view(workspace);
        let compiled = compile(
            request.options(),
            request.metadata(),
            workspace,
            &view,
            self.config.pdf_engine.as_deref(),
            chrono::Local::now().date_naive(),
        )
        .await?;

        let bytes = invoke(
            self.converter.as_ref(),
            workspace,
            &compiled,
            &input_names,
            self.config.conversion_timeout(),
        )
        .await?;

        Ok(RenderedPdf {
            filename: compiled.output_file,
            bytes,
        })
    }
}
