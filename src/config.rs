//! Service configuration.
//!
//! Every knob the conversion service has lives in [`ServiceConfig`], built
//! through [`ServiceConfigBuilder`]. The CLI maps flags and `MD2PDF_*`
//! environment variables onto the builder; tests build configs directly.
//!
//! Per-request document options (TOC, numbering, title page…) are *not* here:
//! they arrive with each request, see [`crate::options`].

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default pandoc image used by [`ConverterMode::DockerRun`].
pub const DEFAULT_DOCKER_IMAGE: &str = "pandoc/extra:3.5.0";

/// Default name of the long-running pandoc sidecar used by [`ConverterMode::DockerExec`].
pub const DEFAULT_EXEC_CONTAINER: &str = "md-pdf-conversion-pandoc-1";

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use md2pdf::{ConverterMode, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .converter(ConverterMode::Local)
///     .workspace_root("/var/lib/md2pdf/workspace")
///     .conversion_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.conversion_timeout_secs, 120);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory under which per-request workspaces are created. Default: `./workspace`.
    ///
    /// With [`ConverterMode::DockerExec`] this directory must be the host side
    /// of the volume shared with the sidecar container.
    pub workspace_root: PathBuf,

    /// Directory holding stored artifacts. Default: `./generated-pdfs`.
    pub artifact_dir: PathBuf,

    /// Directory holding the eisvogel template assets (background PDFs).
    /// Mounted read-only into the container. Default: `./templates`.
    pub templates_dir: PathBuf,

    /// How the converter process is launched. Default: [`ConverterMode::DockerRun`].
    pub converter: ConverterMode,

    /// Executable name (or path) of pandoc for [`ConverterMode::Local`] and the
    /// program run inside the sidecar for [`ConverterMode::DockerExec`]. Default: `pandoc`.
    pub pandoc_program: String,

    /// Executable name (or path) of the container runtime CLI. Default: `docker`.
    pub docker_program: String,

    /// Image for [`ConverterMode::DockerRun`]. Default: `pandoc/extra:3.5.0`.
    pub docker_image: String,

    /// `--platform` passed to `docker run`. Default: `linux/amd64`, the only
    /// platform the pandoc/extra images are published for.
    pub docker_platform: Option<String>,

    /// Sidecar container name for [`ConverterMode::DockerExec`].
    pub exec_container: String,

    /// Where `workspace_root` is mounted inside the sidecar. Default: `/workspace`.
    pub exec_workspace_mount: PathBuf,

    /// Where `templates_dir` is mounted inside the container. Default: `/templates`.
    pub container_templates_mount: PathBuf,

    /// Run `docker run` as the invoking user so output files are not root-owned.
    /// Ignored on non-Unix hosts. Default: true.
    pub run_as_host_user: bool,

    /// Optional `pdf-engine` written into the defaults document (e.g. `xelatex`
    /// for better Unicode coverage). Default: None, pandoc's own default.
    pub pdf_engine: Option<String>,

    /// Upper bound on one converter invocation, in seconds. Default: 300.
    ///
    /// A LaTeX run on a long document routinely takes tens of seconds; five
    /// minutes leaves headroom while still reclaiming a hung process.
    pub conversion_timeout_secs: u64,

    /// Maximum converter processes running at once. Default: 4.
    pub max_concurrent_conversions: usize,

    /// Age after which stored artifacts are evicted, in seconds. `0` keeps
    /// artifacts forever. Default: 86 400 (24 h).
    pub artifact_ttl_secs: u64,

    /// Interval between retention sweeps, in seconds. Default: 600.
    pub sweep_interval_secs: u64,

    /// Maximum accepted multipart body size in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("workspace"),
            artifact_dir: PathBuf::from("generated-pdfs"),
            templates_dir: PathBuf::from("templates"),
            converter: ConverterMode::default(),
            pandoc_program: "pandoc".to_string(),
            docker_program: "docker".to_string(),
            docker_image: DEFAULT_DOCKER_IMAGE.to_string(),
            docker_platform: Some("linux/amd64".to_string()),
            exec_container: DEFAULT_EXEC_CONTAINER.to_string(),
            exec_workspace_mount: PathBuf::from("/workspace"),
            container_templates_mount: PathBuf::from("/templates"),
            run_as_host_user: true,
            pdf_engine: None,
            conversion_timeout_secs: 300,
            max_concurrent_conversions: 4,
            artifact_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 600,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("workspace_root", &self.workspace_root)
            .field("artifact_dir", &self.artifact_dir)
            .field("templates_dir", &self.templates_dir)
            .field("converter", &self.converter)
            .field("docker_image", &self.docker_image)
            .field("pdf_engine", &self.pdf_engine)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("max_concurrent_conversions", &self.max_concurrent_conversions)
            .field("artifact_ttl_secs", &self.artifact_ttl_secs)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Converter timeout as a [`Duration`].
    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }

    /// Artifact retention as a [`Duration`]; `None` when eviction is disabled.
    pub fn artifact_ttl(&self) -> Option<Duration> {
        (self.artifact_ttl_secs > 0).then(|| Duration::from_secs(self.artifact_ttl_secs))
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = dir.into();
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = dir.into();
        self
    }

    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.templates_dir = dir.into();
        self
    }

    pub fn converter(mut self, mode: ConverterMode) -> Self {
        self.config.converter = mode;
        self
    }

    pub fn pandoc_program(mut self, program: impl Into<String>) -> Self {
        self.config.pandoc_program = program.into();
        self
    }

    pub fn docker_program(mut self, program: impl Into<String>) -> Self {
        self.config.docker_program = program.into();
        self
    }

    pub fn docker_image(mut self, image: impl Into<String>) -> Self {
        self.config.docker_image = image.into();
        self
    }

    pub fn docker_platform(mut self, platform: Option<String>) -> Self {
        self.config.docker_platform = platform.filter(|p| !p.is_empty());
        self
    }

    pub fn exec_container(mut self, name: impl Into<String>) -> Self {
        self.config.exec_container = name.into();
        self
    }

    pub fn exec_workspace_mount(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.exec_workspace_mount = path.into();
        self
    }

    pub fn container_templates_mount(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.container_templates_mount = path.into();
        self
    }

    pub fn run_as_host_user(mut self, v: bool) -> Self {
        self.config.run_as_host_user = v;
        self
    }

    pub fn pdf_engine(mut self, engine: Option<String>) -> Self {
        self.config.pdf_engine = engine.filter(|e| !e.is_empty());
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_conversions(mut self, n: usize) -> Self {
        self.config.max_concurrent_conversions = n.max(1);
        self
    }

    pub fn artifact_ttl_secs(mut self, secs: u64) -> Self {
        self.config.artifact_ttl_secs = secs;
        self
    }

    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.sweep_interval_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Md2PdfError> {
        let c = &self.config;
        if c.conversion_timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Conversion timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_concurrent_conversions == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Concurrent conversions must be ≥ 1".into(),
            ));
        }
        if c.artifact_ttl_secs > 0 && c.sweep_interval_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Sweep interval must be ≥ 1 second when artifact retention is enabled".into(),
            ));
        }
        if c.converter == ConverterMode::DockerExec && !c.exec_workspace_mount.is_absolute() {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Sidecar workspace mount must be an absolute path, got {}",
                c.exec_workspace_mount.display()
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the external converter is launched.
///
/// | Mode | Process | Sees the workspace at |
/// |------|---------|-----------------------|
/// | `Local` | `pandoc` on the host | its host path |
/// | `DockerRun` | a fresh `docker run --rm` per request | `/workspace/<id>` (bind mount) |
/// | `DockerExec` | `docker exec` into a running sidecar | `<exec_workspace_mount>/<id>` (shared volume) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConverterMode {
    /// Run pandoc installed on the host.
    Local,
    /// One throwaway container per conversion. (default)
    #[default]
    DockerRun,
    /// Exec into a long-running pandoc container.
    ///
    /// On timeout only the `docker exec` client is killed; pandoc keeps
    /// running inside the sidecar until it finishes on its own.
    DockerExec,
}

impl FromStr for ConverterMode {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ConverterMode::Local),
            "docker-run" | "docker" => Ok(ConverterMode::DockerRun),
            "docker-exec" | "exec" => Ok(ConverterMode::DockerExec),
            other => Err(Md2PdfError::InvalidConfig(format!(
                "Unknown converter mode '{other}' (expected local, docker-run or docker-exec)"
            ))),
        }
    }
}

impl fmt::Display for ConverterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConverterMode::Local => "local",
            ConverterMode::DockerRun => "docker-run",
            ConverterMode::DockerExec => "docker-exec",
        })
    }
}
