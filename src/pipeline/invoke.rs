//! Conversion invoker: run the external converter and classify the outcome.
//!
//! The request pipeline never spawns processes itself. It talks to a
//! [`Converter`], a narrow capability with three operations: say how it sees
//! a workspace ([`Converter::view`]), run one [`Invocation`]
//! ([`Converter::execute`]) and report its version ([`Converter::probe`]).
//! [`ProcessConverter`] is the production implementation; tests plug in
//! in-process fakes.
//!
//! ## Classification
//!
//! | Exit status | Output file | Result |
//! |-------------|-------------|--------|
//! | 0 | present and readable | success, bytes returned |
//! | 0 | missing / unreadable | [`Md2PdfError::Conversion`] |
//! | non-zero / signal | any | [`Md2PdfError::Conversion`] with stderr |
//! | still running at the deadline | any | [`Md2PdfError::Timeout`], process killed |
//!
//! pandoc and LaTeX print plenty of harmless `[WARNING]` lines; those are
//! logged and never change the classification.

use crate::config::{ConverterMode, ServiceConfig};
use crate::error::Md2PdfError;
use crate::pipeline::compile::CompiledConfig;
use crate::pipeline::workspace::{Workspace, DEFAULTS_FILE, DOCS_DIR, METADATA_FILE};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

static RE_WARNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)warning").unwrap());

/// How a converter addresses the workspace and the template assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterView {
    /// Workspace root as seen by the converter process.
    pub workspace: PathBuf,
    /// Template asset directory as seen by the converter process.
    pub templates: PathBuf,
}

/// One converter run, with every path already translated into the
/// converter's view.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub workspace_id: Uuid,
    /// Workspace root on the host (for bind mounts and local runs).
    pub host_workspace: PathBuf,
    /// Working directory for the converter, in its own view.
    pub working_dir: PathBuf,
    /// Input documents in inclusion order.
    pub inputs: Vec<PathBuf>,
    /// Defaults document (`--defaults`).
    pub defaults: PathBuf,
    /// Metadata document (`--metadata-file`).
    pub metadata: PathBuf,
    /// Where the converter is expected to write, on the host.
    pub expected_output: PathBuf,
}

impl Invocation {
    /// Translate a compiled workspace into a converter invocation.
    pub fn new(
        workspace: &Workspace,
        view: &ConverterView,
        input_names: &[String],
        compiled: &CompiledConfig,
    ) -> Self {
        let docs = view.workspace.join(DOCS_DIR);
        Self {
            workspace_id: workspace.id(),
            host_workspace: workspace.path().to_path_buf(),
            working_dir: view.workspace.clone(),
            inputs: input_names.iter().map(|n| docs.join(n)).collect(),
            defaults: view.workspace.join(DEFAULTS_FILE),
            metadata: view.workspace.join(METADATA_FILE),
            expected_output: workspace.output_path(&compiled.output_file),
        }
    }

    /// pandoc arguments: `<inputs…> --defaults <doc1> --metadata-file <doc2>`.
    pub fn pandoc_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.inputs.iter().map(|p| p.into()).collect();
        args.push("--defaults".into());
        args.push(self.defaults.clone().into());
        args.push("--metadata-file".into());
        args.push(self.metadata.clone().into());
        args
    }
}

/// Captured result of a finished converter process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable exit status.
    pub fn status(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Diagnostic text worth showing a user: stderr, else stdout.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// The external document converter.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name for logs and health output.
    fn name(&self) -> &str;

    /// Paths under which the converter sees `workspace` and the templates.
    fn view(&self, workspace: &Workspace) -> ConverterView;

    /// Run one conversion to completion.
    ///
    /// Only failures to *start* the converter are errors here; a converter
    /// that runs and fails is reported through [`ProcessOutput`].
    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput, Md2PdfError>;

    /// Report the converter version, proving it can be launched.
    async fn probe(&self) -> Result<String, Md2PdfError>;

    /// Called after `execute` was abandoned at the deadline. Implementations
    /// whose work outlives the spawned client process clean it up here.
    async fn abort(&self, invocation: &Invocation) {
        let _ = invocation;
    }
}

/// Run the converter for a compiled workspace and return the produced bytes.
pub async fn invoke(
    converter: &dyn Converter,
    workspace: &Workspace,
    compiled: &CompiledConfig,
    input_names: &[String],
    timeout: Duration,
) -> Result<Vec<u8>, Md2PdfError> {
    let view = converter.view(workspace);
    let invocation = Invocation::new(workspace, &view, input_names, compiled);
    info!(
        "Running {} on {} input(s) for workspace {}",
        converter.name(),
        invocation.inputs.len(),
        workspace.id()
    );

    let start = Instant::now();
    let output = match tokio::time::timeout(timeout, converter.execute(&invocation)).await {
        Ok(result) => result?,
        Err(_elapsed) => {
            warn!(
                "Converter exceeded {}s for workspace {}; terminating",
                timeout.as_secs(),
                workspace.id()
            );
            converter.abort(&invocation).await;
            return Err(Md2PdfError::Timeout {
                secs: timeout.as_secs(),
            });
        }
    };
    debug!(
        "Converter finished with {} in {}ms",
        output.status(),
        start.elapsed().as_millis()
    );

    log_diagnostics(&output);
    classify(&output, &invocation.expected_output).await
}

/// Decide success or failure from the process result and the output file.
pub async fn classify(output: &ProcessOutput, expected: &Path) -> Result<Vec<u8>, Md2PdfError> {
    if !output.success() {
        return Err(Md2PdfError::Conversion {
            status: output.status(),
            diagnostics: output.diagnostics(),
        });
    }

    match tokio::fs::read(expected).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            let mut diagnostics = format!(
                "converter reported success but '{}' could not be read: {}",
                expected.display(),
                e
            );
            let extra = output.diagnostics();
            if !extra.is_empty() {
                diagnostics.push('\n');
                diagnostics.push_str(&extra);
            }
            Err(Md2PdfError::Conversion {
                status: output.status(),
                diagnostics,
            })
        }
    }
}

fn log_diagnostics(output: &ProcessOutput) {
    for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
        if RE_WARNING.is_match(line) {
            warn!("converter: {}", line.trim_end());
        } else {
            debug!("converter: {}", line.trim_end());
        }
    }
    for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
        debug!("converter stdout: {}", line.trim_end());
    }
}

// ── Process-backed converter ─────────────────────────────────────────────

/// Launches pandoc as a child process, on the host or through docker.
#[derive(Debug, Clone)]
pub struct ProcessConverter {
    mode: ConverterMode,
    pandoc_program: String,
    docker_program: String,
    docker_image: String,
    docker_platform: Option<String>,
    exec_container: String,
    exec_workspace_mount: PathBuf,
    templates_dir: PathBuf,
    container_templates_mount: PathBuf,
    run_as_host_user: bool,
}

/// Mount point of the per-request workspace inside a `docker run` container.
const RUN_WORKSPACE_MOUNT: &str = "/workspace";

impl ProcessConverter {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            mode: config.converter,
            pandoc_program: config.pandoc_program.clone(),
            docker_program: config.docker_program.clone(),
            docker_image: config.docker_image.clone(),
            docker_platform: config.docker_platform.clone(),
            exec_container: config.exec_container.clone(),
            exec_workspace_mount: config.exec_workspace_mount.clone(),
            templates_dir: config.templates_dir.clone(),
            container_templates_mount: config.container_templates_mount.clone(),
            run_as_host_user: config.run_as_host_user,
        }
    }

    pub fn mode(&self) -> ConverterMode {
        self.mode
    }

    fn container_name(id: Uuid) -> String {
        format!("md2pdf-{id}")
    }

    /// Build the command for `invocation` without running it.
    pub fn command(&self, invocation: &Invocation) -> Result<Command, Md2PdfError> {
        let mut cmd = match self.mode {
            ConverterMode::Local => {
                let mut cmd = Command::new(&self.pandoc_program);
                cmd.current_dir(&invocation.host_workspace);
                cmd
            }
            ConverterMode::DockerRun => {
                let host_ws = absolute(&invocation.host_workspace)?;
                let templates = absolute(&self.templates_dir)?;
                let mut cmd = Command::new(&self.docker_program);
                cmd.args(["run", "--rm", "--name"])
                    .arg(Self::container_name(invocation.workspace_id));
                if let Some(ref platform) = self.docker_platform {
                    cmd.args(["--platform", platform.as_str()]);
                }
                cmd.arg("-v")
                    .arg(bind_mount(&host_ws, &invocation.working_dir, false))
                    .arg("-v")
                    .arg(bind_mount(&templates, &self.container_templates_mount, true));
                if self.run_as_host_user {
                    if let Some(user) = host_user(&host_ws) {
                        cmd.args(["--user", user.as_str()]);
                    }
                }
                cmd.arg("-w")
                    .arg(&invocation.working_dir)
                    .arg(&self.docker_image);
                cmd
            }
            ConverterMode::DockerExec => {
                let mut cmd = Command::new(&self.docker_program);
                cmd.args(["exec", "-w"])
                    .arg(&invocation.working_dir)
                    .arg(&self.exec_container)
                    .arg(&self.pandoc_program);
                cmd
            }
        };
        cmd.args(invocation.pandoc_args());
        Ok(cmd)
    }

    fn probe_command(&self) -> Command {
        let mut cmd = match self.mode {
            ConverterMode::Local => Command::new(&self.pandoc_program),
            ConverterMode::DockerRun => {
                let mut cmd = Command::new(&self.docker_program);
                cmd.args(["run", "--rm"]);
                if let Some(ref platform) = self.docker_platform {
                    cmd.args(["--platform", platform.as_str()]);
                }
                cmd.arg(&self.docker_image);
                cmd
            }
            ConverterMode::DockerExec => {
                let mut cmd = Command::new(&self.docker_program);
                cmd.arg("exec")
                    .arg(&self.exec_container)
                    .arg(&self.pandoc_program);
                cmd
            }
        };
        cmd.arg("--version");
        cmd
    }

    fn program(&self) -> &str {
        match self.mode {
            ConverterMode::Local => &self.pandoc_program,
            ConverterMode::DockerRun | ConverterMode::DockerExec => &self.docker_program,
        }
    }

    async fn run(&self, mut cmd: Command) -> Result<ProcessOutput, Md2PdfError> {
        debug!("Executing: {:?}", cmd.as_std());
        let output = cmd
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Md2PdfError::ConverterUnavailable {
                program: self.program().to_string(),
                reason: e.to_string(),
            })?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Converter for ProcessConverter {
    fn name(&self) -> &str {
        match self.mode {
            ConverterMode::Local => "pandoc",
            ConverterMode::DockerRun => "pandoc (docker run)",
            ConverterMode::DockerExec => "pandoc (docker exec)",
        }
    }

    fn view(&self, workspace: &Workspace) -> ConverterView {
        match self.mode {
            ConverterMode::Local => ConverterView {
                workspace: workspace.path().to_path_buf(),
                // pandoc runs inside the workspace, so relative paths would miss.
                templates: absolute(&self.templates_dir)
                    .unwrap_or_else(|_| self.templates_dir.clone()),
            },
            ConverterMode::DockerRun => ConverterView {
                workspace: Path::new(RUN_WORKSPACE_MOUNT).join(workspace.id().to_string()),
                templates: self.container_templates_mount.clone(),
            },
            ConverterMode::DockerExec => ConverterView {
                workspace: self.exec_workspace_mount.join(workspace.id().to_string()),
                templates: self.container_templates_mount.clone(),
            },
        }
    }

    async fn execute(&self, invocation: &Invocation) -> Result<ProcessOutput, Md2PdfError> {
        let cmd = self.command(invocation)?;
        self.run(cmd).await
    }

    async fn probe(&self) -> Result<String, Md2PdfError> {
        let output = self.run(self.probe_command()).await?;
        if !output.success() {
            return Err(Md2PdfError::ConverterUnavailable {
                program: self.program().to_string(),
                reason: format!("{}: {}", output.status(), output.diagnostics()),
            });
        }
        Ok(output.stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn abort(&self, invocation: &Invocation) {
        // Killing the docker client leaves the container running.
        if self.mode != ConverterMode::DockerRun {
            return;
        }
        let name = Self::container_name(invocation.workspace_id);
        let mut cmd = Command::new(&self.docker_program);
        cmd.args(["rm", "-f", name.as_str()]);
        match self.run(cmd).await {
            Ok(out) if out.success() => debug!("Removed container {}", name),
            Ok(out) => warn!("Failed to remove container {}: {}", name, out.diagnostics()),
            Err(e) => warn!("Failed to remove container {}: {}", name, e),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, Md2PdfError> {
    std::path::absolute(path).map_err(|e| Md2PdfError::io("Failed to resolve path", path, e))
}

fn bind_mount(host: &Path, container: &Path, read_only: bool) -> OsString {
    let mut spec = OsString::from(host);
    spec.push(":");
    spec.push(container);
    if read_only {
        spec.push(":ro");
    }
    spec
}

/// `uid:gid` owning `dir`, i.e. the user this service runs as.
#[cfg(unix)]
fn host_user(dir: &Path) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(dir)
        .ok()
        .map(|m| format!("{}:{}", m.uid(), m.gid()))
}

#[cfg(not(unix))]
fn host_user(_dir: &Path) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DocumentMetadata, PandocOptions};
    use crate::pipeline::compile::compile;
    use chrono::NaiveDate;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    async fn prepared(
        root: &Path,
        converter: &dyn Converter,
    ) -> (Workspace, CompiledConfig, Vec<String>) {
        let ws = Workspace::create(root).await.unwrap();
        let names = vec![
            ws.write_input_file("intro.md", b"# Intro").await.unwrap(),
            ws.write_input_file("body.md", b"# Body").await.unwrap(),
        ];
        let opts = PandocOptions {
            output_file: "report.pdf".into(),
            ..PandocOptions::default()
        };
        let compiled = compile(
            &opts,
            &DocumentMetadata::default(),
            &ws,
            &converter.view(&ws),
            None,
            NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
        )
        .await
        .unwrap();
        (ws, compiled, names)
    }

    fn converter(mode: ConverterMode) -> ProcessConverter {
        let config = ServiceConfig::builder()
            .converter(mode)
            .templates_dir("/srv/templates")
            .run_as_host_user(false)
            .build()
            .unwrap();
        ProcessConverter::from_config(&config)
    }

    #[test]
    fn process_output_status_and_diagnostics() {
        let ok = ProcessOutput {
            exit_code: Some(0),
            ..ProcessOutput::default()
        };
        assert!(ok.success());

        let failed = ProcessOutput {
            exit_code: Some(43),
            stdout: "partial".into(),
            stderr: "  Error producing PDF.\n".into(),
        };
        assert!(!failed.success());
        assert_eq!(failed.status(), "exit code 43");
        assert_eq!(failed.diagnostics(), "Error producing PDF.");

        let killed = ProcessOutput {
            exit_code: None,
            stdout: "only stdout".into(),
            stderr: String::new(),
        };
        assert_eq!(killed.status(), "terminated by signal");
        assert_eq!(killed.diagnostics(), "only stdout");
    }

    #[tokio::test]
    async fn invocation_keeps_input_order_and_document_flags() {
        let root = tempfile::tempdir().unwrap();
        let conv = converter(ConverterMode::DockerRun);
        let (ws, compiled, names) = prepared(root.path(), &conv).await;
        let inv = Invocation::new(&ws, &conv.view(&ws), &names, &compiled);

        let base = format!("/workspace/{}", ws.id());
        let args: Vec<String> = inv
            .pandoc_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                format!("{base}/docs/intro.md"),
                format!("{base}/docs/body.md"),
                "--defaults".to_string(),
                format!("{base}/pandoc.yaml"),
                "--metadata-file".to_string(),
                format!("{base}/eisvogel.yaml"),
            ]
        );
        assert_eq!(inv.expected_output, ws.output_dir().join("report.pdf"));
        assert_eq!(
            compiled.defaults.output_file,
            PathBuf::from(format!("{base}/output/report.pdf"))
        );
    }

    #[tokio::test]
    async fn docker_run_command_mounts_workspace_and_templates() {
        let root = tempfile::tempdir().unwrap();
        let conv = converter(ConverterMode::DockerRun);
        let (ws, compiled, names) = prepared(root.path(), &conv).await;
        let inv = Invocation::new(&ws, &conv.view(&ws), &names, &compiled);
        let cmd = conv.command(&inv).unwrap();
        let args = args_of(&cmd);

        assert_eq!(cmd.as_std().get_program(), "docker");
        let name = format!("md2pdf-{}", ws.id());
        assert_eq!(&args[..4], ["run", "--rm", "--name", name.as_str()]);
        assert!(args.windows(2).any(|w| w == ["--platform", "linux/amd64"]));
        let ws_mount = format!("{}:/workspace/{}", ws.path().display(), ws.id());
        assert!(args.contains(&ws_mount), "args: {args:?}");
        assert!(args.contains(&"/srv/templates:/templates:ro".to_string()));
        assert!(!args.contains(&"--user".to_string()));
        let image_pos = args.iter().position(|a| a == "pandoc/extra:3.5.0").unwrap();
        assert_eq!(args[image_pos - 2], "-w");
        assert!(args[image_pos + 1].ends_with("/docs/intro.md"));
    }

    #[tokio::test]
    async fn docker_exec_command_targets_sidecar() {
        let root = tempfile::tempdir().unwrap();
        let conv = converter(ConverterMode::DockerExec);
        let (ws, compiled, names) = prepared(root.path(), &conv).await;
        let inv = Invocation::new(&ws, &conv.view(&ws), &names, &compiled);
        let args = args_of(&conv.command(&inv).unwrap());

        let wd = format!("/workspace/{}", ws.id());
        assert_eq!(
            &args[..5],
            ["exec", "-w", wd.as_str(), "md-pdf-conversion-pandoc-1", "pandoc"]
        );
        assert_eq!(args.last().unwrap(), &format!("{wd}/eisvogel.yaml"));
    }

    #[tokio::test]
    async fn local_command_runs_in_workspace() {
        let root = tempfile::tempdir().unwrap();
        let conv = converter(ConverterMode::Local);
        let (ws, compiled, names) = prepared(root.path(), &conv).await;
        let view = conv.view(&ws);
        assert_eq!(view.workspace, ws.path());
        assert_eq!(view.templates, PathBuf::from("/srv/templates"));

        let inv = Invocation::new(&ws, &view, &names, &compiled);
        let cmd = conv.command(&inv).unwrap();
        assert_eq!(cmd.as_std().get_program(), "pandoc");
        assert_eq!(cmd.as_std().get_current_dir(), Some(ws.path()));
        assert_eq!(args_of(&cmd)[0], ws.docs_dir().join("intro.md").to_string_lossy());
    }

    #[tokio::test]
    async fn local_view_resolves_relative_templates_dir() {
        let root = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .converter(ConverterMode::Local)
            .templates_dir("templates")
            .build()
            .unwrap();
        let conv = ProcessConverter::from_config(&config);
        let (ws, compiled, _) = prepared(root.path(), &conv).await;

        let view = conv.view(&ws);
        assert!(view.templates.is_absolute(), "{}", view.templates.display());
        assert!(view.templates.ends_with("templates"));
        assert!(compiled.metadata.titlepage_background.is_absolute());
        assert!(compiled
            .metadata
            .titlepage_background
            .ends_with("templates/example-background.pdf"));
    }

    #[tokio::test]
    async fn classify_non_zero_exit_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = ProcessOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "! LaTeX Error: File `eisvogel.latex' not found.".into(),
        };
        match classify(&out, &dir.path().join("x.pdf")).await {
            Err(Md2PdfError::Conversion { status, diagnostics }) => {
                assert_eq!(status, "exit code 1");
                assert!(diagnostics.contains("eisvogel.latex"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn classify_zero_exit_without_output_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = ProcessOutput {
            exit_code: Some(0),
            ..ProcessOutput::default()
        };
        let err = classify(&out, &dir.path().join("missing.pdf")).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::Conversion { .. }));
        assert!(err.to_string().contains("missing.pdf"));
    }

    #[tokio::test]
    async fn classify_success_returns_bytes_despite_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("out.pdf");
        std::fs::write(&pdf, b"%PDF-1.5 body").unwrap();
        let out = ProcessOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: "[WARNING] Missing character: There is no ✓ in font".into(),
        };
        let bytes = classify(&out, &pdf).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.5 body");
    }

    struct SlowConverter;

    #[async_trait]
    impl Converter for SlowConverter {
        fn name(&self) -> &str {
            "slow"
        }
        fn view(&self, workspace: &Workspace) -> ConverterView {
            ConverterView {
                workspace: workspace.path().to_path_buf(),
                templates: PathBuf::from("/templates"),
            }
        }
        async fn execute(&self, _invocation: &Invocation) -> Result<ProcessOutput, Md2PdfError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ProcessOutput::default())
        }
        async fn probe(&self) -> Result<String, Md2PdfError> {
            Ok("slow 1.0".into())
        }
    }

    #[tokio::test]
    async fn deadline_produces_timeout() {
        let root = tempfile::tempdir().unwrap();
        let (ws, compiled, names) = prepared(root.path(), &SlowConverter).await;
        let started = Instant::now();
        let err = invoke(&SlowConverter, &ws, &compiled, &names, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::Timeout { .. }), "got: {err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_program_is_converter_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .converter(ConverterMode::Local)
            .pandoc_program("/definitely/not/pandoc")
            .build()
            .unwrap();
        let conv = ProcessConverter::from_config(&config);
        let (ws, compiled, names) = prepared(root.path(), &conv).await;

        let err = invoke(&conv, &ws, &compiled, &names, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::ConverterUnavailable { .. }), "got: {err:?}");
        assert!(conv.probe().await.is_err());
    }

    /// A stand-in pandoc: reads `output-file` from the defaults document
    /// in its working directory and writes a tiny PDF there.
    #[cfg(unix)]
    fn fake_pandoc(dir: &Path, exit_code: i32, write_output: bool) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-pandoc");
        let write = if write_output {
            r#"out=$(sed -n 's/^output-file: //p' pandoc.yaml)
printf '%%PDF-1.5 fake' > "$out""#
        } else {
            ""
        };
        let body = format!(
            "#!/bin/sh\nif [ \"$1\" = --version ]; then echo 'pandoc 3.5'; exit 0; fi\n\
             echo '[WARNING] Could not fetch resource' >&2\n{write}\nexit {exit_code}\n"
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_process_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .converter(ConverterMode::Local)
            .pandoc_program(fake_pandoc(bin.path(), 0, true).to_string_lossy())
            .build()
            .unwrap();
        let conv = ProcessConverter::from_config(&config);
        let (ws, compiled, names) = prepared(root.path(), &conv).await;

        let bytes = invoke(&conv, &ws, &compiled, &names, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF-1.5 fake");
        assert_eq!(conv.probe().await.unwrap(), "pandoc 3.5");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_process_failure_carries_stderr() {
        let root = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .converter(ConverterMode::Local)
            .pandoc_program(fake_pandoc(bin.path(), 43, false).to_string_lossy())
            .build()
            .unwrap();
        let conv = ProcessConverter::from_config(&config);
        let (ws, compiled, names) = prepared(root.path(), &conv).await;

        let err = invoke(&conv, &ws, &compiled, &names, Duration::from_secs(10))
            .await
            .unwrap_err();
        match err {
            Md2PdfError::Conversion { status, diagnostics } => {
                assert_eq!(status, "exit code 43");
                assert!(diagnostics.contains("Could not fetch resource"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
