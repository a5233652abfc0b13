//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ServiceConfig` and either runs the HTTP service or converts once.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf::{
    server, ConversionRequest, ConverterMode, DocumentMetadata, InputFile, MemoryStore, Md2Pdf,
    PandocOptions, ProcessConverter, ServiceConfig,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service (pandoc via `docker run`)
  md2pdf serve --port 3000

  # Use a long-running pandoc sidecar instead
  md2pdf --converter docker-exec --exec-container md-pdf-conversion-pandoc-1 serve

  # One-shot conversion with host pandoc, files concatenated in order
  md2pdf --converter local convert intro.md body.md -o report.pdf --title Report

  # Options from the same JSON the web form posts
  md2pdf convert *.md --pandoc-config pandoc.json --metadata eisvogel.json

  # Verify the converter can be launched
  md2pdf check

HTTP API:
  POST /api/convert            multipart: files, pandocConfig, eisvogelConfig
  GET  /api/download/{id}      ?filename=report.pdf
  GET  /api/converter          converter version probe
  GET  /health

CONVERTER MODES:
  docker-run   docker run --rm pandoc/extra per request (default)
  docker-exec  docker exec into a running pandoc container sharing --workspace-root
  local        pandoc + TeX + eisvogel installed on this host

ENVIRONMENT VARIABLES:
  Every option has an MD2PDF_* counterpart, e.g. MD2PDF_CONVERTER,
  MD2PDF_WORKSPACE_ROOT, MD2PDF_TIMEOUT, MD2PDF_PORT.
  RUST_LOG overrides the log filter (e.g. RUST_LOG=md2pdf=debug).
"#;

/// Convert Markdown to PDF with pandoc and the eisvogel template.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown to PDF with pandoc and the eisvogel template",
    long_about = "Convert uploaded Markdown files to a styled PDF by driving pandoc with the \
eisvogel LaTeX template. Runs as an HTTP service or converts once from the command line. \
pandoc can run on the host, in a throwaway container, or in a long-running sidecar.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MD2PDF_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to bind.
        #[arg(long, env = "MD2PDF_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind.
        #[arg(short, long, env = "MD2PDF_PORT", default_value_t = 3000)]
        port: u16,
    },

    /// Convert Markdown files to one PDF.
    Convert(ConvertArgs),

    /// Launch the converter once and print its version.
    Check,
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// How pandoc is launched: local, docker-run, docker-exec.
    #[arg(long, global = true, env = "MD2PDF_CONVERTER", default_value = "docker-run")]
    converter: ConverterMode,

    /// Directory for per-request workspaces.
    #[arg(long, global = true, env = "MD2PDF_WORKSPACE_ROOT", default_value = "workspace")]
    workspace_root: PathBuf,

    /// Directory for stored PDFs.
    #[arg(long, global = true, env = "MD2PDF_ARTIFACT_DIR", default_value = "generated-pdfs")]
    artifact_dir: PathBuf,

    /// Directory holding eisvogel background PDFs.
    #[arg(long, global = true, env = "MD2PDF_TEMPLATES_DIR", default_value = "templates")]
    templates_dir: PathBuf,

    /// pandoc executable (local mode, and inside the sidecar).
    #[arg(long, global = true, env = "MD2PDF_PANDOC", default_value = "pandoc")]
    pandoc: String,

    /// Container runtime CLI.
    #[arg(long, global = true, env = "MD2PDF_DOCKER", default_value = "docker")]
    docker: String,

    /// pandoc image for docker-run mode.
    #[arg(long, global = true, env = "MD2PDF_IMAGE", default_value = md2pdf::config::DEFAULT_DOCKER_IMAGE)]
    image: String,

    /// `--platform` for docker-run; empty to omit.
    #[arg(long, global = true, env = "MD2PDF_PLATFORM", default_value = "linux/amd64")]
    platform: String,

    /// Sidecar container for docker-exec mode.
    #[arg(long, global = true, env = "MD2PDF_EXEC_CONTAINER", default_value = md2pdf::config::DEFAULT_EXEC_CONTAINER)]
    exec_container: String,

    /// Where --workspace-root is mounted inside the sidecar.
    #[arg(long, global = true, env = "MD2PDF_EXEC_MOUNT", default_value = "/workspace")]
    exec_mount: PathBuf,

    /// pdf-engine for pandoc (e.g. xelatex).
    #[arg(long, global = true, env = "MD2PDF_PDF_ENGINE")]
    pdf_engine: Option<String>,

    /// Converter timeout in seconds.
    #[arg(long, global = true, env = "MD2PDF_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Maximum concurrent conversions.
    #[arg(long, global = true, env = "MD2PDF_MAX_CONCURRENT", default_value_t = 4)]
    max_concurrent: usize,

    /// Artifact retention in seconds (0 keeps artifacts forever).
    #[arg(long, global = true, env = "MD2PDF_ARTIFACT_TTL", default_value_t = 86_400)]
    artifact_ttl: u64,

    /// Seconds between retention sweeps.
    #[arg(long, global = true, env = "MD2PDF_SWEEP_INTERVAL", default_value_t = 600)]
    sweep_interval: u64,

    /// Maximum upload size in MiB.
    #[arg(long, global = true, env = "MD2PDF_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Run docker-run containers as root instead of the invoking user.
    #[arg(long, global = true, env = "MD2PDF_NO_HOST_USER")]
    no_host_user: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Markdown files, in document order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write the PDF here.
    #[arg(short, long, env = "MD2PDF_OUTPUT", default_value = "output.pdf")]
    output: PathBuf,

    /// JSON file with pandoc options (same shape as the `pandocConfig` form field).
    #[arg(long)]
    pandoc_config: Option<PathBuf>,

    /// JSON file with document metadata (same shape as the `eisvogelConfig` form field).
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Document title.
    #[arg(long)]
    title: Option<String>,

    /// Document author.
    #[arg(long)]
    author: Option<String>,

    /// Table of contents depth (1–6).
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..=6))]
    toc_depth: Option<i64>,

    /// Omit the table of contents.
    #[arg(long)]
    no_toc: bool,

    /// Omit the title page.
    #[arg(long)]
    no_titlepage: bool,

    /// Disable the spinner.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The one-shot spinner gives enough feedback; keep library logs quiet
    // behind it unless asked.
    let show_progress = matches!(cli.command, Command::Convert(ref a) if !a.no_progress) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.service)?;

    match cli.command {
        Command::Serve { ref host, port } => serve(config, host, port).await,
        Command::Convert(ref args) => convert(config, args, show_progress, cli.quiet).await,
        Command::Check => check(config, cli.quiet).await,
    }
}

/// Map CLI args to `ServiceConfig`.
fn build_config(args: &ServiceArgs) -> Result<ServiceConfig> {
    ServiceConfig::builder()
        .converter(args.converter)
        .workspace_root(&args.workspace_root)
        .artifact_dir(&args.artifact_dir)
        .templates_dir(&args.templates_dir)
        .pandoc_program(&args.pandoc)
        .docker_program(&args.docker)
        .docker_image(&args.image)
        .docker_platform(Some(args.platform.clone()))
        .exec_container(&args.exec_container)
        .exec_workspace_mount(&args.exec_mount)
        .pdf_engine(args.pdf_engine.clone())
        .conversion_timeout_secs(args.timeout)
        .max_concurrent_conversions(args.max_concurrent)
        .artifact_ttl_secs(args.artifact_ttl)
        .sweep_interval_secs(args.sweep_interval)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024))
        .run_as_host_user(!args.no_host_user)
        .build()
        .context("Invalid configuration")
}

async fn serve(config: ServiceConfig, host: &str, port: u16) -> Result<()> {
    let engine = Md2Pdf::from_config(config)
        .await
        .context("Failed to initialise conversion engine")?;
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;

    server::serve(Arc::new(engine), listener, shutdown_signal())
        .await
        .context("Server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

async fn convert(config: ServiceConfig, args: &ConvertArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let request = build_request(args).await?;
    let engine = Md2Pdf::new(
        config.clone(),
        Arc::new(ProcessConverter::from_config(&config)),
        Arc::new(MemoryStore::new()),
    );

    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(format!(
            "{} file(s) via {}",
            request.files().len(),
            config.converter
        ));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let start = Instant::now();
    let result = engine.render_to_file(&request, &args.output).await;
    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
    }

    match result {
        Ok(size) => {
            if !quiet {
                eprintln!(
                    "{}  {} bytes  {}ms  →  {}",
                    green("✔"),
                    size,
                    start.elapsed().as_millis(),
                    bold(&args.output.display().to_string()),
                );
            }
            Ok(())
        }
        Err(e) => {
            if !quiet {
                eprintln!("{} {}", red("✘"), red("Conversion failed"));
            }
            Err(e).context("Conversion failed")
        }
    }
}

/// Read input files and option overrides into a `ConversionRequest`.
async fn build_request(args: &ConvertArgs) -> Result<ConversionRequest> {
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.md".to_string());
        files.push(InputFile::new(name, content));
    }

    let mut options = match args.pandoc_config {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read pandoc options from {}", path.display()))?;
            PandocOptions::from_json(&raw)?
        }
        None => PandocOptions::default(),
    };
    let mut metadata = match args.metadata {
        Some(ref path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read metadata from {}", path.display()))?;
            DocumentMetadata::from_json(&raw)?
        }
        None => DocumentMetadata::default(),
    };

    // Explicit flags win over JSON files.
    if let Some(name) = args.output.file_name() {
        options.output_file = name.to_string_lossy().into_owned();
    }
    if let Some(depth) = args.toc_depth {
        options.toc_depth = depth;
    }
    if args.no_toc {
        options.table_of_contents = false;
    }
    if args.title.is_some() {
        metadata.title = args.title.clone();
    }
    if args.author.is_some() {
        metadata.author = args.author.clone();
    }
    if args.no_titlepage {
        metadata.titlepage = Some(false);
    }

    Ok(ConversionRequest::new(files, options, metadata)?)
}

async fn check(config: ServiceConfig, quiet: bool) -> Result<()> {
    let mode = config.converter;
    let converter = ProcessConverter::from_config(&config);
    let version = md2pdf::Converter::probe(&converter)
        .await
        .with_context(|| format!("Converter check failed ({mode})"))?;
    if !quiet {
        println!("{}  {}  {}", green("✔"), bold(&version), dim(&format!("({mode})")));
    }
    Ok(())
}
