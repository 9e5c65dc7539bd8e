//! Treemend CLI
//!
//! The `treemend` command validates and repairs a machine-generated
//! project before anyone tries to build it.
//!
//! ## Commands
//!
//! - `validate`: Run the four validation layers and print a report
//! - `repair`: Validate, apply rule-based fixes, and write the result

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, Level};
use walkdir::{DirEntry, WalkDir};

use treemend_core::{
    write_report_artifact, CheckerKind, GeneratedFile, Orchestrator, PipelineConfig,
    PipelineReport, RepairRegistry, RepairRequest, TargetLanguage, TracingObserver,
};

/// Directories never read from an input tree.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

#[derive(Parser)]
#[command(name = "treemend")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate and repair machine-generated source trees", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project without changing it
    Validate {
        #[command(flatten)]
        target: Target,

        /// Report format
        #[arg(long, value_enum, default_value = "markdown")]
        format: Format,
    },

    /// Validate and repair a project
    Repair {
        #[command(flatten)]
        target: Target,

        /// Maximum number of fix cycles
        #[arg(long, env = "TREEMEND_MAX_ATTEMPTS")]
        max_attempts: Option<u32>,

        /// Only validate; never apply fixes
        #[arg(long)]
        no_fix: bool,

        /// Directory to write the repaired files into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Directory for the run's report artifact
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value = "markdown")]
        format: Format,
    },
}

/// Options shared by every command.
#[derive(clap::Args)]
struct Target {
    /// Project directory, or a JSON file holding `[{"path", "content"}]`
    input: PathBuf,

    /// Target language (typescript, javascript, python, rust)
    #[arg(short, long)]
    language: String,

    /// Replacement lookup table (TOML)
    #[arg(long, env = "TREEMEND_REGISTRY")]
    registry: Option<PathBuf>,

    /// Syntax checker backing the syntax layer
    #[arg(long, value_enum, default_value = "tree-sitter")]
    checker: Checker,
}

#[derive(Clone, Copy, ValueEnum)]
enum Checker {
    TreeSitter,
    Heuristic,
}

impl From<Checker> for CheckerKind {
    fn from(checker: Checker) -> Self {
        match checker {
            Checker::TreeSitter => CheckerKind::TreeSitter,
            Checker::Heuristic => CheckerKind::Heuristic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    treemend_core::init_tracing(cli.json, level);

    let report = match cli.command {
        Commands::Validate { target, format } => {
            let report = cmd_run(&target, None, false).await?;
            print_report(&report, format)?;
            report
        }
        Commands::Repair {
            target,
            max_attempts,
            no_fix,
            output_dir,
            artifacts_dir,
            format,
        } => {
            let report = cmd_run(&target, max_attempts, !no_fix).await?;
            if let Some(dir) = output_dir.as_deref() {
                write_files(&report.files, dir)?;
                info!(files = report.files.len(), dir = ?dir, "Wrote repaired files");
            }
            if let Some(dir) = artifacts_dir.as_deref() {
                let path = write_report_artifact(&report, dir)
                    .with_context(|| format!("Failed to write report artifact under {:?}", dir))?;
                info!(path = ?path, "Wrote report artifact");
            }
            print_report(&report, format)?;
            report
        }
    };

    Ok(if report.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Load the input, build an orchestrator, and run it once.
async fn cmd_run(target: &Target, max_attempts: Option<u32>, auto_fix: bool) -> Result<PipelineReport> {
    let language = TargetLanguage::parse(&target.language)
        .with_context(|| format!("Unsupported language: {}", target.language))?;

    let registry = match target.registry.as_deref() {
        Some(path) => RepairRegistry::load(path)
            .with_context(|| format!("Failed to load registry: {:?}", path))?,
        None => RepairRegistry::builtin(),
    };

    let mut config = PipelineConfig {
        auto_fix,
        checker: target.checker.into(),
        ..PipelineConfig::default()
    };
    if let Some(max) = max_attempts {
        config.max_attempts = max;
    }

    let files = load_input(&target.input)?;
    info!(
        files = files.len(),
        language = %language,
        auto_fix = config.auto_fix,
        "Loaded input"
    );

    let orchestrator =
        Orchestrator::new(&config, Arc::new(registry)).with_observer(Arc::new(TracingObserver));
    let request = RepairRequest::new(files, language)
        .with_auto_fix(config.auto_fix)
        .with_max_attempts(config.max_attempts);
    Ok(orchestrator.run(request).await)
}

fn print_report(report: &PipelineReport, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", report.to_json().context("Failed to serialize report")?),
        Format::Markdown => print!("{}", report.render_markdown()),
    }
    Ok(())
}

/// Read a project from a directory tree or a JSON file list.
fn load_input(input: &Path) -> Result<Vec<GeneratedFile>> {
    if input.is_dir() {
        return load_dir(input);
    }
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {:?}", input))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Input is not a JSON array of {{path, content}}: {:?}", input))
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn load_dir(root: &Path) -> Result<Vec<GeneratedFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{:?} is outside {:?}", entry.path(), root))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        match std::fs::read_to_string(entry.path()) {
            Ok(content) => files.push(GeneratedFile::new(path, content)),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(path = %path, "Skipping non-UTF-8 file");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {:?}", entry.path()));
            }
        }
    }
    Ok(files)
}

/// Write files under `dir`, refusing paths that would escape it.
fn write_files(files: &[GeneratedFile], dir: &Path) -> Result<()> {
    for file in files {
        let relative = Path::new(&file.path);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            anyhow::bail!("Refusing to write outside the output directory: {}", file.path);
        }
        let dest = dir.join(relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        std::fs::write(&dest, &file.content)
            .with_context(|| format!("Failed to write {:?}", dest))?;
    }
    Ok(())
}
