#![deny(unsafe_code)]

//! Stylescope CLI: inspect context resolution and token matching from a
//! terminal.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stylescope_config::{MatchType, Settings};
use stylescope_core::{LogCollector, LogEntry, LogReader, MatchedPosition, Workspace};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Warnings and errors kept for `check`.
const DIAGNOSTIC_CAPACITY: usize = 512;

/// Stylescope: workspace-aware style utility matching.
#[derive(Parser)]
#[command(name = "stylescope", version, about, long_about = None)]
struct Cli {
    /// Path to the integration settings file.
    #[arg(short, long, default_value = "stylescope-settings.toml")]
    settings: PathBuf,

    /// Workspace root. Overrides `workspace.root` from the settings.
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which configuration governs each file.
    Resolve {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List recognized tokens and their byte offsets in a file.
    Scan {
        file: PathBuf,

        /// Use the strict pattern set.
        #[arg(long)]
        strict: bool,
    },

    /// Generate CSS for the tokens recognized in a file.
    Css {
        file: PathBuf,

        #[arg(long)]
        strict: bool,
    },

    /// Suggest completions for a partial utility.
    Suggest {
        /// File whose context provides the candidates.
        file: PathBuf,

        query: String,

        /// Use fuzzy instead of prefix matching.
        #[arg(long)]
        fuzzy: bool,
    },

    /// List every context discovered for the given files.
    Contexts {
        files: Vec<PathBuf>,
    },

    /// Resolve and scan files, then report the warnings and errors raised
    /// on the way (broken configuration, unreadable files).
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate and display the integration settings.
    Settings {
        /// Show the resolved settings.
        #[arg(long)]
        show: bool,
    },
}

#[derive(Serialize)]
struct Resolution {
    file: PathBuf,
    config_dir: Option<PathBuf>,
    sources: Vec<PathBuf>,
    defaulted: bool,
}

#[derive(Serialize)]
struct ContextReport {
    config_dir: PathBuf,
    sources: Vec<PathBuf>,
    defaulted: bool,
    generation: u64,
}

#[derive(Debug, Serialize)]
struct Diagnostic {
    level: String,
    target: String,
    message: String,
    fields: BTreeMap<String, String>,
}

impl From<LogEntry> for Diagnostic {
    fn from(entry: LogEntry) -> Self {
        Self {
            level: entry.level.to_string(),
            target: entry.target,
            message: entry.message,
            fields: entry.fields.into_iter().collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.settings).await?;

    let filter = match cli.verbose {
        0 => settings.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.verbose > 0 {
        EnvFilter::new(filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    };
    let collector = LogCollector::new(DIAGNOSTIC_CAPACITY).with_max_level(Level::WARN);
    let diagnostics = collector.reader();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .with(collector)
        .init();

    if let Commands::Settings { show } = cli.command {
        return cmd_settings(&cli.settings, &settings, show);
    }

    let root = workspace_root(cli.root.as_deref(), &cli.settings, &settings)?;
    let workspace = Workspace::from_settings(&root, &settings)?;
    if let Err(e) = workspace.reload().await {
        warn!(error = %e, "Continuing with default root configuration");
    }

    match cli.command {
        Commands::Resolve { files } => cmd_resolve(&workspace, &files).await?,
        Commands::Scan { file, strict } => cmd_scan(&workspace, &file, strict).await?,
        Commands::Css { file, strict } => cmd_css(&workspace, &file, strict).await?,
        Commands::Suggest { file, query, fuzzy } => {
            cmd_suggest(&workspace, &file, &query, fuzzy).await?
        }
        Commands::Contexts { files } => cmd_contexts(&workspace, &files).await?,
        Commands::Check { files } => cmd_check(&workspace, &files, &diagnostics).await?,
        Commands::Settings { .. } => {}
    }

    Ok(())
}

async fn cmd_resolve(workspace: &Workspace, files: &[PathBuf]) -> Result<()> {
    let mut report = Vec::with_capacity(files.len());
    for file in files {
        let file = resolve_path(file)?;
        let context = workspace.manager().resolve_closest_context("", &file).await;
        report.push(Resolution {
            config_dir: context.as_ref().map(|ctx| ctx.config_dir().to_path_buf()),
            sources: context
                .as_ref()
                .map(|ctx| ctx.config_sources().to_vec())
                .unwrap_or_default(),
            defaulted: context.as_ref().is_some_and(|ctx| ctx.is_default()),
            file,
        });
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn scan(workspace: &Workspace, file: &Path, strict: bool) -> Result<Vec<MatchedPosition>> {
    let file = resolve_path(file)?;
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    workspace.set_strict(strict);
    let doc_id = file.display().to_string();
    let positions = workspace
        .matched_positions(&file, &doc_id, &content, false)
        .await
        .map(|positions| positions.to_vec())
        .unwrap_or_default();
    info!(file = %file.display(), tokens = positions.len(), "Scanned file");
    Ok(positions)
}

async fn cmd_scan(workspace: &Workspace, file: &Path, strict: bool) -> Result<()> {
    let positions = scan(workspace, file, strict).await?;
    println!("{}", serde_json::to_string_pretty(&positions)?);
    Ok(())
}

async fn cmd_css(workspace: &Workspace, file: &Path, strict: bool) -> Result<()> {
    let positions = scan(workspace, file, strict).await?;
    let absolute = resolve_path(file)?;
    let Some(context) = workspace.manager().resolve_closest_context("", &absolute).await else {
        anyhow::bail!("{} is excluded from the workspace", file.display());
    };
    let utilities: Vec<&str> = positions.iter().map(|p| p.utility.as_str()).collect();
    let result = context.generator().generate(&utilities);
    print!("{}", result.css);
    Ok(())
}

async fn cmd_suggest(workspace: &Workspace, file: &Path, query: &str, fuzzy: bool) -> Result<()> {
    if fuzzy {
        workspace.manager().set_autocomplete_match_type(MatchType::Fuzzy);
    }
    let file = resolve_path(file)?;
    let suggestions = workspace.suggest(&file, "", query).await?;
    println!("{}", serde_json::to_string_pretty(&suggestions)?);
    Ok(())
}

async fn cmd_contexts(workspace: &Workspace, files: &[PathBuf]) -> Result<()> {
    for file in files {
        workspace
            .manager()
            .resolve_closest_context("", &resolve_path(file)?)
            .await;
    }
    let report: Vec<ContextReport> = workspace
        .manager()
        .contexts()
        .iter()
        .map(|ctx| ContextReport {
            config_dir: ctx.config_dir().to_path_buf(),
            sources: ctx.config_sources().to_vec(),
            defaulted: ctx.is_default(),
            generation: ctx.generation(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_check(workspace: &Workspace, files: &[PathBuf], diagnostics: &LogReader) -> Result<()> {
    let strict = workspace.strict();
    for file in files {
        if let Err(e) = scan(workspace, file, strict).await {
            warn!(file = %file.display(), error = %e, "Skipping file");
        }
    }
    let report: Vec<Diagnostic> = diagnostics.entries().into_iter().map(Diagnostic::from).collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_settings(path: &Path, settings: &Settings, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(settings).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Settings at '{}' are valid.", path.display());
    }
    Ok(())
}

async fn load_settings(path: &Path) -> Result<Settings> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        Settings::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(Settings::default())
    }
}

/// `--root`, else `workspace.root` relative to the settings file, else the
/// current directory.
fn workspace_root(flag: Option<&Path>, settings_path: &Path, settings: &Settings) -> Result<PathBuf> {
    let root = match (flag, settings.workspace.root.as_deref()) {
        (Some(root), _) => root.to_path_buf(),
        (None, Some(root)) => settings_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(root),
        (None, None) => std::env::current_dir()?,
    };
    resolve_path(&root)
}

/// Canonical form of `path` when it exists, else its absolute form with `.`
/// and `..` folded away, so it compares cleanly against the root.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(canonical) => Ok(canonical),
        Err(_) => Ok(normalize(&std::path::absolute(path)?)),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_root_flag_wins() {
        let mut settings = Settings::default();
        settings.workspace.root = Some("web".to_string());
        let root = workspace_root(Some(Path::new("/srv/site")), Path::new("/etc/s.toml"), &settings)
            .unwrap();
        assert_eq!(root, PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_normalize_folds_dot_components() {
        assert_eq!(
            normalize(Path::new("/srv/proj/../proj/./app/x.html")),
            PathBuf::from("/srv/proj/app/x.html")
        );
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_resolve_path_matches_root_through_parent_components() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("proj/app")).unwrap();
        std::fs::write(tmp.path().join("proj/app/x.html"), "").unwrap();

        let root = resolve_path(&tmp.path().join("proj")).unwrap();
        let existing = resolve_path(&tmp.path().join("proj/app/../app/x.html")).unwrap();
        let missing = resolve_path(&root.join("app/../app/new.html")).unwrap();

        assert!(existing.starts_with(&root));
        assert_eq!(existing, root.join("app/x.html"));
        assert_eq!(missing, root.join("app/new.html"));
    }

    #[test]
    fn test_diagnostic_from_entry() {
        let entry = LogEntry {
            seq: 1,
            elapsed_secs: 0.0,
            level: Level::WARN,
            target: "stylescope_core::context::manager".to_string(),
            message: "Failed to load configuration".to_string(),
            fields: vec![("dir".to_string(), "/ws".to_string())],
        };
        let diagnostic = Diagnostic::from(entry);
        assert_eq!(diagnostic.level, "WARN");
        assert_eq!(diagnostic.fields.get("dir").map(String::as_str), Some("/ws"));
    }

    #[test]
    fn test_settings_root_is_relative_to_settings_file() {
        let mut settings = Settings::default();
        settings.workspace.root = Some("web".to_string());
        let root = workspace_root(None, Path::new("/srv/stylescope-settings.toml"), &settings).unwrap();
        assert_eq!(root, PathBuf::from("/srv/web"));
    }
}
