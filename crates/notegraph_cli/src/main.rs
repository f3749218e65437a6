//! `notegraph` command-line entry point.
//!
//! # Responsibility
//! - Resolve config, logging and storage, then dispatch one subcommand.
//! - Print run reports for humans; exit non-zero on failed runs.

mod cli;

use cli::{Cli, Commands};
use log::warn;
use notegraph_core::db::DbError;
use notegraph_core::enrich::{build_enricher, DisabledEnricher, Enricher, EnrichmentError};
use notegraph_core::repo::graph_repo::{RepoError, SqliteGraphRepository};
use notegraph_core::service::graph_service::GraphService;
use notegraph_core::service::sync_service::{
    SyncError, SyncOptions, SyncPlan, SyncReport, SyncService,
};
use notegraph_core::{
    init_logging, open_db, open_db_in_memory, open_db_read_only, AppConfig, ConfigError,
    LoggingError,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Repo(RepoError),
    Enrichment(EnrichmentError),
    Sync(SyncError),
    Io { path: PathBuf, source: std::io::Error },
    Output(std::io::Error),
    Usage(&'static str),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Enrichment(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
            Self::Output(err) => write!(f, "failed to write output: {err}"),
            Self::Usage(message) => write!(f, "{message}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Enrichment(err) => Some(err),
            Self::Sync(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Output(err) => Some(err),
            Self::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<EnrichmentError> for CliError {
    fn from(value: EnrichmentError) -> Self {
        Self::Enrichment(value)
    }
}

impl From<SyncError> for CliError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Output(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value.into())
    }
}

fn main() -> ExitCode {
    use clap::Parser;

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if let Some(hint) = failure_hint(&err) {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Follow-up advice printed after a failed sync.
fn failure_hint(err: &CliError) -> Option<&'static str> {
    match err {
        CliError::Sync(sync_err) if sync_err.is_safe_to_rerun() => {
            Some("committed changes are kept; re-running is safe")
        }
        CliError::Sync(SyncError::IdentityConflict(_)) => Some(
            "the stored graph needs repair; re-running will not fix this. \
             Run `notegraph clear --yes`, then sync again.",
        ),
        _ => None,
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    if let Some(dir) = config.logging.dir.as_deref() {
        init_logging(&config.logging.level, &absolute(dir)?)?;
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&config, cli.command, &mut out, |key: &str| std::env::var(key).ok())
}

fn execute(
    config: &AppConfig,
    command: Commands,
    out: &mut impl Write,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<(), CliError> {
    match command {
        Commands::Sync(args) => {
            let source = read_source(&args.file)?;
            let enricher = build_enricher(&config.enrichment, lookup_env)?;
            if !enricher.health_check() {
                warn!(
                    "event=enrich_health module=cli status=error provider={}",
                    enricher.provider_id()
                );
                eprintln!(
                    "warning: enrichment provider `{}` is not reachable; new notes will be stored without metadata",
                    enricher.provider_id()
                );
            }

            let mut conn = open_db(&config.database.path)?;
            let repo = SqliteGraphRepository::try_new(&mut conn)?;
            let options = SyncOptions {
                workers: config.enrichment.workers,
            };
            let mut service = SyncService::new(repo, enricher, options);
            let report = service.sync_bytes(&source)?;
            write_report(out, &report)?;
        }
        Commands::Plan(args) => {
            let source = read_source(&args.file)?;
            let db_path = &config.database.path;
            let mut conn = if db_path.exists() {
                open_db_read_only(db_path)?
            } else {
                writeln!(
                    out,
                    "no graph database at `{}` yet; planning against an empty graph",
                    db_path.display()
                )?;
                open_db_in_memory()?
            };
            let repo = SqliteGraphRepository::try_new(&mut conn)?;
            let service = SyncService::new(repo, DisabledEnricher, SyncOptions::default());
            let plan = service.plan_bytes(&source)?;
            write_plan(out, &plan)?;
        }
        Commands::Stats(args) => {
            let mut conn = open_db(&config.database.path)?;
            let service = GraphService::new(SqliteGraphRepository::try_new(&mut conn)?);
            let stats = service.stats()?;
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
            } else {
                writeln!(out, "notes:            {}", stats.notes)?;
                writeln!(out, "tags:             {}", stats.tags)?;
                writeln!(out, "entities:         {}", stats.entities)?;
                writeln!(out, "date buckets:     {}", stats.date_buckets)?;
                writeln!(out, "structural edges: {}", stats.structural_edges)?;
            }
        }
        Commands::Tags(args) => {
            let mut conn = open_db(&config.database.path)?;
            let service = GraphService::new(SqliteGraphRepository::try_new(&mut conn)?);
            let tags = service.tags()?;
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&tags)?)?;
            } else if tags.is_empty() {
                writeln!(out, "no tags")?;
            } else {
                for tag in tags {
                    writeln!(out, "#{:<24} {}", tag.name, tag.note_count)?;
                }
            }
        }
        Commands::Health => {
            let enricher = build_enricher(&config.enrichment, lookup_env)?;
            let healthy = enricher.health_check();
            writeln!(
                out,
                "provider={} model={} status={}",
                enricher.provider_id(),
                config.enrichment.effective_model(),
                if healthy { "ok" } else { "unreachable" }
            )?;
        }
        Commands::Clear(args) => {
            if !args.yes {
                return Err(CliError::Usage(
                    "refusing to clear the graph without --yes",
                ));
            }
            let mut conn = open_db(&config.database.path)?;
            let mut service = GraphService::new(SqliteGraphRepository::try_new(&mut conn)?);
            let removed = service.clear()?;
            writeln!(
                out,
                "removed {} notes, {} tags, {} entities, {} date buckets, {} structural edges",
                removed.notes,
                removed.tags,
                removed.entities,
                removed.date_buckets,
                removed.structural_edges
            )?;
        }
    }
    Ok(())
}

/// Reads raw bytes; undecodable lines become parse warnings downstream.
fn read_source(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn absolute(path: &Path) -> Result<PathBuf, CliError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn write_report(out: &mut impl Write, report: &SyncReport) -> Result<(), CliError> {
    writeln!(
        out,
        "sync ok run_id={} provider={} duration_ms={}",
        report.run_id, report.provider, report.duration_ms
    )?;
    writeln!(
        out,
        "notes={} new={} existing={} deleted={} repositioned={}",
        report.notes, report.new, report.existing, report.deleted, report.positions_updated
    )?;
    writeln!(
        out,
        "structural_edges={} orphans_removed={} enrichment_failures={}",
        report.structural_edges,
        report.orphans_removed.total(),
        report.enrichment_failures
    )?;
    for warning in &report.parse_warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

fn write_plan(out: &mut impl Write, plan: &SyncPlan) -> Result<(), CliError> {
    writeln!(
        out,
        "plan notes={} new={} existing={} deleted={} structural_edges={}",
        plan.notes,
        plan.new.len(),
        plan.existing,
        plan.deleted.len(),
        plan.structural_edges
    )?;
    for note in &plan.new {
        writeln!(out, "+ [{}] {}", note.line_position, note.content)?;
    }
    for fingerprint in &plan.deleted {
        writeln!(out, "- {}", fingerprint.short())?;
    }
    for warning in &plan.parse_warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{execute, failure_hint, CliError};
    use crate::cli::{ClearArgs, Commands, OutputArgs, SourceArgs};
    use notegraph_core::config::ProviderKind;
    use notegraph_core::model::fingerprint::Fingerprint;
    use notegraph_core::repo::graph_repo::RepoError;
    use notegraph_core::service::sync_service::SyncError;
    use notegraph_core::AppConfig;
    use std::path::Path;

    fn config_for(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.path = dir.join("graph.sqlite3");
        config.enrichment.provider = ProviderKind::None;
        config
    }

    fn run_command(config: &AppConfig, command: Commands) -> Result<String, CliError> {
        let mut out = Vec::new();
        execute(config, command, &mut out, |_: &str| None)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn sync_then_plan_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let outline = dir.path().join("outline.txt");
        std::fs::write(&outline, "Task A #work\n  Sub A #work\nTask B #home\n").unwrap();

        let report = run_command(
            &config,
            Commands::Sync(SourceArgs {
                file: outline.clone(),
            }),
        )
        .unwrap();
        assert!(report.contains("new=3"));
        assert!(report.contains("structural_edges=1"));

        let plan = run_command(&config, Commands::Plan(SourceArgs { file: outline })).unwrap();
        assert!(plan.contains("new=0 existing=3 deleted=0"));

        let stats = run_command(&config, Commands::Stats(OutputArgs { json: true })).unwrap();
        let value: serde_json::Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(value["notes"], 3);
        assert_eq!(value["tags"], 2);

        let tags = run_command(&config, Commands::Tags(OutputArgs { json: false })).unwrap();
        assert!(tags.lines().next().unwrap().starts_with("#work"));
    }

    #[test]
    fn clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let err = run_command(&config, Commands::Clear(ClearArgs { yes: false })).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));

        let cleared = run_command(&config, Commands::Clear(ClearArgs { yes: true })).unwrap();
        assert!(cleared.starts_with("removed 0 notes"));
    }

    #[test]
    fn missing_source_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let err = run_command(
            &config,
            Commands::Sync(SourceArgs {
                file: dir.path().join("absent.txt"),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn health_reports_disabled_provider() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_command(&config_for(dir.path()), Commands::Health).unwrap();
        assert!(output.starts_with("provider=none"));
        assert!(output.trim_end().ends_with("status=ok"));
    }

    #[test]
    fn plan_without_database_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let outline = dir.path().join("outline.txt");
        std::fs::write(&outline, "Task A\n  Sub A\n").unwrap();

        let plan = run_command(&config, Commands::Plan(SourceArgs { file: outline })).unwrap();
        assert!(plan.starts_with("no graph database"));
        assert!(plan.contains("new=2 existing=0 deleted=0"));
        assert!(!config.database.path.exists());
    }

    #[test]
    fn sync_skips_undecodable_line_and_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let outline = dir.path().join("outline.txt");
        std::fs::write(&outline, b"Task A\ncaf\xe9 latin-1\nTask B\n").unwrap();

        let report = run_command(
            &config,
            Commands::Sync(SourceArgs {
                file: outline.clone(),
            }),
        )
        .unwrap();
        assert!(report.contains("notes=2 new=2"));
        assert!(report.contains("warning: line 2"));
    }

    #[test]
    fn identity_conflict_hint_says_rerun_will_not_help() {
        let conflict = CliError::Sync(SyncError::IdentityConflict(Fingerprint::of_line("Task A")));
        let hint = failure_hint(&conflict).unwrap();
        assert!(hint.contains("needs repair"));
        assert!(hint.contains("re-running will not fix this"));

        let persistence = CliError::Sync(SyncError::Persistence(RepoError::InvalidData(
            "bad row".to_string(),
        )));
        assert!(failure_hint(&persistence).unwrap().contains("re-running is safe"));
        assert!(failure_hint(&CliError::Usage("x")).is_none());
    }
}
