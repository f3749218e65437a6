use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "notegraph")]
#[command(bin_name = "notegraph")]
#[command(version)]
#[command(about = "Incrementally sync an indented outline into an enriched note graph")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'c',
        long,
        env = "NOTEGRAPH_CONFIG",
        global = true,
        help = "Path to a TOML config file."
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'd',
        long,
        env = "NOTEGRAPH_DB_PATH",
        global = true,
        help = "SQLite database path; overrides [database] path."
    )]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Synchronize the graph with an outline file.")]
    Sync(SourceArgs),
    #[command(about = "Show what a sync would change, without writing or enriching.")]
    Plan(SourceArgs),
    #[command(about = "Print node and edge counts.")]
    Stats(OutputArgs),
    #[command(about = "List tag nodes with reference counts.")]
    Tags(OutputArgs),
    #[command(about = "Probe the configured enrichment provider.")]
    Health,
    #[command(about = "Remove every note, node and edge from the graph.")]
    Clear(ClearArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    #[arg(help = "Outline text file to read.")]
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    #[arg(long, help = "Confirm removal of all graph data.")]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parses_sync_with_global_db_after_subcommand() {
        let cli = Cli::try_parse_from(["notegraph", "sync", "notes.txt", "--db", "/tmp/g.sqlite3"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/g.sqlite3")));
        match cli.command {
            Commands::Sync(args) => assert_eq!(args.file, PathBuf::from("notes.txt")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn clear_defaults_to_unconfirmed() {
        let cli = Cli::try_parse_from(["notegraph", "clear"]).unwrap();
        assert!(matches!(cli.command, Commands::Clear(args) if !args.yes));
    }

    #[test]
    fn sync_requires_file() {
        assert!(Cli::try_parse_from(["notegraph", "sync"]).is_err());
    }
}
