use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::commands;

/// The main CLI command line interface.
#[derive(Parser)]
#[command(name = "evidence")]
#[command(version)]
#[command(about = "Step recorder for manual test runs - screenshots in, test evidence out")]
#[command(long_about = "Evidence records a manual test run as an ordered list of steps.\n\
    Each step is a screenshot with a title and notes, kept in a session\n\
    directory that survives crashes, and can be exported as an HTML,\n\
    Markdown or CSV document.")]
#[command(after_help = "EXAMPLES:\n    \
    evidence new runs/checkout                 Start a session\n    \
    evidence capture -s runs/checkout -i a.png Add a screenshot as a step\n    \
    evidence steps -s runs/checkout            List steps\n    \
    evidence notes 1 \"Login OK\"                Annotate a step\n    \
    evidence export -s runs/checkout           Write an HTML report\n    \
    evidence watch ~/Screenshots               Capture hands-free\n\n\
    For more information about a command, run 'evidence <command> --help'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create a new session directory
    New(commands::new::Args),

    /// Add a screenshot to the session as a new step
    #[command(long_about = "Registers an image file produced by a screenshot tool as the\n\
        next step of the session. The image is copied into the session's\n\
        assets/ directory before the step appears.")]
    Capture(commands::capture::Args),

    /// List the steps of a session
    Steps(commands::steps::Args),

    /// Change a step's title
    Rename(commands::rename::Args),

    /// Set or clear a step's notes
    Notes(commands::notes::Args),

    /// Record a step's expected and actual result
    Results(commands::results::Args),

    /// Move a step to another position
    Reorder(commands::reorder::Args),

    /// Delete a step and its screenshot
    Delete(commands::delete::Args),

    /// Render the session as an HTML, Markdown or CSV document
    #[command(long_about = "Saves any pending edits, then renders every step in order\n\
        with its screenshot, title, notes and capture time. Steps whose\n\
        screenshot is missing are exported with a placeholder.")]
    Export(commands::export::Args),

    /// Show session health and persistence state
    Status(commands::status::Args),

    /// Capture every image dropped into a folder until Ctrl+C
    #[command(long_about = "Keeps the session open and turns each new image file in the\n\
        folder into a step. Activity is also logged to ~/.evidence/evidence.log.")]
    Watch(commands::watch::Args),

    /// View and manage configuration settings
    #[command(long_about = "Provides subcommands to show, get, and set configuration values.\n\
        Configuration is stored in ~/.evidence/config.yaml.")]
    Config(commands::config::Args),

    /// Generate shell completion scripts
    Completions(commands::completions::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "evidence=debug,evidence_cli=debug"
    } else {
        "evidence=info,evidence_cli=info"
    };

    // Long-running watch sessions also log to a file
    let (file_layer, _guard) = match &cli.command {
        Commands::Watch(_) => match file_logging() {
            Ok((layer, guard)) => (Some(layer), Some(guard)),
            Err(e) => {
                eprintln!("Warning: file logging disabled: {e}");
                (None, None)
            }
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    match cli.command {
        Commands::New(args) => commands::new::run(args),
        Commands::Capture(args) => commands::capture::run(args),
        Commands::Steps(args) => commands::steps::run(args),
        Commands::Rename(args) => commands::rename::run(args),
        Commands::Notes(args) => commands::notes::run(args),
        Commands::Results(args) => commands::results::run(args),
        Commands::Reorder(args) => commands::reorder::run(args),
        Commands::Delete(args) => commands::delete::run(args),
        Commands::Export(args) => commands::export::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Completions(args) => {
            commands::completions::generate_completions(&mut Cli::command(), args.shell);
            Ok(())
        }
    }
}

type FileLayer = tracing_subscriber::fmt::Layer<
    tracing_subscriber::Registry,
    tracing_subscriber::fmt::format::DefaultFields,
    tracing_subscriber::fmt::format::Format,
    tracing_appender::non_blocking::NonBlocking,
>;

/// Builds a layer writing to `~/.evidence/evidence.log`. The guard must
/// outlive the program's logging.
fn file_logging() -> Result<(FileLayer, WorkerGuard)> {
    let log_path = evidence_cli::config::Config::log_path()?;
    let dir = log_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let file_name = log_path.file_name().unwrap_or_default().to_os_string();

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    Ok((layer, guard))
}
