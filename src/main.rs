use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docloom::cli::commands;
use docloom::{Config, ConfigLoader};

#[derive(Parser)]
#[command(name = "docloom")]
#[command(
    version,
    about = "Token-budgeted question answering over document archives"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Load configuration from a specific file")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk documents and hand them to the similarity store
    Index,

    /// Generate condensed summaries for documents that lack one
    Summarize {
        #[arg(long, help = "Regenerate summaries that already exist")]
        force: bool,
    },

    /// Ask a question over the indexed corpus
    Ask {
        #[arg(help = "Question to answer; omit for an interactive session")]
        question: Option<String>,
        #[arg(long, help = "Show the retrieved passages behind the answer")]
        passages: bool,
    },

    /// Report per-document token counts
    Tokens {
        #[arg(long, short, help = "Write counts to a CSV file")]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the merged effective configuration
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write a default project configuration
    Init {
        #[arg(long, help = "Overwrite an existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mdocloom encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Default hook prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config actions are self-contained and must work before a valid
    // configuration exists
    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigAction::Show { format } => commands::config::show(format)?,
            ConfigAction::Path => commands::config::path(),
            ConfigAction::Init { force } => commands::config::init(*force)?,
        }
        return Ok(());
    }

    let config: Config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let rt = Runtime::new()?;
    match cli.command {
        Commands::Index => rt.block_on(commands::index::run(&config))?,
        Commands::Summarize { force } => rt.block_on(commands::summarize::run(&config, force))?,
        Commands::Ask { question, passages } => {
            rt.block_on(commands::ask::run(&config, question, passages))?
        }
        Commands::Tokens { output } => commands::tokens::run(&config, output)?,
        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}
