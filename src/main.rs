use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repowiki::cli::commands;
use repowiki::constants::exit;

#[derive(Parser)]
#[command(name = "repowiki")]
#[command(
    version,
    about = "Generate and publish documentation wikis for GitHub repositories"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file; defaults to the global and project config files
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a wiki and publish it (exit 0 done, 100 skipped, 1 failed)
    Generate {
        #[arg(help = "Repository as owner/name")]
        repo: String,
        #[arg(long, short, help = "Branch to document (default: remote default branch)")]
        branch: Option<String>,
        #[arg(long, env = "REPOWIKI_PAT", hide_env_values = true, help = "GitHub personal access token")]
        pat: Option<String>,
        #[arg(long, help = "Wiki config YAML (default: .repowiki/wiki.yaml in the checkout)")]
        wiki_config: Option<PathBuf>,
        #[arg(long, short, help = "Model for every stage, as provider/model")]
        model: Option<String>,
        #[arg(long, short, help = "Regenerate even if the wiki is up to date")]
        force: bool,
    },

    /// Download a repository and bring its retrieval index up to date
    Index {
        #[arg(help = "Repository as owner/name")]
        repo: String,
        #[arg(long, short, help = "Branch to index")]
        branch: Option<String>,
        #[arg(long, env = "REPOWIKI_PAT", hide_env_values = true, help = "GitHub personal access token")]
        pat: Option<String>,
    },

    /// Search a repository's retrieval index
    Search {
        #[arg(help = "Repository as owner/name")]
        repo: String,
        #[arg(help = "Natural language query")]
        query: String,
        #[arg(long, env = "REPOWIKI_PAT", hide_env_values = true, help = "GitHub personal access token")]
        pat: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (merged from all sources)
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
        eprintln!("\x1b[31mrepowiki encountered an unexpected error:\x1b[0m");
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

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::from(exit::FAILURE)
        }
    }
}

fn run_cli() -> anyhow::Result<u8> {
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
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::Config {
        action: ConfigAction::Path,
    } = cli.command
    {
        commands::config::path()?;
        return Ok(exit::SUCCESS);
    }

    let settings = commands::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            repo,
            branch,
            pat,
            wiki_config,
            model,
            force,
        } => {
            let outcome = commands::generate::run(
                commands::generate::GenerateOptions {
                    repo,
                    branch,
                    pat,
                    wiki_config,
                    model,
                    force,
                },
                settings,
            )?;
            return Ok(outcome.exit_code());
        }
        Commands::Index { repo, branch, pat } => {
            commands::index::run(&repo, branch.as_deref(), pat, &settings)?;
        }
        Commands::Search {
            repo,
            query,
            pat,
            format,
        } => {
            commands::search::run(&repo, &query, pat, &format, &settings)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => commands::config::show(&settings, &format)?,
            ConfigAction::Path => commands::config::path()?,
        },
    }

    Ok(exit::SUCCESS)
}
