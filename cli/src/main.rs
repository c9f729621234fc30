use clap::{Parser, Subcommand};
use lobbyscope_cli::{CliContext, HttpStatsProvider, commands, logging, prompt, render, spawn_reader};
use lobbyscope_core::context::{AppConfig, AppConfigExt, TrackerConfig};
use lobbyscope_core::tracker::SessionTracker;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(version, about = "Shows who is in your game lobby and how good they are")]
struct Args {
    /// Log file to tail instead of the configured one
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum concurrent stats requests
    #[arg(short, long)]
    threads: Option<usize>,

    /// Don't print the lobby table when it changes
    #[arg(short, long)]
    quiet: bool,

    /// Debug logging for lobbyscope crates
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    let _log_guard = logging::init(args.verbose);

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path).map_err(|e| error_chain(&e))?,
        None => AppConfig::load(),
    };
    if let Some(path) = &args.log_file {
        config.log_path = path.display().to_string();
    }
    if let Some(threads) = args.threads {
        config.cache.workers = threads;
    }

    let tracker_config = TrackerConfig::from_app_config(&config).map_err(|e| error_chain(&e))?;
    let provider = HttpStatsProvider::new(&config.provider).map_err(|e| error_chain(&e))?;
    let tracker = SessionTracker::start(tracker_config, Arc::new(provider));
    let ctx = CliContext::new(config, args.config.clone(), tracker);

    let printer = (!args.quiet).then(|| render::spawn_printer(ctx.tracker.subscribe()));

    let mut input = spawn_reader();
    loop {
        prompt()?;
        // A tracker that stops on its own (e.g. the log never appeared) ends the REPL right away
        let line = tokio::select! {
            line = input.recv() => line.unwrap_or_else(|| "exit".to_string()),
            _ = ctx.tracker.stopped() => {
                println!();
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &ctx).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    ctx.tracker.shutdown();
    let result = ctx.tracker.wait().await;
    if let Some(printer) = printer {
        printer.abort();
    }
    result.map_err(|e| error_chain(&e))
}

#[derive(Parser)]
struct Repl {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current lobby
    Roster,
    /// Show stats for a player, fetching them if needed
    Stats {
        #[arg(short, long)]
        name: String,
    },
    /// Drop a player's cached stats and fetch them again
    Refresh {
        #[arg(short, long)]
        name: String,
    },
    ClearCache,
    Config,
    Exit,
}

async fn respond(line: &str, ctx: &CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "lobbyscope".to_string());
    let cli = Repl::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Roster) => commands::show_roster(ctx),
        Some(Commands::Stats { name }) => commands::show_stats(name, ctx).await,
        Some(Commands::Refresh { name }) => commands::refresh_stats(name, ctx).await,
        Some(Commands::ClearCache) => commands::clear_cache(ctx),
        Some(Commands::Config) => commands::show_settings(ctx),
        Some(Commands::Exit) => {
            commands::exit();
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}

/// Error message including every source in the chain.
fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
