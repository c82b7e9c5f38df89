use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod app;
mod config;
mod error;
mod lessons;
mod logging;
mod practice;
mod race;
mod report;

use app::App;
use config::Config;
use error::AppError;

/// A typing trainer and racer for your terminal
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory holding `settings.toml` and the `lessons/` folder
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Type a lesson
    Practice {
        #[arg(long)]
        lesson: Option<String>,
        /// Fail the session when accuracy drops too low
        #[arg(long)]
        exam: bool,
    },
    /// Race simulated opponents
    Race {
        #[arg(long)]
        lesson: Option<String>,
        #[arg(
            long,
            default_value_t = 3,
            value_parser = clap::value_parser!(u8).range(1..=race::MAX_BOTS as i64)
        )]
        bots: u8,
    },
    /// Show level, streak, missions and badges
    Progress,
    /// Show past sessions
    History,
    /// List available lessons
    Lessons,
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::get(cli.config)?;
    logging::init(&config.data_dir, &config.settings.log_level)?;

    let mut app = App::new(config)?;
    let mut out = stdout();

    match cli.command.unwrap_or(Command::Practice {
        lesson: None,
        exam: false,
    }) {
        Command::Practice { lesson, exam } => practice::run(&mut app, lesson.as_deref(), exam)?,
        Command::Race { lesson, bots } => {
            race::run(&mut app, lesson.as_deref(), usize::from(bots))?;
        }
        Command::Progress => report::progress(&mut out, app.ledger())?,
        Command::History => report::history(&mut out, &app.archive().history())?,
        Command::Lessons => report::lessons(&mut out, &app.config().lessons)?,
    }

    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "exiting");
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
