use anyhow::Result;
use clap::Parser;
use slotbar::Bar;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config;

mod copy;
mod demo;
mod fetch;
mod pipe;
mod touch;

/// Multi-slot progress bars for everyday transfers
#[derive(Parser, Debug, Default)]
#[command(author, version, about, arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    #[command(alias = "cp")]
    Copy(copy::Args),
    #[command(alias = "t")]
    Touch(touch::Args),
    #[command(alias = "p")]
    Pipe(pipe::Args),
    #[command(alias = "f")]
    Fetch(fetch::Args),
    Demo(demo::Args),

    /// Store a glyph override in the configuration
    Set { key: String, value: String },
    /// Delete the configuration
    Clean,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Ends the bar from a listener, where errors can only be logged
fn end_logged(bar: &mut Bar, message: &str) {
    if let Err(err) = bar.end(Some(message)) {
        warn!("couldn't end the bar: {err}");
    }
}

pub async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    match args.command {
        Some(Command::Copy(cmd)) => copy::execute(cmd).await,
        Some(Command::Touch(cmd)) => touch::execute(cmd).await,
        Some(Command::Pipe(cmd)) => pipe::execute(cmd).await,
        Some(Command::Fetch(cmd)) => fetch::execute(cmd).await,
        Some(Command::Demo(cmd)) => demo::execute(cmd).await,
        Some(Command::Set { key, value }) => config::save(&key, &value),
        Some(Command::Clean) => config::clean(),
        None => unreachable!(),
    }
}
