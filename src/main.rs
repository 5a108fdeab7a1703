use owo_colors::OwoColorize;

mod cli;
mod config;

#[tokio::main]
async fn main() {
    if let Err(err) = cli::run().await {
        eprintln!("{}", format!("[ERROR] {err:#}").red());
        std::process::exit(1);
    }
}
