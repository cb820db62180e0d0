use clap::Parser;
use log::error;

use supply_import::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    if let Err(e) = cli.run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
