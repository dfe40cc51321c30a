use anyhow::Result;
use calpulse::app::Application;
use calpulse::cli::Cli;
use calpulse::config::{self, Config};
use clap::Parser;
use env_logger::Env;
use log::{debug, error};

fn main() {
    let cli = Cli::parse();

    // Initialize logging with custom format
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    if let Err(err) = run(cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config::get_config_path()?,
    };
    debug!("Using config file {}", config_path.display());
    let config = Config::load_from(&config_path)?;

    Application::new(config, config_path).run(cli.command)
}
