use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use umbra_cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_filter().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let stdout = io::stdout();
    match umbra_cli::run(&cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", console::style("error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
