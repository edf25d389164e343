use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pnsb_progress::error::AppError;

use crate::report::{run_report, ReportArgs};
use crate::server;

#[derive(Parser, Debug)]
#[command(
    name = "PNSB Progress",
    about = "Serve or print the PNSB survey progress dashboard",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the dashboard derived from a snapshot file
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON snapshot file polled for survey data
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Report(args) => run_report(args),
    }
}
