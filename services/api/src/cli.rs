use crate::commands::{run_analyze, run_check, AnalyzeArgs, CheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use telehealth_eligibility::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Telehealth Eligibility",
    about = "Check clinic patient populations against the Medicare telehealth disaster exemption",
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
    /// Analyse a patient postcode list and print the population report
    Analyze(AnalyzeArgs),
    /// Check a single postcode
    Check(CheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Analyze(args) => run_analyze(args).await,
        Command::Check(args) => run_check(args).await,
    }
}
