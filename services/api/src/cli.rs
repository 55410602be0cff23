use crate::demo::{run_demo, run_standings, DemoArgs, StandingsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use trackline::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Trackline",
    about = "Run and demonstrate the Trackline recurring-challenge service from the command line",
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
    /// Print period standings for an offline seeded season
    Standings(StandingsArgs),
    /// Run an end-to-end CLI demo covering a full verification season
    Demo(DemoArgs),
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
        Command::Standings(args) => run_standings(args),
        Command::Demo(args) => run_demo(args),
    }
}
