use crate::demo::{run_demo, DemoArgs};
use crate::evaluate::{run_evaluate, EvaluateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use grc_compliance::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "GRC Compliance Engine",
    about = "Assess register assets against declarative compliance rules",
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
    /// Evaluate a JSON rule file against a CSV asset inventory without persisting results
    Evaluate(EvaluateArgs),
    /// Assess the sample register end to end and print the outcome
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
        Command::Evaluate(args) => run_evaluate(args),
        Command::Demo(args) => run_demo(args),
    }
}
