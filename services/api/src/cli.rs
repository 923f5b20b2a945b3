use crate::demo::{run_calculate, run_demo, CalculateArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use unit_pricing::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Unit Pricing Service",
    about = "Serve and run the per-unit pricing pipeline from the command line",
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
    /// Price real-estate objects offline
    Pricing {
        #[command(subcommand)]
        command: PricingCommand,
    },
    /// Price the built-in demo object and print the result
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum PricingCommand {
    /// Run the pipeline over an object and a distribution config read from JSON files
    Calculate(CalculateArgs),
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
        Command::Pricing {
            command: PricingCommand::Calculate(args),
        } => run_calculate(args),
        Command::Demo(args) => run_demo(args),
    }
}
