use crate::demo::{run_demo, run_forms, DemoArgs, FormsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rodo_forms::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "RODO Forms",
    about = "Serve and demonstrate the GDPR regulatory form wizards",
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
    /// List the built-in forms and their steps
    Forms(FormsArgs),
    /// Walk the incident report wizard end-to-end from the command line
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
        Command::Forms(args) => run_forms(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
