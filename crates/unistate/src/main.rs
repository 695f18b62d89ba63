mod cli;
mod commands;
mod config;
mod error;
mod output;
mod secrets;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    // Commands return their exit code; errors map to theirs.
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Command::Validate(args) => commands::validate_cmd::handle(&args, &cli.global),

        Command::Diff(args) => commands::diff_cmd::handle(&args, &cli.global).await,

        Command::Deploy(args) => commands::deploy::handle(&args, &cli.global).await,

        Command::Schema(args) => commands::schema_cmd::handle(&args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "unistate", &mut std::io::stdout());
            Ok(error::exit_code::SUCCESS)
        }
    }
}
