mod commands;
mod dispatch;
mod helpers;

use clap::Parser;
use dmrg_core::domain::DmrgError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    init_tracing();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_dmrg_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

fn init_tracing() {
    // Default level: WARN. Override with RUST_LOG=dmrg_core=debug etc.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("dmrg-flow".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "dmrg-flow",
    version,
    about = "Offline harness for DMRG and dynamic-correlator solver runs"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Validate parameters and write the solver input line
    Encode(commands::EncodeArgs),
    /// Classify a retrieved solver log
    Classify(commands::ClassifyArgs),
    /// Plan how a parent folder is exposed to a new attempt
    Stage(commands::StageArgs),
    /// Drive the restart policy over recorded attempt logs
    Replay(commands::ReplayArgs),
    /// Print the failure exit-code catalog
    ExitCodes,
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Encode(args) => commands::run_encode_command(args),
        CliCommand::Classify(args) => commands::run_classify_command(args),
        CliCommand::Stage(args) => commands::run_stage_command(args),
        CliCommand::Replay(args) => commands::run_replay_command(args),
        CliCommand::ExitCodes => commands::run_exit_codes_command(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Core(DmrgError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DmrgError> for CliError {
    fn from(error: DmrgError) -> Self {
        Self::Core(error)
    }
}

impl CliError {
    fn as_dmrg_error(&self) -> DmrgError {
        match self {
            Self::Usage(message) => {
                DmrgError::input_validation("INPUT.CLI_USAGE", message.trim_end().to_string())
            }
            Self::Core(error) => error.clone(),
            Self::Internal(error) => DmrgError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
