use super::CliError;
use super::dispatch::kind_value_parser;
use super::helpers::{list_file_names, print_json, read_parameter_file, read_raw_output};
use anyhow::Context;
use dmrg_core::classifier::{ClassifiedResult, RetrievedOutput, classify_output};
use dmrg_core::config::{RestartPolicyConfig, RestartPolicyConfigError, load_restart_policy_config};
use dmrg_core::domain::{
    CalculationKind, DmrgError, DmrgResult, EXIT_CODE_CATALOG, HostId, ParameterSet, RawOutput,
    RemoteFolderRef,
};
use dmrg_core::encoder::encode_for_kind;
use dmrg_core::orchestrator::{CalculationRequest, JobHandle, SolverBackend, run_calculation};
use dmrg_core::parser::load_legacy_deck;
use dmrg_core::policy::RestartPolicy;
use dmrg_core::staging::plan_parent_staging;
use dmrg_core::submission::{SubmissionRequest, write_text_artifact};
use dmrg_core::validation::validate_parameters;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_HOST: &str = "localhost";

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["parameters", "deck"])))]
pub(super) struct EncodeArgs {
    /// Calculation kind (dmrg or dyncorr)
    #[arg(long, value_parser = kind_value_parser)]
    kind: CalculationKind,

    /// JSON object of named parameters
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Legacy five-line DMRG input deck
    #[arg(long)]
    deck: Option<PathBuf>,

    /// Write the input file here instead of printing the line
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ClassifyArgs {
    /// Calculation kind that produced the log
    #[arg(long, value_parser = kind_value_parser)]
    kind: CalculationKind,

    /// Retrieved solver log
    log: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct StageArgs {
    /// Calculation kind of the new attempt
    #[arg(long, value_parser = kind_value_parser)]
    kind: CalculationKind,

    /// Host the new attempt runs on
    #[arg(long)]
    target_host: String,

    /// Host holding the parent folder
    #[arg(long)]
    parent_host: String,

    /// Parent folder path on its host
    #[arg(long)]
    parent_path: String,
}

#[derive(clap::Args)]
pub(super) struct ReplayArgs {
    /// Calculation kind of the chain
    #[arg(long, value_parser = kind_value_parser)]
    kind: CalculationKind,

    /// Restart policy config (JSON); built-in defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON object of named parameters for the first attempt
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Host the attempts run on
    #[arg(long, default_value = DEFAULT_HOST)]
    target_host: String,

    /// Host holding the parent folder
    #[arg(long, default_value = DEFAULT_HOST)]
    parent_host: String,

    /// Parent folder path; required for dyncorr
    #[arg(long)]
    parent_path: Option<String>,

    /// One recorded log per attempt, in order
    #[arg(required = true)]
    logs: Vec<PathBuf>,
}

pub(super) fn run_encode_command(args: EncodeArgs) -> Result<i32, CliError> {
    let parameters = match (&args.parameters, &args.deck) {
        (Some(path), _) => read_parameter_file(path)?,
        (None, Some(path)) => load_legacy_deck(path)?,
        (None, None) => {
            return Err(CliError::Usage(
                "one of --parameters or --deck is required".to_string(),
            ));
        }
    };

    validate_parameters(args.kind, &parameters)?;
    let encoded = encode_for_kind(&parameters, args.kind);

    match &args.output {
        Some(path) => {
            write_text_artifact(path, encoded.as_str())
                .with_context(|| format!("failed to write input file '{}'", path.display()))?;
            debug!(kind = %args.kind, path = %path.display(), "input file written");
        }
        None => println!("{encoded}"),
    }
    Ok(0)
}

#[derive(Serialize)]
struct ClassifyReport<'a> {
    kind: CalculationKind,
    exit_code: u32,
    result: &'a ClassifiedResult,
}

pub(super) fn run_classify_command(args: ClassifyArgs) -> Result<i32, CliError> {
    let raw = read_raw_output(&args.log)?;
    let result = classify_output(args.kind, &raw);
    print_json(&ClassifyReport {
        kind: args.kind,
        exit_code: result.exit_code(),
        result: &result,
    })?;
    Ok(if result.is_success() { 0 } else { 1 })
}

pub(super) fn run_stage_command(args: StageArgs) -> Result<i32, CliError> {
    let parent = RemoteFolderRef::new(args.parent_host, args.parent_path);
    let instruction = plan_parent_staging(
        &HostId::new(args.target_host),
        Some(&parent),
        args.kind.parent_folder_name(),
    )
    .ok_or_else(|| {
        CliError::Core(DmrgError::internal(
            "RUN.STAGING",
            "no staging instruction planned for a supplied parent folder",
        ))
    })?;
    print_json(&instruction)?;
    Ok(0)
}

pub(super) fn run_exit_codes_command() -> Result<i32, CliError> {
    print_json(&EXIT_CODE_CATALOG)?;
    Ok(0)
}

pub(super) fn run_replay_command(args: ReplayArgs) -> Result<i32, CliError> {
    let config = match &args.config {
        Some(path) => load_restart_policy_config(path).map_err(policy_config_error)?,
        None => RestartPolicyConfig::default(),
    };
    let policy = RestartPolicy::new(config).map_err(policy_config_error)?;

    let parameters = match &args.parameters {
        Some(path) => read_parameter_file(path)?,
        None => ParameterSet::new(),
    };
    let target_host = HostId::new(args.target_host);
    let mut request = CalculationRequest::new(args.kind, parameters, target_host.clone());
    if let Some(parent_path) = args.parent_path {
        request = request.with_parent(RemoteFolderRef::new(args.parent_host, parent_path));
    }

    let mut backend = ReplayBackend::new(target_host, args.logs);
    let report = run_calculation(&mut backend, &policy, &request)?;
    print_json(&report)?;
    Ok(if report.succeeded() { 0 } else { 1 })
}

fn policy_config_error(error: RestartPolicyConfigError) -> CliError {
    CliError::Core(DmrgError::input_validation(
        "INPUT.POLICY_CONFIG",
        error.to_string(),
    ))
}

/// Serves recorded logs in order, one per submitted attempt.
struct ReplayBackend {
    host: HostId,
    logs: VecDeque<PathBuf>,
    submitted: usize,
}

impl ReplayBackend {
    fn new(host: HostId, logs: Vec<PathBuf>) -> Self {
        Self {
            host,
            logs: logs.into(),
            submitted: 0,
        }
    }

    fn exhausted(&self) -> DmrgError {
        DmrgError::execution(
            "RUN.REPLAY_EXHAUSTED",
            format!(
                "no recorded log left for attempt {} after {} replayed",
                self.submitted + 1,
                self.submitted
            ),
        )
    }
}

impl SolverBackend for ReplayBackend {
    fn submit(&mut self, request: &SubmissionRequest) -> DmrgResult<JobHandle> {
        let log = self.logs.front().ok_or_else(|| self.exhausted())?;
        let folder = log
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let remote_folder = RemoteFolderRef::new(self.host.as_str(), folder.display().to_string());

        self.submitted += 1;
        debug!(
            kind = %request.kind,
            attempt = self.submitted,
            log = %log.display(),
            "replaying recorded attempt"
        );
        Ok(JobHandle {
            job_id: format!("replay-{}", self.submitted),
            remote_folder,
        })
    }

    fn retrieve(&mut self, _job: &JobHandle) -> DmrgResult<RetrievedOutput> {
        let log = self.logs.pop_front().ok_or_else(|| self.exhausted())?;
        if !log.exists() {
            let directory = log.parent().unwrap_or_else(|| Path::new("."));
            return Ok(RetrievedOutput::Missing {
                available: list_file_names(directory),
            });
        }
        Ok(match fs::read(&log) {
            Ok(bytes) => RetrievedOutput::Present(RawOutput::from_bytes(&bytes)),
            Err(error) => RetrievedOutput::Unreadable {
                detail: error.to_string(),
            },
        })
    }
}
