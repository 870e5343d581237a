pub mod classifier;
pub mod config;
pub mod domain;
pub mod encoder;
pub mod orchestrator;
pub mod parser;
pub mod policy;
pub mod staging;
pub mod submission;
pub mod validation;

pub use classifier::{ClassifiedResult, Failure, ResultPayload, RetrievedOutput, classify_output};
pub use config::{RestartPolicyConfig, load_restart_policy_config};
pub use domain::{
    CalculationKind, DmrgError, DmrgResult, FailureCategory, HostId, ParameterSet,
    ParameterValue, RawOutput, RemoteFolderRef,
};
pub use encoder::encode_for_kind;
pub use orchestrator::{SolverBackend, run_calculation, run_dmrg_then_dyncorr};
pub use policy::{AttemptRecord, FinalReport, RestartPolicy};
pub use submission::prepare_submission;
