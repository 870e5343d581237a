//! Sequential attempt loop for one calculation chain, and the DMRG then
//! dynamic-correlator workflow built on it.

use crate::classifier::{RetrievedOutput, classify_retrieved};
use crate::domain::{
    CalculationKind, DmrgError, DmrgResult, HostId, ParameterSet, RemoteFolderRef,
};
use crate::policy::{AttemptRecord, AttemptState, FinalReport, PolicyDecision, RestartPolicy};
use crate::submission::{SubmissionRequest, prepare_submission};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub job_id: String,
    /// Where the attempt's outputs live once it finishes.
    pub remote_folder: RemoteFolderRef,
}

/// External job-submission and retrieval collaborator.
///
/// Both calls may block on I/O; the orchestrator never issues a second
/// submission before the previous attempt has been retrieved and classified.
pub trait SolverBackend {
    fn submit(&mut self, request: &SubmissionRequest) -> DmrgResult<JobHandle>;

    fn retrieve(&mut self, job: &JobHandle) -> DmrgResult<RetrievedOutput>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculationRequest {
    pub kind: CalculationKind,
    pub parameters: ParameterSet,
    pub target_host: HostId,
    pub parent: Option<RemoteFolderRef>,
}

impl CalculationRequest {
    pub fn new(kind: CalculationKind, parameters: ParameterSet, target_host: HostId) -> Self {
        Self {
            kind,
            parameters,
            target_host,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: RemoteFolderRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Runs attempts until the policy accepts or gives up.
pub fn run_calculation<B: SolverBackend + ?Sized>(
    backend: &mut B,
    policy: &RestartPolicy,
    request: &CalculationRequest,
) -> DmrgResult<FinalReport> {
    let kind = request.kind;
    let mut history: Vec<AttemptRecord> = Vec::new();
    let mut parameters = request.parameters.clone();

    loop {
        let index = u32::try_from(history.len() + 1).unwrap_or(u32::MAX);
        let submission = prepare_submission(
            kind,
            &parameters,
            &request.target_host,
            request.parent.as_ref(),
        )?;
        debug!(%kind, attempt = index, state = ?AttemptState::Pending, "attempt prepared");

        let job = backend.submit(&submission)?;
        info!(
            %kind,
            attempt = index,
            job_id = %job.job_id,
            state = ?AttemptState::Running,
            "attempt submitted"
        );

        let retrieved = backend.retrieve(&job)?;
        let result = classify_retrieved(kind, &retrieved);
        match result.as_failure() {
            None => info!(%kind, attempt = index, "attempt classified as success"),
            Some(failure) => warn!(
                %kind,
                attempt = index,
                category = %failure.category,
                detail = %failure.detail,
                "attempt classified as failure"
            ),
        }

        history.push(AttemptRecord {
            index,
            parameters: parameters.clone(),
            result,
            cancelled: retrieved.is_cancelled(),
            remote_folder: Some(job.remote_folder),
        });

        match policy.decide(kind, &history)? {
            PolicyDecision::Retry { next_parameters } => parameters = next_parameters,
            decision => {
                let report = policy.final_report(kind, history, &decision)?;
                info!(
                    %kind,
                    attempts = report.attempts.len(),
                    state = ?report.state,
                    exit_code = report.exit_code,
                    "calculation chain finished"
                );
                return Ok(report);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowOutcome {
    Succeeded,
    DmrgFailed,
    DynCorrFailed,
}

impl WorkflowOutcome {
    pub const fn exit_code(self) -> u32 {
        match self {
            Self::Succeeded => 0,
            Self::DmrgFailed => 400,
            Self::DynCorrFailed => 401,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCESS",
            Self::DmrgFailed => "ERROR_DMRG_FAILED",
            Self::DynCorrFailed => "ERROR_DYNCORR_FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub outcome: WorkflowOutcome,
    pub exit_code: u32,
    pub dmrg: FinalReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dyncorr: Option<FinalReport>,
}

/// DMRG chain first; on success its output folder becomes the dynamic
/// correlator's parent.
pub fn run_dmrg_then_dyncorr<B: SolverBackend + ?Sized>(
    backend: &mut B,
    policy: &RestartPolicy,
    target_host: &HostId,
    dmrg_parameters: ParameterSet,
    dyncorr_parameters: ParameterSet,
) -> DmrgResult<WorkflowReport> {
    let dmrg_request =
        CalculationRequest::new(CalculationKind::Dmrg, dmrg_parameters, target_host.clone());
    let dmrg = run_calculation(backend, policy, &dmrg_request)?;

    if !dmrg.succeeded() {
        warn!(exit_code = dmrg.exit_code, "DMRG chain failed; dynamic correlator not started");
        return Ok(finish(WorkflowOutcome::DmrgFailed, dmrg, None));
    }

    let parent = dmrg.remote_folder().cloned().ok_or_else(|| {
        DmrgError::internal(
            "WORKFLOW.PARENT_FOLDER",
            "accepted DMRG attempt has no output folder",
        )
    })?;
    let dyncorr_request = CalculationRequest::new(
        CalculationKind::DynCorr,
        dyncorr_parameters,
        target_host.clone(),
    )
    .with_parent(parent);
    let dyncorr = run_calculation(backend, policy, &dyncorr_request)?;

    let outcome = if dyncorr.succeeded() {
        WorkflowOutcome::Succeeded
    } else {
        WorkflowOutcome::DynCorrFailed
    };
    Ok(finish(outcome, dmrg, Some(dyncorr)))
}

fn finish(outcome: WorkflowOutcome, dmrg: FinalReport, dyncorr: Option<FinalReport>) -> WorkflowReport {
    info!(
        outcome = outcome.label(),
        exit_code = outcome.exit_code(),
        "workflow finished"
    );
    WorkflowReport {
        outcome,
        exit_code: outcome.exit_code(),
        dmrg,
        dyncorr,
    }
}
