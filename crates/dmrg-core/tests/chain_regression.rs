use dmrg_core::classifier::{ClassifiedResult, ResultPayload, RetrievedOutput, classify_output};
use dmrg_core::config::{RestartPolicyConfig, load_restart_policy_config};
use dmrg_core::domain::{
    CalculationKind, DmrgError, DmrgResult, FailureCategory, HostId, ParameterSet, ParameterValue,
    RawOutput, RemoteFolderRef,
};
use dmrg_core::encoder::encode_for_kind;
use dmrg_core::orchestrator::{
    JobHandle, SolverBackend, WorkflowOutcome, run_dmrg_then_dyncorr,
};
use dmrg_core::policy::{AttemptState, RestartPolicy};
use dmrg_core::staging::StagingMode;
use dmrg_core::submission::SubmissionRequest;
use std::collections::VecDeque;
use std::fs;
use tempfile::TempDir;

/// Renders a matrix the way the solver prints it: `[a b; c d]`.
fn solver_matrix_text(rows: &[Vec<i64>]) -> String {
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>();
    format!("[{}]", rows.join("; "))
}

#[test]
fn encoded_matrix_survives_the_solver_round_trip() {
    let matrix = vec![vec![0_i64, 23], vec![23, 0]];
    let parameters = ParameterSet::new()
        .with("J", ParameterValue::matrix(matrix.clone()))
        .with("N_max", 10);

    let encoded = encode_for_kind(&parameters, CalculationKind::DynCorr);
    assert_eq!(encoded.as_str(), "[[0, 23], [23, 0]] 10");

    let log = format!(
        "Dynamic correlator:\n{}\ntotal time = 0.2",
        solver_matrix_text(&matrix)
    );
    let result = classify_output(CalculationKind::DynCorr, &RawOutput::new(log));
    let Some(ResultPayload::DynCorr(results)) = result.payload() else {
        panic!("expected dyncorr success, got {result:?}");
    };
    let expected = matrix
        .iter()
        .map(|row| row.iter().map(|value| *value as f64).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    assert_eq!(results.correlator_matrix, expected);
}

#[test]
fn larger_coupling_matrix_round_trips() {
    let n = 6;
    let mut matrix = vec![vec![0_i64; n]; n];
    for i in 0..n - 1 {
        matrix[i][i + 1] = 10 + i as i64;
        matrix[i + 1][i] = 10 + i as i64;
    }
    let log = format!("noise line\n{}\n", solver_matrix_text(&matrix));
    let result = classify_output(CalculationKind::DynCorr, &RawOutput::new(log));
    let Some(ResultPayload::DynCorr(results)) = result.payload() else {
        panic!("expected dyncorr success, got {result:?}");
    };
    assert_eq!(results.correlator_matrix.len(), n);
    assert_eq!(results.correlator_matrix[2][3], 12.0);
    assert_eq!(results.correlator_matrix[3][2], 12.0);
}

#[test]
fn every_dmrg_fatal_marker_classifies_to_its_category() {
    let cases = [
        (
            "Usage: julia DMRG_template_pll_Energyextrema.jl <input>",
            FailureCategory::MalformedInput,
        ),
        ("Failed to read from stdin", FailureCategory::MalformedInput),
        ("Check s parameter", FailureCategory::UnphysicalParameters),
        (
            "J matrix not properly closed with ']'.",
            FailureCategory::MalformedMatrix,
        ),
        (
            "All rows in J matrix must have the same number of columns.",
            FailureCategory::MalformedMatrix,
        ),
        ("Failed to parse J: [[1, 2]", FailureCategory::MalformedMatrix),
        (
            "Sz must be provided when conserve_symmetry is true.",
            FailureCategory::UnphysicalParameters,
        ),
        ("J matrix dimensions (3, 3) != N_sites 4", FailureCategory::MalformedMatrix),
        (
            "J must either be a Float64 scalar or a Matrix",
            FailureCategory::MalformedMatrix,
        ),
        ("Error termination", FailureCategory::GenericCalculationFailure),
        ("Error: Calculation failed.", FailureCategory::GenericCalculationFailure),
    ];

    for (line, expected) in cases {
        let result = classify_output(CalculationKind::Dmrg, &RawOutput::new(format!("{line}\n")));
        assert_eq!(result.category(), Some(expected), "line: {line}");
        assert_eq!(result.exit_code(), expected.exit_code());
    }
}

#[test]
fn classification_of_non_utf8_bytes_never_panics() {
    let raw = RawOutput::from_bytes(&[0xff, 0xfe, b'\n', b'[', b'1', b']']);
    let result = classify_output(CalculationKind::DynCorr, &raw);
    assert!(matches!(result, ClassifiedResult::Success(_)));

    let result = classify_output(CalculationKind::Dmrg, &raw);
    assert_eq!(result.category(), Some(FailureCategory::OutputIncomplete));
}

struct HostBackend {
    dmrg_host: HostId,
    outputs: VecDeque<RetrievedOutput>,
    submissions: Vec<SubmissionRequest>,
}

impl SolverBackend for HostBackend {
    fn submit(&mut self, request: &SubmissionRequest) -> DmrgResult<JobHandle> {
        self.submissions.push(request.clone());
        let host = match request.kind {
            CalculationKind::Dmrg => self.dmrg_host.clone(),
            CalculationKind::DynCorr => request.target_host.clone(),
        };
        Ok(JobHandle {
            job_id: format!("{}", self.submissions.len()),
            remote_folder: RemoteFolderRef::new(
                host.as_str(),
                format!("/work/{}", self.submissions.len()),
            ),
        })
    }

    fn retrieve(&mut self, _job: &JobHandle) -> DmrgResult<RetrievedOutput> {
        self.outputs
            .pop_front()
            .ok_or_else(|| DmrgError::io_system("IO.RETRIEVE", "nothing left to retrieve"))
    }
}

const DMRG_LOG: &str =
    "List of E:\n[1.0, 2.0, 3.0]\nList of S²:\n[0.5, 0.5, 0.5]\nList of Sz(i):\n[0.1, 0.1, 0.1]\ntotal time = 123.45";

#[test]
fn workflow_copies_parent_when_dmrg_ran_elsewhere() {
    let mut backend = HostBackend {
        dmrg_host: HostId::new("archive"),
        outputs: VecDeque::from([
            RetrievedOutput::Present(RawOutput::new(DMRG_LOG)),
            RetrievedOutput::Present(RawOutput::new("Dynamic correlator:\n[1.0 2.0; 3.0 4.0]")),
        ]),
        submissions: Vec::new(),
    };

    let report = run_dmrg_then_dyncorr(
        &mut backend,
        &RestartPolicy::default(),
        &HostId::new("compute"),
        ParameterSet::new().with("S", 0.5).with("N_sites", 3),
        ParameterSet::new().with("J", 2),
    )
    .expect("workflow should finish");

    assert_eq!(report.outcome, WorkflowOutcome::Succeeded);
    let staging = &backend.submissions[1].staging;
    assert!(staging.symlinks.is_empty());
    assert_eq!(staging.copies[0].mode, StagingMode::Copy);
    assert_eq!(staging.copies[0].source_host, HostId::new("archive"));
    assert_eq!(staging.copies[0].source_path, "/work/1");

    let json = serde_json::to_value(&report).expect("report should serialize");
    assert_eq!(json["outcome"], "SUCCEEDED");
    assert_eq!(json["dmrg"]["final_result"]["energies"][2], 3.0);
    assert_eq!(json["dyncorr"]["final_result"]["correlator_matrix"][1][0], 3.0);
}

#[test]
fn configured_policy_file_drives_retries_in_a_chain() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = temp.path().join("policy.json");
    fs::write(
        &path,
        r#"{"maxAttempts": 2, "recoverableCategories": ["GENERIC_CALCULATION_FAILURE"],
            "relaxations": [{"parameter": "cutoff", "factor": 4.0}]}"#,
    )
    .expect("config should be written");

    let config = load_restart_policy_config(&path).expect("config should load");
    assert_ne!(config, RestartPolicyConfig::default());
    let policy = RestartPolicy::new(config).expect("config should validate");

    let mut backend = HostBackend {
        dmrg_host: HostId::new("compute"),
        outputs: VecDeque::from([
            RetrievedOutput::Present(RawOutput::new(DMRG_LOG)),
            RetrievedOutput::Present(RawOutput::new("ERROR: solver diverged")),
            RetrievedOutput::Present(RawOutput::new("[0.5 0.25; 0.25 0.5]")),
        ]),
        submissions: Vec::new(),
    };

    let report = run_dmrg_then_dyncorr(
        &mut backend,
        &policy,
        &HostId::new("compute"),
        ParameterSet::new().with("S", 1),
        ParameterSet::new().with("J", 2).with("cutoff", 0.125),
    )
    .expect("workflow should finish");

    assert_eq!(report.outcome, WorkflowOutcome::Succeeded);
    let dyncorr = report.dyncorr.expect("dyncorr should have run");
    assert_eq!(dyncorr.state, AttemptState::Succeeded);
    assert_eq!(dyncorr.attempts.len(), 2);
    assert_eq!(backend.submissions[1].input_content, "2 0.125\n");
    assert_eq!(backend.submissions[2].input_content, "2 0.5\n");
}
