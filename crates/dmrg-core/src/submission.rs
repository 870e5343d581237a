use crate::domain::{
    CalculationKind, DmrgError, DmrgResult, EncodedInput, HostId, ParameterSet, RemoteFolderRef,
};
use crate::encoder::encode_for_kind;
use crate::staging::{StagingPlan, plan_parent_staging};
use crate::validation::validate_parameters;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the job-submission collaborator needs for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRequest {
    pub kind: CalculationKind,
    pub target_host: HostId,
    pub input_file_name: &'static str,
    pub input_content: String,
    pub stdin_file_name: &'static str,
    pub stdout_file_name: &'static str,
    pub retrieve_list: Vec<String>,
    pub with_mpi: bool,
    pub staging: StagingPlan,
    #[serde(skip)]
    pub encoded: EncodedInput,
}

impl SubmissionRequest {
    /// Writes the input file into `directory` and returns its path.
    pub fn write_input_file(&self, directory: &Path) -> DmrgResult<PathBuf> {
        let path = directory.join(self.input_file_name);
        write_text_artifact(&path, &self.input_content).map_err(|source| {
            DmrgError::io_system(
                "IO.INPUT_WRITE",
                format!("failed to write '{}': {source}", path.display()),
            )
        })?;
        Ok(path)
    }
}

pub fn prepare_submission(
    kind: CalculationKind,
    parameters: &ParameterSet,
    target_host: &HostId,
    parent: Option<&RemoteFolderRef>,
) -> DmrgResult<SubmissionRequest> {
    if kind.requires_parent_folder() && parent.is_none() {
        return Err(DmrgError::input_validation(
            "INPUT.PARENT_FOLDER",
            format!(
                "{kind} requires a parent folder staged as '{}'",
                kind.parent_folder_name()
            ),
        ));
    }
    validate_parameters(kind, parameters)?;

    let encoded = encode_for_kind(parameters, kind);
    let mut staging = StagingPlan::default();
    if let Some(instruction) = plan_parent_staging(target_host, parent, kind.parent_folder_name()) {
        staging.push(instruction);
    }

    Ok(SubmissionRequest {
        kind,
        target_host: target_host.clone(),
        input_file_name: kind.input_file(),
        input_content: normalize_text_artifact(encoded.as_str()),
        stdin_file_name: kind.input_file(),
        stdout_file_name: kind.output_file(),
        retrieve_list: vec![kind.output_file().to_string()],
        with_mpi: kind.default_with_mpi(),
        staging,
        encoded,
    })
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}
