use super::CliError;
use anyhow::Context;
use dmrg_core::domain::{DmrgError, ParameterSet, RawOutput};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub(super) fn read_raw_output(path: &Path) -> Result<RawOutput, CliError> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read solver log '{}'", path.display()))?;
    Ok(RawOutput::from_bytes(&bytes))
}

pub(super) fn read_parameter_file(path: &Path) -> Result<ParameterSet, CliError> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read parameter file '{}'", path.display()))?;
    serde_json::from_str(&source).map_err(|error| {
        CliError::Core(DmrgError::input_validation(
            "INPUT.PARAMETER_FILE",
            format!("failed to parse parameter file '{}': {error}", path.display()),
        ))
    })
}

pub(super) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?;
    println!("{rendered}");
    Ok(())
}

/// Names of the entries in `directory`, sorted; empty when unreadable.
pub(super) fn list_file_names(directory: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(directory) else {
        return Vec::new();
    };
    let mut names = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}
