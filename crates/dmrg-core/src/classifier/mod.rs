//! Classification of a solver log into a structured result or a categorized
//! failure.
//!
//! Fatal markers are checked first, in table order, so a log that also holds
//! partially printed results is still reported as the failure it names.
//! Only when no marker matches are the result fields extracted.

mod extract;
pub mod literal;

use crate::domain::{CalculationKind, FailureCategory, RawOutput, SUCCESS_EXIT_CODE};
use extract::{ExtractionError, extract_semicolon_matrix, extract_total_time, extract_vector};
use serde::Serialize;

pub use extract::TOTAL_TIME_MARKER;

pub const ENERGIES_MARKER: &str = "List of E:";
pub const SPIN_SQUARED_MARKER: &str = "List of S²:";
pub const SPIN_Z_MARKER: &str = "List of Sz(i):";
pub const CORRELATOR_MARKER: &str = "Dynamic correlator:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerMatch {
    Substring,
    /// Case-insensitive whole word.
    Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalMarker {
    pub needle: &'static str,
    pub category: FailureCategory,
    matching: MarkerMatch,
}

impl FatalMarker {
    const fn substring(needle: &'static str, category: FailureCategory) -> Self {
        Self {
            needle,
            category,
            matching: MarkerMatch::Substring,
        }
    }

    const fn word(needle: &'static str, category: FailureCategory) -> Self {
        Self {
            needle,
            category,
            matching: MarkerMatch::Word,
        }
    }

    fn matches_line(&self, line: &str) -> bool {
        match self.matching {
            MarkerMatch::Substring => line.contains(self.needle),
            MarkerMatch::Word => line
                .split(|ch: char| !ch.is_alphanumeric() && ch != '_')
                .any(|word| word.eq_ignore_ascii_case(self.needle)),
        }
    }
}

pub const DMRG_FATAL_MARKERS: [FatalMarker; 11] = [
    FatalMarker::substring(
        "Usage: julia DMRG_template_pll_Energyextrema.jl",
        FailureCategory::MalformedInput,
    ),
    FatalMarker::substring("Failed to read from stdin", FailureCategory::MalformedInput),
    FatalMarker::substring("Check s", FailureCategory::UnphysicalParameters),
    FatalMarker::substring(
        "J matrix not properly closed with ']'.",
        FailureCategory::MalformedMatrix,
    ),
    FatalMarker::substring(
        "All rows in J matrix must have the same number of columns.",
        FailureCategory::MalformedMatrix,
    ),
    FatalMarker::substring("Failed to parse J", FailureCategory::MalformedMatrix),
    FatalMarker::substring(
        "Sz must be provided when conserve_symmetry is true.",
        FailureCategory::UnphysicalParameters,
    ),
    FatalMarker::substring("J matrix dimensions", FailureCategory::MalformedMatrix),
    FatalMarker::substring(
        "J must either be a Float64 scalar or a",
        FailureCategory::MalformedMatrix,
    ),
    FatalMarker::substring(
        "Error termination",
        FailureCategory::GenericCalculationFailure,
    ),
    FatalMarker::word("error", FailureCategory::GenericCalculationFailure),
];

pub const DYNCORR_FATAL_MARKERS: [FatalMarker; 2] = [
    FatalMarker::substring("Failed to read from stdin", FailureCategory::MalformedInput),
    FatalMarker::word("error", FailureCategory::GenericCalculationFailure),
];

pub fn fatal_markers_for(kind: CalculationKind) -> &'static [FatalMarker] {
    match kind {
        CalculationKind::Dmrg => &DMRG_FATAL_MARKERS,
        CalculationKind::DynCorr => &DYNCORR_FATAL_MARKERS,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DmrgResults {
    pub energies: Vec<f64>,
    pub spin_squared: Vec<f64>,
    pub spin_z: Vec<f64>,
    pub total_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynCorrResults {
    pub correlator_matrix: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Dmrg(DmrgResults),
    DynCorr(DynCorrResults),
}

impl ResultPayload {
    pub fn total_time(&self) -> Option<&str> {
        match self {
            Self::Dmrg(results) => Some(results.total_time.as_str()),
            Self::DynCorr(results) => results.total_time.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub category: FailureCategory,
    pub detail: String,
}

impl Failure {
    pub fn new(category: FailureCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            detail: detail.into(),
        }
    }

    pub fn exit_code(&self) -> u32 {
        self.category.exit_code()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifiedResult {
    Success(ResultPayload),
    Failure(Failure),
}

impl ClassifiedResult {
    pub fn failure(category: FailureCategory, detail: impl Into<String>) -> Self {
        Self::Failure(Failure::new(category, detail))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&ResultPayload> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn category(&self) -> Option<FailureCategory> {
        self.as_failure().map(|failure| failure.category)
    }

    pub fn exit_code(&self) -> u32 {
        self.as_failure()
            .map_or(SUCCESS_EXIT_CODE, Failure::exit_code)
    }
}

/// What the retrieval collaborator found for a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievedOutput {
    Present(RawOutput),
    Missing { available: Vec<String> },
    Unreadable { detail: String },
    /// The collaborator cancelled or timed out the job.
    Cancelled { detail: String },
}

impl RetrievedOutput {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub fn classify_retrieved(kind: CalculationKind, retrieved: &RetrievedOutput) -> ClassifiedResult {
    match retrieved {
        RetrievedOutput::Present(raw) => classify_output(kind, raw),
        RetrievedOutput::Missing { available } => ClassifiedResult::failure(
            FailureCategory::RetrievalMissing,
            format!(
                "'{}' not found in retrieved folder; available: [{}]",
                kind.output_file(),
                available.join(", ")
            ),
        ),
        RetrievedOutput::Unreadable { detail } => ClassifiedResult::failure(
            FailureCategory::RetrievalUnreadable,
            format!("'{}' could not be read: {detail}", kind.output_file()),
        ),
        RetrievedOutput::Cancelled { detail } => ClassifiedResult::failure(
            FailureCategory::UnrecoverableTermination,
            format!("{kind} job was cancelled: {detail}"),
        ),
    }
}

pub fn classify_output(kind: CalculationKind, raw: &RawOutput) -> ClassifiedResult {
    let content = raw.as_str();
    if let Some(failure) = scan_fatal_markers(fatal_markers_for(kind), content) {
        return ClassifiedResult::Failure(failure);
    }

    let extracted = match kind {
        CalculationKind::Dmrg => extract_dmrg(content).map(ResultPayload::Dmrg),
        CalculationKind::DynCorr => extract_dyncorr(content).map(ResultPayload::DynCorr),
    };
    match extracted {
        Ok(payload) => ClassifiedResult::Success(payload),
        Err(error) => ClassifiedResult::failure(FailureCategory::OutputIncomplete, error.detail()),
    }
}

/// First marker in table order that occurs anywhere in the log; the detail is
/// the first line carrying it.
pub fn scan_fatal_markers(markers: &[FatalMarker], content: &str) -> Option<Failure> {
    markers.iter().find_map(|marker| {
        content
            .lines()
            .find(|line| marker.matches_line(line))
            .map(|line| Failure::new(marker.category, line.trim()))
    })
}

fn extract_dmrg(content: &str) -> Result<DmrgResults, ExtractionError> {
    Ok(DmrgResults {
        energies: extract_vector(content, ENERGIES_MARKER)?,
        spin_squared: extract_vector(content, SPIN_SQUARED_MARKER)?,
        spin_z: extract_vector(content, SPIN_Z_MARKER)?,
        total_time: extract_total_time(content).ok_or_else(|| ExtractionError::MarkerMissing {
            marker: TOTAL_TIME_MARKER.to_string(),
        })?,
    })
}

fn extract_dyncorr(content: &str) -> Result<DynCorrResults, ExtractionError> {
    Ok(DynCorrResults {
        correlator_matrix: extract_semicolon_matrix(content, CORRELATOR_MARKER)?,
        total_time: extract_total_time(content),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ClassifiedResult, DMRG_FATAL_MARKERS, DYNCORR_FATAL_MARKERS, DmrgResults, ResultPayload,
        RetrievedOutput, classify_output, classify_retrieved,
    };
    use crate::domain::{CalculationKind, FailureCategory, RawOutput};

    const DMRG_LOG: &str = "\
sweep 1 maxlinkdim=10
List of E:
[-3.375, -2.625]
List of S²:
[2.0, 6.0]
List of Sz(i):
[0.5, -0.5, 0.5, -0.5]
total time = 1.234 s
";

    fn classify(kind: CalculationKind, log: &str) -> ClassifiedResult {
        classify_output(kind, &RawOutput::new(log))
    }

    #[test]
    fn complete_dmrg_log_is_a_success() {
        let result = classify(CalculationKind::Dmrg, DMRG_LOG);
        let Some(ResultPayload::Dmrg(results)) = result.payload() else {
            panic!("expected DMRG payload, got {result:?}");
        };
        assert_eq!(results.energies, vec![-3.375, -2.625]);
        assert_eq!(results.spin_squared, vec![2.0, 6.0]);
        assert_eq!(results.spin_z, vec![0.5, -0.5, 0.5, -0.5]);
        assert_eq!(results.total_time, "1.234 s");
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn annotated_markers_still_classify_as_success() {
        let log = "List of E: (eV)\n[1.0]\nList of S²:\n[0.5]\nList of Sz(i): per site\n[0.1]\ntotal time = 1";
        let Some(ResultPayload::Dmrg(results)) = classify(CalculationKind::Dmrg, log).payload().cloned()
        else {
            panic!("annotated log should classify as success");
        };
        assert_eq!(results.energies, vec![1.0]);
        assert_eq!(results.spin_z, vec![0.1]);
        assert_eq!(results.total_time, "1");
    }

    #[test]
    fn check_s_marker_is_unphysical_with_its_line_as_detail() {
        let result = classify(CalculationKind::Dmrg, "Check s: value 0.7 is not a half-integer\n");
        let failure = result.as_failure().expect("should be a failure");
        assert_eq!(failure.category, FailureCategory::UnphysicalParameters);
        assert_eq!(failure.detail, "Check s: value 0.7 is not a half-integer");
        assert_eq!(result.exit_code(), 311);
    }

    #[test]
    fn earlier_table_entry_wins_over_later_one() {
        let log = "ERROR: J matrix dimensions do not match\nFailed to read from stdin\n";
        assert_eq!(
            classify(CalculationKind::Dmrg, log).category(),
            Some(FailureCategory::MalformedInput)
        );
    }

    #[test]
    fn fatal_marker_beats_partial_results() {
        let log = format!("{DMRG_LOG}Failed to parse J from '[[1, 2]'\n");
        assert_eq!(
            classify(CalculationKind::Dmrg, &log).category(),
            Some(FailureCategory::MalformedMatrix)
        );
    }

    #[test]
    fn generic_error_word_is_case_insensitive_and_whole_word() {
        let log = "Error: Calculation failed.";
        assert_eq!(
            classify(CalculationKind::Dmrg, log).category(),
            Some(FailureCategory::GenericCalculationFailure)
        );
        assert_eq!(
            classify(CalculationKind::DynCorr, "ERROR: LoadError: something broke").exit_code(),
            390
        );

        let benign = format!("truncation errors below 1e-10\nerror_estimate=0.1\n{DMRG_LOG}");
        assert!(classify(CalculationKind::Dmrg, &benign).is_success());
    }

    #[test]
    fn each_dmrg_field_is_mandatory() {
        for dropped in ["List of E:", "List of S²:", "List of Sz(i):", "total time ="] {
            let log = DMRG_LOG
                .lines()
                .filter(|line| !line.starts_with(dropped))
                .collect::<Vec<_>>()
                .join("\n");
            let result = classify(CalculationKind::Dmrg, &log);
            assert_eq!(
                result.category(),
                Some(FailureCategory::OutputIncomplete),
                "dropping '{dropped}' should make the output incomplete"
            );
        }
    }

    #[test]
    fn dyncorr_matrix_is_extracted() {
        let result = classify(CalculationKind::DynCorr, "Dynamic correlator:\n[1.0 2.0; 3.0 4.0]");
        let Some(ResultPayload::DynCorr(results)) = result.payload() else {
            panic!("expected dyncorr payload, got {result:?}");
        };
        assert_eq!(results.correlator_matrix, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(results.total_time, None);
    }

    #[test]
    fn dyncorr_ragged_matrix_is_incomplete_output() {
        let result = classify(CalculationKind::DynCorr, "Dynamic correlator:\n[1.0 2.0; 3.0]");
        assert_eq!(result.category(), Some(FailureCategory::OutputIncomplete));
    }

    #[test]
    fn dyncorr_ignores_dmrg_only_markers() {
        let result = classify(CalculationKind::DynCorr, "Check s\n[0 23; 23 0]\ntotal time = 4 s");
        let payload = result.payload().expect("Check s is not fatal for dyncorr");
        assert_eq!(payload.total_time(), Some("4 s"));
    }

    #[test]
    fn specific_marker_beats_generic_error_token() {
        let log = "ERROR: J matrix not properly closed with ']'.\n";
        assert_eq!(
            classify(CalculationKind::Dmrg, log).category(),
            Some(FailureCategory::MalformedMatrix)
        );
    }

    #[test]
    fn documented_success_example() {
        let log = "List of E:\n[1.0, 2.0, 3.0]\nList of S²:\n[0.5, 0.5, 0.5]\nList of Sz(i):\n[0.1, 0.1, 0.1]\ntotal time = 123.45";
        let expected = ResultPayload::Dmrg(DmrgResults {
            energies: vec![1.0, 2.0, 3.0],
            spin_squared: vec![0.5, 0.5, 0.5],
            spin_z: vec![0.1, 0.1, 0.1],
            total_time: "123.45".to_string(),
        });
        assert_eq!(classify(CalculationKind::Dmrg, log), ClassifiedResult::Success(expected));
    }

    #[test]
    fn classification_is_deterministic() {
        for log in [DMRG_LOG, "Failed to read from stdin", "", "List of E:\n[1.0"] {
            assert_eq!(
                classify(CalculationKind::Dmrg, log),
                classify(CalculationKind::Dmrg, log)
            );
        }
    }

    #[test]
    fn retrieval_problems_map_to_their_categories() {
        let missing = classify_retrieved(
            CalculationKind::Dmrg,
            &RetrievedOutput::Missing {
                available: vec!["_scheduler-stdout.txt".to_string()],
            },
        );
        assert_eq!(missing.category(), Some(FailureCategory::RetrievalMissing));
        assert!(
            missing
                .as_failure()
                .is_some_and(|failure| failure.detail.contains("aiida.out"))
        );

        let unreadable = classify_retrieved(
            CalculationKind::DynCorr,
            &RetrievedOutput::Unreadable {
                detail: "permission denied".to_string(),
            },
        );
        assert_eq!(unreadable.exit_code(), 211);

        let cancelled = RetrievedOutput::Cancelled {
            detail: "walltime exceeded".to_string(),
        };
        assert!(cancelled.is_cancelled());
        assert_eq!(
            classify_retrieved(CalculationKind::Dmrg, &cancelled).category(),
            Some(FailureCategory::UnrecoverableTermination)
        );
    }

    #[test]
    fn marker_tables_end_with_the_generic_error_word() {
        assert_eq!(DMRG_FATAL_MARKERS[10].needle, "error");
        assert_eq!(DYNCORR_FATAL_MARKERS[1].needle, "error");
        assert!(
            DMRG_FATAL_MARKERS
                .iter()
                .take(9)
                .all(|marker| marker.category.is_never_recoverable())
        );
    }

    #[test]
    fn success_serializes_flat_with_status_tag() {
        let value = serde_json::to_value(classify(CalculationKind::Dmrg, DMRG_LOG))
            .expect("result should serialize");
        assert_eq!(value["status"], "success");
        assert_eq!(value["total_time"], "1.234 s");

        let failure = serde_json::to_value(classify(CalculationKind::Dmrg, "Check s"))
            .expect("failure should serialize");
        assert_eq!(failure["status"], "failure");
        assert_eq!(failure["category"], "UNPHYSICAL_PARAMETERS");
    }
}
