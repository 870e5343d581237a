use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DmrgResult<T> = Result<T, DmrgError>;
pub type ParserResult<T> = DmrgResult<T>;

/// Process-level category of a language error raised by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    ExecutionError,
    InternalError,
}

impl ErrorCategory {
    pub const fn process_exit(self) -> ProcessExit {
        match self {
            Self::Success => ProcessExit {
                exit_code: 0,
                rust_category: "Success",
                severity_class: "SUCCESS",
            },
            Self::InputValidationError => ProcessExit {
                exit_code: 2,
                rust_category: "InputValidationError",
                severity_class: "INPUT_FATAL",
            },
            Self::IoSystemError => ProcessExit {
                exit_code: 3,
                rust_category: "IoSystemError",
                severity_class: "IO_FATAL",
            },
            Self::ExecutionError => ProcessExit {
                exit_code: 4,
                rust_category: "ExecutionError",
                severity_class: "RUN_FATAL",
            },
            Self::InternalError => ProcessExit {
                exit_code: 5,
                rust_category: "InternalError",
                severity_class: "SYS_FATAL",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.process_exit().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.process_exit().rust_category
    }

    pub const fn severity_class(self) -> &'static str {
        self.process_exit().severity_class
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub exit_code: i32,
    pub rust_category: &'static str,
    pub severity_class: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmrgError {
    category: ErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl DmrgError {
    pub fn new(category: ErrorCategory, placeholder: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn execution(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ExecutionError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for DmrgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.rust_category(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for DmrgError {}

/// Closed taxonomy of solver-attempt failures. Values, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    RetrievalMissing,
    RetrievalUnreadable,
    OutputIncomplete,
    MalformedInput,
    UnphysicalParameters,
    MalformedMatrix,
    GenericCalculationFailure,
    UnrecoverableTermination,
}

pub const SUCCESS_EXIT_CODE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitCodeEntry {
    pub category: FailureCategory,
    pub exit_code: u32,
    pub label: &'static str,
    pub message: &'static str,
}

/// Indexed by `FailureCategory` discriminant.
pub static EXIT_CODE_CATALOG: [ExitCodeEntry; 8] = [
    ExitCodeEntry {
        category: FailureCategory::RetrievalMissing,
        exit_code: 210,
        label: "ERROR_OUTPUT_MISSING",
        message: "The retrieved folder did not contain the output file.",
    },
    ExitCodeEntry {
        category: FailureCategory::RetrievalUnreadable,
        exit_code: 211,
        label: "ERROR_OUTPUT_LOG_READ",
        message: "The retrieved output log could not be read.",
    },
    ExitCodeEntry {
        category: FailureCategory::OutputIncomplete,
        exit_code: 220,
        label: "ERROR_INVALID_OUTPUT",
        message: "The output log is missing mandatory results or they could not be parsed.",
    },
    ExitCodeEntry {
        category: FailureCategory::MalformedInput,
        exit_code: 310,
        label: "ERROR_READING_INPUT_FILE",
        message: "The solver could not read the input file.",
    },
    ExitCodeEntry {
        category: FailureCategory::UnphysicalParameters,
        exit_code: 311,
        label: "ERROR_UNPHYSICAL_INPUT",
        message: "The solver rejected the parameter values as unphysical.",
    },
    ExitCodeEntry {
        category: FailureCategory::MalformedMatrix,
        exit_code: 312,
        label: "ERROR_J_VALUE",
        message: "The coupling matrix failed structural validation in the solver.",
    },
    ExitCodeEntry {
        category: FailureCategory::GenericCalculationFailure,
        exit_code: 390,
        label: "ERROR_CALCULATION_FAILED",
        message: "The calculation reported an error.",
    },
    ExitCodeEntry {
        category: FailureCategory::UnrecoverableTermination,
        exit_code: 399,
        label: "ERROR_UNRECOVERABLE_TERMINATION",
        message: "The calculation failed with an unrecoverable error.",
    },
];

impl FailureCategory {
    pub const ALL: [FailureCategory; 8] = [
        Self::RetrievalMissing,
        Self::RetrievalUnreadable,
        Self::OutputIncomplete,
        Self::MalformedInput,
        Self::UnphysicalParameters,
        Self::MalformedMatrix,
        Self::GenericCalculationFailure,
        Self::UnrecoverableTermination,
    ];

    pub fn exit_code_entry(self) -> &'static ExitCodeEntry {
        &EXIT_CODE_CATALOG[self as usize]
    }

    pub fn exit_code(self) -> u32 {
        self.exit_code_entry().exit_code
    }

    pub fn label(self) -> &'static str {
        self.exit_code_entry().label
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RetrievalMissing => "RETRIEVAL_MISSING",
            Self::RetrievalUnreadable => "RETRIEVAL_UNREADABLE",
            Self::OutputIncomplete => "OUTPUT_INCOMPLETE",
            Self::MalformedInput => "MALFORMED_INPUT",
            Self::UnphysicalParameters => "UNPHYSICAL_PARAMETERS",
            Self::MalformedMatrix => "MALFORMED_MATRIX",
            Self::GenericCalculationFailure => "GENERIC_CALCULATION_FAILURE",
            Self::UnrecoverableTermination => "UNRECOVERABLE_TERMINATION",
        }
    }

    /// Categories no configuration may mark as retryable.
    pub const fn is_never_recoverable(self) -> bool {
        matches!(
            self,
            Self::MalformedInput
                | Self::UnphysicalParameters
                | Self::MalformedMatrix
                | Self::UnrecoverableTermination
        )
    }

    pub fn from_exit_code(exit_code: u32) -> Option<Self> {
        EXIT_CODE_CATALOG
            .iter()
            .find(|entry| entry.exit_code == exit_code)
            .map(|entry| entry.category)
    }
}

impl Display for FailureCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{DmrgError, ErrorCategory, EXIT_CODE_CATALOG, FailureCategory};

    #[test]
    fn process_exit_mapping_is_stable() {
        let cases = [
            (ErrorCategory::Success, 0, "Success", "SUCCESS"),
            (
                ErrorCategory::InputValidationError,
                2,
                "InputValidationError",
                "INPUT_FATAL",
            ),
            (ErrorCategory::IoSystemError, 3, "IoSystemError", "IO_FATAL"),
            (ErrorCategory::ExecutionError, 4, "ExecutionError", "RUN_FATAL"),
            (ErrorCategory::InternalError, 5, "InternalError", "SYS_FATAL"),
        ];

        for (category, exit_code, rust_category, severity_class) in cases {
            let exit = category.process_exit();
            assert_eq!(exit.exit_code, exit_code);
            assert_eq!(exit.rust_category, rust_category);
            assert_eq!(exit.severity_class, severity_class);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = DmrgError::input_validation("INPUT.PARAMETER_KIND", "N_sites must be an integer");

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [INPUT.PARAMETER_KIND] N_sites must be an integer"
        );
        assert_eq!(error.fatal_exit_line().as_deref(), Some("FATAL EXIT CODE: 2"));
    }

    #[test]
    fn catalog_rows_line_up_with_category_discriminants() {
        for category in FailureCategory::ALL {
            assert_eq!(category.exit_code_entry().category, category);
        }
        assert_eq!(EXIT_CODE_CATALOG.len(), FailureCategory::ALL.len());
    }

    #[test]
    fn exit_codes_are_banded_by_severity() {
        assert_eq!(FailureCategory::RetrievalMissing.exit_code(), 210);
        assert_eq!(FailureCategory::RetrievalUnreadable.exit_code(), 211);
        assert_eq!(FailureCategory::OutputIncomplete.exit_code(), 220);
        assert_eq!(FailureCategory::MalformedInput.exit_code(), 310);
        assert_eq!(FailureCategory::UnphysicalParameters.exit_code(), 311);
        assert_eq!(FailureCategory::MalformedMatrix.exit_code(), 312);
        assert_eq!(FailureCategory::GenericCalculationFailure.exit_code(), 390);
        assert_eq!(FailureCategory::UnrecoverableTermination.exit_code(), 399);
    }

    #[test]
    fn exit_code_lookup_is_one_to_one() {
        for category in FailureCategory::ALL {
            assert_eq!(
                FailureCategory::from_exit_code(category.exit_code()),
                Some(category)
            );
        }
        assert_eq!(FailureCategory::from_exit_code(0), None);
        assert_eq!(FailureCategory::from_exit_code(400), None);
    }

    #[test]
    fn category_serializes_with_taxonomy_names() {
        let encoded = serde_json::to_string(&FailureCategory::MalformedMatrix)
            .expect("category should serialize");
        assert_eq!(encoded, "\"MALFORMED_MATRIX\"");
        assert_eq!(FailureCategory::MalformedMatrix.to_string(), "MALFORMED_MATRIX");
    }
}
