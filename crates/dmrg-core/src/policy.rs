//! Bounded retry over classified attempts.
//!
//! The policy holds no attempt state of its own: callers pass the full
//! history and get back the next action.

use crate::classifier::ClassifiedResult;
use crate::config::{Relaxation, RestartPolicyConfig, RestartPolicyConfigError};
use crate::domain::{
    CalculationKind, DmrgError, DmrgResult, FailureCategory, Number, ParameterSet, ParameterValue,
    RemoteFolderRef, SUCCESS_EXIT_CODE,
};
use crate::validation::validate_parameters;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptState {
    Pending,
    Running,
    Succeeded,
    Retrying,
    FailedTerminal,
}

impl AttemptState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedTerminal)
    }
}

/// One submit/retrieve/classify cycle. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 1-based.
    pub index: u32,
    pub parameters: ParameterSet,
    pub result: ClassifiedResult,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_folder: Option<RemoteFolderRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GiveUpReason {
    Unrecoverable { category: FailureCategory },
    Cancelled,
    BudgetExhausted { attempts: u32 },
    /// Relaxations produced parameters the solver may not receive.
    InvalidAmendment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    Accept,
    Retry { next_parameters: ParameterSet },
    GiveUp(GiveUpReason),
}

impl PolicyDecision {
    pub fn next_state(&self) -> AttemptState {
        match self {
            Self::Accept => AttemptState::Succeeded,
            Self::Retry { .. } => AttemptState::Retrying,
            Self::GiveUp(_) => AttemptState::FailedTerminal,
        }
    }
}

/// Emitted once per chain, on success or terminal failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalReport {
    pub kind: CalculationKind,
    pub state: AttemptState,
    pub final_result: ClassifiedResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_category: Option<FailureCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub give_up: Option<GiveUpReason>,
    pub exit_code: u32,
    pub attempts: Vec<AttemptRecord>,
}

impl FinalReport {
    pub fn succeeded(&self) -> bool {
        self.state == AttemptState::Succeeded
    }

    /// Output folder of the accepted attempt.
    pub fn remote_folder(&self) -> Option<&RemoteFolderRef> {
        if !self.succeeded() {
            return None;
        }
        self.attempts
            .last()
            .and_then(|attempt| attempt.remote_folder.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestartPolicy {
    config: RestartPolicyConfig,
}

impl RestartPolicy {
    pub fn new(config: RestartPolicyConfig) -> Result<Self, RestartPolicyConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RestartPolicyConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn decide(
        &self,
        kind: CalculationKind,
        history: &[AttemptRecord],
    ) -> DmrgResult<PolicyDecision> {
        let last = history.last().ok_or_else(|| {
            DmrgError::internal(
                "POLICY.EMPTY_HISTORY",
                "restart policy consulted before any attempt was recorded",
            )
        })?;

        let failure = match &last.result {
            ClassifiedResult::Success(_) => {
                debug!(attempt = last.index, "attempt accepted");
                return Ok(PolicyDecision::Accept);
            }
            ClassifiedResult::Failure(failure) => failure,
        };

        if last.cancelled && !self.config.retry_on_cancellation {
            info!(attempt = last.index, "cancelled attempt is not retried");
            return Ok(PolicyDecision::GiveUp(GiveUpReason::Cancelled));
        }

        if !last.cancelled && !self.config.is_recoverable(failure.category) {
            info!(
                attempt = last.index,
                category = %failure.category,
                "failure category is not recoverable"
            );
            return Ok(PolicyDecision::GiveUp(GiveUpReason::Unrecoverable {
                category: failure.category,
            }));
        }

        let attempts = u32::try_from(history.len()).unwrap_or(u32::MAX);
        if attempts >= self.config.max_attempts {
            warn!(
                attempts,
                max_attempts = self.config.max_attempts,
                category = %failure.category,
                "attempt budget exhausted"
            );
            return Ok(PolicyDecision::GiveUp(GiveUpReason::BudgetExhausted {
                attempts,
            }));
        }

        let next_parameters = self.amend(&last.parameters);
        if let Err(error) = validate_parameters(kind, &next_parameters) {
            warn!(
                attempt = last.index,
                error = %error,
                "amended parameters failed validation; giving up"
            );
            return Ok(PolicyDecision::GiveUp(GiveUpReason::InvalidAmendment));
        }
        info!(
            attempt = last.index,
            next_attempt = attempts + 1,
            category = %failure.category,
            "scheduling retry"
        );
        Ok(PolicyDecision::Retry { next_parameters })
    }

    /// Applies every configured relaxation to a copy of `parameters`.
    pub fn amend(&self, parameters: &ParameterSet) -> ParameterSet {
        let mut amended = parameters.clone();
        for relaxation in &self.config.relaxations {
            if let Some(relaxed) = relax_value(amended.get(&relaxation.parameter), relaxation) {
                debug!(
                    parameter = %relaxation.parameter,
                    factor = relaxation.factor,
                    "relaxing parameter for retry"
                );
                amended.insert(relaxation.parameter.clone(), relaxed);
            }
        }
        amended
    }

    pub fn final_report(
        &self,
        kind: CalculationKind,
        attempts: Vec<AttemptRecord>,
        decision: &PolicyDecision,
    ) -> DmrgResult<FinalReport> {
        let final_result = attempts
            .last()
            .map(|attempt| attempt.result.clone())
            .ok_or_else(|| {
                DmrgError::internal(
                    "POLICY.EMPTY_HISTORY",
                    "final report requested before any attempt was recorded",
                )
            })?;

        let (state, terminal_category, give_up) = match decision {
            PolicyDecision::Accept => (AttemptState::Succeeded, None, None),
            PolicyDecision::GiveUp(reason) => (
                AttemptState::FailedTerminal,
                Some(FailureCategory::UnrecoverableTermination),
                Some(*reason),
            ),
            PolicyDecision::Retry { .. } => {
                return Err(DmrgError::internal(
                    "POLICY.NOT_TERMINAL",
                    "final report requested while a retry is pending",
                ));
            }
        };

        Ok(FinalReport {
            kind,
            state,
            final_result,
            terminal_category,
            give_up,
            exit_code: terminal_category.map_or(SUCCESS_EXIT_CODE, FailureCategory::exit_code),
            attempts,
        })
    }
}

fn relax_value(value: Option<&ParameterValue>, relaxation: &Relaxation) -> Option<ParameterValue> {
    let number = value?.as_number()?;
    let product = number.as_f64() * relaxation.factor;
    let relaxed = match number {
        Number::Integer(_) if product.fract() == 0.0 && product.abs() < i64::MAX as f64 => {
            Number::Integer(product as i64)
        }
        _ => Number::Float(product),
    };
    Some(ParameterValue::Number(relaxed))
}
