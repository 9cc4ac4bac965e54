//! The normalized result of one evaluation attempt.
//!
//! Every evaluation path (subprocess, fallback, relay failure) ends in an
//! [`EvaluationOutcome`]; no other error type leaves the core.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Closed set of failure classes a caller can observe.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    InterpreterUnavailable,
    InterpreterNonZeroExit,
    OutputUnparsable,
    EvaluationTimeout,
    InternalError,
}

impl FailureKind {
    /// HTTP status the transport reports for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Operator-facing hint, if there is an obvious one.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InterpreterUnavailable => {
                Some("Check that the configured interpreter program is installed and on PATH")
            }
            Self::EvaluationTimeout => Some("Reduce the work done by the source or raise the timeout"),
            Self::InternalError => Some("Make sure the internal evaluation endpoint is deployed"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Success {
        returned_value: Option<Value>,
        stdout: String,
        stderr: String,
    },
    Failure {
        kind: FailureKind,
        message: String,
        detail: String,
        stdout: String,
        stderr: String,
    },
}

impl EvaluationOutcome {
    pub fn success(returned_value: Option<Value>, stdout: String, stderr: String) -> Self {
        Self::Success {
            returned_value,
            stdout,
            stderr,
        }
    }

    /// A failure with no captured output.
    pub fn failure<M: Into<String>, D: Into<String>>(kind: FailureKind, message: M, detail: D) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            detail: detail.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn stdout(&self) -> &str {
        match self {
            Self::Success { stdout, .. } | Self::Failure { stdout, .. } => stdout,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            Self::Success { stderr, .. } | Self::Failure { stderr, .. } => stderr,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.failure_kind().map_or(200, |kind| kind.status_code())
    }
}

/// Which evaluator produced an outcome.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, strum::Display, PartialEq, Eq, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvaluatorKind {
    /// A real interpreter process computed the result.
    Interpreter,
    /// The in-process stub answered; results are descriptive, not computed.
    Fallback,
    /// The gateway itself answered without evaluating (rejections, relay failures).
    Gateway,
}

/// An outcome together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: EvaluationOutcome,
    pub evaluator: EvaluatorKind,
    pub exit_code: Option<i32>,
    pub cleaned_source: Option<String>,
    pub elapsed: Duration,
}

impl Evaluation {
    pub fn new(outcome: EvaluationOutcome, evaluator: EvaluatorKind) -> Self {
        Self {
            outcome,
            evaluator,
            exit_code: None,
            cleaned_source: None,
            elapsed: Duration::ZERO,
        }
    }

    /// An outcome produced by the gateway before or instead of evaluation.
    pub fn rejected<M: Into<String>, D: Into<String>>(kind: FailureKind, message: M, detail: D) -> Self {
        Self::new(EvaluationOutcome::failure(kind, message, detail), EvaluatorKind::Gateway)
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_cleaned_source(mut self, cleaned: String) -> Self {
        self.cleaned_source = Some(cleaned);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Whether a real interpreter computed this result.
    pub fn interpreter_available(&self) -> bool {
        self.evaluator != EvaluatorKind::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(FailureKind::InvalidRequest.status_code(), 400);
        assert!(FailureKind::InvalidRequest.is_client_error());
        for kind in [
            FailureKind::InterpreterUnavailable,
            FailureKind::InterpreterNonZeroExit,
            FailureKind::OutputUnparsable,
            FailureKind::EvaluationTimeout,
            FailureKind::InternalError,
        ] {
            assert_eq!(kind.status_code(), 500, "{kind}");
        }
    }

    #[test]
    fn test_failure_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(FailureKind::InterpreterNonZeroExit).unwrap(),
            json!("interpreter_non_zero_exit")
        );
        assert_eq!(FailureKind::EvaluationTimeout.to_string(), "evaluation_timeout");
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = EvaluationOutcome::Failure {
            kind: FailureKind::InterpreterNonZeroExit,
            message: "interpreter exited with error".to_string(),
            detail: "boom".to_string(),
            stdout: "partial".to_string(),
            stderr: "boom".to_string(),
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.stdout(), "partial");
        assert_eq!(outcome.stderr(), "boom");
        assert_eq!(outcome.status_code(), 500);

        let outcome = EvaluationOutcome::success(Some(json!(1)), String::new(), String::new());
        assert_eq!(outcome.status_code(), 200);
        assert_eq!(outcome.failure_kind(), None);
    }

    #[test]
    fn test_fallback_is_flagged() {
        let evaluation = Evaluation::new(
            EvaluationOutcome::success(None, String::new(), String::new()),
            EvaluatorKind::Fallback,
        );
        assert!(!evaluation.interpreter_available());
    }
}
