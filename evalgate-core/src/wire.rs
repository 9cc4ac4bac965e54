//! JSON shapes exchanged with callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::config::BackendKind;
use crate::outcome::{Evaluation, EvaluationOutcome, FailureKind};
use crate::request::EvaluationMode;

/// Body of an evaluation call.
///
/// `source`, `expr` and `code` are interchangeable spellings of the same field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EvaluateBody {
    #[serde(default, alias = "expr", alias = "code")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<EvaluationMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuccessBody {
    pub message: String,
    /// Decoded return value; `null` when the source only had side effects.
    #[schema(value_type = Object)]
    pub result: Value,
    pub stdout: String,
    pub stderr: String,
    /// `false` when the answer came from the fallback evaluator.
    pub aima_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorBody {
    pub fn new<S: Into<String>>(error: S) -> Self {
        Self {
            error: error.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Status code and JSON body for an evaluation.
pub fn render(evaluation: &Evaluation) -> (u16, Value) {
    let status = evaluation.outcome.status_code();
    let body = match &evaluation.outcome {
        EvaluationOutcome::Success {
            returned_value,
            stdout,
            stderr,
        } => serde_json::to_value(SuccessBody {
            message: "evaluation completed".to_string(),
            result: returned_value.clone().unwrap_or(Value::Null),
            stdout: stdout.clone(),
            stderr: stderr.clone(),
            aima_available: evaluation.interpreter_available(),
            cleaned_expression: evaluation.cleaned_source.clone(),
            exit_code: evaluation.exit_code,
        }),
        EvaluationOutcome::Failure {
            kind,
            message,
            detail,
            stdout,
            stderr,
        } => {
            // Rejected requests never produced output; leave the fields out.
            let with_output = *kind != FailureKind::InvalidRequest;
            serde_json::to_value(ErrorBody {
                error: message.clone(),
                kind: Some(*kind),
                details: (!detail.is_empty()).then(|| detail.clone()),
                stdout: with_output.then(|| stdout.clone()),
                stderr: with_output.then(|| stderr.clone()),
                exit_code: evaluation.exit_code,
                suggestion: kind.suggestion().map(str::to_string),
            })
        }
    };
    // Both bodies are plain structs of strings and JSON values.
    let body = body.unwrap_or_else(|err| Value::String(err.to_string()));
    (status, body)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Operation {
    pub method: String,
    pub description: String,
}

/// Static capability description returned by the discovery call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Discovery {
    pub message: String,
    pub backend: BackendKind,
    pub aima_available: bool,
    pub default_mode: EvaluationMode,
    pub operations: Vec<Operation>,
    pub usage: String,
    pub examples: Vec<String>,
}

impl Discovery {
    pub fn new(backend: BackendKind, aima_available: bool, default_mode: EvaluationMode) -> Self {
        Self {
            message: "Evaluation gateway".to_string(),
            backend,
            aima_available,
            default_mode,
            operations: vec![
                Operation {
                    method: "POST".to_string(),
                    description: "Evaluate a source snippet and return its result and output"
                        .to_string(),
                },
                Operation {
                    method: "GET".to_string(),
                    description: "Describe this endpoint".to_string(),
                },
                Operation {
                    method: "OPTIONS".to_string(),
                    description: "Pre-flight: list permitted methods and headers".to_string(),
                },
            ],
            usage: r#"Send POST requests with { "source": "...", "mode": "expression" | "script" } ("expr" and "code" are accepted for "source")"#
                .to_string(),
            examples: vec![
                "expr('P & Q')".to_string(),
                "kb = PropKB()\nkb.tell(expr('P'))\nkb.ask(expr('P'))".to_string(),
                "pl_true(expr('P & Q'), {expr('P'): True, expr('Q'): True})".to_string(),
                "print('Hello from Python!')".to_string(),
            ],
        }
    }
}
