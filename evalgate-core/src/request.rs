use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, GatewayResult};

/// How the interpreter should treat the source text.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    Default,
    PartialEq,
    Eq,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvaluationMode {
    /// Evaluate the text and report its value. In multi-line input every line
    /// but the last is executed first.
    Expression,
    /// Execute the text for its side effects.
    #[default]
    Script,
}

/// A validated unit of work for one evaluation.
///
/// Only constructible through [`EvaluationRequest::new`], so `source` is never
/// empty by the time it reaches an evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRequest {
    source: String,
    mode: EvaluationMode,
}

impl EvaluationRequest {
    pub fn new<S: Into<String>>(source: S, mode: EvaluationMode) -> GatewayResult<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(Error::invalid_request("source must not be empty"));
        }
        Ok(Self { source, mode })
    }

    /// Builds a request from an optional wire field, as decoded from a body.
    pub fn from_parts(source: Option<String>, mode: EvaluationMode) -> GatewayResult<Self> {
        match source {
            Some(source) => Self::new(source, mode),
            None => Err(Error::invalid_request(
                r#"Missing "source" in request body (also accepted as "expr" or "code")"#,
            )),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_source() {
        assert!(matches!(
            EvaluationRequest::new("", EvaluationMode::Script),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            EvaluationRequest::new("  \n\t", EvaluationMode::Expression),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_rejects_missing_source() {
        let err = EvaluationRequest::from_parts(None, EvaluationMode::Script).unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_keeps_source_verbatim() {
        let request = EvaluationRequest::new("  print(1)\n", EvaluationMode::Script).unwrap();
        assert_eq!(request.source(), "  print(1)\n");
        assert_eq!(request.mode(), EvaluationMode::Script);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "expression".parse::<EvaluationMode>().unwrap(),
            EvaluationMode::Expression
        );
        let mode: EvaluationMode = serde_json::from_str(r#""script""#).unwrap();
        assert_eq!(mode, EvaluationMode::Script);
    }
}
