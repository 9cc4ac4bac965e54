//! Turns raw interpreter output into an [`EvaluationOutcome`].

use serde_json::Value;

use crate::outcome::{EvaluationOutcome, FailureKind};
use crate::process::ProcessOutput;

const ELLIPSIS: &str = "...";

/// Clips `text` to at most `limit` characters, marking the cut with `...`.
///
/// The marker counts towards the limit, so the result never exceeds it.
pub fn truncate_detail(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut clipped: String = text.chars().take(keep).collect();
    clipped.push_str(&ELLIPSIS[..limit.min(ELLIPSIS.len())]);
    clipped
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    result_marker: String,
    detail_limit: usize,
    capture_limit: Option<usize>,
}

impl Normalizer {
    pub fn new<S: Into<String>>(result_marker: S, detail_limit: usize) -> Self {
        Self {
            result_marker: result_marker.into(),
            detail_limit,
            capture_limit: None,
        }
    }

    /// Stdout capture cap of the process whose output is normalized, used in diagnostics.
    pub fn with_capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = Some(limit);
        self
    }

    pub fn detail_limit(&self) -> usize {
        self.detail_limit
    }

    pub fn truncate(&self, text: &str) -> String {
        truncate_detail(text, self.detail_limit)
    }

    pub fn normalize(&self, output: ProcessOutput) -> EvaluationOutcome {
        let ProcessOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
            stdout_truncated,
            elapsed,
            ..
        } = output;

        if timed_out {
            return EvaluationOutcome::Failure {
                kind: FailureKind::EvaluationTimeout,
                message: "evaluation timed out".to_string(),
                detail: self.truncate(&format!(
                    "interpreter did not finish within {} ms",
                    elapsed.as_millis()
                )),
                stdout,
                stderr,
            };
        }

        if exit_code != Some(0) {
            return EvaluationOutcome::Failure {
                kind: FailureKind::InterpreterNonZeroExit,
                message: "interpreter exited with error".to_string(),
                detail: self.truncate(&stderr),
                stdout,
                stderr,
            };
        }

        // The result line comes last, so a clipped stdout cannot vouch for it.
        if stdout_truncated {
            let detail = match self.capture_limit {
                Some(limit) => format!("interpreter output exceeded {} bytes", limit),
                None => "interpreter output exceeded the capture limit".to_string(),
            };
            return EvaluationOutcome::Failure {
                kind: FailureKind::OutputUnparsable,
                message: "interpreter output was truncated".to_string(),
                detail: self.truncate(&detail),
                stdout,
                stderr,
            };
        }

        let Some((payload, remaining)) = self.split_result(&stdout) else {
            return EvaluationOutcome::success(None, stdout, stderr);
        };

        match serde_json::from_str::<Value>(payload.trim()) {
            Ok(Value::Null) => EvaluationOutcome::success(None, remaining, stderr),
            Ok(value) => EvaluationOutcome::success(Some(value), remaining, stderr),
            Err(err) => EvaluationOutcome::Failure {
                kind: FailureKind::OutputUnparsable,
                message: format!("interpreter result is not valid JSON: {}", err),
                detail: self.truncate(payload),
                stdout,
                stderr,
            },
        }
    }

    /// Finds the last result line and returns its payload and stdout without it.
    fn split_result<'a>(&self, stdout: &'a str) -> Option<(&'a str, String)> {
        let mut offset = 0;
        let mut found = None;
        for line in stdout.split_inclusive('\n') {
            if let Some(payload) = line.strip_prefix(self.result_marker.as_str()) {
                found = Some((offset, line.len(), payload));
            }
            offset += line.len();
        }

        let (start, len, payload) = found?;
        let mut remaining = String::with_capacity(stdout.len() - len);
        remaining.push_str(&stdout[..start]);
        remaining.push_str(&stdout[start + len..]);
        Some((payload.trim_end_matches(['\n', '\r']), remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn normalizer() -> Normalizer {
        Normalizer::new("__RESULT__:", 200)
    }

    fn exited(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            timed_out: false,
            stdout_truncated: false,
            stderr_truncated: false,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_side_effects_only() {
        let outcome = normalizer().normalize(exited(0, "Hello from Python!\n", ""));
        assert_eq!(
            outcome,
            EvaluationOutcome::success(None, "Hello from Python!\n".to_string(), String::new())
        );
    }

    #[test]
    fn test_decodes_marked_result() {
        let outcome = normalizer().normalize(exited(
            0,
            "thinking\n__RESULT__:{\"x\": [1, 2]}\nafter\n",
            "warn\n",
        ));
        assert_eq!(
            outcome,
            EvaluationOutcome::success(
                Some(json!({"x": [1, 2]})),
                "thinking\nafter\n".to_string(),
                "warn\n".to_string()
            )
        );
    }

    #[test]
    fn test_last_marker_wins() {
        let outcome = normalizer().normalize(exited(0, "__RESULT__:1\n__RESULT__:2\n", ""));
        match outcome {
            EvaluationOutcome::Success {
                returned_value,
                stdout,
                ..
            } => {
                assert_eq!(returned_value, Some(json!(2)));
                assert_eq!(stdout, "__RESULT__:1\n");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_null_result_is_absent() {
        let outcome = normalizer().normalize(exited(0, "__RESULT__:null", ""));
        assert_eq!(
            outcome,
            EvaluationOutcome::success(None, String::new(), String::new())
        );
    }

    #[test]
    fn test_unparsable_result() {
        let outcome = normalizer().normalize(exited(0, "__RESULT__:<FolKB object at 0x7f>\n", ""));
        match outcome {
            EvaluationOutcome::Failure {
                kind,
                detail,
                stdout,
                ..
            } => {
                assert_eq!(kind, FailureKind::OutputUnparsable);
                assert_eq!(detail, "<FolKB object at 0x7f>");
                assert_eq!(stdout, "__RESULT__:<FolKB object at 0x7f>\n");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_non_zero_exit_keeps_streams() {
        let stderr = format!("Traceback\n{}", "x".repeat(500));
        let outcome = normalizer().normalize(exited(1, "partial\n", &stderr));
        match outcome {
            EvaluationOutcome::Failure {
                kind,
                message,
                detail,
                stdout,
                stderr: full,
            } => {
                assert_eq!(kind, FailureKind::InterpreterNonZeroExit);
                assert_eq!(message, "interpreter exited with error");
                assert_eq!(detail.chars().count(), 200);
                assert!(detail.ends_with("..."));
                assert_eq!(stdout, "partial\n");
                assert_eq!(full, stderr);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_non_zero_exit_ignores_result_marker() {
        let outcome = normalizer().normalize(exited(2, "__RESULT__:1\n", "err"));
        assert_eq!(
            outcome.failure_kind(),
            Some(FailureKind::InterpreterNonZeroExit)
        );
    }

    #[test]
    fn test_killed_by_signal_is_non_zero_exit() {
        let output = ProcessOutput {
            exit_code: None,
            ..exited(0, "", "")
        };
        assert_eq!(
            normalizer().normalize(output).failure_kind(),
            Some(FailureKind::InterpreterNonZeroExit)
        );
    }

    #[test]
    fn test_timeout_keeps_partial_output() {
        let output = ProcessOutput {
            exit_code: None,
            timed_out: true,
            ..exited(0, "partial\n", "")
        };
        let outcome = normalizer().normalize(output);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::EvaluationTimeout));
        assert_eq!(outcome.stdout(), "partial\n");
        match outcome {
            EvaluationOutcome::Failure { detail, .. } => {
                assert_eq!(detail, "interpreter did not finish within 5 ms")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stdout_is_not_trusted() {
        let output = ProcessOutput {
            stdout_truncated: true,
            ..exited(0, "aaaa", "")
        };
        let outcome = normalizer().with_capture_limit(4).normalize(output);
        match outcome {
            EvaluationOutcome::Failure {
                kind,
                detail,
                stdout,
                ..
            } => {
                assert_eq!(kind, FailureKind::OutputUnparsable);
                assert_eq!(detail, "interpreter output exceeded 4 bytes");
                assert_eq!(stdout, "aaaa");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stderr_keeps_result() {
        let output = ProcessOutput {
            stderr_truncated: true,
            ..exited(0, "__RESULT__:7\n", "noise")
        };
        assert_eq!(
            normalizer().normalize(output),
            EvaluationOutcome::success(Some(json!(7)), String::new(), "noise".to_string())
        );
    }

    #[test]
    fn test_truncated_stdout_after_non_zero_exit() {
        let output = ProcessOutput {
            stdout_truncated: true,
            ..exited(1, "aaaa", "boom")
        };
        assert_eq!(
            normalizer().normalize(output).failure_kind(),
            Some(FailureKind::InterpreterNonZeroExit)
        );
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_detail("short", 200), "short");
        assert_eq!(truncate_detail("", 200), "");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let text = "é".repeat(10);
        assert_eq!(truncate_detail(&text, 10), text);
        assert_eq!(truncate_detail(&text, 6), "ééé...");
    }

    proptest! {
        #[test]
        fn prop_truncate_never_exceeds_limit(text in ".{0,600}", limit in 0usize..300) {
            let clipped = truncate_detail(&text, limit);
            prop_assert!(clipped.chars().count() <= limit);
            if text.chars().count() <= limit {
                prop_assert_eq!(clipped, text);
            }
        }

        #[test]
        fn prop_non_zero_exit_detail_is_bounded(stderr in ".{0,1000}", code in 1i32..255) {
            let outcome = normalizer().normalize(exited(code, "", &stderr));
            match outcome {
                EvaluationOutcome::Failure { kind, detail, .. } => {
                    prop_assert_eq!(kind, FailureKind::InterpreterNonZeroExit);
                    prop_assert!(detail.chars().count() <= 200);
                }
                _ => prop_assert!(false, "expected failure"),
            }
        }
    }
}
