//! Evaluators with canned behaviour for transport tests.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use evalgate_core::{Evaluation, EvaluationRequest, Evaluator, EvaluatorKind};

/// Answers every request with the same evaluation.
pub struct CannedEvaluator {
    pub evaluation: Evaluation,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl CannedEvaluator {
    pub fn new(evaluation: Evaluation) -> Self {
        Self {
            evaluation,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for CannedEvaluator {
    fn kind(&self) -> EvaluatorKind {
        self.evaluation.evaluator
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn evaluate(&self, _request: &EvaluationRequest) -> Evaluation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.evaluation.clone()
    }
}
