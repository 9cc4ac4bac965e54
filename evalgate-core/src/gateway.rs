//! # Gateway
//!
//! Entry point shared by the HTTP transport and the command line client. A
//! [`Gateway`] owns exactly one evaluation path, chosen by
//! [`GatewayConfig::backend`]:
//!
//! - `subprocess`: [`ProcessManager`], optionally backed by the
//!   [`FallbackEvaluator`] when the interpreter cannot be started
//! - `fallback`: [`FallbackEvaluator`] only
//! - `relay`: [`Relay`] to an internal evaluation endpoint
//!
//! The gateway is immutable once built and holds no per-request state, so one
//! instance serves all concurrent calls.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::config::{BackendKind, GatewayConfig};
use crate::error::{Error, GatewayResult};
use crate::fallback::FallbackEvaluator;
use crate::normalize::truncate_detail;
use crate::outcome::{Evaluation, EvaluatorKind, FailureKind};
use crate::process::ProcessManager;
use crate::relay::{Relay, RelayReply};
use crate::request::{EvaluationMode, EvaluationRequest};
use crate::wire::{Discovery, EvaluateBody, render};

/// Something that turns a validated request into exactly one evaluation.
///
/// Implementations never fail: every error is folded into the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn kind(&self) -> EvaluatorKind;

    /// Whether the evaluator can currently be used, without running anything.
    fn is_available(&self) -> bool;

    async fn evaluate(&self, request: &EvaluationRequest) -> Evaluation;
}

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReply {
    Evaluated(Evaluation),
    /// Status and body from the internal endpoint, passed through untouched.
    Relayed { status: u16, body: Value },
}

impl GatewayReply {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Evaluated(evaluation) => evaluation.outcome.status_code(),
            Self::Relayed { status, .. } => *status,
        }
    }

    /// Status code and JSON body as sent on the wire.
    pub fn into_wire(self) -> (u16, Value) {
        match self {
            Self::Evaluated(evaluation) => render(&evaluation),
            Self::Relayed { status, body } => (status, body),
        }
    }
}

enum Route {
    Local {
        primary: Arc<dyn Evaluator>,
        fallback: Option<Arc<dyn Evaluator>>,
    },
    Relay(Relay),
}

pub struct Gateway {
    route: Route,
    backend: BackendKind,
    default_mode: EvaluationMode,
    detail_limit: usize,
}

impl Gateway {
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;
        let route = match config.backend {
            BackendKind::Subprocess => {
                let manager = ProcessManager::new(config.interpreter.clone(), config.detail_limit);
                match manager.probe() {
                    Some(path) => info!(program = %path.display(), "interpreter resolved"),
                    None => warn!(
                        program = %config.interpreter.program,
                        fallback = config.fallback_on_unavailable,
                        "interpreter not found"
                    ),
                }
                Route::Local {
                    primary: Arc::new(manager),
                    fallback: config
                        .fallback_on_unavailable
                        .then(|| Arc::new(FallbackEvaluator) as Arc<dyn Evaluator>),
                }
            }
            BackendKind::Fallback => Route::Local {
                primary: Arc::new(FallbackEvaluator),
                fallback: None,
            },
            BackendKind::Relay => Route::Relay(Relay::new(&config.relay, config.detail_limit)?),
        };

        Ok(Self {
            route,
            backend: config.backend,
            default_mode: config.default_mode,
            detail_limit: config.detail_limit,
        })
    }

    /// A gateway evaluating locally with the given evaluators.
    pub fn local(
        primary: Arc<dyn Evaluator>,
        fallback: Option<Arc<dyn Evaluator>>,
        default_mode: EvaluationMode,
    ) -> Self {
        let backend = match primary.kind() {
            EvaluatorKind::Fallback => BackendKind::Fallback,
            _ => BackendKind::Subprocess,
        };
        Self {
            route: Route::Local { primary, fallback },
            backend,
            default_mode,
            detail_limit: GatewayConfig::default().detail_limit,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn default_mode(&self) -> EvaluationMode {
        self.default_mode
    }

    /// Upper bound, in characters, of diagnostics produced for this gateway.
    pub fn detail_limit(&self) -> usize {
        self.detail_limit
    }

    /// Whether a real interpreter (local or behind the relay) answers requests.
    pub fn interpreter_available(&self) -> bool {
        match &self.route {
            Route::Local { primary, .. } => {
                primary.kind() != EvaluatorKind::Fallback && primary.is_available()
            }
            Route::Relay(_) => true,
        }
    }

    pub fn describe(&self) -> Discovery {
        Discovery::new(self.backend, self.interpreter_available(), self.default_mode)
    }

    /// Decodes a request body and evaluates it.
    ///
    /// Bodies that do not decode, or carry no source, are answered with
    /// [`FailureKind::InvalidRequest`] and never reach an evaluator.
    pub async fn handle(&self, body: Value) -> GatewayReply {
        match self.decode(&body) {
            Ok(request) => {
                let mut forwarded = body;
                if let Value::Object(fields) = &mut forwarded {
                    fields.insert("mode".to_string(), json!(request.mode()));
                }
                self.dispatch(&request, &forwarded).await
            }
            Err(rejection) => {
                info!(kind = %FailureKind::InvalidRequest, "request rejected");
                GatewayReply::Evaluated(rejection)
            }
        }
    }

    /// Evaluates an already validated request.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> GatewayReply {
        let body = json!({ "source": request.source(), "mode": request.mode() });
        self.dispatch(request, &body).await
    }

    fn decode(&self, body: &Value) -> Result<EvaluationRequest, Evaluation> {
        let decoded: EvaluateBody = serde_json::from_value(body.clone()).map_err(|err| {
            Evaluation::rejected(
                FailureKind::InvalidRequest,
                "Invalid JSON",
                truncate_detail(&format!("Invalid request body: {}", err), self.detail_limit),
            )
        })?;
        EvaluationRequest::from_parts(decoded.source, decoded.mode.unwrap_or(self.default_mode))
            .map_err(|err| {
                let message = match err {
                    Error::InvalidRequest(message) => message,
                    other => other.to_string(),
                };
                Evaluation::rejected(FailureKind::InvalidRequest, message, "")
            })
    }

    async fn dispatch(&self, request: &EvaluationRequest, body: &Value) -> GatewayReply {
        let span = info_span!(
            "evaluation",
            request_id = %Uuid::new_v4(),
            backend = %self.backend,
            mode = %request.mode(),
        );
        async {
            let started = Instant::now();
            let reply = match &self.route {
                Route::Local { primary, fallback } => {
                    GatewayReply::Evaluated(evaluate_local(primary, fallback.as_ref(), request).await)
                }
                Route::Relay(relay) => match relay.forward(body).await {
                    RelayReply::Forwarded { status, body } => GatewayReply::Relayed { status, body },
                    RelayReply::Failed(evaluation) => GatewayReply::Evaluated(evaluation),
                },
            };
            let kind = match &reply {
                GatewayReply::Evaluated(evaluation) => evaluation
                    .outcome
                    .failure_kind()
                    .map_or_else(|| "success".to_string(), |kind| kind.to_string()),
                GatewayReply::Relayed { .. } => "relayed".to_string(),
            };
            info!(
                status = reply.status_code(),
                %kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "evaluation finished"
            );
            reply
        }
        .instrument(span)
        .await
    }
}

async fn evaluate_local(
    primary: &Arc<dyn Evaluator>,
    fallback: Option<&Arc<dyn Evaluator>>,
    request: &EvaluationRequest,
) -> Evaluation {
    let evaluation = primary.evaluate(request).await;
    match fallback {
        Some(fallback)
            if evaluation.outcome.failure_kind() == Some(FailureKind::InterpreterUnavailable) =>
        {
            warn!("interpreter unavailable, answering with the fallback evaluator");
            fallback.evaluate(request).await
        }
        _ => evaluation,
    }
}
