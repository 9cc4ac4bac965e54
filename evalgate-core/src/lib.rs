//! # evalgate: execution gateway
//!
//! Accepts a snippet of source text, runs it through exactly one evaluation
//! path and answers with a normalized outcome that always carries the
//! captured output, a failure class and a bounded diagnostic.
//!
//! ```text
//! body -> EvaluationRequest -> Gateway ─┬─> ProcessManager -> Normalizer ─┐
//!                                       ├─> FallbackEvaluator ────────────┼─> Evaluation -> wire
//!                                       └─> Relay (status/body passthrough)┘
//! ```
//!
//! - [`request`]: validated input
//! - [`process`]: interpreter subprocess with concurrent pipe drains and a deadline
//! - [`normalize`]: result marker decoding and failure classification
//! - [`fallback`]: symbolic stand-in when no interpreter is installed
//! - [`relay`]: forwarding to an internal evaluation endpoint
//! - [`gateway`]: backend selection and the [`Evaluator`] seam
//! - [`wire`]: JSON bodies shared with the HTTP transport and CLI
//!
//! Transports live in `evalgate-http` and `evalgate-cli`.

pub mod config;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod normalize;
pub mod outcome;
pub mod process;
pub mod relay;
pub mod request;
pub mod wire;

// Re-exports
pub use config::{BackendKind, GatewayConfig, InterpreterConfig, RelayConfig};
pub use error::*;
pub use gateway::{Evaluator, Gateway, GatewayReply};
pub use outcome::*;
pub use request::{EvaluationMode, EvaluationRequest};
