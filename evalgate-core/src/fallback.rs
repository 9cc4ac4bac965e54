//! # Fallback Evaluator
//!
//! An in-process stand-in used when no interpreter can be reached. It
//! recognizes a closed set of call shapes and answers with a symbolic
//! description of them; it never computes anything. Every answer is flagged
//! with [`EvaluatorKind::Fallback`] so callers can tell it from a real result.
//!
//! Recognized shapes:
//!
//! | input                       | result                |
//! |-----------------------------|-----------------------|
//! | `expr('P  &  Q')`           | `P & Q`               |
//! | `pl_true('P')`              | `pl_true(P)`          |
//! | `fol_fc_ask("Fever(x)")`    | `fol_fc_ask(Fever(x))`|
//! | `PropKB()` / `FolKB()`      | `PropKB(0 clauses)`   |
//! | anything else               | `unevaluated: <input>`|

use std::time::Instant;

use async_trait::async_trait;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, opt, recognize},
    error::{VerboseError, context},
    sequence::{delimited, pair, tuple},
};
use serde_json::Value;

use crate::gateway::Evaluator;
use crate::outcome::{Evaluation, EvaluationOutcome, EvaluatorKind};
use crate::request::EvaluationRequest;

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Symbolic queries that take one sentence argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum QueryOp {
    PlTrue,
    FolFcAsk,
    FolBcAsk,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum KnowledgeBaseKind {
    PropKB,
    FolKB,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `expr('...')`
    Sentence(String),
    /// `pl_true('...')` and friends
    Query { op: QueryOp, sentence: String },
    /// `PropKB()` / `FolKB()`
    KnowledgeBase(KnowledgeBaseKind),
    Unrecognized(String),
}

impl Shape {
    pub fn describe(&self) -> String {
        match self {
            Shape::Sentence(sentence) => sentence.clone(),
            Shape::Query { op, sentence } => format!("{}({})", op, sentence),
            Shape::KnowledgeBase(kind) => format!("{}(0 clauses)", kind),
            Shape::Unrecognized(cleaned) => format!("unevaluated: {}", cleaned),
        }
    }
}

/// Collapses every run of whitespace into a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn identifier(input: &str) -> ParseResult<&str> {
    context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
    )(input)
}

fn quoted(input: &str) -> ParseResult<&str> {
    context(
        "quoted argument",
        alt((
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        )),
    )(input)
}

fn call(input: &str) -> ParseResult<(&str, Option<&str>)> {
    context(
        "call",
        all_consuming(delimited(
            multispace0,
            pair(
                identifier,
                delimited(
                    tuple((multispace0, char('('), multispace0)),
                    opt(quoted),
                    tuple((multispace0, char(')'))),
                ),
            ),
            multispace0,
        )),
    )(input)
}

/// Classifies `source` into one of the recognized shapes.
pub fn classify(source: &str) -> Shape {
    let unrecognized = || Shape::Unrecognized(normalize_whitespace(source));
    let Ok((_, (name, argument))) = call(source) else {
        return unrecognized();
    };

    match (name, argument) {
        ("expr", Some(sentence)) => Shape::Sentence(normalize_whitespace(sentence)),
        (name, Some(sentence)) => match name.parse::<QueryOp>() {
            Ok(op) => Shape::Query {
                op,
                sentence: normalize_whitespace(sentence),
            },
            Err(_) => unrecognized(),
        },
        (name, None) => match name.parse::<KnowledgeBaseKind>() {
            Ok(kind) => Shape::KnowledgeBase(kind),
            Err(_) => unrecognized(),
        },
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEvaluator;

impl FallbackEvaluator {
    /// Pure evaluation: the same source always maps to the same evaluation.
    pub fn evaluate_source(&self, source: &str) -> Evaluation {
        let started = Instant::now();
        let shape = classify(source);
        let outcome = EvaluationOutcome::success(
            Some(Value::String(shape.describe())),
            String::new(),
            String::new(),
        );
        Evaluation::new(outcome, EvaluatorKind::Fallback)
            .with_cleaned_source(normalize_whitespace(source))
            .with_elapsed(started.elapsed())
    }
}

#[async_trait]
impl Evaluator for FallbackEvaluator {
    fn kind(&self) -> EvaluatorKind {
        EvaluatorKind::Fallback
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Evaluation {
        self.evaluate_source(request.source())
    }
}
