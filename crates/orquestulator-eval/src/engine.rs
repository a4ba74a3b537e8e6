//! Engine trait and the dispatching evaluator.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::QueryKind;
use crate::error::{EvalError, Result};
use crate::jinja::JinjaEngine;
use crate::orquesta::OrquestaEngine;
use crate::payload::EvaluationPayload;
use crate::yaql::YaqlEngine;

/// An expression language.
///
/// Engines are stateless between calls: every evaluation re-parses the
/// expression.
pub trait ExpressionEngine: Send + Sync {
    fn kind(&self) -> QueryKind;

    fn evaluate(&self, expression: &str, payload: &EvaluationPayload) -> Result<Value>;
}

/// Dispatches evaluation requests to the engine registered for their kind.
#[derive(Clone)]
pub struct Evaluator {
    engines: HashMap<QueryKind, Arc<dyn ExpressionEngine>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator with the built-in Orquesta, YAQL and Jinja2 engines.
    pub fn new() -> Self {
        Self::empty()
            .with_engine(OrquestaEngine)
            .with_engine(YaqlEngine)
            .with_engine(JinjaEngine)
    }

    /// Evaluator with no engines registered.
    pub fn empty() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Register an engine, replacing any engine of the same kind.
    pub fn with_engine(mut self, engine: impl ExpressionEngine + 'static) -> Self {
        self.engines.insert(engine.kind(), Arc::new(engine));
        self
    }

    pub fn supports(&self, kind: QueryKind) -> bool {
        self.engines.contains_key(&kind)
    }

    /// Evaluate `expression` against request `data`.
    pub fn evaluate(&self, kind: QueryKind, expression: &str, data: Value) -> Result<Value> {
        let engine = self
            .engines
            .get(&kind)
            .ok_or_else(|| EvalError::UnsupportedKind(kind.to_string()))?;
        let payload = EvaluationPayload::from_request(kind, data)?;

        let result = engine.evaluate(expression, &payload);
        match &result {
            Ok(_) => tracing::debug!(kind = %kind, len = expression.len(), "Expression evaluated"),
            Err(e) => tracing::debug!(kind = %kind, error = %e, "Expression evaluation failed"),
        }
        result
    }

    /// Like [`evaluate`](Self::evaluate) but takes the kind as a string, as
    /// it arrives in the request path.
    pub fn evaluate_str(&self, kind: &str, expression: &str, data: Value) -> Result<Value> {
        self.evaluate(kind.parse()?, expression, data)
    }
}
