//! Evaluation API.

use serde_json::Value;

use crate::client::OrquestulatorClient;
use crate::error::Result;
use crate::types::{EvaluateRequest, EvaluateResponse};

/// Evaluation API client.
pub struct EvaluateApi {
    client: OrquestulatorClient,
}

impl EvaluateApi {
    pub(crate) fn new(client: OrquestulatorClient) -> Self {
        Self { client }
    }

    /// Evaluate `expression` against `data` with the named engine.
    pub async fn evaluate(&self, kind: &str, expression: &str, data: Value) -> Result<Value> {
        let request = EvaluateRequest {
            expression: expression.to_string(),
            data,
        };
        let response: EvaluateResponse = self
            .client
            .post(&format!("evaluate/{}", kind), &request)
            .await?;
        Ok(response.result)
    }

    /// Evaluate an Orquesta expression.
    ///
    /// Task context is passed through the reserved `__task_status` and
    /// `__task_result` keys of `data`.
    pub async fn orquesta(&self, expression: &str, data: Value) -> Result<Value> {
        self.evaluate("orquesta", expression, data).await
    }

    /// Evaluate a YAQL expression.
    pub async fn yaql(&self, expression: &str, data: Value) -> Result<Value> {
        self.evaluate("yaql", expression, data).await
    }

    /// Render a Jinja2 template.
    pub async fn jinja2(&self, expression: &str, data: Value) -> Result<Value> {
        self.evaluate("jinja2", expression, data).await
    }
}
