//! Request payloads.
//!
//! Orquesta requests carry workflow state in reserved `__`-prefixed keys of
//! the data object; they are lifted into a typed [`TaskContext`] before
//! evaluation so user expressions never see them in `ctx()`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::QueryKind;
use crate::error::{EvalError, Result};

/// Task id reported by `task_status()` when the payload names none.
pub const DEFAULT_TASK_ID: &str = "current_task";

const TASK_STATUS_KEY: &str = "__task_status";
const TASK_RESULT_KEY: &str = "__task_result";
const TASK_ID_KEY: &str = "__task_id";
const TASK_ROUTE_KEY: &str = "__task_route";
const CURRENT_ITEM_KEY: &str = "__current_item";

/// Completed task statuses an expression can observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Succeeded,
    Failed,
    Expired,
    Abandoned,
    Canceled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
            Self::Canceled => "canceled",
        }
    }

    /// `failed()` is true for every unsuccessful completion.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            "abandoned" => Ok(Self::Abandoned),
            "canceled" => Ok(Self::Canceled),
            other => Err(EvalError::invalid_payload(format!(
                "Invalid __task_status '{other}': expected one of succeeded, failed, expired, abandoned, canceled"
            ))),
        }
    }
}

/// Workflow state visible to Orquesta functions.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskContext {
    pub id: String,
    pub status: TaskStatus,
    pub result: Value,
    pub route: u64,
    pub current_item: Option<Value>,
}

impl Default for TaskContext {
    fn default() -> Self {
        Self {
            id: DEFAULT_TASK_ID.to_string(),
            status: TaskStatus::default(),
            result: Value::Null,
            route: 0,
            current_item: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrquestaPayload {
    /// User context with the reserved keys removed.
    pub context: Map<String, Value>,
    pub task: TaskContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericPayload {
    pub data: Value,
}

/// Evaluation input, shaped per query kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationPayload {
    Orquesta(OrquestaPayload),
    Generic(GenericPayload),
}

impl EvaluationPayload {
    /// Build the payload for `kind` from raw request data.
    pub fn from_request(kind: QueryKind, data: Value) -> Result<Self> {
        match kind {
            QueryKind::Orquesta => OrquestaPayload::from_value(data).map(Self::Orquesta),
            QueryKind::Yaql | QueryKind::Jinja2 => Ok(Self::Generic(GenericPayload { data })),
        }
    }

    /// The data expressions see as their root: the user context for
    /// Orquesta, the raw data otherwise.
    pub fn data(&self) -> Value {
        match self {
            Self::Orquesta(p) => Value::Object(p.context.clone()),
            Self::Generic(p) => p.data.clone(),
        }
    }
}

impl OrquestaPayload {
    pub fn from_value(data: Value) -> Result<Self> {
        let map = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(EvalError::invalid_payload(format!(
                    "Orquesta context must be a JSON object, got {}",
                    json_type(&other)
                )));
            }
        };

        let mut task = TaskContext::default();
        let mut context = Map::with_capacity(map.len());
        for (key, value) in map {
            match key.as_str() {
                TASK_STATUS_KEY => {
                    task.status = match &value {
                        Value::String(s) => s.parse()?,
                        Value::Null => TaskStatus::default(),
                        other => {
                            return Err(EvalError::invalid_payload(format!(
                                "__task_status must be a string, got {}",
                                json_type(other)
                            )));
                        }
                    }
                }
                TASK_RESULT_KEY => task.result = value,
                TASK_ID_KEY => {
                    if let Some(id) = value.as_str().filter(|s| !s.is_empty()) {
                        task.id = id.to_string();
                    }
                }
                TASK_ROUTE_KEY => task.route = route(&value)?,
                CURRENT_ITEM_KEY => task.current_item = Some(value),
                _ if key.starts_with("__") => {
                    tracing::trace!(key = %key, "Dropping reserved context key");
                }
                _ => {
                    context.insert(key, value);
                }
            }
        }
        Ok(Self { context, task })
    }
}

fn route(value: &Value) -> Result<u64> {
    let parsed = match value {
        Value::Null => Some(0),
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        EvalError::invalid_payload(format!(
            "__task_route must be a non-negative integer, got {value}"
        ))
    })
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_reserved_keys_are_lifted() {
        let payload = OrquestaPayload::from_value(json!({
            "a": 1,
            "__task_status": "failed",
            "__task_result": {"stdout": "x"},
            "__task_id": "t1",
            "__task_route": "2",
            "__current_item": "i",
            "__private": true,
        }))
        .unwrap();

        assert_eq!(Value::Object(payload.context), json!({"a": 1}));
        assert_eq!(payload.task.status, TaskStatus::Failed);
        assert_eq!(payload.task.result, json!({"stdout": "x"}));
        assert_eq!(payload.task.id, "t1");
        assert_eq!(payload.task.route, 2);
        assert_eq!(payload.task.current_item, Some(json!("i")));
    }

    #[test]
    fn test_defaults() {
        let payload = OrquestaPayload::from_value(json!({})).unwrap();
        assert_eq!(payload.task, TaskContext::default());
        assert_eq!(payload.task.id, DEFAULT_TASK_ID);
        assert!(OrquestaPayload::from_value(Value::Null).is_ok());
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(
            OrquestaPayload::from_value(json!({"__task_status": "running"})),
            Err(EvalError::InvalidPayload(_))
        ));
        assert!(OrquestaPayload::from_value(json!({"__task_route": -1})).is_err());
        assert!(OrquestaPayload::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_generic_payload_keeps_data() {
        let data = json!({"__task_status": "anything", "x": [1]});
        let payload = EvaluationPayload::from_request(QueryKind::Jinja2, data.clone()).unwrap();
        assert_eq!(payload.data(), data);
    }

    #[test]
    fn test_failure_statuses() {
        assert!(!TaskStatus::Succeeded.is_failure());
        for s in ["failed", "expired", "abandoned", "canceled"] {
            assert!(s.parse::<TaskStatus>().unwrap().is_failure());
        }
    }
}
