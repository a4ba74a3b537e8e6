//! Orquesta workflow expressions.
//!
//! An Orquesta expression is either YAQL wrapped in `<% %>` or Jinja wrapped
//! in `{{ }}` / `{% %}`. A string that is exactly one expression evaluates
//! to the native value; any surrounding text turns the result into an
//! interpolated string. Both flavours see the workflow functions
//! (`ctx()`, `succeeded()`, `task_status()`, ...).

use std::sync::Arc;

use minijinja::value::{Rest, Value as JinjaValue};
use minijinja::{Environment, ErrorKind};
use serde_json::{Map, Value};

use crate::QueryKind;
use crate::engine::ExpressionEngine;
use crate::error::{EvalError, Result};
use crate::jinja;
use crate::payload::{EvaluationPayload, OrquestaPayload, TaskContext};
use crate::yaql::{self, FunctionHost, Interpreter, to_display};

const YAQL_OPEN: &str = "<%";
const YAQL_CLOSE: &str = "%>";

/// Names of the workflow functions, shared by both flavours.
const WORKFLOW_FUNCTIONS: &[&str] = &[
    "ctx",
    "succeeded",
    "failed",
    "completed",
    "result",
    "task_status",
    "item",
    "json",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Yaql,
    Jinja,
    Literal,
}

fn detect(expression: &str) -> Result<Flavour> {
    let yaql = expression.contains(YAQL_OPEN);
    let jinja = expression.contains("{{") || expression.contains("{%");
    match (yaql, jinja) {
        (true, true) => Err(EvalError::evaluation(
            "Expression mixes YAQL <% %> and Jinja {{ }} delimiters",
        )),
        (true, false) => Ok(Flavour::Yaql),
        (false, true) => Ok(Flavour::Jinja),
        (false, false) => Ok(Flavour::Literal),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow functions
// ─────────────────────────────────────────────────────────────────────────────

/// Workflow state behind the Orquesta functions.
#[derive(Debug, Clone)]
struct Workflow {
    context: Map<String, Value>,
    task: TaskContext,
}

impl Workflow {
    fn from_payload(payload: &OrquestaPayload) -> Self {
        Self {
            context: payload.context.clone(),
            task: payload.task.clone(),
        }
    }

    fn call_fn(&self, name: &str, args: &[Value]) -> Result<Value> {
        match (name, args) {
            ("ctx", []) => Ok(Value::Object(self.context.clone())),
            ("ctx", [Value::String(key)]) => self.context.get(key).cloned().ok_or_else(|| {
                EvalError::evaluation(format!(
                    "Unable to find key \"{key}\" in the workflow context"
                ))
            }),
            ("succeeded", []) => Ok(Value::Bool(!self.task.status.is_failure())),
            ("failed", []) => Ok(Value::Bool(self.task.status.is_failure())),
            // Every status a request can carry is a completed one.
            ("completed", []) => Ok(Value::Bool(true)),
            ("result", []) => Ok(self.task.result.clone()),
            ("task_status", []) => Ok(Value::String(self.task.status.to_string())),
            ("task_status", [Value::String(id)]) => Ok(if *id == self.task.id {
                Value::String(self.task.status.to_string())
            } else {
                Value::Null
            }),
            ("item", []) => self.current_item().cloned(),
            ("item", [Value::String(key)]) => match self.current_item()? {
                Value::Object(map) => map.get(key).cloned().ok_or_else(|| {
                    EvalError::evaluation(format!("Item does not have key \"{key}\""))
                }),
                _ => Err(EvalError::evaluation(format!(
                    "Item is not a dict, cannot read key \"{key}\""
                ))),
            },
            ("json", [Value::String(text)]) => serde_json::from_str(text)
                .map_err(|e| EvalError::evaluation(format!("json(): invalid JSON: {e}"))),
            _ => Err(EvalError::evaluation(format!(
                "Invalid arguments for {name}(): {}",
                args.iter().map(to_display).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    fn current_item(&self) -> Result<&Value> {
        self.task.current_item.as_ref().ok_or_else(|| {
            EvalError::evaluation("item() is only available inside a with-items task")
        })
    }
}

impl FunctionHost for Workflow {
    fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value>> {
        WORKFLOW_FUNCTIONS
            .contains(&name)
            .then(|| self.call_fn(name, args))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// YAQL flavour
// ─────────────────────────────────────────────────────────────────────────────

enum Segment<'a> {
    Text(&'a str),
    Expr(&'a str),
}

fn yaql_segments(expression: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = expression;
    while let Some(start) = rest.find(YAQL_OPEN) {
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let after_open = &rest[start + YAQL_OPEN.len()..];
        let end = after_open.find(YAQL_CLOSE).ok_or_else(|| {
            EvalError::syntax(QueryKind::Orquesta, "unterminated <% expression")
        })?;
        segments.push(Segment::Expr(after_open[..end].trim()));
        rest = &after_open[end + YAQL_CLOSE.len()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

fn evaluate_yaql(expression: &str, workflow: &Workflow) -> Result<Value> {
    let data = Value::Object(workflow.context.clone());
    let interpreter = Interpreter::with_host(workflow);
    let eval = |src: &str| -> Result<Value> {
        interpreter.evaluate(&yaql::compile(src)?, &data)
    };

    let segments = yaql_segments(expression.trim())?;
    if let [Segment::Expr(src)] = segments.as_slice() {
        return eval(src);
    }

    let mut out = String::new();
    for segment in yaql_segments(expression)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Expr(src) => out.push_str(&to_display(&eval(src)?)),
        }
    }
    Ok(Value::String(out))
}

// ─────────────────────────────────────────────────────────────────────────────
// Jinja flavour
// ─────────────────────────────────────────────────────────────────────────────

fn jinja_environment<'s>(workflow: &Arc<Workflow>) -> Environment<'s> {
    let mut env = jinja::environment();
    for &name in WORKFLOW_FUNCTIONS {
        let workflow = Arc::clone(workflow);
        env.add_function(name, move |args: Rest<JinjaValue>| {
            let args = args
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
            workflow
                .call_fn(name, &args)
                .map(|v| JinjaValue::from_serialize(&v))
                .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))
        });
    }
    env
}

/// The body of `{{ ... }}` when the whole string is a single expression.
fn single_jinja_expression(expression: &str) -> Option<&str> {
    let inner = expression.strip_prefix("{{")?.strip_suffix("}}")?;
    let nested = ["{{", "}}", "{%", "%}"].iter().any(|d| inner.contains(d));
    (!nested).then_some(inner.trim())
}

fn evaluate_jinja(expression: &str, workflow: Workflow) -> Result<Value> {
    let mut ctx = workflow.context.clone();
    ctx.insert("_".to_string(), Value::Object(workflow.context.clone()));
    let workflow = Arc::new(workflow);
    let env = jinja_environment(&workflow);

    match single_jinja_expression(expression.trim()) {
        Some(inner) => jinja::eval_expression(&env, inner, &ctx),
        None => jinja::render(&env, expression, &ctx).map(Value::String),
    }
}

/// Orquesta expressions with workflow functions.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrquestaEngine;

impl ExpressionEngine for OrquestaEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::Orquesta
    }

    fn evaluate(&self, expression: &str, payload: &EvaluationPayload) -> Result<Value> {
        let EvaluationPayload::Orquesta(payload) = payload else {
            return Err(EvalError::invalid_payload(
                "Orquesta expressions need an Orquesta payload",
            ));
        };
        let workflow = Workflow::from_payload(payload);
        match detect(expression)? {
            Flavour::Yaql => evaluate_yaql(expression, &workflow),
            Flavour::Jinja => evaluate_jinja(expression, workflow),
            Flavour::Literal => Ok(Value::String(expression.to_string())),
        }
    }
}
