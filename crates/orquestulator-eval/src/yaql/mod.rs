//! YAQL core subset.
//!
//! Supported: `$` and `$name` references, member/index access (member access
//! maps over lists), literals, list and `{k => v}` dict construction, the
//! usual arithmetic, comparison and boolean operators, `in`, method-call
//! syntax and a library of builtins including the lambda-style `select`,
//! `where`, `any`, `all` and `orderBy`.

mod ast;
mod functions;
mod interpreter;
mod parser;
mod value;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use interpreter::{FunctionHost, Interpreter};
pub use parser::parse;
pub use value::{to_display, truthy};

use serde_json::Value;

use crate::engine::ExpressionEngine;
use crate::error::{EvalError, Result};
use crate::payload::EvaluationPayload;
use crate::QueryKind;

/// Parse `expression` as YAQL, mapping parse failures to [`EvalError::Syntax`].
pub fn compile(expression: &str) -> Result<Expr> {
    parse(expression).map_err(|message| EvalError::syntax(QueryKind::Yaql, message))
}

/// Plain YAQL: `$` is the request data.
#[derive(Debug, Default, Clone, Copy)]
pub struct YaqlEngine;

impl ExpressionEngine for YaqlEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::Yaql
    }

    fn evaluate(&self, expression: &str, payload: &EvaluationPayload) -> Result<Value> {
        let expr = compile(expression)?;
        Interpreter::new().evaluate(&expr, &payload.data())
    }
}
