//! Expression evaluation for Orquestulator.
//!
//! Three languages are supported, selected by [`QueryKind`]:
//!
//! - **jinja2**: minijinja templates rendered against the request data.
//! - **yaql**: a YAQL core subset evaluated to native JSON values.
//! - **orquesta**: `<% yaql %>` or `{{ jinja }}` with workflow functions
//!   (`ctx()`, `succeeded()`, `task_status()`, `item()`, ...).
//!
//! ```
//! use orquestulator_eval::{Evaluator, QueryKind};
//! use serde_json::json;
//!
//! let evaluator = Evaluator::new();
//! let value = evaluator
//!     .evaluate(QueryKind::Yaql, "$.items.where($ > 1)", json!({"items": [1, 2, 3]}))
//!     .unwrap();
//! assert_eq!(value, json!([2, 3]));
//! ```

mod engine;
mod error;
mod jinja;
mod kind;
mod orquesta;
pub mod payload;
pub mod yaql;

pub use engine::{Evaluator, ExpressionEngine};
pub use error::{EvalError, Result};
pub use jinja::JinjaEngine;
pub use kind::QueryKind;
pub use orquesta::OrquestaEngine;
pub use payload::{EvaluationPayload, GenericPayload, OrquestaPayload, TaskContext, TaskStatus};
pub use yaql::YaqlEngine;
