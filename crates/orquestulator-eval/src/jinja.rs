//! Jinja2 rendering through minijinja.

use minijinja::Environment;
use serde::Serialize;
use serde_json::Value;

use crate::QueryKind;
use crate::engine::ExpressionEngine;
use crate::error::{EvalError, Result};
use crate::payload::EvaluationPayload;

/// A fresh environment per evaluation; nothing is cached between requests.
pub(crate) fn environment<'s>() -> Environment<'s> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env
}

/// Render `template` to a string.
pub(crate) fn render<S: Serialize>(env: &Environment<'_>, template: &str, ctx: S) -> Result<String> {
    Ok(env.render_str(template, ctx)?)
}

/// Evaluate a bare Jinja expression (no `{{ }}`) to its native value.
pub(crate) fn eval_expression<'s, S: Serialize>(
    env: &Environment<'s>,
    expression: &'s str,
    ctx: S,
) -> Result<Value> {
    let value = env.compile_expression(expression)?.eval(ctx)?;
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    serde_json::to_value(&value)
        .map_err(|e| EvalError::evaluation(format!("result is not representable as JSON: {e}")))
}

/// Plain Jinja2: the request data is the template context and the result
/// is always the rendered string.
#[derive(Debug, Default, Clone, Copy)]
pub struct JinjaEngine;

impl ExpressionEngine for JinjaEngine {
    fn kind(&self) -> QueryKind {
        QueryKind::Jinja2
    }

    fn evaluate(&self, expression: &str, payload: &EvaluationPayload) -> Result<Value> {
        render(&environment(), expression, payload.data()).map(Value::String)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(expression: &str, data: Value) -> Result<Value> {
        let payload = EvaluationPayload::from_request(QueryKind::Jinja2, data)?;
        JinjaEngine.evaluate(expression, &payload)
    }

    #[test]
    fn test_render() {
        assert_eq!(
            run("Hello {{ name | upper }}!", json!({"name": "st2"})).unwrap(),
            json!("Hello ST2!")
        );
        assert_eq!(
            run("{% for i in items %}{{ i }},{% endfor %}", json!({"items": [1, 2]})).unwrap(),
            json!("1,2,")
        );
        // Numbers render as text.
        assert_eq!(run("{{ n + 1 }}", json!({"n": 1})).unwrap(), json!("2"));
        assert_eq!(run("{{ missing }}", json!({})).unwrap(), json!(""));
    }

    #[test]
    fn test_no_autoescape() {
        assert_eq!(run("{{ s }}", json!({"s": "<b>&</b>"})).unwrap(), json!("<b>&</b>"));
    }

    #[test]
    fn test_syntax_error() {
        match run("{% if %}", json!({})) {
            Err(EvalError::Syntax { kind, .. }) => assert_eq!(kind, QueryKind::Jinja2),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_eval_expression_native() {
        let env = environment();
        assert_eq!(
            eval_expression(&env, "items | length", json!({"items": [1, 2, 3]})).unwrap(),
            json!(3)
        );
        assert_eq!(
            eval_expression(&env, "d.k", json!({"d": {"k": [true]}})).unwrap(),
            json!([true])
        );
        assert_eq!(eval_expression(&env, "nothing", json!({})).unwrap(), json!(null));
    }
}
