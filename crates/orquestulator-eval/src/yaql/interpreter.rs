//! Tree-walking YAQL interpreter over `serde_json::Value`.

use serde_json::{Map, Value};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::functions::{self, contains, list, sort_values};
use super::value::{Num, compare_or_err, equals, float, to_display, truthy, type_name};
use crate::error::{EvalError, Result};

/// Functions supplied by the embedding context (e.g. Orquesta's `ctx()`).
///
/// Host functions take precedence over builtins of the same name and are
/// only reachable through plain calls, not method syntax.
pub trait FunctionHost {
    /// Returns `None` when the host does not define `name`.
    fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value>>;
}

/// Functions whose trailing arguments are evaluated once per element with
/// `$` bound to that element.
const LAMBDA_FUNCTIONS: &[&str] = &[
    "select",
    "where",
    "filter",
    "any",
    "all",
    "orderBy",
    "orderByDescending",
];

struct Scope<'s> {
    /// The input data; `$name` resolves against it.
    root: &'s Value,
    /// The value `$` refers to.
    this: &'s Value,
}

/// Evaluates parsed expressions.
#[derive(Default)]
pub struct Interpreter<'h> {
    host: Option<&'h dyn FunctionHost>,
}

impl<'h> Interpreter<'h> {
    pub fn new() -> Self {
        Self { host: None }
    }

    pub fn with_host(host: &'h dyn FunctionHost) -> Self {
        Self { host: Some(host) }
    }

    /// Evaluate `expr` with `$` bound to `data`.
    pub fn evaluate(&self, expr: &Expr, data: &Value) -> Result<Value> {
        self.eval(
            expr,
            &Scope {
                root: data,
                this: data,
            },
        )
    }

    fn eval(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::This => Ok(scope.this.clone()),
            Expr::Var(name) => Ok(scope.root.get(name).cloned().unwrap_or(Value::Null)),
            Expr::Ident(name) => Ok(Value::String(name.clone())),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item, scope))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expr::Dict(pairs) => {
                let mut map = Map::new();
                for (k, v) in pairs {
                    let key = to_display(&self.eval(k, scope)?);
                    map.insert(key, self.eval(v, scope)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Member(receiver, name) => member(self.eval(receiver, scope)?, name),
            Expr::Index(receiver, index) => {
                index_value(self.eval(receiver, scope)?, &self.eval(index, scope)?)
            }
            Expr::Call { name, args } => self.call(name, None, args, scope),
            Expr::Method {
                receiver,
                name,
                args,
            } => {
                let receiver = self.eval(receiver, scope)?;
                self.call(name, Some(receiver), args, scope)
            }
            Expr::Unary(UnaryOp::Not, operand) => {
                Ok(Value::Bool(!truthy(&self.eval(operand, scope)?)))
            }
            Expr::Unary(UnaryOp::Neg, operand) => negate(&self.eval(operand, scope)?),
            // `and`/`or` short-circuit and return an operand, as in Python.
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = self.eval(lhs, scope)?;
                if truthy(&left) {
                    self.eval(rhs, scope)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = self.eval(lhs, scope)?;
                if truthy(&left) {
                    Ok(left)
                } else {
                    self.eval(rhs, scope)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                binary(*op, &self.eval(lhs, scope)?, &self.eval(rhs, scope)?)
            }
        }
    }

    fn call(
        &self,
        name: &str,
        receiver: Option<Value>,
        args: &[Expr],
        scope: &Scope<'_>,
    ) -> Result<Value> {
        if LAMBDA_FUNCTIONS.contains(&name) {
            let (collection, lambdas) = match receiver {
                Some(r) => (r, args),
                None => match args.split_first() {
                    Some((first, rest)) => (self.eval(first, scope)?, rest),
                    None => {
                        return Err(EvalError::evaluation(format!(
                            "{name}() needs a collection"
                        )));
                    }
                },
            };
            return self.lambda_call(name, collection, lambdas, scope);
        }

        let is_method = receiver.is_some();
        let mut values = Vec::with_capacity(args.len() + 1);
        values.extend(receiver);
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }

        if !is_method
            && let Some(host) = self.host
            && let Some(result) = host.call(name, &values)
        {
            return result;
        }
        functions::call(name, &values)
            .unwrap_or_else(|| Err(EvalError::evaluation(format!("Unknown function \"{name}\""))))
    }

    fn lambda_call(
        &self,
        name: &str,
        collection: Value,
        lambdas: &[Expr],
        scope: &Scope<'_>,
    ) -> Result<Value> {
        let items = list(name, &collection)?;
        let lambda = match lambdas {
            [] => None,
            [one] => Some(one),
            _ => {
                return Err(EvalError::evaluation(format!(
                    "{name}() takes at most one expression argument"
                )));
            }
        };
        let apply = |item: &Value, lambda: &Expr| {
            self.eval(
                lambda,
                &Scope {
                    root: scope.root,
                    this: item,
                },
            )
        };

        match (name, lambda) {
            ("select", Some(lambda)) => items
                .iter()
                .map(|item| apply(item, lambda))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            ("where" | "filter", Some(lambda)) => {
                let mut out = Vec::new();
                for item in items {
                    if truthy(&apply(&item, lambda)?) {
                        out.push(item);
                    }
                }
                Ok(Value::Array(out))
            }
            ("any", lambda) => {
                for item in &items {
                    let hit = match lambda {
                        Some(lambda) => truthy(&apply(item, lambda)?),
                        None => truthy(item),
                    };
                    if hit {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            ("all", lambda) => {
                for item in &items {
                    let hit = match lambda {
                        Some(lambda) => truthy(&apply(item, lambda)?),
                        None => truthy(item),
                    };
                    if !hit {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            ("orderBy" | "orderByDescending", Some(lambda)) => {
                sort_values(items, |item| apply(item, lambda), name == "orderByDescending")
                    .map(Value::Array)
            }
            _ => Err(EvalError::evaluation(format!(
                "{name}() needs an expression argument"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

/// `receiver.name`. On a list the access is mapped over the elements.
fn member(receiver: Value, name: &str) -> Result<Value> {
    match receiver {
        Value::Object(mut map) => Ok(map.remove(name).unwrap_or(Value::Null)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| member(item, name))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Null => Ok(Value::Null),
        other => Err(EvalError::evaluation(format!(
            "cannot read attribute '{name}' of {}",
            type_name(&other)
        ))),
    }
}

fn index_value(receiver: Value, index: &Value) -> Result<Value> {
    match (receiver, index) {
        (Value::Array(items), idx) => {
            let i = position(idx, items.len())?;
            Ok(items[i].clone())
        }
        (Value::String(s), idx) => {
            let chars: Vec<char> = s.chars().collect();
            let i = position(idx, chars.len())?;
            Ok(Value::String(chars[i].to_string()))
        }
        (Value::Object(mut map), Value::String(key)) => {
            Ok(map.remove(key).unwrap_or(Value::Null))
        }
        (Value::Null, _) => Ok(Value::Null),
        (other, idx) => Err(EvalError::evaluation(format!(
            "cannot index {} with {}",
            type_name(&other),
            type_name(idx)
        ))),
    }
}

/// Resolve a possibly negative index against `len`.
fn position(index: &Value, len: usize) -> Result<usize> {
    let i = index.as_i64().ok_or_else(|| {
        EvalError::evaluation(format!("index must be an integer, got {}", type_name(index)))
    })?;
    let resolved = if i < 0 { len as i64 + i } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::evaluation(format!("index {i} out of range")));
    }
    Ok(resolved as usize)
}

fn negate(v: &Value) -> Result<Value> {
    match Num::of(v) {
        Some(Num::Int(i)) => i
            .checked_neg()
            .map(Value::from)
            .ok_or_else(|| EvalError::evaluation("integer overflow")),
        Some(Num::Float(f)) => float(-f),
        None => Err(EvalError::evaluation(format!(
            "cannot negate {}",
            type_name(v)
        ))),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    use std::cmp::Ordering::*;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(left, right))),
        BinaryOp::Lt => Ok(Value::Bool(compare_or_err(left, right)? == Less)),
        BinaryOp::Le => Ok(Value::Bool(compare_or_err(left, right)? != Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare_or_err(left, right)? == Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare_or_err(left, right)? != Less)),
        BinaryOp::In => contains(right, left).map(Value::Bool),
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, left, right)
        }
        BinaryOp::And | BinaryOp::Or => Err(EvalError::evaluation(format!(
            "'{}' must short-circuit",
            op.symbol()
        ))),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b).cloned().collect()))
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::Object(merged))
        }
        _ => arithmetic(BinaryOp::Add, left, right),
    }
}

/// Integer arithmetic stays integral (with Python floor semantics for `/`
/// and `mod`) and falls back to floats on overflow.
fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(EvalError::evaluation(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            type_name(left),
            type_name(right)
        )));
    };

    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b.as_f64() == 0.0 {
        return Err(EvalError::evaluation("division by zero"));
    }

    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => floor_div(x, y),
            BinaryOp::Mod => floor_div(x, y).and_then(|q| x.checked_sub(q.checked_mul(y)?)),
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Value::from(v));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Mod => x - y * (x / y).floor(),
        _ => unreachable_op(op)?,
    };
    float(result)
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn unreachable_op(op: BinaryOp) -> Result<f64> {
    Err(EvalError::evaluation(format!(
        "'{}' is not an arithmetic operator",
        op.symbol()
    )))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::yaql::parser::parse;

    fn eval(src: &str, data: Value) -> Result<Value> {
        Interpreter::new().evaluate(&parse(src).unwrap(), &data)
    }

    #[test]
    fn test_paths() {
        let data = json!({"a": {"b": [10, 20, 30]}, "users": [{"name": "x"}, {"name": "y"}]});
        assert_eq!(eval("$.a.b[1]", data.clone()).unwrap(), json!(20));
        assert_eq!(eval("$.a.b[-1]", data.clone()).unwrap(), json!(30));
        assert_eq!(eval("$.users.name", data.clone()).unwrap(), json!(["x", "y"]));
        assert_eq!(eval("$.missing", data.clone()).unwrap(), json!(null));
        assert_eq!(eval("$.missing.deeper", data.clone()).unwrap(), json!(null));
        assert_eq!(eval("$a", data).unwrap(), json!({"b": [10, 20, 30]}));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3", json!({})).unwrap(), json!(7));
        assert_eq!(eval("7 / 2", json!({})).unwrap(), json!(3));
        assert_eq!(eval("-7 / 2", json!({})).unwrap(), json!(-4));
        assert_eq!(eval("7.0 / 2", json!({})).unwrap(), json!(3.5));
        assert_eq!(eval("-7 mod 3", json!({})).unwrap(), json!(2));
        assert_eq!(eval("'a' + 'b'", json!({})).unwrap(), json!("ab"));
        assert_eq!(eval("[1] + [2]", json!({})).unwrap(), json!([1, 2]));
        assert!(eval("1 / 0", json!({})).is_err());
        assert!(eval("'a' + 1", json!({})).is_err());
    }

    #[test]
    fn test_logic_returns_operands() {
        assert_eq!(eval("$.x or 'default'", json!({"x": ""})).unwrap(), json!("default"));
        assert_eq!(eval("$.x and $.y", json!({"x": 1, "y": 2})).unwrap(), json!(2));
        assert_eq!(eval("not $.x", json!({"x": []})).unwrap(), json!(true));
        // The right side is never evaluated.
        assert_eq!(eval("false and undefined_fn()", json!({})).unwrap(), json!(false));
    }

    #[test]
    fn test_comparison_and_membership() {
        assert_eq!(eval("$.n >= 3", json!({"n": 3})).unwrap(), json!(true));
        assert_eq!(eval("2 in $.l", json!({"l": [1, 2.0]})).unwrap(), json!(true));
        assert_eq!(eval("'k' in $", json!({"k": 0})).unwrap(), json!(true));
        assert_eq!(eval("'ell' in 'hello'", json!({})).unwrap(), json!(true));
        assert!(eval("1 < 'a'", json!({})).is_err());
    }

    #[test]
    fn test_lambdas() {
        let data = json!({"items": [{"n": 3, "ok": true}, {"n": 1, "ok": false}, {"n": 2, "ok": true}]});
        assert_eq!(
            eval("$.items.where($.ok).select($.n)", data.clone()).unwrap(),
            json!([3, 2])
        );
        assert_eq!(
            eval("$.items.orderBy($.n).select($.n)", data.clone()).unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(eval("$.items.any($.n > 2)", data.clone()).unwrap(), json!(true));
        assert_eq!(eval("$.items.all($.ok)", data.clone()).unwrap(), json!(false));
        assert_eq!(eval("select($.items, $.n * 10)", data.clone()).unwrap(), json!([30, 10, 20]));
        // `$name` still sees the input inside a lambda.
        assert_eq!(
            eval("$.items.select($limit)", json!({"items": [1, 2], "limit": 5})).unwrap(),
            json!([5, 5])
        );
    }

    #[test]
    fn test_methods_and_dicts() {
        assert_eq!(eval("$.s.toUpper()", json!({"s": "abc"})).unwrap(), json!("ABC"));
        assert_eq!(eval("$.l.len()", json!({"l": [1, 2]})).unwrap(), json!(2));
        assert_eq!(eval("{a => 1, 'b' => [2]}", json!({})).unwrap(), json!({"a": 1, "b": [2]}));
        assert!(eval("$.l.nope()", json!({"l": []})).is_err());
    }

    struct Host;

    impl FunctionHost for Host {
        fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value>> {
            (name == "len").then(|| Ok(json!(format!("host:{}", args.len()))))
        }
    }

    #[test]
    fn test_host_functions_take_precedence_for_calls_only() {
        let host = Host;
        let interp = Interpreter::with_host(&host);
        let data = json!({"l": [1, 2, 3]});
        assert_eq!(
            interp.evaluate(&parse("len($.l)").unwrap(), &data).unwrap(),
            json!("host:1")
        );
        assert_eq!(
            interp.evaluate(&parse("$.l.len()").unwrap(), &data).unwrap(),
            json!(3)
        );
    }
}
