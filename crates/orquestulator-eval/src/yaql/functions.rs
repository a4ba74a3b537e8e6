//! Eager YAQL builtins.
//!
//! Method calls pass the receiver as the first argument, so
//! `$.name.toUpper()` and `toUpper($.name)` are the same call.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::value::{Num, compare_or_err, equals, float, to_display, truthy, type_name};
use crate::error::{EvalError, Result};

/// Upper bound on collections produced by `range`.
const MAX_RANGE: i64 = 100_000;

/// Call builtin `name`. Returns `None` when no builtin has that name.
pub(crate) fn call(name: &str, args: &[Value]) -> Option<Result<Value>> {
    let result = match name {
        "len" | "count" => arity(name, args, 1, 1).and_then(|_| len(&args[0])),
        "sum" => arity(name, args, 1, 1).and_then(|_| sum(&args[0])),
        "max" => extreme(name, args, Ordering::Greater),
        "min" => extreme(name, args, Ordering::Less),
        "first" => arity(name, args, 1, 2).and_then(|_| {
            list(name, &args[0]).and_then(|items| {
                items
                    .first()
                    .cloned()
                    .or_else(|| args.get(1).cloned())
                    .ok_or_else(|| EvalError::evaluation("first() of an empty collection"))
            })
        }),
        "last" => arity(name, args, 1, 2).and_then(|_| {
            list(name, &args[0]).and_then(|items| {
                items
                    .last()
                    .cloned()
                    .or_else(|| args.get(1).cloned())
                    .ok_or_else(|| EvalError::evaluation("last() of an empty collection"))
            })
        }),
        "distinct" => arity(name, args, 1, 1).and_then(|_| {
            let mut out: Vec<Value> = Vec::new();
            for item in list(name, &args[0])? {
                if !out.iter().any(|seen| equals(seen, &item)) {
                    out.push(item);
                }
            }
            Ok(Value::Array(out))
        }),
        "flatten" => arity(name, args, 1, 1).and_then(|_| {
            let mut out = Vec::new();
            for item in list(name, &args[0])? {
                match item {
                    Value::Array(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            Ok(Value::Array(out))
        }),
        "reverse" => arity(name, args, 1, 1).and_then(|_| match &args[0] {
            Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
            other => {
                let mut items = list(name, other)?;
                items.reverse();
                Ok(Value::Array(items))
            }
        }),
        "sort" => arity(name, args, 1, 1).and_then(|_| {
            let items = list(name, &args[0])?;
            sort_values(items, |v| Ok(v.clone()), false).map(Value::Array)
        }),
        "skip" => arity(name, args, 2, 2).and_then(|_| {
            let n = non_negative(name, &args[1])?;
            Ok(Value::Array(list(name, &args[0])?.into_iter().skip(n).collect()))
        }),
        "take" | "limit" => arity(name, args, 2, 2).and_then(|_| {
            let n = non_negative(name, &args[1])?;
            Ok(Value::Array(list(name, &args[0])?.into_iter().take(n).collect()))
        }),
        "contains" => arity(name, args, 2, 2).and_then(|_| contains(&args[0], &args[1]).map(Value::Bool)),
        "keys" => arity(name, args, 1, 1).and_then(|_| {
            Ok(Value::Array(dict(name, &args[0])?.keys().cloned().map(Value::String).collect()))
        }),
        "values" => arity(name, args, 1, 1)
            .and_then(|_| Ok(Value::Array(dict(name, &args[0])?.values().cloned().collect()))),
        "items" => arity(name, args, 1, 1).and_then(|_| {
            Ok(Value::Array(
                dict(name, &args[0])?
                    .iter()
                    .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
                    .collect(),
            ))
        }),
        "get" => arity(name, args, 2, 3).and_then(|_| {
            let key = string(name, &args[1])?;
            Ok(dict(name, &args[0])?
                .get(key)
                .cloned()
                .unwrap_or_else(|| args.get(2).cloned().unwrap_or(Value::Null)))
        }),
        "dict" => dict_from_pairs(args),
        "list" => Ok(Value::Array(args.to_vec())),
        "concat" => concat(args),
        "coalesce" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        "join" => arity(name, args, 2, 2).and_then(|_| join(&args[0], &args[1])),
        "split" => arity(name, args, 1, 2).and_then(|_| {
            let s = string(name, &args[0])?;
            let parts: Vec<Value> = match args.get(1) {
                None | Some(Value::Null) => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = string(name, sep)?;
                    if sep.is_empty() {
                        return Err(EvalError::evaluation("split() separator must not be empty"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::Array(parts))
        }),
        "replace" => arity(name, args, 3, 3).and_then(|_| {
            let s = string(name, &args[0])?;
            Ok(Value::String(s.replace(string(name, &args[1])?, string(name, &args[2])?)))
        }),
        "toUpper" | "upper" => {
            arity(name, args, 1, 1).and_then(|_| Ok(Value::String(string(name, &args[0])?.to_uppercase())))
        }
        "toLower" | "lower" => {
            arity(name, args, 1, 1).and_then(|_| Ok(Value::String(string(name, &args[0])?.to_lowercase())))
        }
        "trim" | "strip" => {
            arity(name, args, 1, 1).and_then(|_| Ok(Value::String(string(name, &args[0])?.trim().to_string())))
        }
        "startsWith" => arity(name, args, 2, 2)
            .and_then(|_| Ok(Value::Bool(string(name, &args[0])?.starts_with(string(name, &args[1])?)))),
        "endsWith" => arity(name, args, 2, 2)
            .and_then(|_| Ok(Value::Bool(string(name, &args[0])?.ends_with(string(name, &args[1])?)))),
        "substring" => arity(name, args, 2, 3).and_then(|_| substring(args)),
        "format" => arity(name, args, 1, usize::MAX).and_then(|_| format(args)),
        "str" => arity(name, args, 1, 1).and_then(|_| Ok(Value::String(to_display(&args[0])))),
        "int" => arity(name, args, 1, 1).and_then(|_| to_int(&args[0])),
        "float" => arity(name, args, 1, 1).and_then(|_| to_float(&args[0])),
        "bool" => arity(name, args, 1, 1).and_then(|_| Ok(Value::Bool(truthy(&args[0])))),
        "abs" => arity(name, args, 1, 1).and_then(|_| match number(name, &args[0])? {
            Num::Int(i) => i
                .checked_abs()
                .map(Value::from)
                .ok_or_else(|| EvalError::evaluation("integer overflow in abs()")),
            Num::Float(f) => float(f.abs()),
        }),
        "round" => arity(name, args, 1, 1).and_then(|_| match number(name, &args[0])? {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => Ok(Value::from(f.round() as i64)),
        }),
        "range" => arity(name, args, 1, 2).and_then(|_| range(args)),
        _ => return None,
    };
    Some(result)
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument helpers
// ─────────────────────────────────────────────────────────────────────────────

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(EvalError::evaluation(format!(
            "{name}() takes {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

/// Iterate a collection: lists yield elements, dicts yield their keys.
pub(crate) fn list(name: &str, v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map.keys().cloned().map(Value::String).collect()),
        other => Err(EvalError::evaluation(format!(
            "{name}() expects a collection, got {}",
            type_name(other)
        ))),
    }
}

fn dict<'v>(name: &str, v: &'v Value) -> Result<&'v Map<String, Value>> {
    v.as_object().ok_or_else(|| {
        EvalError::evaluation(format!("{name}() expects a dict, got {}", type_name(v)))
    })
}

fn string<'v>(name: &str, v: &'v Value) -> Result<&'v str> {
    v.as_str().ok_or_else(|| {
        EvalError::evaluation(format!("{name}() expects a string, got {}", type_name(v)))
    })
}

fn number(name: &str, v: &Value) -> Result<Num> {
    Num::of(v).ok_or_else(|| {
        EvalError::evaluation(format!("{name}() expects a number, got {}", type_name(v)))
    })
}

fn integer(name: &str, v: &Value) -> Result<i64> {
    v.as_i64().ok_or_else(|| {
        EvalError::evaluation(format!("{name}() expects an integer, got {}", type_name(v)))
    })
}

fn non_negative(name: &str, v: &Value) -> Result<usize> {
    let n = integer(name, v)?;
    usize::try_from(n)
        .map_err(|_| EvalError::evaluation(format!("{name}() expects a non-negative count")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Implementations
// ─────────────────────────────────────────────────────────────────────────────

fn len(v: &Value) -> Result<Value> {
    let n = match v {
        Value::Array(a) => a.len(),
        Value::Object(o) => o.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(EvalError::evaluation(format!(
                "len() is not defined for {}",
                type_name(other)
            )));
        }
    };
    Ok(Value::from(n))
}

fn sum(v: &Value) -> Result<Value> {
    let mut total = Num::Int(0);
    for item in list("sum", v)? {
        total = match (total, number("sum", &item)?) {
            (Num::Int(a), Num::Int(b)) => a
                .checked_add(b)
                .map(Num::Int)
                .unwrap_or(Num::Float(a as f64 + b as f64)),
            (a, b) => Num::Float(a.as_f64() + b.as_f64()),
        };
    }
    match total {
        Num::Int(i) => Ok(Value::from(i)),
        Num::Float(f) => float(f),
    }
}

/// `max(list)` or `max(a, b, ...)`; likewise `min`.
fn extreme(name: &str, args: &[Value], want: Ordering) -> Result<Value> {
    let items = match args {
        [single] => list(name, single)?,
        [] => return Err(EvalError::evaluation(format!("{name}() needs arguments"))),
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = Some(match best {
            None => item,
            Some(current) => {
                if compare_or_err(&item, &current)? == want {
                    item
                } else {
                    current
                }
            }
        });
    }
    best.ok_or_else(|| EvalError::evaluation(format!("{name}() of an empty collection")))
}

/// Stable sort by a key function.
pub(crate) fn sort_values<F>(items: Vec<Value>, mut key: F, descending: bool) -> Result<Vec<Value>>
where
    F: FnMut(&Value) -> Result<Value>,
{
    let mut keyed = items
        .into_iter()
        .map(|item| Ok((key(&item)?, item)))
        .collect::<Result<Vec<_>>>()?;

    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| match compare_or_err(a, b) {
        Ok(ord) if descending => ord.reverse(),
        Ok(ord) => ord,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(keyed.into_iter().map(|(_, item)| item).collect()),
    }
}

pub(crate) fn contains(collection: &Value, needle: &Value) -> Result<bool> {
    match collection {
        Value::Array(items) => Ok(items.iter().any(|item| equals(item, needle))),
        Value::Object(map) => Ok(needle.as_str().is_some_and(|k| map.contains_key(k))),
        Value::String(s) => match needle {
            Value::String(n) => Ok(s.contains(n.as_str())),
            other => Err(EvalError::evaluation(format!(
                "cannot search a string for {}",
                type_name(other)
            ))),
        },
        other => Err(EvalError::evaluation(format!(
            "'in' is not defined for {}",
            type_name(other)
        ))),
    }
}

fn dict_from_pairs(args: &[Value]) -> Result<Value> {
    let pairs = match args {
        [] => return Ok(Value::Object(Map::new())),
        [single] => list("dict", single)?,
        many => many.to_vec(),
    };
    let mut out = Map::new();
    for pair in pairs {
        match pair {
            Value::Array(kv) if kv.len() == 2 => {
                out.insert(to_display(&kv[0]), kv[1].clone());
            }
            other => {
                return Err(EvalError::evaluation(format!(
                    "dict() expects [key, value] pairs, got {}",
                    type_name(&other)
                )));
            }
        }
    }
    Ok(Value::Object(out))
}

fn concat(args: &[Value]) -> Result<Value> {
    if args.iter().all(Value::is_array) {
        let mut out = Vec::new();
        for a in args {
            out.extend(list("concat", a)?);
        }
        return Ok(Value::Array(out));
    }
    Ok(Value::String(args.iter().map(to_display).collect()))
}

/// `join(list, sep)`; the string-receiver form `sep.join(list)` is accepted
/// too.
fn join(a: &Value, b: &Value) -> Result<Value> {
    let (items, sep) = match (a, b) {
        (Value::String(sep), Value::Array(_)) => (list("join", b)?, sep.as_str()),
        (_, Value::String(sep)) => (list("join", a)?, sep.as_str()),
        _ => return Err(EvalError::evaluation("join() expects a list and a separator")),
    };
    Ok(Value::String(
        items.iter().map(to_display).collect::<Vec<_>>().join(sep),
    ))
}

fn substring(args: &[Value]) -> Result<Value> {
    let chars: Vec<char> = string("substring", &args[0])?.chars().collect();
    let len = chars.len() as i64;
    let mut start = integer("substring", &args[1])?;
    if start < 0 {
        start += len;
    }
    let start = start.clamp(0, len) as usize;
    let end = match args.get(2) {
        None => chars.len(),
        Some(n) => {
            let n = integer("substring", n)?;
            if n < 0 {
                chars.len()
            } else {
                (start + n as usize).min(chars.len())
            }
        }
    };
    Ok(Value::String(chars[start..end].iter().collect()))
}

/// `'{0} and {1}'.format(a, b)` or `'{} and {}'.format(a, b)`.
fn format(args: &[Value]) -> Result<Value> {
    let template = string("format", &args[0])?;
    let params = &args[1..];
    let mut out = String::new();
    let mut auto_index = 0;
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open].replace("}}", "}"));
        let after = &rest[open + 1..];
        if let Some(stripped) = after.strip_prefix('{') {
            out.push('{');
            rest = stripped;
            continue;
        }
        let close = after
            .find('}')
            .ok_or_else(|| EvalError::evaluation("format(): unmatched '{'"))?;
        let field = &after[..close];
        let index = if field.is_empty() {
            auto_index += 1;
            auto_index - 1
        } else {
            field.parse::<usize>().map_err(|_| {
                EvalError::evaluation(format!("format(): invalid field '{{{field}}}'"))
            })?
        };
        let value = params.get(index).ok_or_else(|| {
            EvalError::evaluation(format!("format(): missing argument {index}"))
        })?;
        out.push_str(&to_display(value));
        rest = &after[close + 1..];
    }
    out.push_str(&rest.replace("}}", "}"));
    Ok(Value::String(out))
}

fn to_int(v: &Value) -> Result<Value> {
    match v {
        Value::Null => Ok(Value::from(0)),
        Value::Bool(b) => Ok(Value::from(*b as i64)),
        Value::Number(_) => match number("int", v)? {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => Ok(Value::from(f.trunc() as i64)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| EvalError::evaluation(format!("int(): invalid literal '{s}'"))),
        other => Err(EvalError::evaluation(format!(
            "int() is not defined for {}",
            type_name(other)
        ))),
    }
}

fn to_float(v: &Value) -> Result<Value> {
    match v {
        Value::Null => float(0.0),
        Value::Bool(b) => float(if *b { 1.0 } else { 0.0 }),
        Value::Number(_) => float(number("float", v)?.as_f64()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::evaluation(format!("float(): invalid literal '{s}'")))
            .and_then(float),
        other => Err(EvalError::evaluation(format!(
            "float() is not defined for {}",
            type_name(other)
        ))),
    }
}

fn range(args: &[Value]) -> Result<Value> {
    let (start, stop) = match args {
        [stop] => (0, integer("range", stop)?),
        [start, stop, ..] => (integer("range", start)?, integer("range", stop)?),
        [] => return Err(EvalError::evaluation("range() needs arguments")),
    };
    if stop.saturating_sub(start) > MAX_RANGE {
        return Err(EvalError::evaluation(format!(
            "range() is limited to {MAX_RANGE} elements"
        )));
    }
    Ok(Value::Array((start..stop).map(Value::from).collect()))
}
