//! Nom parser for the YAQL core grammar.
//!
//! Precedence, loosest first:
//!
//! ```text
//! or
//! and
//! not
//! =  ==  !=  <  <=  >  >=  in      (non-associative)
//! +  -
//! *  /  mod
//! unary -
//! postfix: .name  .name(args)  [index]
//! primary: $  $name  literals  [list]  {k => v}  name(args)  name  (expr)
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, satisfy},
    combinator::{all_consuming, cut, map, not, opt, recognize, value, verify},
    error::{ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind, context},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
};
use serde_json::{Number, Value};

use super::ast::{BinaryOp, Expr, UnaryOp};

const KEYWORDS: &[&str] = &["and", "or", "not", "in", "mod", "true", "false", "null"];

/// Error bound shared by every parser in this module.
trait YaqlError<'a>: ParseError<&'a str> + ContextError<&'a str> {}

impl<'a, T: ParseError<&'a str> + ContextError<&'a str>> YaqlError<'a> for T {}

// ============================================================================
// Public API
// ============================================================================

/// Parse a complete YAQL expression.
///
/// The error string points at the offending position.
pub fn parse(input: &str) -> Result<Expr, String> {
    if input.trim().is_empty() {
        return Err("expression is empty".to_string());
    }
    match all_consuming(terminated(expression::<VerboseError<&str>>, multispace0))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(describe_error(input, &e)),
        Err(nom::Err::Incomplete(_)) => Err("incomplete input".to_string()),
    }
}

/// One-line message for the innermost failure, with a 1-based column.
fn describe_error(input: &str, error: &VerboseError<&str>) -> String {
    let context = error.errors.iter().find_map(|(rest, kind)| match kind {
        VerboseErrorKind::Context(label) => Some((*rest, *label)),
        _ => None,
    });
    let Some((rest, kind)) = error.errors.first().map(|(rest, kind)| (*rest, kind)) else {
        return "invalid expression".to_string();
    };

    let at = |rest: &str| {
        let rest = rest.trim_start();
        let offset = input.len().saturating_sub(rest.len());
        let column = input.get(..offset).map_or(offset, |s| s.chars().count()) + 1;
        let found = match rest.chars().next() {
            Some(c) => format!("'{c}'"),
            None => "end of input".to_string(),
        };
        (column, found)
    };

    match (context, kind) {
        (Some((rest, label)), _) if label.starts_with("unterminated") => {
            format!("{label} at column {}", at(rest).0)
        }
        (Some((rest, label)), _) => {
            let (column, found) = at(rest);
            // Bare labels are operator symbols.
            let expected = if label.contains(' ') || label.starts_with('\'') {
                label.to_string()
            } else {
                format!("operand of '{label}'")
            };
            format!("expected {expected} at column {column}, found {found}")
        }
        (None, VerboseErrorKind::Char(c)) => {
            let (column, found) = at(rest);
            format!("expected '{c}' at column {column}, found {found}")
        }
        (None, _) => {
            let (column, found) = at(rest);
            format!("unexpected {found} at column {column}")
        }
    }
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn sym<'a, E: ParseError<&'a str>>(
    s: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    preceded(multispace0, tag(s))
}

/// A reserved word not followed by an identifier character.
fn keyword<'a, E: ParseError<&'a str>>(
    kw: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    preceded(multispace0, terminated(tag(kw), not(satisfy(is_ident_char))))
}

fn identifier<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    verify(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| !KEYWORDS.contains(&s),
    )(input)
}

// ============================================================================
// Operators
// ============================================================================

/// Fold `operand (operator operand)*` to the left.
fn left_assoc<'a, E, F, O>(
    mut operand: F,
    mut operator: O,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expr, E>
where
    E: YaqlError<'a>,
    F: FnMut(&'a str) -> IResult<&'a str, Expr, E>,
    O: FnMut(&'a str) -> IResult<&'a str, BinaryOp, E>,
{
    move |input| {
        let (mut input, mut lhs) = operand(input)?;
        loop {
            let (rest, op) = match operator(input) {
                Ok(ok) => ok,
                Err(nom::Err::Error(_)) => return Ok((input, lhs)),
                Err(e) => return Err(e),
            };
            let (rest, rhs) = match operand(rest) {
                Ok(ok) => ok,
                Err(nom::Err::Error(e)) => {
                    return Err(nom::Err::Failure(E::add_context(
                        rest,
                        op.symbol(),
                        e,
                    )));
                }
                Err(e) => return Err(e),
            };
            lhs = Expr::binary(op, lhs, rhs);
            input = rest;
        }
    }
}

fn expression<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    or_expr::<E>(input)
}

fn or_expr<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    left_assoc(and_expr::<E>, value(BinaryOp::Or, keyword("or")))(input)
}

fn and_expr<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    left_assoc(not_expr::<E>, value(BinaryOp::And, keyword("and")))(input)
}

fn not_expr<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    alt((
        map(
            preceded(keyword("not"), cut(context("operand of 'not'", not_expr::<E>))),
            |e| Expr::unary(UnaryOp::Not, e),
        ),
        comparison::<E>,
    ))(input)
}

fn comparison_op<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, BinaryOp, E> {
    preceded(
        multispace0,
        alt((
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Ne, tag("!=")),
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Eq, terminated(tag("="), not(char('>')))),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Gt, tag(">")),
            value(
                BinaryOp::In,
                terminated(tag("in"), not(satisfy(is_ident_char))),
            ),
        )),
    )(input)
}

fn comparison<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    let (input, lhs) = additive::<E>(input)?;
    let (input, op) = opt(comparison_op::<E>)(input)?;
    match op {
        None => Ok((input, lhs)),
        Some(op) => {
            let (input, rhs) = cut(context(op.symbol(), additive::<E>))(input)?;
            Ok((input, Expr::binary(op, lhs, rhs)))
        }
    }
}

fn additive<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    left_assoc(
        multiplicative::<E>,
        preceded(
            multispace0,
            alt((
                value(BinaryOp::Add, char('+')),
                value(BinaryOp::Sub, char('-')),
            )),
        ),
    )(input)
}

fn multiplicative<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    left_assoc(
        unary::<E>,
        alt((
            value(BinaryOp::Mul, sym("*")),
            value(BinaryOp::Div, sym("/")),
            value(BinaryOp::Mod, keyword("mod")),
        )),
    )(input)
}

fn unary<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    alt((
        map(
            preceded(sym("-"), cut(context("operand of '-'", unary::<E>))),
            |e| Expr::unary(UnaryOp::Neg, e),
        ),
        postfix::<E>,
    ))(input)
}

// ============================================================================
// Postfix chains
// ============================================================================

fn call_args<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Vec<Expr>, E> {
    preceded(
        char('('),
        cut(terminated(
            separated_list0(sym(","), expression::<E>),
            context("closing parenthesis", sym(")")),
        )),
    )(input)
}

fn postfix<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    let (mut input, mut expr) = primary::<E>(input)?;
    loop {
        if let Ok((rest, _)) = sym::<E>(".")(input) {
            let (rest, name) = cut(context("member name", identifier::<E>))(rest)?;
            let (rest, args) = opt(call_args::<E>)(rest)?;
            expr = match args {
                Some(args) => Expr::Method {
                    receiver: Box::new(expr),
                    name: name.to_string(),
                    args,
                },
                None => Expr::Member(Box::new(expr), name.to_string()),
            };
            input = rest;
        } else if let Ok((rest, _)) = sym::<E>("[")(input) {
            let (rest, index) = cut(terminated(
                expression::<E>,
                context("closing bracket", sym("]")),
            ))(rest)?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
            input = rest;
        } else {
            return Ok((input, expr));
        }
    }
}

// ============================================================================
// Primaries
// ============================================================================

fn primary<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    preceded(
        multispace0,
        alt((
            number::<E>,
            map(string_literal::<E>, |s| Expr::Literal(Value::String(s))),
            dollar::<E>,
            delimited(
                char('('),
                cut(expression::<E>),
                cut(context("closing parenthesis", sym(")"))),
            ),
            list_literal::<E>,
            dict_literal::<E>,
            value(Expr::Literal(Value::Bool(true)), keyword("true")),
            value(Expr::Literal(Value::Bool(false)), keyword("false")),
            value(Expr::Literal(Value::Null), keyword("null")),
            call_or_ident::<E>,
        )),
    )(input)
}

fn number<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    let (rest, text) = recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)?;
    let parsed = if text.contains('.') {
        text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
    } else {
        text.parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number))
    };
    match parsed {
        Some(v) => Ok((rest, Expr::Literal(v))),
        None => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Digit))),
    }
}

/// A single- or double-quoted string with backslash escapes.
fn string_literal<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, String, E> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"'))) => q,
        _ => return Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Char))),
    };

    let mut out = String::new();
    let mut escaped = false;
    for (idx, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[idx + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Failure(E::add_context(
        input,
        "unterminated string",
        E::from_error_kind(input, ErrorKind::Char),
    )))
}

fn dollar<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    map(preceded(char('$'), opt(identifier::<E>)), |name| match name {
        Some(name) => Expr::Var(name.to_string()),
        None => Expr::This,
    })(input)
}

fn list_literal<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    map(
        delimited(
            char('['),
            separated_list0(sym(","), expression::<E>),
            cut(context("closing bracket", sym("]"))),
        ),
        Expr::List,
    )(input)
}

fn dict_literal<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    map(
        delimited(
            char('{'),
            separated_list0(
                sym(","),
                separated_pair(
                    expression::<E>,
                    cut(context("'=>'", sym("=>"))),
                    cut(expression::<E>),
                ),
            ),
            cut(context("closing brace", sym("}"))),
        ),
        Expr::Dict,
    )(input)
}

fn call_or_ident<'a, E: YaqlError<'a>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    let (input, name) = identifier::<E>(input)?;
    let (input, args) = opt(call_args::<E>)(input)?;
    let name = name.to_string();
    Ok((
        input,
        match args {
            Some(args) => Expr::Call { name, args },
            None => Expr::Ident(name),
        },
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn lit(v: Value) -> Expr {
        Expr::Literal(v)
    }

    #[test]
    fn test_member_chain() {
        assert_eq!(
            parse("$.a.b").unwrap(),
            Expr::Member(
                Box::new(Expr::Member(Box::new(Expr::This), "a".into())),
                "b".into()
            )
        );
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 = 7 or not false
        let expr = parse("1 + 2 * 3 = 7 or not false").unwrap();
        let expected = Expr::binary(
            BinaryOp::Or,
            Expr::binary(
                BinaryOp::Eq,
                Expr::binary(
                    BinaryOp::Add,
                    lit(json!(1)),
                    Expr::binary(BinaryOp::Mul, lit(json!(2)), lit(json!(3))),
                ),
                lit(json!(7)),
            ),
            Expr::unary(UnaryOp::Not, lit(json!(false))),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_method_and_index() {
        let expr = parse("$.items[0].name.toUpper()").unwrap();
        match expr {
            Expr::Method { name, args, .. } => {
                assert_eq!(name, "toUpper");
                assert!(args.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("'it\\'s'").unwrap(), lit(json!("it's")));
        assert_eq!(parse("\"\"").unwrap(), lit(json!("")));
        assert_eq!(parse("1.5").unwrap(), lit(json!(1.5)));
        assert_eq!(parse("null").unwrap(), lit(Value::Null));
        assert_eq!(
            parse("[1, 'a']").unwrap(),
            Expr::List(vec![lit(json!(1)), lit(json!("a"))])
        );
        assert_eq!(
            parse("{a => 1}").unwrap(),
            Expr::Dict(vec![(Expr::Ident("a".into()), lit(json!(1)))])
        );
    }

    #[test]
    fn test_variables_and_calls() {
        assert_eq!(parse("$x").unwrap(), Expr::Var("x".into()));
        assert_eq!(
            parse("ctx(foo)").unwrap(),
            Expr::Call {
                name: "ctx".into(),
                args: vec![Expr::Ident("foo".into())]
            }
        );
        assert_eq!(
            parse("  succeeded( )  ").unwrap(),
            Expr::Call {
                name: "succeeded".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(parse("$.order").unwrap(), Expr::Member(Box::new(Expr::This), "order".into()));
        assert_eq!(parse("notes").unwrap(), Expr::Ident("notes".into()));
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("$.").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("$.a $.b").is_err());
    }

    #[test]
    fn test_error_messages_are_single_line() {
        assert_eq!(parse("1e400").unwrap_err(), "unexpected 'e' at column 2");
        assert_eq!(
            parse("(1 + 2").unwrap_err(),
            "expected closing parenthesis at column 7, found end of input"
        );
        assert_eq!(
            parse("1 +").unwrap_err(),
            "expected operand of '+' at column 4, found end of input"
        );
        assert_eq!(parse("'open").unwrap_err(), "unterminated string at column 1");
        assert_eq!(
            parse("$.a and").unwrap_err(),
            "expected operand of 'and' at column 8, found end of input"
        );
        for bad in ["$.", "$.a $.b", "[1, 2", "not"] {
            let message = parse(bad).unwrap_err();
            assert!(!message.contains('\n'), "{bad}: {message}");
            assert!(message.contains("column"), "{bad}: {message}");
        }
    }
}
