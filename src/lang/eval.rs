//! Tree-walking expression evaluator.
//!
//! Identifier resolution order: field of the current table, then the
//! variable store, then an empty string (observable dBASE behavior).
//! Division and modulo by zero record a soft error on the context and
//! evaluate to 0 so the rest of the expression completes.

use crate::error::{DbError, Result};
use crate::interp::context::Context;
use crate::lang::ast::{BinOp, Expr, UnOp};
use crate::lang::builtins;
use crate::lang::parser;
use crate::util;
use crate::value::Value;

/// Macro expansions may nest; cap the depth so `x = "&x"` cannot recurse
/// forever.
const MAX_MACRO_DEPTH: u32 = 16;

pub fn eval(ctx: &mut Context, expr: &Expr) -> Result<Value> {
    eval_at(ctx, expr, 0)
}

fn eval_at(ctx: &mut Context, expr: &Expr, depth: u32) -> Result<Value> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::DateLit(d) => Ok(Value::Date(d.clone())),
        Expr::Logical(b) => Ok(Value::Logical(*b)),
        Expr::Ident(name) => resolve_ident(ctx, name),
        Expr::FieldRef { alias: _, field } => {
            // Only the current work area is consulted; the alias is parsed
            // but carries no routing yet
            if let Some(table) = &ctx.table {
                if let Some(idx) = table.field_index(field) {
                    return table.get_value(idx);
                }
            }
            Ok(Value::empty_str())
        }
        Expr::Subscript { name, index } => {
            let idx = eval_at(ctx, index, depth)?.as_number();
            match ctx.vars.get(name) {
                Some(Value::Array(items)) => {
                    if idx < 1.0 || idx as usize > items.len() {
                        return Ok(Value::Nil);
                    }
                    Ok(items[idx as usize - 1].clone())
                }
                Some(other) => Err(DbError::TypeMismatch(format!(
                    "{} is type {}, not an array",
                    name.to_ascii_uppercase(),
                    other.type_char()
                ))),
                None => Err(DbError::UndefinedVariable(name.to_ascii_uppercase())),
            }
        }
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_at(ctx, arg, depth)?);
            }
            builtins::dispatch(ctx, name, &values)
        }
        Expr::Unary { op, expr } => {
            let value = eval_at(ctx, expr, depth)?;
            match op {
                UnOp::Not => Ok(Value::Logical(!value.is_true())),
                UnOp::Minus => Ok(Value::Number(-value.as_number())),
                UnOp::Plus => Ok(Value::Number(value.as_number())),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let left = eval_at(ctx, lhs, depth)?;
            let right = eval_at(ctx, rhs, depth)?;
            apply_binary(ctx, *op, left, right)
        }
        Expr::Macro(name) => {
            if depth >= MAX_MACRO_DEPTH {
                return Err(DbError::Syntax(format!(
                    "macro &{} nests too deeply",
                    name.to_ascii_uppercase()
                )));
            }
            let Some(value) = ctx.vars.get(name) else {
                return Err(DbError::UndefinedVariable(name.to_ascii_uppercase()));
            };
            let body = value.as_string();
            let inner = parser::parse_expression(&body)?;
            eval_at(ctx, &inner, depth + 1)
        }
    }
}

fn resolve_ident(ctx: &mut Context, name: &str) -> Result<Value> {
    if let Some(table) = &ctx.table {
        if let Some(idx) = table.field_index(name) {
            return table.get_value(idx);
        }
    }
    if let Some(value) = ctx.vars.get(name) {
        return Ok(value.clone());
    }
    Ok(Value::empty_str())
}

// ── Binary Operators ───────────────────────────────────────────────

fn apply_binary(ctx: &mut Context, op: BinOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinOp::Or => Ok(Value::Logical(left.is_true() || right.is_true())),
        BinOp::And => Ok(Value::Logical(left.is_true() && right.is_true())),
        BinOp::Add => add(ctx, left, right),
        BinOp::Sub => sub(ctx, left, right),
        BinOp::Mul => Ok(Value::Number(left.as_number() * right.as_number())),
        BinOp::Div => {
            let divisor = right.as_number();
            if divisor == 0.0 {
                ctx.set_soft_error(DbError::DivisionByZero);
                return Ok(Value::Number(0.0));
            }
            Ok(Value::Number(left.as_number() / divisor))
        }
        BinOp::Mod => {
            let divisor = right.as_number();
            if divisor == 0.0 {
                ctx.set_soft_error(DbError::DivisionByZero);
                return Ok(Value::Number(0.0));
            }
            Ok(Value::Number(left.as_number() % divisor))
        }
        BinOp::Pow => Ok(Value::Number(left.as_number().powf(right.as_number()))),
        BinOp::Contain => match (&left, &right) {
            (Value::Str(needle), Value::Str(hay)) => Ok(Value::Logical(hay.contains(needle))),
            _ => Err(DbError::TypeMismatch(format!(
                "$ needs two strings, got {} and {}",
                left.type_char(),
                right.type_char()
            ))),
        },
        BinOp::Eq | BinOp::ExactEq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            compare(ctx, op, left, right)
        }
    }
}

fn add(_ctx: &mut Context, left: Value, right: Value) -> Result<Value> {
    match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::Date(d), Value::Number(n)) => Ok(date_plus(d, *n)),
        (Value::Number(n), Value::Date(d)) => Ok(date_plus(d, *n)),
        (Value::Number(_) | Value::Logical(_) | Value::Nil, Value::Number(_) | Value::Logical(_) | Value::Nil) => {
            Ok(Value::Number(left.as_number() + right.as_number()))
        }
        _ => Err(DbError::TypeMismatch(format!(
            "cannot add {} and {}",
            left.type_char(),
            right.type_char()
        ))),
    }
}

fn sub(_ctx: &mut Context, left: Value, right: Value) -> Result<Value> {
    match (&left, &right) {
        // dBASE string subtraction: right-trim the left operand, then join
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a.trim_end(), b))),
        (Value::Date(a), Value::Date(b)) => {
            let ja = util::date_to_julian(a).unwrap_or(0);
            let jb = util::date_to_julian(b).unwrap_or(0);
            Ok(Value::Number((ja - jb) as f64))
        }
        (Value::Date(d), Value::Number(n)) => Ok(date_plus(d, -*n)),
        (Value::Number(_) | Value::Logical(_) | Value::Nil, Value::Number(_) | Value::Logical(_) | Value::Nil) => {
            Ok(Value::Number(left.as_number() - right.as_number()))
        }
        _ => Err(DbError::TypeMismatch(format!(
            "cannot subtract {} from {}",
            right.type_char(),
            left.type_char()
        ))),
    }
}

fn date_plus(date: &str, days: f64) -> Value {
    match util::date_to_julian(date) {
        Some(julian) => match util::julian_to_date(julian + days as i64) {
            Some(out) => Value::Date(out),
            None => Value::empty_date(),
        },
        None => Value::empty_date(),
    }
}

fn compare(ctx: &mut Context, op: BinOp, left: Value, right: Value) -> Result<Value> {
    use std::cmp::Ordering;

    let ordering = match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => {
            let equal = if op == BinOp::ExactEq {
                a.trim_end() == b.trim_end()
            } else if ctx.settings.exact {
                a.trim_end() == b.trim_end()
            } else {
                // dBASE rule: comparison runs for the length of the right
                // operand, so "ABC" = "AB" holds but "AB" = "ABC" does not
                a.len() >= b.len() && a.as_bytes()[..b.len()] == *b.as_bytes()
            };
            match op {
                BinOp::Eq | BinOp::ExactEq => return Ok(Value::Logical(equal)),
                BinOp::Ne => return Ok(Value::Logical(!equal)),
                _ => a.as_str().cmp(b.as_str()),
            }
        }
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Logical(a), Value::Logical(b)) => match op {
            BinOp::Eq | BinOp::ExactEq => return Ok(Value::Logical(a == b)),
            BinOp::Ne => return Ok(Value::Logical(a != b)),
            _ => {
                return Err(DbError::TypeMismatch(
                    "logicals only compare with = and <>".into(),
                ))
            }
        },
        (
            Value::Number(_) | Value::Logical(_) | Value::Nil,
            Value::Number(_) | Value::Logical(_) | Value::Nil,
        ) => {
            let (a, b) = (left.as_number(), right.as_number());
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        _ => {
            return Err(DbError::TypeMismatch(format!(
                "cannot compare {} with {}",
                left.type_char(),
                right.type_char()
            )))
        }
    };

    let result = match op {
        BinOp::Eq | BinOp::ExactEq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!("comparison op"),
    };
    Ok(Value::Logical(result))
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parser::parse_expression;

    fn eval_str(ctx: &mut Context, src: &str) -> Value {
        let expr = parse_expression(src).unwrap();
        eval(ctx, &expr).unwrap()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let mut ctx = Context::new();
        assert_eq!(eval_str(&mut ctx, "1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval_str(&mut ctx, "2 ^ 3 ^ 2"), Value::Number(512.0));
        assert_eq!(eval_str(&mut ctx, "10 % 3"), Value::Number(1.0));
        assert_eq!(eval_str(&mut ctx, "-(2 + 3)"), Value::Number(-5.0));
    }

    #[test]
    fn test_division_by_zero_soft_error_yields_zero() {
        let mut ctx = Context::new();
        assert_eq!(eval_str(&mut ctx, "5 / 0 + 3"), Value::Number(3.0));
        assert_eq!(ctx.take_soft_error().unwrap().code(), "DIVISION_BY_ZERO");
        assert_eq!(eval_str(&mut ctx, "7 % 0"), Value::Number(0.0));
        assert_eq!(ctx.take_soft_error().unwrap().code(), "DIVISION_BY_ZERO");
    }

    #[test]
    fn test_string_operators() {
        let mut ctx = Context::new();
        assert_eq!(
            eval_str(&mut ctx, "\"abc\" + \"def\""),
            Value::Str("abcdef".into())
        );
        assert_eq!(
            eval_str(&mut ctx, "\"abc   \" - \"def\""),
            Value::Str("abcdef".into())
        );
        assert_eq!(
            eval_str(&mut ctx, "\"ell\" $ \"hello\""),
            Value::Logical(true)
        );
        assert_eq!(
            eval_str(&mut ctx, "\"xyz\" $ \"hello\""),
            Value::Logical(false)
        );
    }

    #[test]
    fn test_string_equality_prefix_rule() {
        let mut ctx = Context::new();
        assert_eq!(eval_str(&mut ctx, "\"ABC\" = \"AB\""), Value::Logical(true));
        assert_eq!(eval_str(&mut ctx, "\"AB\" = \"ABC\""), Value::Logical(false));
        ctx.settings.exact = true;
        assert_eq!(eval_str(&mut ctx, "\"ABC\" = \"AB\""), Value::Logical(false));
        assert_eq!(
            eval_str(&mut ctx, "\"AB  \" = \"AB\""),
            Value::Logical(true)
        );
    }

    #[test]
    fn test_date_arithmetic() {
        let mut ctx = Context::new();
        assert_eq!(
            eval_str(&mut ctx, "{01/31/2024} + 1"),
            Value::Date("20240201".into())
        );
        assert_eq!(
            eval_str(&mut ctx, "{03/01/2024} - {02/29/2024}"),
            Value::Number(1.0)
        );
        assert_eq!(
            eval_str(&mut ctx, "{03/01/2024} - 1"),
            Value::Date("20240229".into())
        );
        assert_eq!(
            eval_str(&mut ctx, "{01/31/2024} < {02/01/2024}"),
            Value::Logical(true)
        );
    }

    #[test]
    fn test_undefined_ident_is_empty_string() {
        let mut ctx = Context::new();
        assert_eq!(eval_str(&mut ctx, "nosuchvar"), Value::Str("".into()));
    }

    #[test]
    fn test_variable_resolution() {
        let mut ctx = Context::new();
        ctx.vars.set("x", Value::Number(40.0));
        assert_eq!(eval_str(&mut ctx, "X + 2"), Value::Number(42.0));
    }

    #[test]
    fn test_array_subscript_one_based() {
        let mut ctx = Context::new();
        ctx.vars.set(
            "arr",
            Value::Array(vec![Value::Number(10.0), Value::Number(20.0)]),
        );
        assert_eq!(eval_str(&mut ctx, "arr[1]"), Value::Number(10.0));
        assert_eq!(eval_str(&mut ctx, "arr[2]"), Value::Number(20.0));
        assert_eq!(eval_str(&mut ctx, "arr[3]"), Value::Nil);
        assert_eq!(eval_str(&mut ctx, "arr[0]"), Value::Nil);
    }

    #[test]
    fn test_subscript_of_scalar_is_type_mismatch() {
        let mut ctx = Context::new();
        ctx.vars.set("x", Value::Number(1.0));
        let expr = parse_expression("x[1]").unwrap();
        assert_eq!(
            eval(&mut ctx, &expr).unwrap_err().code(),
            "TYPE_MISMATCH"
        );
    }

    #[test]
    fn test_macro_reparses_as_expression() {
        let mut ctx = Context::new();
        ctx.vars.set("body", Value::Str("2 + 3 * 4".into()));
        assert_eq!(eval_str(&mut ctx, "&body"), Value::Number(14.0));
        assert_eq!(eval_str(&mut ctx, "&body * 2"), Value::Number(28.0));
    }

    #[test]
    fn test_macro_depth_guard() {
        let mut ctx = Context::new();
        ctx.vars.set("loopy", Value::Str("&loopy".into()));
        let expr = parse_expression("&loopy").unwrap();
        assert_eq!(eval(&mut ctx, &expr).unwrap_err().code(), "SYNTAX");
    }

    #[test]
    fn test_logical_operators() {
        let mut ctx = Context::new();
        assert_eq!(
            eval_str(&mut ctx, ".T. .AND. .NOT. .F."),
            Value::Logical(true)
        );
        assert_eq!(
            eval_str(&mut ctx, "1 > 2 .OR. \"x\" = \"x\""),
            Value::Logical(true)
        );
    }

    #[test]
    fn test_type_mismatch_reported() {
        let mut ctx = Context::new();
        let expr = parse_expression("\"abc\" + 1").unwrap();
        assert_eq!(eval(&mut ctx, &expr).unwrap_err().code(), "TYPE_MISMATCH");
        let expr = parse_expression("1 $ 2").unwrap();
        assert_eq!(eval(&mut ctx, &expr).unwrap_err().code(), "TYPE_MISMATCH");
    }
}
