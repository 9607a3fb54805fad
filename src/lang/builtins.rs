//! Built-in function table.
//!
//! Dispatch is by case-insensitive name with a min..max arity check; an
//! unknown name reports undefined-function, a bad count reports a syntax
//! error naming the function.

use chrono::{Datelike, Timelike};

use crate::error::{DbError, Result};
use crate::interp::context::Context;
use crate::util;
use crate::value::Value;

type BuiltinFn = fn(&mut Context, &[Value]) -> Result<Value>;

struct Builtin {
    name: &'static str,
    min: usize,
    max: usize,
    func: BuiltinFn,
}

pub fn dispatch(ctx: &mut Context, name: &str, args: &[Value]) -> Result<Value> {
    let upper = name.to_ascii_uppercase();
    let builtin = BUILTINS
        .iter()
        .find(|b| b.name == upper)
        .ok_or_else(|| DbError::UndefinedFunction(upper.clone()))?;
    if args.len() < builtin.min {
        return Err(DbError::Syntax(format!(
            "too few arguments to {}()",
            upper
        )));
    }
    if args.len() > builtin.max {
        return Err(DbError::Syntax(format!(
            "too many arguments to {}()",
            upper
        )));
    }
    (builtin.func)(ctx, args)
}

static BUILTINS: &[Builtin] = &[
    // String
    Builtin { name: "ALLTRIM", min: 1, max: 1, func: fn_alltrim },
    Builtin { name: "ASC", min: 1, max: 1, func: fn_asc },
    Builtin { name: "AT", min: 2, max: 2, func: fn_at },
    Builtin { name: "CHR", min: 1, max: 1, func: fn_chr },
    Builtin { name: "LEFT", min: 2, max: 2, func: fn_left },
    Builtin { name: "LEN", min: 1, max: 1, func: fn_len },
    Builtin { name: "LOWER", min: 1, max: 1, func: fn_lower },
    Builtin { name: "LTRIM", min: 1, max: 1, func: fn_ltrim },
    Builtin { name: "REPLICATE", min: 2, max: 2, func: fn_replicate },
    Builtin { name: "RIGHT", min: 2, max: 2, func: fn_right },
    Builtin { name: "RTRIM", min: 1, max: 1, func: fn_rtrim },
    Builtin { name: "SPACE", min: 1, max: 1, func: fn_space },
    Builtin { name: "STUFF", min: 4, max: 4, func: fn_stuff },
    Builtin { name: "SUBSTR", min: 2, max: 3, func: fn_substr },
    Builtin { name: "TRIM", min: 1, max: 1, func: fn_alltrim },
    Builtin { name: "UPPER", min: 1, max: 1, func: fn_upper },
    // Numeric
    Builtin { name: "ABS", min: 1, max: 1, func: fn_abs },
    Builtin { name: "EXP", min: 1, max: 1, func: fn_exp },
    Builtin { name: "INT", min: 1, max: 1, func: fn_int },
    Builtin { name: "LOG", min: 1, max: 1, func: fn_log },
    Builtin { name: "MAX", min: 2, max: 2, func: fn_max },
    Builtin { name: "MIN", min: 2, max: 2, func: fn_min },
    Builtin { name: "MOD", min: 2, max: 2, func: fn_mod },
    Builtin { name: "ROUND", min: 2, max: 2, func: fn_round },
    Builtin { name: "SQRT", min: 1, max: 1, func: fn_sqrt },
    // Conversion
    Builtin { name: "STR", min: 1, max: 3, func: fn_str },
    Builtin { name: "VAL", min: 1, max: 1, func: fn_val },
    // Date
    Builtin { name: "CDOW", min: 1, max: 1, func: fn_cdow },
    Builtin { name: "CMONTH", min: 1, max: 1, func: fn_cmonth },
    Builtin { name: "CTOD", min: 1, max: 1, func: fn_ctod },
    Builtin { name: "DATE", min: 0, max: 0, func: fn_date },
    Builtin { name: "DAY", min: 1, max: 1, func: fn_day },
    Builtin { name: "DOW", min: 1, max: 1, func: fn_dow },
    Builtin { name: "DTOC", min: 1, max: 1, func: fn_dtoc },
    Builtin { name: "MONTH", min: 1, max: 1, func: fn_month },
    Builtin { name: "YEAR", min: 1, max: 1, func: fn_year },
    // Type inspection
    Builtin { name: "EMPTY", min: 1, max: 1, func: fn_empty },
    Builtin { name: "ISALPHA", min: 1, max: 1, func: fn_isalpha },
    Builtin { name: "ISDIGIT", min: 1, max: 1, func: fn_isdigit },
    Builtin { name: "ISLOWER", min: 1, max: 1, func: fn_islower },
    Builtin { name: "ISUPPER", min: 1, max: 1, func: fn_isupper },
    Builtin { name: "TYPE", min: 1, max: 1, func: fn_type },
    // Table state
    Builtin { name: "BOF", min: 0, max: 0, func: fn_bof },
    Builtin { name: "DELETED", min: 0, max: 0, func: fn_deleted },
    Builtin { name: "EOF", min: 0, max: 0, func: fn_eof },
    Builtin { name: "FCOUNT", min: 0, max: 0, func: fn_fcount },
    Builtin { name: "FIELD", min: 1, max: 1, func: fn_field },
    Builtin { name: "LASTREC", min: 0, max: 0, func: fn_reccount },
    Builtin { name: "RECCOUNT", min: 0, max: 0, func: fn_reccount },
    Builtin { name: "RECNO", min: 0, max: 0, func: fn_recno },
    // Misc
    Builtin { name: "IIF", min: 3, max: 3, func: fn_iif },
    Builtin { name: "TIME", min: 0, max: 0, func: fn_time },
];

// ── String Functions ───────────────────────────────────────────────

fn fn_len(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let n = match &args[0] {
        Value::Array(items) => items.len(),
        other => other.as_string().len(),
    };
    Ok(Value::Number(n as f64))
}

fn fn_rtrim(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(args[0].as_string().trim_end().to_string()))
}

fn fn_ltrim(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(args[0].as_string().trim_start().to_string()))
}

fn fn_alltrim(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(args[0].as_string().trim().to_string()))
}

fn fn_upper(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(args[0].as_string().to_ascii_uppercase()))
}

fn fn_lower(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(args[0].as_string().to_ascii_lowercase()))
}

fn fn_substr(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let text = args[0].as_string();
    let start = args[1].as_number() as i64;
    let count = args
        .get(2)
        .map(|v| v.as_number() as i64)
        .unwrap_or(i64::MAX);
    if start < 1 || count < 0 {
        return Ok(Value::Str(String::new()));
    }
    let from = (start - 1) as usize;
    if from >= text.len() {
        return Ok(Value::Str(String::new()));
    }
    let avail = text.len() - from;
    let take = (count as u64).min(avail as u64) as usize;
    Ok(Value::Str(text[from..from + take].to_string()))
}

fn fn_left(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let text = args[0].as_string();
    let n = args[1].as_number().max(0.0) as usize;
    Ok(Value::Str(text[..n.min(text.len())].to_string()))
}

fn fn_right(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let text = args[0].as_string();
    let n = args[1].as_number().max(0.0) as usize;
    let from = text.len().saturating_sub(n);
    Ok(Value::Str(text[from..].to_string()))
}

fn fn_at(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let needle = args[0].as_string();
    let hay = args[1].as_string();
    let pos = hay.find(&needle).map(|i| i + 1).unwrap_or(0);
    Ok(Value::Number(pos as f64))
}

fn fn_space(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let n = args[0].as_number().max(0.0) as usize;
    Ok(Value::Str(" ".repeat(n)))
}

fn fn_replicate(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let text = args[0].as_string();
    let n = args[1].as_number().max(0.0) as usize;
    Ok(Value::Str(text.repeat(n)))
}

fn fn_stuff(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let text = args[0].as_string();
    let start = (args[1].as_number().max(1.0) as usize - 1).min(text.len());
    let del = (args[2].as_number().max(0.0) as usize).min(text.len() - start);
    let insert = args[3].as_string();
    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..start]);
    out.push_str(&insert);
    out.push_str(&text[start + del..]);
    Ok(Value::Str(out))
}

fn fn_chr(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let code = args[0].as_number() as u32 & 0xFF;
    Ok(Value::Str(
        char::from_u32(code).map(String::from).unwrap_or_default(),
    ))
}

fn fn_asc(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let text = args[0].as_string();
    Ok(Value::Number(
        text.as_bytes().first().copied().unwrap_or(0) as f64
    ))
}

// ── Numeric Functions ──────────────────────────────────────────────

fn fn_abs(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(args[0].as_number().abs()))
}

fn fn_int(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(args[0].as_number().floor()))
}

fn fn_round(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let n = args[0].as_number();
    let places = args[1].as_number() as i32;
    let factor = 10f64.powi(places);
    Ok(Value::Number((n * factor).round() / factor))
}

fn fn_sqrt(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let n = args[0].as_number();
    Ok(Value::Number(if n < 0.0 { 0.0 } else { n.sqrt() }))
}

fn fn_mod(ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let divisor = args[1].as_number();
    if divisor == 0.0 {
        ctx.set_soft_error(DbError::DivisionByZero);
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(args[0].as_number() % divisor))
}

fn fn_max(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(args[0].as_number().max(args[1].as_number())))
}

fn fn_min(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(args[0].as_number().min(args[1].as_number())))
}

fn fn_log(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let n = args[0].as_number();
    Ok(Value::Number(if n <= 0.0 { 0.0 } else { n.ln() }))
}

fn fn_exp(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(args[0].as_number().exp()))
}

// ── Conversion ─────────────────────────────────────────────────────

fn fn_str(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let n = args[0].as_number();
    let width = args.get(1).map(|v| v.as_number() as usize).unwrap_or(10);
    let decimals = args.get(2).map(|v| v.as_number() as usize).unwrap_or(0);
    Ok(Value::Str(util::format_fixed(n, width, decimals)))
}

fn fn_val(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(util::parse_number(&args[0].as_string())))
}

// ── Date Functions ─────────────────────────────────────────────────

fn fn_date(_ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    Ok(Value::Date(util::today_yyyymmdd()))
}

fn date_arg(value: &Value) -> Result<&str> {
    match value {
        Value::Date(d) => Ok(d),
        other => Err(DbError::TypeMismatch(format!(
            "expected a date, got type {}",
            other.type_char()
        ))),
    }
}

fn fn_year(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let d = date_arg(&args[0])?;
    Ok(Value::Number(
        util::parse_yyyymmdd(d).map(|d| d.year() as f64).unwrap_or(0.0),
    ))
}

fn fn_month(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let d = date_arg(&args[0])?;
    Ok(Value::Number(
        util::parse_yyyymmdd(d).map(|d| d.month() as f64).unwrap_or(0.0),
    ))
}

fn fn_day(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let d = date_arg(&args[0])?;
    Ok(Value::Number(
        util::parse_yyyymmdd(d).map(|d| d.day() as f64).unwrap_or(0.0),
    ))
}

/// Day of week, 1 = Sunday through 7 = Saturday.
fn fn_dow(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let d = date_arg(&args[0])?;
    Ok(Value::Number(
        util::parse_yyyymmdd(d)
            .map(|d| d.weekday().num_days_from_sunday() as f64 + 1.0)
            .unwrap_or(0.0),
    ))
}

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn fn_cdow(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let d = date_arg(&args[0])?;
    let name = util::parse_yyyymmdd(d)
        .map(|d| DAY_NAMES[d.weekday().num_days_from_sunday() as usize])
        .unwrap_or("");
    Ok(Value::Str(name.to_string()))
}

fn fn_cmonth(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let d = date_arg(&args[0])?;
    let name = util::parse_yyyymmdd(d)
        .map(|d| MONTH_NAMES[d.month0() as usize])
        .unwrap_or("");
    Ok(Value::Str(name.to_string()))
}

/// Date to character, MM/DD/YY.
fn fn_dtoc(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let d = date_arg(&args[0])?;
    if d.len() == 8 {
        Ok(Value::Str(format!("{}/{}/{}", &d[4..6], &d[6..8], &d[2..4])))
    } else {
        Ok(Value::Str("  /  /  ".to_string()))
    }
}

/// Character MM/DD/YY or MM/DD/YYYY to date.
fn fn_ctod(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let text = args[0].as_string();
    let parts: Vec<&str> = text.trim().split('/').collect();
    if parts.len() != 3 {
        return Ok(Value::empty_date());
    }
    let month: u32 = parts[0].trim().parse().unwrap_or(0);
    let day: u32 = parts[1].trim().parse().unwrap_or(0);
    let mut year: i32 = parts[2].trim().parse().unwrap_or(-1);
    if (0..100).contains(&year) {
        year += 1900;
    }
    let formatted = format!("{:04}{:02}{:02}", year, month, day);
    if util::parse_yyyymmdd(&formatted).is_some() {
        Ok(Value::Date(formatted))
    } else {
        Ok(Value::empty_date())
    }
}

// ── Type Inspection ────────────────────────────────────────────────

fn fn_type(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(args[0].type_char().to_string()))
}

fn fn_empty(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(args[0].is_empty()))
}

fn first_char(value: &Value) -> Option<char> {
    value.as_string().chars().next()
}

fn fn_isalpha(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(
        first_char(&args[0]).is_some_and(|c| c.is_ascii_alphabetic()),
    ))
}

fn fn_isdigit(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(
        first_char(&args[0]).is_some_and(|c| c.is_ascii_digit()),
    ))
}

fn fn_isupper(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(
        first_char(&args[0]).is_some_and(|c| c.is_ascii_uppercase()),
    ))
}

fn fn_islower(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(
        first_char(&args[0]).is_some_and(|c| c.is_ascii_lowercase()),
    ))
}

// ── Table State ────────────────────────────────────────────────────

fn fn_recno(ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(ctx.table_ref()?.recno() as f64))
}

fn fn_reccount(ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(ctx.table_ref()?.record_count() as f64))
}

fn fn_eof(ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(ctx.table_ref()?.at_eof()))
}

fn fn_bof(ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(ctx.table_ref()?.at_bof()))
}

fn fn_deleted(ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    Ok(Value::Logical(ctx.table_ref()?.is_deleted()))
}

fn fn_fcount(ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(ctx.table_ref()?.field_count() as f64))
}

/// Field name by 1-based ordinal; "" when out of range.
fn fn_field(ctx: &mut Context, args: &[Value]) -> Result<Value> {
    let n = args[0].as_number();
    let table = ctx.table_ref()?;
    if n < 1.0 || n as usize > table.field_count() {
        return Ok(Value::Str(String::new()));
    }
    Ok(Value::Str(table.fields()[n as usize - 1].name.clone()))
}

// ── Misc ───────────────────────────────────────────────────────────

fn fn_iif(_ctx: &mut Context, args: &[Value]) -> Result<Value> {
    Ok(if args[0].is_true() {
        args[1].clone()
    } else {
        args[2].clone()
    })
}

fn fn_time(_ctx: &mut Context, _args: &[Value]) -> Result<Value> {
    let now = chrono::Local::now();
    Ok(Value::Str(format!(
        "{:02}:{:02}:{:02}",
        now.hour(),
        now.minute(),
        now.second()
    )))
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::eval::eval;
    use crate::lang::parser::parse_expression;

    fn run(src: &str) -> Value {
        let mut ctx = Context::new();
        eval(&mut ctx, &parse_expression(src).unwrap()).unwrap()
    }

    #[test]
    fn test_string_family() {
        assert_eq!(run("UPPER(SUBSTR(\"hello\", 1, 3))"), Value::Str("HEL".into()));
        assert_eq!(run("LEN(TRIM(\"  hi  \"))"), Value::Number(2.0));
        assert_eq!(run("LEN(RTRIM(\"  hi  \"))"), Value::Number(4.0));
        assert_eq!(run("LEN(ALLTRIM(\"  hi  \"))"), Value::Number(2.0));
        assert_eq!(run("LTRIM(\"  x\")"), Value::Str("x".into()));
        assert_eq!(run("LOWER(\"ABC\")"), Value::Str("abc".into()));
        assert_eq!(run("LEFT(\"hello\", 2)"), Value::Str("he".into()));
        assert_eq!(run("RIGHT(\"hello\", 2)"), Value::Str("lo".into()));
        assert_eq!(run("AT(\"ll\", \"hello\")"), Value::Number(3.0));
        assert_eq!(run("AT(\"zz\", \"hello\")"), Value::Number(0.0));
        assert_eq!(run("SPACE(3)"), Value::Str("   ".into()));
        assert_eq!(run("REPLICATE(\"ab\", 3)"), Value::Str("ababab".into()));
        assert_eq!(
            run("STUFF(\"abcdef\", 2, 3, \"XY\")"),
            Value::Str("aXYef".into())
        );
        assert_eq!(run("CHR(65)"), Value::Str("A".into()));
        assert_eq!(run("ASC(\"A\")"), Value::Number(65.0));
    }

    #[test]
    fn test_substr_edges() {
        assert_eq!(run("SUBSTR(\"hello\", 4)"), Value::Str("lo".into()));
        assert_eq!(run("SUBSTR(\"hello\", 9)"), Value::Str("".into()));
        assert_eq!(run("SUBSTR(\"hello\", 2, 99)"), Value::Str("ello".into()));
        assert_eq!(run("SUBSTR(\"hello\", 0)"), Value::Str("".into()));
    }

    #[test]
    fn test_numeric_family() {
        assert_eq!(run("ABS(-4)"), Value::Number(4.0));
        assert_eq!(run("INT(3.9)"), Value::Number(3.0));
        assert_eq!(run("INT(-3.1)"), Value::Number(-4.0));
        assert_eq!(run("ROUND(3.456, 2)"), Value::Number(3.46));
        assert_eq!(run("SQRT(16)"), Value::Number(4.0));
        assert_eq!(run("SQRT(-1)"), Value::Number(0.0));
        assert_eq!(run("MOD(10, 3)"), Value::Number(1.0));
        assert_eq!(run("MAX(2, 7)"), Value::Number(7.0));
        assert_eq!(run("MIN(2, 7)"), Value::Number(2.0));
        assert_eq!(run("EXP(0)"), Value::Number(1.0));
        assert_eq!(run("LOG(EXP(1))"), Value::Number(1.0));
        assert_eq!(run("LOG(0)"), Value::Number(0.0));
    }

    #[test]
    fn test_conversion() {
        assert_eq!(run("STR(25, 5)"), Value::Str("   25".into()));
        assert_eq!(run("STR(3.5, 6, 2)"), Value::Str("  3.50".into()));
        assert_eq!(run("VAL(\" 42.5 \")"), Value::Number(42.5));
        assert_eq!(run("VAL(\"junk\")"), Value::Number(0.0));
    }

    #[test]
    fn test_date_family() {
        assert_eq!(run("YEAR({01/31/2024})"), Value::Number(2024.0));
        assert_eq!(run("MONTH({01/31/2024})"), Value::Number(1.0));
        assert_eq!(run("DAY({01/31/2024})"), Value::Number(31.0));
        // 2024-01-31 was a Wednesday: DOW 4 with 1 = Sunday
        assert_eq!(run("DOW({01/31/2024})"), Value::Number(4.0));
        assert_eq!(run("CDOW({01/31/2024})"), Value::Str("Wednesday".into()));
        assert_eq!(run("CMONTH({01/31/2024})"), Value::Str("January".into()));
        assert_eq!(run("DTOC({01/31/2024})"), Value::Str("01/31/24".into()));
        assert_eq!(run("CTOD(\"01/31/2024\")"), Value::Date("20240131".into()));
        assert_eq!(run("CTOD(\"02/29/87\")"), Value::Date("".into()));
        assert_eq!(run("CTOD(\"12/25/87\")"), Value::Date("19871225".into()));
    }

    #[test]
    fn test_date_today_is_well_formed() {
        let Value::Date(today) = run("DATE()") else {
            panic!("DATE() must return a date");
        };
        assert_eq!(today.len(), 8);
        assert!(util::parse_yyyymmdd(&today).is_some());
    }

    #[test]
    fn test_type_family() {
        assert_eq!(run("TYPE(\"x\")"), Value::Str("C".into()));
        assert_eq!(run("TYPE(1)"), Value::Str("N".into()));
        assert_eq!(run("TYPE({01/31/2024})"), Value::Str("D".into()));
        assert_eq!(run("TYPE(.T.)"), Value::Str("L".into()));
        assert_eq!(run("EMPTY(\"   \")"), Value::Logical(true));
        assert_eq!(run("EMPTY(\"x\")"), Value::Logical(false));
        assert_eq!(run("EMPTY(0)"), Value::Logical(true));
        assert_eq!(run("ISALPHA(\"abc\")"), Value::Logical(true));
        assert_eq!(run("ISDIGIT(\"9x\")"), Value::Logical(true));
        assert_eq!(run("ISUPPER(\"Xy\")"), Value::Logical(true));
        assert_eq!(run("ISLOWER(\"Xy\")"), Value::Logical(false));
    }

    #[test]
    fn test_iif_and_time() {
        assert_eq!(run("IIF(5 > 3, 10, 20)"), Value::Number(10.0));
        assert_eq!(run("IIF(5 < 3, 10, 20)"), Value::Number(20.0));
        let Value::Str(time) = run("TIME()") else {
            panic!("TIME() must return text");
        };
        assert_eq!(time.len(), 8);
        assert_eq!(&time[2..3], ":");
    }

    #[test]
    fn test_arity_and_unknown_function() {
        let mut ctx = Context::new();
        let err = eval(&mut ctx, &parse_expression("LEN()").unwrap()).unwrap_err();
        assert_eq!(err.code(), "SYNTAX");
        let err = eval(&mut ctx, &parse_expression("LEN(\"a\", \"b\")").unwrap()).unwrap_err();
        assert_eq!(err.code(), "SYNTAX");
        let err = eval(&mut ctx, &parse_expression("NOSUCH(1)").unwrap()).unwrap_err();
        assert_eq!(err.code(), "UNDEFINED_FUNCTION");
    }

    #[test]
    fn test_table_functions_need_a_table() {
        let mut ctx = Context::new();
        let err = eval(&mut ctx, &parse_expression("RECNO()").unwrap()).unwrap_err();
        assert_eq!(err.code(), "NO_DATABASE_OPEN");
    }
}
