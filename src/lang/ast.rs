//! Expression and command trees.
//!
//! Every sub-node is owned by exactly one parent; dropping a tree drops it
//! whole. `Expr` carries a `Display` impl that unparses to canonical text,
//! which is what INDEX stores in the XDX header.

use std::fmt;

use crate::util;

// ── Expressions ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    ExactEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contain,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => ".OR.",
            BinOp::And => ".AND.",
            BinOp::Eq => "=",
            BinOp::ExactEq => "==",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Contain => "$",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    /// Normalized YYYYMMDD, or "" for an empty date.
    DateLit(String),
    Logical(bool),
    /// Field or variable reference, resolved at evaluation time.
    Ident(String),
    /// `alias->field`
    FieldRef { alias: String, field: String },
    /// `name[index]`, 1-based
    Subscript { name: String, index: Box<Expr> },
    Call { name: String, args: Vec<Expr> },
    Unary { op: UnOp, expr: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// `&name` macro substitution
    Macro(String),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => f.write_str(&util::format_number(*n)),
            Expr::Str(s) => write!(f, "\"{}\"", s),
            Expr::DateLit(d) if d.len() == 8 => {
                write!(f, "{{{}/{}/{}}}", &d[4..6], &d[6..8], &d[0..4])
            }
            Expr::DateLit(_) => f.write_str("{}"),
            Expr::Logical(true) => f.write_str(".T."),
            Expr::Logical(false) => f.write_str(".F."),
            Expr::Ident(name) => f.write_str(&name.to_ascii_uppercase()),
            Expr::FieldRef { alias, field } => write!(
                f,
                "{}->{}",
                alias.to_ascii_uppercase(),
                field.to_ascii_uppercase()
            ),
            Expr::Subscript { name, index } => {
                write!(f, "{}[{}]", name.to_ascii_uppercase(), index)
            }
            Expr::Call { name, args } => {
                write!(f, "{}(", name.to_ascii_uppercase())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Unary { op, expr } => match op {
                UnOp::Plus => write!(f, "+{}", paren(expr)),
                UnOp::Minus => write!(f, "-{}", paren(expr)),
                UnOp::Not => write!(f, ".NOT. {}", paren(expr)),
            },
            Expr::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", paren(lhs), op.symbol(), paren(rhs))
            }
            Expr::Macro(name) => write!(f, "&{}", name.to_ascii_uppercase()),
        }
    }
}

/// Parenthesize nested binary operands so the unparsed text re-parses with
/// the same shape regardless of precedence.
struct Paren<'a>(&'a Expr);

fn paren(expr: &Expr) -> Paren<'_> {
    Paren(expr)
}

impl fmt::Display for Paren<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Binary { .. } => write!(f, "({})", self.0),
            other => write!(f, "{}", other),
        }
    }
}

// ── Commands ───────────────────────────────────────────────────────

/// Record-range clause on iterating commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// No scope clause given; each command applies its own default.
    Default,
    All,
    Next(u32),
    Record(u32),
    Rest,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Default
    }
}

/// Common command tail: scope plus FOR/WHILE predicates, any order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clauses {
    pub scope: Scope,
    pub for_cond: Option<Expr>,
    pub while_cond: Option<Expr>,
}

impl Clauses {
    pub fn is_plain(&self) -> bool {
        self.scope == Scope::Default && self.for_cond.is_none() && self.while_cond.is_none()
    }
}

/// Field definition accepted by the CREATE command.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub type_char: char,
    pub length: u8,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTarget {
    Databases,
    Indexes,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Public,
    Private,
    Local,
}

/// Argument of a SET command.
#[derive(Debug, Clone, PartialEq)]
pub enum SetArg {
    On,
    Off,
    To(Vec<String>),
    ToExpr(Expr),
}

/// Assignment target: bare variable or array element.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Var(String),
    Element(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Blank or comment line.
    Empty,
    Use { name: Option<String> },
    Close(CloseTarget),
    CreateTable { name: String, fields: Vec<FieldDef> },
    List { exprs: Vec<Expr>, clauses: Clauses },
    Display { exprs: Vec<Expr>, clauses: Clauses },
    ListStructure,
    DisplayStructure,
    GoTop,
    GoBottom,
    GoRecord(Expr),
    Skip(Option<Expr>),
    Locate(Clauses),
    Continue,
    AppendBlank,
    AppendFrom(String),
    Delete(Clauses),
    Recall(Clauses),
    Pack,
    Zap,
    Replace { pairs: Vec<(String, Expr)>, clauses: Clauses },
    Store { expr: Expr, names: Vec<String> },
    Assign { target: AssignTarget, expr: Expr },
    SetIndex(Vec<String>),
    SetOrder(Expr),
    Set { option: String, arg: SetArg },
    Select(Expr),
    DeclareVars { kind: VarKind, names: Vec<String> },
    Release { all: bool, names: Vec<String> },
    DeclareArray { name: String, size: Expr },
    Clear { all: bool },
    Quit,
    Cancel,
    Return(Option<Expr>),
    IndexOn { key: Expr, file: String, unique: bool, descending: bool },
    Reindex,
    Seek(Expr),
    Find(String),
    Wait { prompt: Option<Expr>, to: Option<String> },
    Accept { prompt: Option<Expr>, to: String },
    Input { prompt: Option<Expr>, to: String },
    AtSayGet { row: Expr, col: Expr, say: Option<Expr>, get: Option<String> },
    Read,
    Count { to: Option<String>, clauses: Clauses },
    Sum { exprs: Vec<Expr>, to: Vec<String>, clauses: Clauses },
    Average { exprs: Vec<Expr>, to: Vec<String>, clauses: Clauses },
    Help,
    /// `?` (with newline) and `??` (without).
    Print { exprs: Vec<Expr>, newline: bool },
}
