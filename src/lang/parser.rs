//! Recursive-descent parser for commands and expressions.
//!
//! Expression precedence, low to high: .OR., .AND., .NOT., comparison
//! (= == <> < <= > >= $), additive, multiplicative, power (right
//! associative), unary sign, primary. Command parsing dispatches on the
//! leading keyword; scope and FOR/WHILE clauses may appear in any order at
//! the command tail.

use crate::error::{DbError, Result};
use crate::lang::ast::{
    AssignTarget, BinOp, Clauses, CloseTarget, Command, Expr, FieldDef, Scope, SetArg, UnOp,
    VarKind,
};
use crate::lang::lexer::Lexer;
use crate::lang::token::{Kw, Token};

pub struct Parser<'a> {
    lex: Lexer<'a>,
}

/// Parse one source line into a command.
pub fn parse_command(src: &str) -> Result<Command> {
    Parser::new(src).command()
}

/// Parse a standalone expression (macro bodies, stored key expressions).
pub fn parse_expression(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(src);
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Parser {
            lex: Lexer::new(src),
        }
    }

    // ── Token Helpers ──────────────────────────────────────────────

    fn peek(&mut self) -> Result<Token> {
        self.lex.peek()
    }

    fn next(&mut self) -> Result<Token> {
        self.lex.next()
    }

    fn at_end(&mut self) -> Result<bool> {
        Ok(self.peek()? == Token::End)
    }

    fn accept(&mut self, tok: &Token) -> Result<bool> {
        if self.peek()? == *tok {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn accept_kw(&mut self, kw: Kw) -> Result<bool> {
        if self.peek()?.kw() == Some(kw) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, tok: &Token, what: &str) -> Result<()> {
        let got = self.next()?;
        if got == *tok {
            Ok(())
        } else {
            Err(DbError::Syntax(format!("expected {}, got {:?}", what, got)))
        }
    }

    fn expect_kw(&mut self, kw: Kw) -> Result<()> {
        let got = self.next()?;
        if got.kw() == Some(kw) {
            Ok(())
        } else {
            Err(DbError::Syntax(format!("expected {:?}, got {:?}", kw, got)))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        let got = self.next()?;
        if got == Token::End {
            Ok(())
        } else {
            Err(DbError::Syntax(format!("unexpected {:?} at end of line", got)))
        }
    }

    /// Any word (identifier or keyword used as a name), or a string.
    fn expect_name(&mut self, what: &str) -> Result<String> {
        match self.next()? {
            Token::Word { text, .. } => Ok(text),
            Token::Str(text) => Ok(text),
            got => Err(DbError::Syntax(format!("expected {}, got {:?}", what, got))),
        }
    }

    fn name_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_name("a name")?];
        while self.accept(&Token::Comma)? {
            names.push(self.expect_name("a name")?);
        }
        Ok(names)
    }

    fn expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.expression()?];
        while self.accept(&Token::Comma)? {
            exprs.push(self.expression()?);
        }
        Ok(exprs)
    }

    // ── Command Parsing ────────────────────────────────────────────

    pub fn command(&mut self) -> Result<Command> {
        let tok = self.peek()?;
        match tok {
            Token::End => {
                return Ok(Command::Empty);
            }
            Token::Question => {
                self.next()?;
                return self.print_command(true);
            }
            Token::DoubleQuestion => {
                self.next()?;
                return self.print_command(false);
            }
            Token::At => {
                self.next()?;
                return self.at_command();
            }
            _ => {}
        }

        // NOTE lines are whole-line comments
        if let Some(text) = tok.word() {
            if text.eq_ignore_ascii_case("NOTE") {
                return Ok(Command::Empty);
            }
        }

        let Some(kw) = tok.kw() else {
            // Not a command keyword: implicit assignment `name = expr`
            return self.assignment();
        };

        self.next()?;
        let cmd = match kw {
            Kw::Use => {
                if self.at_end()? {
                    Command::Use { name: None }
                } else {
                    Command::Use {
                        name: Some(self.expect_name("a table name")?),
                    }
                }
            }
            Kw::Close => {
                let target = if self.accept_kw(Kw::Databases)? {
                    CloseTarget::Databases
                } else if self.accept_kw(Kw::Indexes)? {
                    CloseTarget::Indexes
                } else {
                    self.accept_kw(Kw::All)?;
                    CloseTarget::All
                };
                Command::Close(target)
            }
            Kw::Create => self.create_command()?,
            Kw::List => {
                if self.accept_kw(Kw::Structure)? {
                    Command::ListStructure
                } else {
                    let (exprs, clauses) = self.exprs_and_clauses()?;
                    Command::List { exprs, clauses }
                }
            }
            Kw::Display => {
                if self.accept_kw(Kw::Structure)? {
                    Command::DisplayStructure
                } else {
                    let (exprs, clauses) = self.exprs_and_clauses()?;
                    Command::Display { exprs, clauses }
                }
            }
            Kw::Go | Kw::Goto => {
                if self.accept_kw(Kw::Top)? {
                    Command::GoTop
                } else if self.accept_kw(Kw::Bottom)? {
                    Command::GoBottom
                } else {
                    self.accept_kw(Kw::Record)?;
                    Command::GoRecord(self.expression()?)
                }
            }
            Kw::Skip => {
                if self.at_end()? {
                    Command::Skip(None)
                } else {
                    Command::Skip(Some(self.expression()?))
                }
            }
            Kw::Locate => Command::Locate(self.clauses()?),
            Kw::Continue => Command::Continue,
            Kw::Append => {
                if self.accept_kw(Kw::From)? {
                    Command::AppendFrom(self.expect_name("a table name")?)
                } else {
                    self.accept_kw(Kw::Blank)?;
                    Command::AppendBlank
                }
            }
            Kw::Delete => Command::Delete(self.clauses()?),
            Kw::Recall => Command::Recall(self.clauses()?),
            Kw::Pack => Command::Pack,
            Kw::Zap => Command::Zap,
            Kw::Replace => self.replace_command()?,
            Kw::Store => {
                let expr = self.expression()?;
                self.expect_kw(Kw::To)?;
                Command::Store {
                    expr,
                    names: self.name_list()?,
                }
            }
            Kw::Set => self.set_command()?,
            Kw::Select => Command::Select(self.expression()?),
            Kw::Public => Command::DeclareVars {
                kind: VarKind::Public,
                names: self.name_list()?,
            },
            Kw::Private => Command::DeclareVars {
                kind: VarKind::Private,
                names: self.name_list()?,
            },
            Kw::Local => Command::DeclareVars {
                kind: VarKind::Local,
                names: self.name_list()?,
            },
            Kw::Release => {
                if self.accept_kw(Kw::All)? {
                    Command::Release {
                        all: true,
                        names: Vec::new(),
                    }
                } else {
                    Command::Release {
                        all: false,
                        names: self.name_list()?,
                    }
                }
            }
            Kw::Declare => {
                let name = self.expect_name("an array name")?;
                self.expect(&Token::LBracket, "'['")?;
                let size = self.expression()?;
                self.expect(&Token::RBracket, "']'")?;
                Command::DeclareArray { name, size }
            }
            Kw::Clear => Command::Clear {
                all: self.accept_kw(Kw::All)?,
            },
            Kw::Quit => Command::Quit,
            Kw::Cancel => Command::Cancel,
            Kw::Return => {
                if self.at_end()? {
                    Command::Return(None)
                } else {
                    Command::Return(Some(self.expression()?))
                }
            }
            Kw::Index => {
                self.expect_kw(Kw::On)?;
                let key = self.expression()?;
                self.expect_kw(Kw::To)?;
                let file = self.expect_name("an index file name")?;
                let mut unique = false;
                let mut descending = false;
                loop {
                    if self.accept_kw(Kw::Unique)? {
                        unique = true;
                    } else if self.accept_kw(Kw::Descending)? {
                        descending = true;
                    } else {
                        break;
                    }
                }
                Command::IndexOn {
                    key,
                    file,
                    unique,
                    descending,
                }
            }
            Kw::Reindex => Command::Reindex,
            Kw::Seek => Command::Seek(self.expression()?),
            Kw::Find => Command::Find(self.lex.take_rest()),
            Kw::Wait => {
                let prompt = if self.at_end()? || self.peek()?.kw() == Some(Kw::To) {
                    None
                } else {
                    Some(self.expression()?)
                };
                let to = if self.accept_kw(Kw::To)? {
                    Some(self.expect_name("a variable name")?)
                } else {
                    None
                };
                Command::Wait { prompt, to }
            }
            Kw::Accept => {
                let (prompt, to) = self.prompt_to()?;
                Command::Accept { prompt, to }
            }
            Kw::Input => {
                let (prompt, to) = self.prompt_to()?;
                Command::Input { prompt, to }
            }
            Kw::Read => Command::Read,
            Kw::Count => {
                let mut clauses = Clauses::default();
                let mut to = None;
                loop {
                    if self.accept_kw(Kw::To)? {
                        to = Some(self.expect_name("a variable name")?);
                    } else if !self.clause_step(&mut clauses)? {
                        break;
                    }
                }
                self.expect_end()?;
                Command::Count { to, clauses }
            }
            Kw::Sum => {
                let (exprs, to, clauses) = self.aggregate_tail()?;
                Command::Sum { exprs, to, clauses }
            }
            Kw::Average => {
                let (exprs, to, clauses) = self.aggregate_tail()?;
                Command::Average { exprs, to, clauses }
            }
            Kw::Help => Command::Help,
            _ => {
                return Err(DbError::Syntax(format!(
                    "{:?} cannot start a command",
                    kw
                )))
            }
        };
        match &cmd {
            // FIND consumed the raw remainder; COUNT already hit the end
            Command::Find(_) | Command::Count { .. } => {}
            _ => self.expect_end()?,
        }
        Ok(cmd)
    }

    fn print_command(&mut self, newline: bool) -> Result<Command> {
        let exprs = if self.at_end()? {
            Vec::new()
        } else {
            self.expr_list()?
        };
        self.expect_end()?;
        Ok(Command::Print { exprs, newline })
    }

    fn at_command(&mut self) -> Result<Command> {
        let row = self.expression()?;
        self.expect(&Token::Comma, "','")?;
        let col = self.expression()?;
        let mut say = None;
        let mut get = None;
        loop {
            if self.accept_kw(Kw::Say)? {
                say = Some(self.expression()?);
            } else if self.accept_kw(Kw::Get)? {
                get = Some(self.expect_name("a variable name")?);
            } else {
                break;
            }
        }
        self.expect_end()?;
        Ok(Command::AtSayGet { row, col, say, get })
    }

    fn assignment(&mut self) -> Result<Command> {
        let name = match self.next()? {
            Token::Word { text, .. } => text,
            got => {
                return Err(DbError::Syntax(format!(
                    "expected a command, got {:?}",
                    got
                )))
            }
        };
        let target = if self.accept(&Token::LBracket)? {
            let index = self.expression()?;
            self.expect(&Token::RBracket, "']'")?;
            AssignTarget::Element(name, index)
        } else {
            AssignTarget::Var(name)
        };
        let tok = self.next()?;
        if tok != Token::Eq && tok != Token::Assign {
            return Err(DbError::Syntax(format!(
                "expected '=' or ':=', got {:?}",
                tok
            )));
        }
        let expr = self.expression()?;
        self.expect_end()?;
        Ok(Command::Assign { target, expr })
    }

    fn create_command(&mut self) -> Result<Command> {
        let name = self.expect_name("a table name")?;
        self.expect(&Token::LParen, "'('")?;
        let mut fields = Vec::new();
        loop {
            let fname = self.expect_name("a field name")?;
            let type_word = self.expect_name("a field type")?;
            if type_word.len() != 1 {
                return Err(DbError::Syntax(format!(
                    "bad field type {:?}",
                    type_word
                )));
            }
            let type_char = type_word.to_ascii_uppercase().chars().next().expect("len 1");
            let (mut length, mut decimals) = match type_char {
                'C' => (10u8, 0u8),
                'N' => (10, 0),
                'D' => (8, 0),
                'L' => (1, 0),
                'M' => (10, 0),
                other => {
                    return Err(DbError::Syntax(format!("bad field type {:?}", other)))
                }
            };
            if self.accept(&Token::LParen)? {
                length = self.expect_small_int("a field length")?;
                if self.accept(&Token::Comma)? {
                    decimals = self.expect_small_int("a decimal count")?;
                }
                self.expect(&Token::RParen, "')'")?;
            }
            fields.push(FieldDef {
                name: fname,
                type_char,
                length,
                decimals,
            });
            if !self.accept(&Token::Comma)? {
                break;
            }
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(Command::CreateTable { name, fields })
    }

    fn expect_small_int(&mut self, what: &str) -> Result<u8> {
        match self.next()? {
            Token::Number(n) if n >= 0.0 && n <= 255.0 && n.fract() == 0.0 => Ok(n as u8),
            got => Err(DbError::Syntax(format!("expected {}, got {:?}", what, got))),
        }
    }

    fn replace_command(&mut self) -> Result<Command> {
        let mut pairs = Vec::new();
        loop {
            let field = self.expect_name("a field name")?;
            self.expect_kw(Kw::With)?;
            let expr = self.expression()?;
            pairs.push((field, expr));
            if !self.accept(&Token::Comma)? {
                break;
            }
        }
        let clauses = self.clauses()?;
        Ok(Command::Replace { pairs, clauses })
    }

    fn set_command(&mut self) -> Result<Command> {
        let option = self.expect_name("a SET option")?.to_ascii_uppercase();
        match option.as_str() {
            "INDEX" => {
                self.expect_kw(Kw::To)?;
                let names = if self.at_end()? {
                    Vec::new()
                } else {
                    self.name_list()?
                };
                Ok(Command::SetIndex(names))
            }
            "ORDER" => {
                self.expect_kw(Kw::To)?;
                Ok(Command::SetOrder(self.expression()?))
            }
            _ => {
                let arg = if self.accept_kw(Kw::On)? {
                    SetArg::On
                } else if self.accept_kw(Kw::Off)? {
                    SetArg::Off
                } else if self.accept_kw(Kw::To)? {
                    match self.peek()? {
                        Token::Word { .. } | Token::Str(_) => SetArg::To(self.name_list()?),
                        _ => SetArg::ToExpr(self.expression()?),
                    }
                } else {
                    return Err(DbError::Syntax(format!(
                        "SET {} needs ON, OFF or TO",
                        option
                    )));
                };
                Ok(Command::Set { option, arg })
            }
        }
    }

    fn prompt_to(&mut self) -> Result<(Option<Expr>, String)> {
        let prompt = if self.peek()?.kw() == Some(Kw::To) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_kw(Kw::To)?;
        Ok((prompt, self.expect_name("a variable name")?))
    }

    fn aggregate_tail(&mut self) -> Result<(Vec<Expr>, Vec<String>, Clauses)> {
        let exprs = self.expr_list()?;
        let mut to = Vec::new();
        let mut clauses = Clauses::default();
        loop {
            if self.accept_kw(Kw::To)? {
                to = self.name_list()?;
            } else if !self.clause_step(&mut clauses)? {
                break;
            }
        }
        Ok((exprs, to, clauses))
    }

    fn exprs_and_clauses(&mut self) -> Result<(Vec<Expr>, Clauses)> {
        let mut exprs = Vec::new();
        if !self.at_end()? && !self.at_clause_start()? {
            exprs = self.expr_list()?;
        }
        Ok((exprs, self.clauses()?))
    }

    fn at_clause_start(&mut self) -> Result<bool> {
        Ok(matches!(
            self.peek()?.kw(),
            Some(Kw::All | Kw::Next | Kw::Record | Kw::Rest | Kw::For | Kw::While)
        ))
    }

    /// Parse scope and FOR/WHILE clauses in any order until none match.
    fn clauses(&mut self) -> Result<Clauses> {
        let mut clauses = Clauses::default();
        while self.clause_step(&mut clauses)? {}
        Ok(clauses)
    }

    fn clause_step(&mut self, clauses: &mut Clauses) -> Result<bool> {
        if self.accept_kw(Kw::All)? {
            clauses.scope = Scope::All;
        } else if self.accept_kw(Kw::Next)? {
            clauses.scope = Scope::Next(self.expect_recno()?);
        } else if self.accept_kw(Kw::Record)? {
            clauses.scope = Scope::Record(self.expect_recno()?);
        } else if self.accept_kw(Kw::Rest)? {
            clauses.scope = Scope::Rest;
        } else if self.accept_kw(Kw::For)? {
            clauses.for_cond = Some(self.expression()?);
        } else if self.accept_kw(Kw::While)? {
            clauses.while_cond = Some(self.expression()?);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn expect_recno(&mut self) -> Result<u32> {
        match self.next()? {
            Token::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => {
                Ok(n as u32)
            }
            got => Err(DbError::Syntax(format!(
                "expected a record number, got {:?}",
                got
            ))),
        }
    }

    // ── Expression Parsing ─────────────────────────────────────────

    pub fn expression(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.accept(&Token::Or)? {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.not_expr()?;
        while self.accept(&Token::And)? {
            let rhs = self.not_expr()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.accept(&Token::Not)? {
            let expr = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                expr: Box::new(expr),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek()? {
            Token::Eq => BinOp::Eq,
            Token::EqEq => BinOp::ExactEq,
            Token::Ne => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::Dollar => BinOp::Contain,
            _ => return Ok(lhs),
        };
        self.next()?;
        let rhs = self.additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek()? {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.next()?;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.power()?;
        loop {
            let op = match self.peek()? {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.next()?;
            let rhs = self.power()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn power(&mut self) -> Result<Expr> {
        let lhs = self.unary()?;
        if self.accept(&Token::Caret)? {
            // Right associative: 2 ^ 3 ^ 2 == 2 ^ (3 ^ 2)
            let rhs = self.power()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.accept(&Token::Minus)? {
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Minus,
                expr: Box::new(expr),
            });
        }
        if self.accept(&Token::Plus)? {
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Plus,
                expr: Box::new(expr),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next()? {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::DateLit(d) => Ok(Expr::DateLit(d)),
            Token::True => Ok(Expr::Logical(true)),
            Token::False => Ok(Expr::Logical(false)),
            Token::LParen => {
                let expr = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::Amp => {
                let name = self.expect_name("a macro name")?;
                Ok(Expr::Macro(name))
            }
            Token::Word { text, .. } => {
                if self.accept(&Token::LParen)? {
                    let args = if self.accept(&Token::RParen)? {
                        Vec::new()
                    } else {
                        let args = self.expr_list()?;
                        self.expect(&Token::RParen, "')'")?;
                        args
                    };
                    return Ok(Expr::Call { name: text, args });
                }
                if self.accept(&Token::LBracket)? {
                    let index = self.expression()?;
                    self.expect(&Token::RBracket, "']'")?;
                    return Ok(Expr::Subscript {
                        name: text,
                        index: Box::new(index),
                    });
                }
                if self.accept(&Token::Arrow)? {
                    let field = self.expect_name("a field name")?;
                    return Ok(Expr::FieldRef { alias: text, field });
                }
                Ok(Expr::Ident(text))
            }
            got => Err(DbError::Syntax(format!(
                "unexpected {:?} in expression",
                got
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
