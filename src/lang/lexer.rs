//! Single-pass scanner with one-token lookahead.
//!
//! Works on one source line at a time (the script driver feeds lines).
//! Comment forms: `*` in column 1, `&&` to end of line. `NOTE` lines are
//! recognized by the parser, which sees an ordinary word.

use crate::error::{DbError, Result};
use crate::lang::token::{keyword, Token};
use crate::util;

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    peeked: Option<Token>,
    /// Start position of the peeked token, for `take_rest`.
    peek_start: usize,
    /// Whether the previous token can end a value (identifier, number,
    /// closing bracket/paren). Decides `[` between subscript and string.
    prev_value: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            peeked: None,
            peek_start: 0,
            prev_value: false,
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Token> {
        if self.peeked.is_none() {
            let start = self.skipped_pos();
            let tok = self.scan()?;
            self.peek_start = start;
            self.peeked = Some(tok);
        }
        Ok(self.peeked.clone().expect("just filled"))
    }

    /// Consume and return the next token.
    pub fn next(&mut self) -> Result<Token> {
        if let Some(tok) = self.peeked.take() {
            return Ok(tok);
        }
        self.scan()
    }

    /// Consume the remainder of the line as raw text (used by FIND).
    pub fn take_rest(&mut self) -> String {
        let from = if self.peeked.take().is_some() {
            self.peek_start
        } else {
            self.pos
        };
        let text = String::from_utf8_lossy(&self.src[from.min(self.src.len())..]).into_owned();
        self.pos = self.src.len();
        let trimmed = text.trim();
        match trimmed.find("&&") {
            Some(at) => trimmed[..at].trim_end().to_string(),
            None => trimmed.to_string(),
        }
    }

    fn skipped_pos(&mut self) -> usize {
        while self.pos < self.src.len() && (self.src[self.pos] as char).is_ascii_whitespace() {
            self.pos += 1;
        }
        self.pos
    }

    fn bump(&mut self) -> u8 {
        let b = self.src[self.pos];
        self.pos += 1;
        b
    }

    fn at(&self, ahead: usize) -> u8 {
        *self.src.get(self.pos + ahead).unwrap_or(&0)
    }

    fn scan(&mut self) -> Result<Token> {
        // Full-line comment: '*' in column 1
        if self.pos == 0 && self.src.first() == Some(&b'*') {
            self.pos = self.src.len();
            return Ok(Token::End);
        }
        self.skipped_pos();
        if self.pos >= self.src.len() {
            return Ok(Token::End);
        }

        let was_value = self.prev_value;
        self.prev_value = false;
        let b = self.at(0);

        // '&&' comment to end of line; single '&' is the macro prefix
        if b == b'&' {
            if self.at(1) == b'&' {
                self.pos = self.src.len();
                return Ok(Token::End);
            }
            self.bump();
            return Ok(Token::Amp);
        }

        if b.is_ascii_digit() {
            return self.scan_number();
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            return self.scan_word();
        }

        match b {
            b'"' | b'\'' => self.scan_string(b),
            b'[' => {
                if was_value {
                    self.bump();
                    Ok(Token::LBracket)
                } else {
                    self.scan_bracket_string()
                }
            }
            b']' => {
                self.bump();
                self.prev_value = true;
                Ok(Token::RBracket)
            }
            b'{' => self.scan_date(),
            b'.' => self.scan_dotted(),
            b'(' => {
                self.bump();
                Ok(Token::LParen)
            }
            b')' => {
                self.bump();
                self.prev_value = true;
                Ok(Token::RParen)
            }
            b',' => {
                self.bump();
                Ok(Token::Comma)
            }
            b'+' => {
                self.bump();
                Ok(Token::Plus)
            }
            b'-' => {
                self.bump();
                if self.at(0) == b'>' {
                    self.bump();
                    Ok(Token::Arrow)
                } else {
                    Ok(Token::Minus)
                }
            }
            b'*' => {
                self.bump();
                // '**' is the alternate power spelling
                if self.at(0) == b'*' {
                    self.bump();
                    Ok(Token::Caret)
                } else {
                    Ok(Token::Star)
                }
            }
            b'/' => {
                self.bump();
                Ok(Token::Slash)
            }
            b'^' => {
                self.bump();
                Ok(Token::Caret)
            }
            b'%' => {
                self.bump();
                Ok(Token::Percent)
            }
            b'=' => {
                self.bump();
                if self.at(0) == b'=' {
                    self.bump();
                    Ok(Token::EqEq)
                } else {
                    Ok(Token::Eq)
                }
            }
            b'<' => {
                self.bump();
                match self.at(0) {
                    b'=' => {
                        self.bump();
                        Ok(Token::Le)
                    }
                    b'>' => {
                        self.bump();
                        Ok(Token::Ne)
                    }
                    _ => Ok(Token::Lt),
                }
            }
            b'>' => {
                self.bump();
                if self.at(0) == b'=' {
                    self.bump();
                    Ok(Token::Ge)
                } else {
                    Ok(Token::Gt)
                }
            }
            b'!' => {
                self.bump();
                if self.at(0) == b'=' {
                    self.bump();
                    Ok(Token::Ne)
                } else {
                    Err(DbError::Syntax("stray '!'".into()))
                }
            }
            b'#' => {
                self.bump();
                Ok(Token::Ne)
            }
            b':' => {
                self.bump();
                if self.at(0) == b'=' {
                    self.bump();
                    Ok(Token::Assign)
                } else {
                    Err(DbError::Syntax("stray ':'".into()))
                }
            }
            b'?' => {
                self.bump();
                if self.at(0) == b'?' {
                    self.bump();
                    Ok(Token::DoubleQuestion)
                } else {
                    Ok(Token::Question)
                }
            }
            b'$' => {
                self.bump();
                Ok(Token::Dollar)
            }
            b'@' => {
                self.bump();
                Ok(Token::At)
            }
            other => Err(DbError::Syntax(format!(
                "unexpected character {:?}",
                other as char
            ))),
        }
    }

    fn scan_number(&mut self) -> Result<Token> {
        let start = self.pos;
        while self.at(0).is_ascii_digit() {
            self.bump();
        }
        if self.at(0) == b'.' && self.at(1).is_ascii_digit() {
            self.bump();
            while self.at(0).is_ascii_digit() {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| DbError::Syntax("bad number".into()))?;
        let value: f64 = text
            .parse()
            .map_err(|_| DbError::Syntax(format!("bad number {:?}", text)))?;
        self.prev_value = true;
        Ok(Token::Number(value))
    }

    fn scan_word(&mut self) -> Result<Token> {
        let start = self.pos;
        while self.at(0).is_ascii_alphanumeric() || self.at(0) == b'_' {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.prev_value = true;
        let kw = keyword(&text);
        Ok(Token::Word { text, kw })
    }

    fn scan_string(&mut self, quote: u8) -> Result<Token> {
        self.bump();
        let start = self.pos;
        while self.pos < self.src.len() && self.at(0) != quote {
            self.bump();
        }
        if self.pos >= self.src.len() {
            return Err(DbError::Syntax("unterminated string".into()));
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.bump();
        Ok(Token::Str(text))
    }

    fn scan_bracket_string(&mut self) -> Result<Token> {
        self.bump();
        let start = self.pos;
        while self.pos < self.src.len() && self.at(0) != b']' {
            self.bump();
        }
        if self.pos >= self.src.len() {
            return Err(DbError::Syntax("unterminated bracket string".into()));
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.bump();
        Ok(Token::Str(text))
    }

    fn scan_date(&mut self) -> Result<Token> {
        self.bump();
        let start = self.pos;
        while self.pos < self.src.len() && self.at(0) != b'}' {
            self.bump();
        }
        if self.pos >= self.src.len() {
            return Err(DbError::Syntax("unterminated date literal".into()));
        }
        let inner = String::from_utf8_lossy(&self.src[start..self.pos])
            .trim()
            .to_string();
        self.bump();
        if inner.is_empty() {
            return Ok(Token::DateLit(String::new()));
        }
        let normalized = if inner.contains('/') {
            let parts: Vec<&str> = inner.split('/').collect();
            if parts.len() != 3 {
                return Err(DbError::Syntax(format!("bad date literal {{{}}}", inner)));
            }
            let month: u32 = parts[0].trim().parse().unwrap_or(0);
            let day: u32 = parts[1].trim().parse().unwrap_or(0);
            let mut year: i32 = parts[2].trim().parse().unwrap_or(-1);
            if (0..100).contains(&year) {
                year += 1900;
            }
            format!("{:04}{:02}{:02}", year, month, day)
        } else {
            inner.clone()
        };
        if util::parse_yyyymmdd(&normalized).is_none() {
            return Err(DbError::Syntax(format!("bad date literal {{{}}}", inner)));
        }
        Ok(Token::DateLit(normalized))
    }

    fn scan_dotted(&mut self) -> Result<Token> {
        // '.' begins a dotted keyword; anything else dotted is a syntax error
        let mut end = self.pos + 1;
        while end < self.src.len() && self.src[end].is_ascii_alphabetic() {
            end += 1;
        }
        if end < self.src.len() && self.src[end] == b'.' {
            let word = String::from_utf8_lossy(&self.src[self.pos + 1..end]).to_ascii_uppercase();
            let tok = match word.as_str() {
                "T" | "Y" => Some(Token::True),
                "F" | "N" => Some(Token::False),
                "AND" => Some(Token::And),
                "OR" => Some(Token::Or),
                "NOT" => Some(Token::Not),
                _ => None,
            };
            if let Some(tok) = tok {
                self.pos = end + 1;
                return Ok(tok);
            }
        }
        Err(DbError::Syntax("stray '.'".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::token::Kw;

    fn all_tokens(src: &str) -> Vec<Token> {
        let mut lex = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lex.next().unwrap();
            let end = tok == Token::End;
            out.push(tok);
            if end {
                break;
            }
        }
        out
    }

    #[test]
    fn test_words_and_keywords() {
        let toks = all_tokens("use people");
        assert_eq!(toks[0].kw(), Some(Kw::Use));
        assert_eq!(toks[1].word(), Some("people"));
        assert_eq!(toks[1].kw(), None);
        assert_eq!(toks[2], Token::End);
    }

    #[test]
    fn test_keyword_lookup_is_case_insensitive() {
        let toks = all_tokens("RePlAcE");
        assert_eq!(toks[0].kw(), Some(Kw::Replace));
        assert_eq!(toks[0].word(), Some("RePlAcE"));
    }

    #[test]
    fn test_numbers() {
        let toks = all_tokens("42 3.25");
        assert_eq!(toks[0], Token::Number(42.0));
        assert_eq!(toks[1], Token::Number(3.25));
    }

    #[test]
    fn test_strings_three_quotings() {
        let toks = all_tokens(r#""dquote" 'squote' [brackets]"#);
        assert_eq!(toks[0], Token::Str("dquote".into()));
        assert_eq!(toks[1], Token::Str("squote".into()));
        assert_eq!(toks[2], Token::Str("brackets".into()));
    }

    #[test]
    fn test_bracket_after_value_is_subscript() {
        let toks = all_tokens("arr[3]");
        assert_eq!(toks[0].word(), Some("arr"));
        assert_eq!(toks[1], Token::LBracket);
        assert_eq!(toks[2], Token::Number(3.0));
        assert_eq!(toks[3], Token::RBracket);
    }

    #[test]
    fn test_dotted_literals_and_operators() {
        let toks = all_tokens(".t. .F. .y. .AND. .or. .NOT.");
        assert_eq!(
            toks[..6],
            [
                Token::True,
                Token::False,
                Token::True,
                Token::And,
                Token::Or,
                Token::Not
            ]
        );
    }

    #[test]
    fn test_multichar_operators() {
        let toks = all_tokens("<= >= <> != == := -> ?? # = < >");
        assert_eq!(
            toks[..12],
            [
                Token::Le,
                Token::Ge,
                Token::Ne,
                Token::Ne,
                Token::EqEq,
                Token::Assign,
                Token::Arrow,
                Token::DoubleQuestion,
                Token::Ne,
                Token::Eq,
                Token::Lt,
                Token::Gt
            ]
        );
    }

    #[test]
    fn test_date_literals() {
        let toks = all_tokens("{01/31/2024} {12/25/87} {20240201} {}");
        assert_eq!(toks[0], Token::DateLit("20240131".into()));
        assert_eq!(toks[1], Token::DateLit("19871225".into()));
        assert_eq!(toks[2], Token::DateLit("20240201".into()));
        assert_eq!(toks[3], Token::DateLit("".into()));
    }

    #[test]
    fn test_bad_date_is_error() {
        let mut lex = Lexer::new("{13/45/2024}");
        assert!(lex.next().is_err());
    }

    #[test]
    fn test_comments() {
        assert_eq!(all_tokens("* whole line comment"), [Token::End]);
        let toks = all_tokens("go top && trailing comment");
        assert_eq!(toks[0].kw(), Some(Kw::Go));
        assert_eq!(toks[1].kw(), Some(Kw::Top));
        assert_eq!(toks[2], Token::End);
    }

    #[test]
    fn test_star_mid_line_is_multiply() {
        let toks = all_tokens("2 * 3 ** 2");
        assert_eq!(toks[1], Token::Star);
        assert_eq!(toks[3], Token::Caret);
    }

    #[test]
    fn test_macro_and_amp_comment() {
        let toks = all_tokens("&name");
        assert_eq!(toks[0], Token::Amp);
        assert_eq!(toks[1].word(), Some("name"));
    }

    #[test]
    fn test_peek_is_stable() {
        let mut lex = Lexer::new("seek 42");
        assert_eq!(lex.peek().unwrap().kw(), Some(Kw::Seek));
        assert_eq!(lex.peek().unwrap().kw(), Some(Kw::Seek));
        assert_eq!(lex.next().unwrap().kw(), Some(Kw::Seek));
        assert_eq!(lex.next().unwrap(), Token::Number(42.0));
    }

    #[test]
    fn test_take_rest_spans_peeked_token() {
        let mut lex = Lexer::new("find Jane Smith && note");
        assert_eq!(lex.next().unwrap().kw(), Some(Kw::Find));
        let _ = lex.peek().unwrap();
        assert_eq!(lex.take_rest(), "Jane Smith");
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let mut lex = Lexer::new("\"oops");
        assert!(lex.next().is_err());
    }
}
