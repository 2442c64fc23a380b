//! Literal scanner: turns text into interned atoms and fact literals.
//!
//! Every symbol, string, integer and float token is interned in the
//! environment as it is read, so token equality is atom identity. A `;`
//! starts a comment running to the end of the line.
//!
//! ```
//! use atomtron::backend::Environment;
//! use atomtron::scanner::Scanner;
//!
//! let mut env = Environment::default();
//! let mut scanner = Scanner::new("(point 1 2.5 \"label\" (tags a b))");
//! let fact = scanner.read_fact(&mut env).unwrap().unwrap();
//! assert_eq!(env.symbol_text(fact.template), "point");
//! assert_eq!(fact.fields.len(), 4);
//! assert!(scanner.read_fact(&mut env).unwrap().is_none());
//! ```
use std::fmt;

use crate::backend::atoms::{FloatAtom, IntegerAtom, SymbolAtom};
use crate::backend::facts::Field;
use crate::backend::Environment;

/// Deepest multifield nesting accepted inside one fact literal.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    Symbol(SymbolAtom),
    String(SymbolAtom),
    Integer(IntegerAtom),
    Float(FloatAtom),
    Eof,
}

impl Token {
    /// Source-like rendering, for diagnostics.
    pub fn describe(&self, env: &Environment) -> String {
        match self {
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Symbol(atom) => env.symbol_text(*atom).to_string(),
            Token::String(atom) => format!("{:?}", env.symbol_text(*atom)),
            Token::Integer(atom) => env.integer_value(*atom).to_string(),
            Token::Float(atom) => format!("{:?}", env.float_value(*atom)),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// A fact literal `(template field...)` with its fields interned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactLiteral {
    pub template: SymbolAtom,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    UnterminatedString { line: usize, column: usize },
    IntegerOverflow { text: String, line: usize, column: usize },
    UnexpectedToken { found: String, expected: &'static str, line: usize, column: usize },
    UnexpectedEof { line: usize, column: usize },
    NestingTooDeep { line: usize, column: usize },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::UnterminatedString { line, column } => {
                write!(f, "{}:{}: unterminated string literal", line, column)
            }
            ScanError::IntegerOverflow { text, line, column } => {
                write!(f, "{}:{}: integer literal out of range: {}", line, column, text)
            }
            ScanError::UnexpectedToken {
                found,
                expected,
                line,
                column,
            } => write!(f, "{}:{}: expected {}, found {}", line, column, expected, found),
            ScanError::UnexpectedEof { line, column } => {
                write!(f, "{}:{}: unexpected end of input inside a fact", line, column)
            }
            ScanError::NestingTooDeep { line, column } => write!(
                f,
                "{}:{}: multifields nested more than {} deep",
                line, column, MAX_NESTING
            ),
        }
    }
}

impl std::error::Error for ScanError {}

enum Number {
    Integer,
    Float,
}

/// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`, else not a number.
fn classify_number(word: &str) -> Option<Number> {
    let bytes = word.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut frac_digits = 0;
    let mut float = false;
    if i < bytes.len() && bytes[i] == b'.' {
        float = true;
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - frac_start;
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        float = true;
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return None;
        }
    }

    if i != bytes.len() {
        return None;
    }
    Some(if float { Number::Float } else { Number::Integer })
}

pub struct Scanner {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Scanner {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Current line and column, 1-based.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                while let Some(ch) = self.advance() {
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn is_delimiter(ch: char) -> bool {
        ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | ';')
    }

    fn read_string(&mut self) -> Result<String, ScanError> {
        let (line, column) = self.position();
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.advance() {
            match ch {
                '"' => return Ok(result),
                '\\' => match self.advance() {
                    Some(escaped) => result.push(escaped),
                    None => break,
                },
                _ => result.push(ch),
            }
        }
        Err(ScanError::UnterminatedString { line, column })
    }

    fn read_word(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current() {
            if Self::is_delimiter(ch) {
                break;
            }
            result.push(ch);
            self.advance();
        }
        result
    }

    /// Read the next token, interning its value in `env`.
    pub fn next_token(&mut self, env: &mut Environment) -> Result<Token, ScanError> {
        self.skip_whitespace_and_comments();
        let (line, column) = self.position();

        let Some(ch) = self.current() else {
            return Ok(Token::Eof);
        };

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RParen)
            }
            '"' => {
                let text = self.read_string()?;
                Ok(Token::String(env.intern_string(&text)))
            }
            _ => {
                let word = self.read_word();
                match classify_number(&word) {
                    Some(Number::Integer) => match word.parse::<i64>() {
                        Ok(value) => Ok(Token::Integer(env.intern_integer(value))),
                        Err(_) => Err(ScanError::IntegerOverflow {
                            text: word,
                            line,
                            column,
                        }),
                    },
                    Some(Number::Float) => match word.parse::<f64>() {
                        Ok(value) => Ok(Token::Float(env.intern_float(value))),
                        Err(_) => Ok(Token::Symbol(env.intern_symbol(&word))),
                    },
                    None => Ok(Token::Symbol(env.intern_symbol(&word))),
                }
            }
        }
    }

    /// Read every remaining token up to (not including) `Eof`.
    pub fn tokenize(&mut self, env: &mut Environment) -> Result<Vec<Token>, ScanError> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token(env)? {
                Token::Eof => return Ok(tokens),
                token => tokens.push(token),
            }
        }
    }

    /// Read one `(template field...)` literal. Parenthesized groups inside a
    /// fact become multifields. Returns `Ok(None)` at end of input.
    pub fn read_fact(&mut self, env: &mut Environment) -> Result<Option<FactLiteral>, ScanError> {
        match self.next_token(env)? {
            Token::Eof => return Ok(None),
            Token::LParen => {}
            other => return Err(self.unexpected(&other, "'('", env)),
        }

        let template = match self.next_token(env)? {
            Token::Symbol(atom) => atom,
            Token::Eof => return Err(self.eof()),
            other => return Err(self.unexpected(&other, "a template name", env)),
        };

        let fields = self.read_fields(env, 0)?;
        Ok(Some(FactLiteral { template, fields }))
    }

    /// Fields up to and including the closing parenthesis. `nesting` counts
    /// the enclosing multifields.
    fn read_fields(
        &mut self,
        env: &mut Environment,
        nesting: usize,
    ) -> Result<Vec<Field>, ScanError> {
        let mut fields = Vec::new();
        loop {
            let field = match self.next_token(env)? {
                Token::RParen => return Ok(fields),
                Token::Eof => return Err(self.eof()),
                Token::LParen if nesting >= MAX_NESTING => {
                    let (line, column) = self.position();
                    return Err(ScanError::NestingTooDeep { line, column });
                }
                Token::LParen => Field::Multifield(self.read_fields(env, nesting + 1)?),
                Token::Symbol(atom) => Field::Symbol(atom),
                Token::String(atom) => Field::String(atom),
                Token::Integer(atom) => Field::Integer(atom),
                Token::Float(atom) => Field::Float(atom),
            };
            fields.push(field);
        }
    }

    fn unexpected(&self, token: &Token, expected: &'static str, env: &Environment) -> ScanError {
        let (line, column) = self.position();
        ScanError::UnexpectedToken {
            found: token.describe(env),
            expected,
            line,
            column,
        }
    }

    fn eof(&self) -> ScanError {
        let (line, column) = self.position();
        ScanError::UnexpectedEof { line, column }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str, env: &mut Environment) -> Vec<Token> {
        Scanner::new(input).tokenize(env).unwrap()
    }

    #[test]
    fn test_scanner_parens_and_symbols() {
        let mut env = Environment::default();
        let tokens = scan("(foo bar-baz)", &mut env);
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], Token::LParen);
        assert_eq!(tokens[1], Token::Symbol(env.intern_symbol("foo")));
        assert_eq!(tokens[2], Token::Symbol(env.intern_symbol("bar-baz")));
        assert_eq!(tokens[3], Token::RParen);
    }

    #[test]
    fn test_scanner_interns_once() {
        let mut env = Environment::default();
        let tokens = scan("foo foo", &mut env);
        assert_eq!(tokens[0], tokens[1]);
    }

    #[test]
    fn test_scanner_numbers() {
        let mut env = Environment::default();
        let tokens = scan("42 -7 +3 2.5 .5 1. 1e3 -2.5E-2", &mut env);
        let expected = [
            Token::Integer(env.intern_integer(42)),
            Token::Integer(env.intern_integer(-7)),
            Token::Integer(env.intern_integer(3)),
            Token::Float(env.intern_float(2.5)),
            Token::Float(env.intern_float(0.5)),
            Token::Float(env.intern_float(1.0)),
            Token::Float(env.intern_float(1000.0)),
            Token::Float(env.intern_float(-0.025)),
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_scanner_number_lookalikes_are_symbols() {
        let mut env = Environment::default();
        let tokens = scan("+ - . 1e inf NaN 12abc +oo", &mut env);
        for token in &tokens {
            assert!(matches!(token, Token::Symbol(_)), "{:?}", token);
        }
        assert_eq!(tokens[7], Token::Symbol(env.specials().positive_infinity));
    }

    #[test]
    fn test_scanner_strings_share_symbol_table() {
        let mut env = Environment::default();
        let tokens = scan(r#""say \"hi\"" "foo" foo"#, &mut env);
        let Token::String(said) = tokens[0] else {
            panic!("expected string, got {:?}", tokens[0]);
        };
        assert_eq!(env.symbol_text(said), "say \"hi\"");
        let (Token::String(a), Token::Symbol(b)) = (tokens[1], tokens[2]) else {
            panic!("unexpected tokens {:?}", tokens);
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_scanner_comments() {
        let mut env = Environment::default();
        let tokens = scan("; header\n(a ; trailing\n b)", &mut env);
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_scanner_unterminated_string() {
        let mut env = Environment::default();
        let err = Scanner::new("\n  \"open").tokenize(&mut env).unwrap_err();
        assert_eq!(err, ScanError::UnterminatedString { line: 2, column: 3 });
    }

    #[test]
    fn test_scanner_integer_overflow() {
        let mut env = Environment::default();
        let err = Scanner::new("99999999999999999999")
            .tokenize(&mut env)
            .unwrap_err();
        assert!(matches!(err, ScanError::IntegerOverflow { .. }));
    }

    #[test]
    fn test_read_fact_nested() {
        let mut env = Environment::default();
        let mut scanner = Scanner::new("(point 1 (x y) \"s\")\n(empty)");

        let fact = scanner.read_fact(&mut env).unwrap().unwrap();
        assert_eq!(env.symbol_text(fact.template), "point");
        assert_eq!(fact.fields.len(), 3);
        assert_eq!(fact.fields[0], Field::Integer(env.intern_integer(1)));
        let Field::Multifield(inner) = &fact.fields[1] else {
            panic!("expected multifield, got {:?}", fact.fields[1]);
        };
        assert_eq!(inner.len(), 2);
        assert!(matches!(fact.fields[2], Field::String(_)));

        let empty = scanner.read_fact(&mut env).unwrap().unwrap();
        assert!(empty.fields.is_empty());
        assert!(scanner.read_fact(&mut env).unwrap().is_none());
    }

    #[test]
    fn test_read_fact_errors() {
        let mut env = Environment::default();
        let err = Scanner::new("point 1)").read_fact(&mut env).unwrap_err();
        assert!(err.to_string().contains("expected '('"));

        let err = Scanner::new("(1 2)").read_fact(&mut env).unwrap_err();
        assert!(err.to_string().contains("a template name"));

        let err = Scanner::new("(point (1 2)").read_fact(&mut env).unwrap_err();
        assert!(matches!(err, ScanError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_read_fact_nesting_limit() {
        let mut env = Environment::default();
        let nested = |n: usize| format!("(a {}{})", "(".repeat(n), ")".repeat(n));

        let fact = Scanner::new(&nested(MAX_NESTING))
            .read_fact(&mut env)
            .unwrap()
            .unwrap();
        assert_eq!(fact.fields.len(), 1);

        let err = Scanner::new(&nested(MAX_NESTING + 1))
            .read_fact(&mut env)
            .unwrap_err();
        assert!(matches!(err, ScanError::NestingTooDeep { line: 1, .. }));

        let err = Scanner::new(&format!("(a {}", "(".repeat(200_000)))
            .read_fact(&mut env)
            .unwrap_err();
        assert!(matches!(err, ScanError::NestingTooDeep { .. }));
    }
}
