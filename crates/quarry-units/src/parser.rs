//! Recursive-descent parser for unit and dimension expressions.
//!
//! Grammar (whitespace is ignored):
//!
//! ```text
//! expr     := term (('*' | '/') term)*
//! term     := atom (('**' | '^') exponent)?
//! atom     := SYMBOL | NUMBER | '(' expr ')'
//! exponent := ['+' | '-'] (NUMBER | '(' ['-'] NUMBER ['/' NUMBER] ')')
//! ```
//!
//! Symbols are resolved through a caller-supplied lookup so the same
//! parser serves unit strings (`"g/cm**3"`) and dimension strings
//! (`"mass/length**3"`).

use crate::dimensions::Dimensions;
use crate::error::UnitError;
use crate::rational::Rational;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Symbol(String),
    Number(f64),
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
    Minus,
    Plus,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, UnitError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '-' || chars[j] == '+') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| UnitError::Syntax {
                    expr: expr.to_string(),
                    reason: format!("invalid number '{text}'"),
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Symbol(chars[start..i].iter().collect()));
            }
            other => {
                return Err(UnitError::Syntax {
                    expr: expr.to_string(),
                    reason: format!("unexpected character '{other}'"),
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a, F> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    lookup: F,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<(f64, Dimensions)>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn syntax(&self, reason: impl Into<String>) -> UnitError {
        UnitError::Syntax {
            expr: self.expr.to_string(),
            reason: reason.into(),
        }
    }

    fn expr(&mut self) -> Result<(f64, Dimensions), UnitError> {
        let (mut scale, mut dims) = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    let (s, d) = self.term()?;
                    scale *= s;
                    dims = dims
                        .checked_multiply(&d)
                        .ok_or_else(|| self.syntax("dimension exponent overflow"))?;
                }
                Some(Token::Slash) => {
                    self.next();
                    let (s, d) = self.term()?;
                    scale /= s;
                    dims = dims
                        .checked_divide(&d)
                        .ok_or_else(|| self.syntax("dimension exponent overflow"))?;
                }
                _ => return Ok((scale, dims)),
            }
        }
    }

    fn term(&mut self) -> Result<(f64, Dimensions), UnitError> {
        let (scale, dims) = self.atom()?;
        if self.peek() == Some(&Token::Pow) {
            self.next();
            let exponent = self.exponent()?;
            let dims = dims
                .checked_pow(exponent)
                .ok_or_else(|| self.syntax("dimension exponent overflow"))?;
            return Ok((scale.powf(exponent.to_f64()), dims));
        }
        Ok((scale, dims))
    }

    fn atom(&mut self) -> Result<(f64, Dimensions), UnitError> {
        match self.next() {
            Some(Token::Symbol(symbol)) => {
                (self.lookup)(&symbol).ok_or_else(|| UnitError::UnknownSymbol {
                    symbol,
                    expr: self.expr.to_string(),
                })
            }
            Some(Token::Number(value)) => Ok((value, Dimensions::DIMENSIONLESS)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.syntax("missing ')'")),
                }
            }
            Some(other) => Err(self.syntax(format!("unexpected token {other:?}"))),
            None => Err(self.syntax("unexpected end of expression")),
        }
    }

    fn signed_number(&mut self) -> Result<f64, UnitError> {
        let mut sign = 1.0;
        loop {
            match self.next() {
                Some(Token::Minus) => sign = -sign,
                Some(Token::Plus) => {}
                Some(Token::Number(value)) => return Ok(sign * value),
                _ => return Err(self.syntax("expected a numeric exponent")),
            }
        }
    }

    fn exponent(&mut self) -> Result<Rational, UnitError> {
        let value = if self.peek() == Some(&Token::LParen) {
            self.next();
            let num = self.signed_number()?;
            let value = if self.peek() == Some(&Token::Slash) {
                self.next();
                let denom = self.signed_number()?;
                if denom == 0.0 {
                    return Err(self.syntax("zero denominator in exponent"));
                }
                num / denom
            } else {
                num
            };
            match self.next() {
                Some(Token::RParen) => value,
                _ => return Err(self.syntax("missing ')' after exponent")),
            }
        } else {
            self.signed_number()?
        };
        Rational::from_f64(value).ok_or_else(|| self.syntax(format!("unsupported exponent {value}")))
    }
}

/// Parse `expr` into `(cgs scale, dimensions)` using `lookup` for symbols.
///
/// An empty expression is dimensionless with scale 1.
pub(crate) fn parse_expression<F>(expr: &str, lookup: F) -> Result<(f64, Dimensions), UnitError>
where
    F: Fn(&str) -> Option<(f64, Dimensions)>,
{
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Ok((1.0, Dimensions::DIMENSIONLESS));
    }
    let mut parser = Parser {
        expr,
        tokens,
        pos: 0,
        lookup,
    };
    let parsed = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.syntax("trailing input"));
    }
    Ok(parsed)
}

/// Parse a dimension expression: a named dimension (`"density"`) or an
/// expression over named dimensions (`"mass/length**3"`).
pub fn parse_dimensions(expr: &str) -> Result<Dimensions, UnitError> {
    parse_expression(expr, |name| Dimensions::named(name).map(|d| (1.0, d)))
        .map(|(_, dims)| dims)
        .map_err(|_| UnitError::UnknownDimension {
            name: expr.to_string(),
        })
}
