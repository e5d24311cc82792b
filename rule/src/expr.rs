//! A small, closed expression mini-language used inside `{...}` template spans.
//!
//! Grammar:
//!   expr    := postfix
//!   postfix := primary ( '(' args ')' | '[' expr ']' )*
//!   primary := IDENT | NUMBER | STRING | '(' expr ')'
//!   args    := (expr (',' expr)*)?
//!
//! Deliberately closed (DESIGN NOTES: "Keep it closed") -- no arithmetic, no control flow, no
//! arbitrary code. Just enough to resolve rule attributes and call the handful of registered
//! helpers (`len`, `glob`, `swap_ext`, `run_cmd`, `color`).

use crate::value::{ExprError, Value};
use crate::Rule;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("trailing input after expression")]
    TrailingInput,
}

fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut chars = src.chars().peekable();
    let mut tokens = Vec::new();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => s.push(c),
                        None => return Err(ParseError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || (c == '-' && tokens.is_empty()) => {
                let mut s = String::new();
                s.push(c);
                chars.next();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n: f64 = s.parse().map_err(|_| ParseError::UnexpectedChar(c))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(s));
            }
            other => return Err(ParseError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    rule: &'a Rule,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn parse_expr(&mut self) -> Result<Value, ExprError> {
        let mut value = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.advance();
                    let args = self.parse_args()?;
                    value = self.call(value, args)?;
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect_token(Token::RBracket)?;
                    value = index_value(&value, &index)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_args(&mut self) -> Result<Vec<Value>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(ExprError::Other("expected ',' or ')'".to_string())),
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Value, ExprError> {
        match self.advance().cloned() {
            Some(Token::Ident(name)) => Ok(self.rule.get(&name)),
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::LParen) => {
                let v = self.parse_expr()?;
                self.expect_token(Token::RParen)?;
                Ok(v)
            }
            other => Err(ExprError::Other(format!("unexpected token {other:?}"))),
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.advance() == Some(&expected) {
            Ok(())
        } else {
            Err(ExprError::Other(format!("expected {expected:?}")))
        }
    }

    fn call(&self, callee: Value, args: Vec<Value>) -> Result<Value, ExprError> {
        match callee {
            Value::Helper(f) => f(&args),
            other => Err(ExprError::NotCallable(other.to_plain_string())),
        }
    }
}

fn index_value(value: &Value, index: &Value) -> Result<Value, ExprError> {
    let i = match index {
        Value::Number(n) => *n as usize,
        _ => return Err(ExprError::Other("index must be a number".to_string())),
    };
    match value {
        Value::List(items) => items
            .get(i)
            .cloned()
            .ok_or(ExprError::IndexOutOfRange(i)),
        _ => Err(ExprError::NotIndexable),
    }
}

/// Evaluates `source` (the text between `{` and `}`, already stripped of braces) against `rule`.
pub fn eval(rule: &Rule, source: &str) -> Result<Value, ExprError> {
    let tokens = lex(source).map_err(|e| ExprError::Other(e.to_string()))?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        rule,
    };
    let value = parser.parse_expr()?;
    if parser.pos != tokens.len() {
        return Err(ExprError::Other(ParseError::TrailingInput.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Rule;

    #[test]
    fn test_identifier_lookup() {
        let rule = Rule::root();
        rule.set("x", Value::string("hello"));
        match eval(&rule, "x").unwrap() {
            Value::String(s) => assert_eq!(s, "hello"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_identifier_is_null() {
        let rule = Rule::root();
        assert!(matches!(eval(&rule, "nope").unwrap(), Value::Null));
    }

    #[test]
    fn test_index() {
        let rule = Rule::root();
        rule.set("files_in", Value::list([Value::string("a.c"), Value::string("b.c")]));
        match eval(&rule, "files_in[1]").unwrap() {
            Value::String(s) => assert_eq!(s, "b.c"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_len_helper() {
        let rule = Rule::root();
        rule.set(
            "files_in",
            Value::list([Value::string("a.c"), Value::string("b.c")]),
        );
        match eval(&rule, "len(files_in)").unwrap() {
            Value::Number(n) => assert_eq!(n, 2.0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
