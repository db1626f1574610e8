//! Arithmetic evaluator
//!
//! Evaluates a restricted expression language: decimal numbers, `+ - * /`,
//! floor division `//`, exponent `**`, unary signs and parentheses. Nothing
//! outside `0-9 . + - * / ( ) space` is ever parsed. All failures come back as
//! `Error: ...` strings.

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use thiserror::Error;

const ALLOWED_CHARS: &str = "0123456789.+-*/() ";
const MAX_NESTING: usize = 200;
/// Largest integer result, in bits (about 19,700 decimal digits)
const MAX_INT_BITS: u64 = 1 << 16;

pub const INVALID_CHARACTERS: &str =
    "Error: Expression contains invalid characters. Only numbers and +, -, *, /, (), . allowed.";

#[derive(Debug, Error, PartialEq)]
enum EvalError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid mathematical expression")]
    Syntax,

    #[error("Numerical result out of range")]
    OutOfRange,

    #[error("Result is not a real number")]
    NotReal,
}

/// Evaluate `expression` and format the result.
///
/// Whole results print without a fractional part, other floats are rounded
/// to two decimals.
pub fn evaluate(expression: &str) -> String {
    let expression = expression.trim();

    if !expression.chars().all(|c| ALLOWED_CHARS.contains(c)) {
        return INVALID_CHARACTERS.to_string();
    }

    match eval_expression(expression).and_then(format_number) {
        Ok(formatted) => formatted,
        Err(e) => format!("Error: {}", e),
    }
}

/// Integers are exact and unbounded; floats are IEEE doubles
#[derive(Debug, Clone, PartialEq)]
enum Number {
    Int(BigInt),
    Float(f64),
}

impl Number {
    fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => i.to_f64().unwrap_or(f64::NAN),
            Number::Float(f) => *f,
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Number::Int(i) => i.is_zero(),
            Number::Float(f) => *f == 0.0,
        }
    }
}

fn format_number(n: Number) -> Result<String, EvalError> {
    match n {
        Number::Int(i) if i.bits() > MAX_INT_BITS => Err(EvalError::OutOfRange),
        Number::Int(i) => Ok(i.to_string()),
        Number::Float(f) if !f.is_finite() => Err(EvalError::OutOfRange),
        Number::Float(f) if f == 0.0 => Ok("0".to_string()),
        Number::Float(f) if f.fract() == 0.0 => Ok(format!("{:.0}", f)),
        Number::Float(f) => Ok(format!("{:.2}", f)),
    }
}

//
// ================= Tokenizer =================
//

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            ' ' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if next == Some('*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
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
            '0'..='9' | '.' => {
                let start = i;
                let mut seen_dot = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || (chars[i] == '.' && !seen_dot)) {
                    seen_dot |= chars[i] == '.';
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_literal(&literal)?));
            }
            _ => return Err(EvalError::Syntax),
        }
    }

    Ok(tokens)
}

fn parse_literal(literal: &str) -> Result<Number, EvalError> {
    if literal == "." {
        return Err(EvalError::Syntax);
    }

    if literal.contains('.') {
        return literal
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| EvalError::Syntax);
    }

    // Leading zeros are only valid for zero itself ("00" but not "07")
    if literal.len() > 1 && literal.starts_with('0') && literal.chars().any(|c| c != '0') {
        return Err(EvalError::Syntax);
    }

    literal
        .parse::<BigInt>()
        .map(Number::Int)
        .map_err(|_| EvalError::Syntax)
}

//
// ================= Parser =================
//
// expr   := term (('+' | '-') term)*
// term   := unary (('*' | '/' | '//') unary)*
// unary  := ('+' | '-') unary | power
// power  := atom ('**' unary)?
// atom   := NUMBER | '(' expr ')'

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn eval_expression(input: &str) -> Result<Number, EvalError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::Syntax);
    }
    Ok(value)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Number, EvalError> {
        let mut value = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                value = add(value, self.term()?);
            } else if self.eat(&Token::Minus) {
                value = sub(value, self.term()?);
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<Number, EvalError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                value = mul(value, self.unary()?);
            } else if self.eat(&Token::Slash) {
                value = div(value, self.unary()?)?;
            } else if self.eat(&Token::DoubleSlash) {
                value = floor_div(value, self.unary()?)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<Number, EvalError> {
        self.enter()?;
        let value = if self.eat(&Token::Minus) {
            self.unary().map(negate)
        } else if self.eat(&Token::Plus) {
            self.unary()
        } else {
            self.power()
        };
        self.depth -= 1;
        value
    }

    fn power(&mut self) -> Result<Number, EvalError> {
        let base = self.atom()?;
        if self.eat(&Token::DoubleStar) {
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number, EvalError> {
        match self.peek().cloned() {
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                self.enter()?;
                let value = self.expr()?;
                self.depth -= 1;
                if !self.eat(&Token::RParen) {
                    return Err(EvalError::Syntax);
                }
                Ok(value)
            }
            _ => Err(EvalError::Syntax),
        }
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(EvalError::Syntax);
        }
        Ok(())
    }
}

//
// ================= Arithmetic =================
//

fn add(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Number::Int(x + y),
        (a, b) => Number::Float(a.as_f64() + b.as_f64()),
    }
}

fn sub(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Number::Int(x - y),
        (a, b) => Number::Float(a.as_f64() - b.as_f64()),
    }
}

fn mul(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Number::Int(x * y),
        (a, b) => Number::Float(a.as_f64() * b.as_f64()),
    }
}

fn negate(a: Number) -> Number {
    match a {
        Number::Int(i) => Number::Int(-i),
        Number::Float(f) => Number::Float(-f),
    }
}

fn div(a: Number, b: Number) -> Result<Number, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

/// Rounds toward negative infinity, for ints and floats alike
fn floor_div(a: Number, b: Number) -> Result<Number, EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }

    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let quotient = &x / &y;
            let remainder = &x % &y;
            if !remainder.is_zero() && remainder.is_negative() != y.is_negative() {
                Ok(Number::Int(quotient - BigInt::one()))
            } else {
                Ok(Number::Int(quotient))
            }
        }
        (a, b) => Ok(Number::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number, EvalError> {
    if base.is_zero() && exponent.as_f64() < 0.0 {
        return Err(EvalError::DivisionByZero);
    }

    if let (Number::Int(b), Number::Int(e)) = (&base, &exponent) {
        if !e.is_negative() {
            return int_pow(b, e).map(Number::Int);
        }
    }

    let (b, e) = (base.as_f64(), exponent.as_f64());
    if b < 0.0 && e.fract() != 0.0 {
        return Err(EvalError::NotReal);
    }

    let value = b.powf(e);
    if !value.is_finite() {
        return Err(EvalError::OutOfRange);
    }
    Ok(Number::Float(value))
}

fn int_pow(base: &BigInt, exponent: &BigInt) -> Result<BigInt, EvalError> {
    // 0, 1 and -1 stay small for any exponent
    if base.abs() <= BigInt::one() {
        if exponent.is_zero() || base.is_one() {
            return Ok(BigInt::one());
        }
        if base.is_zero() {
            return Ok(BigInt::zero());
        }
        let odd = !(exponent % BigInt::from(2)).is_zero();
        return Ok(if odd { -BigInt::one() } else { BigInt::one() });
    }

    let exponent = exponent
        .to_u32()
        .filter(|e| base.bits().saturating_mul(u64::from(*e)) <= MAX_INT_BITS)
        .ok_or(EvalError::OutOfRange)?;
    Ok(base.pow(exponent))
}
