//! Expression validation and postfix evaluation.

use std::sync::LazyLock;

use regex::Regex;

use crate::calculator::rpn::{Rpn, to_rpn};
use crate::calculator::token::Token;
use crate::error::EvalError;

/// Digits, whitespace, parentheses, the four operators and decimal points.
static VALID_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9\s()+\-*/.]+$").expect("expression pattern compiles"));

/// Reject input outside the accepted character class before any parsing.
pub fn validate(expr: &str) -> Result<(), EvalError> {
    if expr.trim().is_empty() {
        return Err(EvalError::Empty);
    }
    if VALID_EXPRESSION.is_match(expr) {
        return Ok(());
    }
    let bad = expr
        .chars()
        .find(|c| !(c.is_ascii_digit() || c.is_whitespace() || "()+-*/.".contains(*c)));
    Err(bad.map_or(EvalError::Empty, EvalError::InvalidCharacter))
}

/// Drop all whitespace; it carries no meaning in an expression.
pub fn strip_whitespace(expr: &str) -> String {
    expr.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Evaluate an infix arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, EvalError> {
    let rpn = to_rpn(&strip_whitespace(expr))?;
    evaluate_rpn(&rpn)
}

/// Evaluate a postfix token sequence with a value stack.
pub fn evaluate_rpn(rpn: &Rpn) -> Result<f64, EvalError> {
    let mut stack: Vec<f64> = Vec::with_capacity(rpn.len());

    for token in rpn.iter() {
        match token {
            Token::Number(text) => stack.push(parse_number(text)?),
            Token::Op(op) => {
                let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                    return Err(EvalError::InvalidExpression);
                };
                stack.push(op.apply(a, b)?);
            }
        }
    }

    match stack.as_slice() {
        [value] => Ok(*value),
        _ => Err(EvalError::InvalidExpression),
    }
}

/// Parse a decimal operand as sent over the wire or produced by the tokenizer.
pub fn parse_number(text: &str) -> Result<f64, EvalError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(EvalError::InvalidNumber(text.to_string()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| EvalError::InvalidNumber(text.to_string()))
}
