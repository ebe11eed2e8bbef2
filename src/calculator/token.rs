//! Tokens and the binary operator set.

use std::fmt;

use crate::error::EvalError;

/// One of the four supported binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    /// Map an input character to an operator.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            _ => None,
        }
    }

    /// Parse the wire symbol (`"+"`, `"-"`, `"*"`, `"/"`).
    pub fn from_symbol(s: &str) -> Result<Self, EvalError> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::from_char(c).ok_or_else(|| EvalError::UnknownOperator(s.to_string()))
            }
            _ => Err(EvalError::UnknownOperator(s.to_string())),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
        }
    }

    /// Binding strength. Parenthesis markers sit at 0 and are never compared.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Add | Operator::Sub => 1,
            Operator::Mul | Operator::Div => 2,
        }
    }

    /// Compute `a <op> b`. Results outside the finite `f64` range are errors.
    pub fn apply(self, a: f64, b: f64) -> Result<f64, EvalError> {
        let value = match self {
            Operator::Add => a + b,
            Operator::Sub => a - b,
            Operator::Mul => a * b,
            Operator::Div => {
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                a / b
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::Overflow)
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A postfix token. Numbers keep their source text until evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(String),
    Op(Operator),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(text) => f.write_str(text),
            Token::Op(op) => op.fmt(f),
        }
    }
}
