//! Shunting-yard conversion from infix text to postfix tokens.

use std::fmt;

use crate::calculator::token::{Operator, Token};
use crate::error::EvalError;

/// A postfix token sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rpn(pub Vec<Token>);

impl std::ops::Deref for Rpn {
    type Target = Vec<Token>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Rpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            token.fmt(f)?;
            first = false;
        }
        Ok(())
    }
}

/// Operator-stack entry.
enum Pending {
    LParen,
    Op(Operator),
}

/// Tokenize `expr` and convert it to postfix in one left-to-right scan.
///
/// Whitespace must already be stripped; any whitespace left here is reported
/// as an invalid character.
pub fn to_rpn(expr: &str) -> Result<Rpn, EvalError> {
    let mut output = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if is_number_char(c) => {
                let mut text = String::from(c);
                while let Some(next) = chars.next_if(|n| is_number_char(*n)) {
                    text.push(next);
                }
                output.push(Token::Number(text));
            }
            '(' => stack.push(Pending::LParen),
            ')' => loop {
                match stack.pop() {
                    Some(Pending::Op(op)) => output.push(Token::Op(op)),
                    Some(Pending::LParen) => break,
                    None => return Err(EvalError::MismatchedParentheses),
                }
            },
            c => {
                let op = Operator::from_char(c).ok_or(EvalError::InvalidCharacter(c))?;
                // `>=` keeps equal-precedence operators left-associative.
                while let Some(Pending::Op(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(Token::Op(*top));
                    stack.pop();
                }
                stack.push(Pending::Op(op));
            }
        }
    }

    while let Some(entry) = stack.pop() {
        match entry {
            Pending::Op(op) => output.push(Token::Op(op)),
            Pending::LParen => return Err(EvalError::MismatchedParentheses),
        }
    }

    Ok(Rpn(output))
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}
