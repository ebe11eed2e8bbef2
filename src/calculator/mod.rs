//! Arithmetic expressions: validation, shunting-yard conversion to RPN,
//! evaluation, and compilation into dispatchable operations.

pub mod compiler;
pub mod evaluator;
pub mod rpn;
pub mod token;

pub use compiler::{Operation, compile};
pub use evaluator::{evaluate, evaluate_rpn, parse_number, strip_whitespace, validate};
pub use rpn::{Rpn, to_rpn};
pub use token::{Operator, Token};

use crate::error::EvalError;

/// Validate then evaluate; the synchronous `/calculate` path.
pub fn calculate(expr: &str) -> Result<f64, EvalError> {
    validate(expr)?;
    evaluate(expr)
}

/// The single binary operation a worker performs on wire-format operands.
pub fn apply_binary(arg1: &str, operation: &str, arg2: &str) -> Result<f64, EvalError> {
    let a = parse_number(arg1)?;
    let b = parse_number(arg2)?;
    Operator::from_symbol(operation)?.apply(a, b)
}
