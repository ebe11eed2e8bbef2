//! Compiles a submitted expression into the unit of work a worker receives.
//!
//! An expression that reduces to exactly one binary operation over two
//! literals is shipped as `arg1 <op> arg2`. Anything larger is shipped whole
//! and evaluated by the worker in a single round-trip; expressions are never
//! split into dependent sub-tasks.

use crate::calculator::evaluator::{evaluate_rpn, strip_whitespace, validate};
use crate::calculator::rpn::to_rpn;
use crate::calculator::token::{Operator, Token};
use crate::error::EvalError;

/// A dispatchable unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// A single binary operation. Operands keep their source text.
    Binary {
        arg1: String,
        op: Operator,
        arg2: String,
    },
    /// A whitespace-free expression evaluated as a whole.
    Expression(String),
}

impl Operation {
    /// Compute this operation locally.
    pub fn compute(&self) -> Result<f64, EvalError> {
        match self {
            Operation::Binary { arg1, op, arg2 } => {
                crate::calculator::apply_binary(arg1, op.symbol(), arg2)
            }
            Operation::Expression(expr) => crate::calculator::evaluate(expr),
        }
    }
}

/// Validate, convert and classify `expr`.
///
/// The converted form is also evaluated once so structurally invalid input
/// and constant division by zero are rejected before anything is enqueued.
pub fn compile(expr: &str) -> Result<Operation, EvalError> {
    validate(expr)?;
    let stripped = strip_whitespace(expr);
    let rpn = to_rpn(&stripped)?;
    evaluate_rpn(&rpn)?;

    match rpn.as_slice() {
        [Token::Number(arg1), Token::Number(arg2), Token::Op(op)] => Ok(Operation::Binary {
            arg1: arg1.clone(),
            op: *op,
            arg2: arg2.clone(),
        }),
        _ => Ok(Operation::Expression(stripped)),
    }
}
