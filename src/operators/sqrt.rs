//! Square root rule.

use crate::errors::{ConstructionError, EvaluationError};
use crate::symbol::Symbol;

pub(crate) fn eval(x: f64) -> Result<f64, EvaluationError> {
    if x < 0.0 {
        return Err(EvaluationError::OutOfDomain {
            function: "sqrt",
            value: x,
        });
    }
    Ok(x.sqrt())
}

/// d/dx(sqrt(f)) = 1/(2*sqrt(f))
pub(crate) fn derivative(arg: &Symbol) -> Result<Symbol, ConstructionError> {
    Symbol::scalar(0.5).try_div(&arg.sqrt())
}
