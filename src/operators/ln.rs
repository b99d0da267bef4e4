//! Natural logarithm rule.
//!
//! The logarithm is only defined for strictly positive arguments; evaluating
//! it anywhere else is an error rather than a silent NaN.

use crate::errors::{ConstructionError, EvaluationError};
use crate::symbol::Symbol;

pub(crate) fn eval(x: f64) -> Result<f64, EvaluationError> {
    if x > 0.0 || x.is_nan() {
        Ok(x.ln())
    } else {
        Err(EvaluationError::OutOfDomain {
            function: "ln",
            value: x,
        })
    }
}

/// d/dx(ln(f)) = 1/f
pub(crate) fn derivative(arg: &Symbol) -> Result<Symbol, ConstructionError> {
    Symbol::one().try_div(arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval() {
        assert_eq!(eval(1.0), Ok(0.0));
        assert_eq!(
            eval(0.0),
            Err(EvaluationError::OutOfDomain {
                function: "ln",
                value: 0.0
            })
        );
        assert!(eval(-2.0).is_err());
    }
}
