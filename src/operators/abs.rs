//! Absolute value rule.

use crate::errors::ConstructionError;
use crate::symbol::Symbol;

pub(crate) fn eval(x: f64) -> f64 {
    x.abs()
}

/// d/dx|f| = f/|f|, undefined at zero
pub(crate) fn derivative(arg: &Symbol) -> Result<Symbol, ConstructionError> {
    arg.try_div(&arg.abs())
}
