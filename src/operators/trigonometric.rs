//! Trigonometric and hyperbolic function rules.
//!
//! All trigonometric functions expect arguments in radians.

use crate::errors::ConstructionError;
use crate::symbol::Symbol;

pub(crate) fn sin(x: f64) -> f64 {
    x.sin()
}

pub(crate) fn cos(x: f64) -> f64 {
    x.cos()
}

pub(crate) fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// d/dx(sin(f)) = cos(f)
pub(crate) fn sin_derivative(arg: &Symbol) -> Symbol {
    arg.cos()
}

/// d/dx(cos(f)) = -sin(f)
pub(crate) fn cos_derivative(arg: &Symbol) -> Symbol {
    arg.sin().negate()
}

/// d/dx(tanh(f)) = 1 - tanh(f)^2
pub(crate) fn tanh_derivative(arg: &Symbol) -> Result<Symbol, ConstructionError> {
    Symbol::one().try_sub(&arg.tanh().try_pow(&Symbol::scalar(2.0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivative_forms() {
        let a = Symbol::state_vector(0..1).unwrap();
        assert_eq!(sin_derivative(&a).to_string(), "cos(y[0:1])");
        assert_eq!(cos_derivative(&a).to_string(), "-sin(y[0:1])");
        assert_eq!(
            tanh_derivative(&a).unwrap().to_string(),
            "(1 - (tanh(y[0:1]) ** 2))"
        );
    }
}
