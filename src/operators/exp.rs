//! Exponential function rule.
//!
//! The exponential is defined everywhere, and is its own derivative.

use crate::symbol::Symbol;

pub(crate) fn eval(x: f64) -> f64 {
    x.exp()
}

/// d/dx(e^f) = e^f
pub(crate) fn derivative(arg: &Symbol) -> Symbol {
    arg.exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval() {
        assert_eq!(eval(0.0), 1.0);
        assert_eq!(eval(1.0), std::f64::consts::E);
    }

    #[test]
    fn test_derivative() {
        let a = Symbol::state_vector(0..1).unwrap();
        assert_eq!(derivative(&a), a.exp());
    }
}
