//! Power rule.
//!
//! Powers are always evaluated with `powf`, whatever the exponent. The
//! derivative picks the cheapest form of the general power rule that the
//! zero pattern of the operand derivatives allows, so `ln(base)` is only
//! built when the exponent actually varies.

use crate::errors::{ConstructionError, EvaluationError};
use crate::simplify;
use crate::symbol::Symbol;

pub(crate) fn eval(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

/// Checks a power result: finite operands must give a finite value.
pub(crate) fn check(base: f64, exponent: f64, value: f64) -> Result<f64, EvaluationError> {
    if !value.is_finite() && base.is_finite() && exponent.is_finite() {
        return Err(EvaluationError::NonFinite {
            operation: "power",
        });
    }
    Ok(value)
}

/// Derivative of `base ** exponent`, given the derivatives of both operands.
pub(crate) fn derivative(
    base: &Symbol,
    exponent: &Symbol,
    dbase: &Symbol,
    dexponent: &Symbol,
) -> Result<Symbol, ConstructionError> {
    match (dbase.is_zero(), dexponent.is_zero()) {
        (true, true) => Ok(Symbol::zero()),
        // d/dx(f^c) = c * f^(c-1) * df/dx
        (false, true) => {
            let reduced = simplify::sub(exponent, &Symbol::one())?;
            let power = simplify::pow(base, &reduced)?;
            simplify::mul(&simplify::mul(exponent, &power)?, dbase)
        }
        // d/dx(c^g) = c^g * ln(c) * dg/dx
        (true, false) => {
            let power = simplify::pow(base, exponent)?;
            simplify::mul(&simplify::mul(&power, &base.ln())?, dexponent)
        }
        // d/dx(f^g) = f^g * (dg/dx * ln(f) + g * df/dx / f)
        (false, false) => {
            let power = simplify::pow(base, exponent)?;
            let from_exponent = simplify::mul(dexponent, &base.ln())?;
            let from_base = simplify::mul(exponent, &simplify::div(dbase, base)?)?;
            simplify::mul(&power, &simplify::add(&from_exponent, &from_base)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        assert_eq!(check(2.0, 3.0, eval(2.0, 3.0)), Ok(8.0));
        assert!(check(-8.0, 1.0 / 3.0, eval(-8.0, 1.0 / 3.0)).is_err());
        assert!(check(0.0, -1.0, eval(0.0, -1.0)).is_err());
        // non-finite inputs pass through
        assert!(check(f64::INFINITY, 2.0, eval(f64::INFINITY, 2.0)).is_ok());
    }

    #[test]
    fn test_constant_exponent_skips_ln() {
        let a = Symbol::state_vector(0..1).unwrap();
        let d = derivative(&a, &Symbol::scalar(3.0), &Symbol::one(), &Symbol::zero()).unwrap();
        assert_eq!(d.to_string(), "(3 * (y[0:1] ** 2))");
    }
}
