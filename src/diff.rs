//! Symbolic differentiation of symbol trees.
//!
//! Derivatives are taken with respect to a state vector (or, trivially, a
//! scalar). The derivative of a tree `f` with respect to a state vector `v` is
//! the directional derivative of `f` along the entries covered by `v`:
//!
//! - a state vector identical to `v` differentiates to 1, a disjoint one to 0
//! - a state vector strictly containing `v` differentiates to the indicator
//!   vector of `v` inside it, one Jacobian column
//! - constants, parameters and spatial variables differentiate to 0
//!
//! The rules implemented are:
//! - Sum rule: d/dx(f ± g) = df/dx ± dg/dx
//! - Product rule: d/dx(f * g) = df/dx * g + f * dg/dx
//! - Quotient rule: d/dx(f / g) = (df/dx * g - f * dg/dx) / g^2
//! - General power rule: d/dx(f^g) = f^g * (dg/dx * ln(f) + g * df/dx / f)
//! - Chain rule for every elementary function
//! - Linearity through matrix products, broadcasts and concatenations
//!
//! Zero derivatives are propagated while the result is built, so differentiating
//! with respect to a state the tree does not depend on returns `Symbol::zero()`
//! itself. Results are memoised per subtree and simplified before being returned.

use std::collections::HashMap;

use log::debug;
use ndarray::{s, Array1};

use crate::errors::{ConstructionError, ExpressionError, UnsupportedOperationError};
use crate::operators::pow;
use crate::simplify;
use crate::symbol::{Symbol, SymbolKind};

impl Symbol {
    /// Computes the symbolic derivative of this tree with respect to `variable`.
    ///
    /// # Arguments
    /// * `variable` - A state vector (or scalar) to differentiate with respect to
    ///
    /// # Returns
    /// A simplified tree representing the derivative
    ///
    /// # Errors
    /// - `UnsupportedOperationError::InvalidVariable` if `variable` is not a state vector or scalar
    /// - `UnsupportedOperationError::NoDerivativeRule` for variables, grad and div,
    ///   which must be discretised first
    /// - `ConstructionError::OverlappingStateVectors` if `variable` partially
    ///   overlaps a state vector in the tree
    ///
    /// # Example
    /// ```
    /// use battsym::prelude::*;
    ///
    /// let a = Symbol::state_vector(0..1).unwrap();
    /// let b = Symbol::state_vector(1..2).unwrap();
    /// let f = (&a * &b).sin();
    ///
    /// let df = f.diff(&a).unwrap();
    /// let value = df.evaluate(&State::new(&[5.0, 3.0])).unwrap();
    /// assert_eq!(value[[0, 0]], 15.0_f64.cos() * 3.0);
    /// ```
    pub fn diff(&self, variable: &Symbol) -> Result<Symbol, ExpressionError> {
        match variable.kind() {
            SymbolKind::StateVector(_) | SymbolKind::Scalar(_) => {}
            other => {
                return Err(UnsupportedOperationError::InvalidVariable(other.name()).into());
            }
        }

        let mut differentiator = Differentiator {
            variable,
            memo: HashMap::new(),
        };
        let derivative = differentiator.differentiate(self)?;
        let simplified = derivative.simplify();
        debug!(
            "d/d{variable} of a tree with id {:x}: {} memoised subtrees",
            self.id(),
            differentiator.memo.len()
        );
        Ok(simplified)
    }
}

struct Differentiator<'v> {
    variable: &'v Symbol,
    memo: HashMap<u64, (Symbol, Symbol)>,
}

impl Differentiator<'_> {
    fn differentiate(&mut self, symbol: &Symbol) -> Result<Symbol, ExpressionError> {
        if let Some((original, derivative)) = self.memo.get(&symbol.id()) {
            if original == symbol {
                return Ok(derivative.clone());
            }
        }
        let derivative = self.rule(symbol)?;
        self.memo
            .insert(symbol.id(), (symbol.clone(), derivative.clone()));
        Ok(derivative)
    }

    fn rule(&mut self, symbol: &Symbol) -> Result<Symbol, ExpressionError> {
        let derivative = match symbol.kind() {
            SymbolKind::Scalar(_) => {
                if symbol == self.variable {
                    Symbol::one()
                } else {
                    Symbol::zero()
                }
            }
            SymbolKind::StateVector(slice) => match self.variable.kind() {
                SymbolKind::StateVector(target) if target == slice => Symbol::one(),
                SymbolKind::StateVector(target) if slice.is_disjoint(target) => Symbol::zero(),
                SymbolKind::StateVector(target) if slice.contains(target) => {
                    let offset = slice.start();
                    let mut column = Array1::zeros(slice.len());
                    column
                        .slice_mut(s![target.start() - offset..target.stop() - offset])
                        .fill(1.0);
                    Symbol::vector(column, symbol.domain().clone())
                }
                SymbolKind::StateVector(target) => {
                    return Err(ConstructionError::OverlappingStateVectors {
                        first: *slice,
                        second: *target,
                    }
                    .into());
                }
                _ => Symbol::zero(),
            },
            SymbolKind::Parameter(_) | SymbolKind::Vector(_) => Symbol::zero(),
            SymbolKind::Variable(name) | SymbolKind::SpatialVariable { name, .. } => {
                return Err(UnsupportedOperationError::NoDerivativeRule {
                    kind: symbol.kind().name(),
                    name: name.clone(),
                }
                .into());
            }
            SymbolKind::Gradient(x) | SymbolKind::Divergence(x) => {
                return Err(UnsupportedOperationError::NoDerivativeRule {
                    kind: symbol.kind().name(),
                    name: x.to_string(),
                }
                .into());
            }

            SymbolKind::Neg(x) => {
                // d/dx(-f) = -(df/dx)
                simplify::neg(&self.differentiate(x)?)?
            }

            SymbolKind::Add(l, r) => {
                // d/dx(f + g) = df/dx + dg/dx
                simplify::add(&self.differentiate(l)?, &self.differentiate(r)?)?
            }

            SymbolKind::Sub(l, r) => {
                // d/dx(f - g) = df/dx - dg/dx
                simplify::sub(&self.differentiate(l)?, &self.differentiate(r)?)?
            }

            SymbolKind::Mul(l, r) => {
                // d/dx(f * g) = df/dx * g + f * dg/dx
                let dl = self.differentiate(l)?;
                let dr = self.differentiate(r)?;
                simplify::add(&simplify::mul(&dl, r)?, &simplify::mul(l, &dr)?)?
            }

            SymbolKind::Div(l, r) => {
                let dl = self.differentiate(l)?;
                let dr = self.differentiate(r)?;
                if dr.is_zero() {
                    // d/dx(f / c) = (df/dx) / c
                    simplify::div(&dl, r)?
                } else {
                    // d/dx(f / g) = (df/dx * g - f * dg/dx) / g^2
                    let numerator =
                        simplify::sub(&simplify::mul(&dl, r)?, &simplify::mul(l, &dr)?)?;
                    let denominator = simplify::pow(r, &Symbol::scalar(2.0))?;
                    simplify::div(&numerator, &denominator)?
                }
            }

            SymbolKind::Pow(base, exponent) => {
                let dbase = self.differentiate(base)?;
                let dexponent = self.differentiate(exponent)?;
                pow::derivative(base, exponent, &dbase, &dexponent)?
            }

            SymbolKind::Function(function, x) => {
                // d/dx(f(g)) = f'(g) * dg/dx
                let dx = self.differentiate(x)?;
                if dx.is_zero() {
                    Symbol::zero()
                } else {
                    simplify::mul(&function.derivative(x)?, &dx)?
                }
            }

            SymbolKind::MatMul(matrix, x) => {
                // d/dx(M @ f) = M @ df/dx
                let dx = self.differentiate(x)?;
                if dx.is_zero() {
                    Symbol::zero()
                } else {
                    simplify::simplify_node(&Symbol::matmul_shared(matrix.clone(), &dx)?)?
                }
            }

            SymbolKind::Broadcast { child, size } => {
                let dchild = self.differentiate(child)?;
                if dchild.is_zero() {
                    Symbol::zero()
                } else {
                    dchild.broadcast_sized(symbol.domain().clone(), *size)?
                }
            }

            SymbolKind::Concatenation(children) => {
                let derivatives = children
                    .iter()
                    .map(|child| self.differentiate(child))
                    .collect::<Result<Vec<_>, _>>()?;
                if derivatives.iter().all(|d| d.is_zero()) {
                    Symbol::zero()
                } else {
                    let parts = children
                        .iter()
                        .zip(derivatives)
                        .map(|(child, derivative)| fit_to_child(derivative, child))
                        .collect::<Result<Vec<_>, _>>()?;
                    Symbol::concatenate(parts)?
                }
            }
        };
        Ok(derivative)
    }
}

/// Places a child's derivative on the child's domain with the child's length,
/// so the derivatives can be concatenated in the child's place.
fn fit_to_child(derivative: Symbol, child: &Symbol) -> Result<Symbol, ConstructionError> {
    if derivative.domain() == child.domain() && derivative.len() == child.len() {
        return Ok(derivative);
    }
    match (child.len(), derivative.len(), derivative.as_scalar()) {
        (Some(n), Some(1), Some(value)) => Ok(Symbol::vector(
            Array1::from_elem(n, value),
            child.domain().clone(),
        )),
        (Some(n), Some(1), None) if derivative.domain().is_empty() => {
            derivative.broadcast_sized(child.domain().clone(), Some(n))
        }
        (Some(n), Some(1), None) => {
            simplify::mul(&derivative, &Symbol::vector(Array1::ones(n), child.domain().clone()))
        }
        _ if derivative.domain().is_empty() => {
            derivative.broadcast_sized(child.domain().clone(), child.len())
        }
        _ => Ok(derivative),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, NEGATIVE_ELECTRODE, POSITIVE_ELECTRODE, SEPARATOR};
    use crate::evaluate::State;
    use ndarray::array;
    use std::f64::consts::E;

    fn a() -> Symbol {
        Symbol::state_vector(0..1).unwrap()
    }

    fn b() -> Symbol {
        Symbol::state_vector(1..2).unwrap()
    }

    fn at(expr: &Symbol, y: &[f64]) -> f64 {
        expr.evaluate(&State::new(y)).unwrap()[[0, 0]]
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-12 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tolerance,
            "{actual} != {expected}"
        );
    }

    const Y: [f64; 2] = [5.0, 3.0];

    #[test]
    fn test_leaf_rules() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(a().diff(&a())?, Symbol::one());
        assert_eq!(a().diff(&b())?, Symbol::zero());
        assert_eq!(Symbol::scalar(4.0).diff(&a())?, Symbol::zero());
        assert_eq!(Symbol::parameter("k").diff(&a())?, Symbol::zero());
        Ok(())
    }

    #[test]
    fn test_power() -> Result<(), Box<dyn std::error::Error>> {
        let func = &a() * b().pow(a());

        let da = func.diff(&a())?;
        assert_close(at(&da, &Y), 3f64.powi(5) * (5.0 * 3f64.ln() + 1.0));

        let db = func.diff(&b())?;
        assert_eq!(at(&db, &Y), 5f64.powi(2) * 3f64.powi(4));
        Ok(())
    }

    #[test]
    fn test_quotient() -> Result<(), Box<dyn std::error::Error>> {
        let func = (&a() * 2.0 + 5.0 * (-b())) / (&a() * &b());

        assert_eq!(at(&func.diff(&a())?, &Y), 1.0 / 5.0);
        assert_eq!(at(&func.diff(&b())?, &Y), -2.0 / 9.0);
        Ok(())
    }

    #[test]
    fn test_chain_rule() -> Result<(), Box<dyn std::error::Error>> {
        let func = ((&a() * 4.0).cos() / 2.0).sin() * (4.0 * (&b() / 3.0).exp()).cos();

        let da = func.diff(&a())?;
        assert_eq!(at(&da, &Y), 0.21839018886839512);
        assert_close(
            at(&da, &Y),
            -2.0 * 20f64.sin() * (20f64.cos() / 2.0).cos() * (4.0 * E).cos(),
        );

        let db = func.diff(&b())?;
        assert_eq!(at(&db, &Y), 0.7289020009896687);
        assert_close(
            at(&db, &Y),
            -4.0 / 3.0 * E * (4.0 * E).sin() * (20f64.cos() / 2.0).sin(),
        );

        let inner = (&a() * &b()).sin().diff(&a())?;
        assert_eq!(at(&inner, &Y), 15f64.cos() * 3.0);

        let scaled = (&a() * b().exp()).diff(&a())?;
        assert_eq!(at(&scaled, &Y), 3f64.exp());
        Ok(())
    }

    #[test]
    fn test_exponential_sum() -> Result<(), Box<dyn std::error::Error>> {
        let func = (&a() + 2.0 * b() + &a() * &b()).exp() + &a() * b().exp();

        assert_close(at(&func.diff(&a())?, &Y), 4.0 * 26f64.exp() + 3f64.exp());
        assert_close(
            at(&func.diff(&b())?, &Y),
            3f64.exp() * (7.0 * 23f64.exp() + 5.0),
        );
        Ok(())
    }

    #[test]
    fn test_zero_propagation() -> Result<(), Box<dyn std::error::Error>> {
        let func = (&a() * 2.0 + 5.0 * (-a())) / (&a() * &a());

        assert_eq!(func.diff(&b())?.id(), Symbol::zero().id());
        assert_ne!(func.diff(&a())?.id(), Symbol::zero().id());
        Ok(())
    }

    #[test]
    fn test_no_rule_for_variables() {
        let c = Symbol::variable("c", Domain::region(SEPARATOR));
        assert!(matches!(
            (&c * 2.0).diff(&a()),
            Err(ExpressionError::UnsupportedOperation(
                UnsupportedOperationError::NoDerivativeRule { kind: "variable", .. }
            ))
        ));
        assert!(matches!(
            c.gradient().unwrap().diff(&a()),
            Err(ExpressionError::UnsupportedOperation(
                UnsupportedOperationError::NoDerivativeRule { kind: "gradient", .. }
            ))
        ));
    }

    #[test]
    fn test_invalid_variable() {
        assert!(matches!(
            a().diff(&Symbol::parameter("k")),
            Err(ExpressionError::UnsupportedOperation(
                UnsupportedOperationError::InvalidVariable("parameter")
            ))
        ));
    }

    #[test]
    fn test_jacobian_column() -> Result<(), Box<dyn std::error::Error>> {
        let y = Symbol::state_vector(0..3)?;
        let entry = Symbol::state_vector(1..2)?;

        let d = (&y * &y).diff(&entry)?;
        let value = d.evaluate(&State::new(&[1.0, 2.0, 3.0]))?;
        assert_eq!(value, array![[0.0], [4.0], [0.0]]);

        let overlapping = Symbol::state_vector(2..4)?;
        assert!(matches!(
            y.diff(&overlapping),
            Err(ExpressionError::Construction(
                ConstructionError::OverlappingStateVectors { .. }
            ))
        ));
        Ok(())
    }

    #[test]
    fn test_matmul_and_concatenation() -> Result<(), Box<dyn std::error::Error>> {
        let neg = Domain::region(NEGATIVE_ELECTRODE);
        let pos = Domain::region(POSITIVE_ELECTRODE);
        let c_n = Symbol::state_vector_on(0..2, neg)?;
        let c_p = Symbol::state_vector_on(2..4, pos)?;
        let m = array![[2.0, 0.0], [1.0, 1.0]];

        let expr = Symbol::concatenate(vec![Symbol::matmul(m, &c_n)?, &c_p * 3.0])?;
        let state = State::new(&[1.0, 1.0, 1.0, 1.0]);

        let d0 = expr.diff(&Symbol::state_vector(0..1)?)?;
        assert_eq!(d0.evaluate(&state)?, array![[2.0], [1.0], [0.0], [0.0]]);

        let d3 = expr.diff(&Symbol::state_vector(3..4)?)?;
        assert_eq!(d3.evaluate(&state)?, array![[0.0], [0.0], [0.0], [3.0]]);
        Ok(())
    }

    #[test]
    fn test_memoised_shared_subtrees() -> Result<(), Box<dyn std::error::Error>> {
        let mut expr = a();
        for _ in 0..30 {
            expr = &expr * &expr;
        }
        // without sharing, the derivative tree would have 2^30 leaves
        let d = expr.diff(&a())?;
        assert!(at(&d, &[1.0, 0.0]).is_finite());
        Ok(())
    }

    #[test]
    fn test_derivative_size_stays_bounded() -> Result<(), Box<dyn std::error::Error>> {
        let func = ((&a() * 4.0).cos() / 2.0).sin() * (4.0 * (&b() / 3.0).exp()).cos();
        for variable in [a(), b()] {
            let d = func.diff(&variable)?;
            assert!(d.size() <= 4 * func.size(), "{d} grew from {func}");
        }
        Ok(())
    }
}
