//! Simplification of symbol trees.
//!
//! Rewrite pipeline
//! ----------------
//!  1. **fold**     – a node whose children are all constants is evaluated and
//!                    replaced by the resulting scalar or vector.
//!  2. **neutral**  – neutral and absorbing elements are removed:
//!                    `x + 0`, `x - 0`, `x * 1`, `x / 1`, `x ** 1` → `x`,
//!                    `x * 0` → `0`, `x ** 0` → `1`.
//!                    `0 / x`, `x / x`, `x - x` and `1 ** x` are kept, so
//!                    evaluating them still reports a failure inside `x`.
//!  3. **negation** – `--x` → `x`, `0 - x` → `-x`, `x * -1` → `-x`,
//!                    `x + (-y)` → `x - y`, `x - (-y)` → `x + y`.
//!
//! Every rewrite gives bit-identical values on valid states: folding goes
//! through the evaluator itself, and no rule reassociates or redistributes
//! floating-point operations. A rewritten node always keeps the domain and
//! length of the node it replaces; a zero replacing a vector of known length is
//! a zero vector of that length.
//!
//! The pipeline runs bottom-up over the whole tree and repeats until a
//! fix-point is reached, so `simplify` is idempotent. The arithmetic operators
//! and `Symbol::try_*` apply one local step of it to every node they build.

use std::collections::HashMap;

use log::{debug, error};
use ndarray::{Array1, Axis};

use crate::errors::{ConstructionError, SimplificationError};
use crate::evaluate;
use crate::symbol::{BinaryOperator, Symbol, SymbolKind};

/// Upper bound on full-tree passes. Real trees settle in two or three.
const MAX_PASSES: usize = 16;

impl Symbol {
    /// Simplifies the tree by folding constants and applying exact algebraic rules.
    ///
    /// The returned tree evaluates to exactly the same values as `self` on any
    /// state where `self` evaluates without error, and has the same domain and
    /// length. Simplifying an already simplified tree returns an equal tree.
    ///
    /// If a rewrite would break the domain or length of a node, the violation
    /// is logged and the unsimplified tree is returned.
    ///
    /// # Example
    /// ```
    /// use battsym::prelude::*;
    ///
    /// let a = Symbol::state_vector(0..1).unwrap();
    /// let expr = (&a + 0.0) * 1.0 + (Symbol::scalar(2.0) * 3.0);
    /// assert_eq!(expr.simplify().to_string(), "(y[0:1] + 6)");
    /// ```
    pub fn simplify(&self) -> Symbol {
        match self.try_simplify() {
            Ok(simplified) => simplified,
            Err(err) => {
                error!("{err}; keeping the unsimplified tree for {self}");
                self.clone()
            }
        }
    }

    /// Like `simplify`, but reports an invariant violation instead of recovering from it.
    pub fn try_simplify(&self) -> Result<Symbol, SimplificationError> {
        let mut current = self.clone();
        for pass in 1..=MAX_PASSES {
            let mut memo = HashMap::new();
            let next = simplify_tree(&current, &mut memo)?;
            if next == current {
                debug!("simplification settled after {pass} pass(es)");
                return Ok(next);
            }
            current = next;
        }
        debug!("simplification stopped after {MAX_PASSES} passes");
        Ok(current)
    }
}

fn simplify_tree(
    symbol: &Symbol,
    memo: &mut HashMap<u64, (Symbol, Symbol)>,
) -> Result<Symbol, SimplificationError> {
    if let Some((original, simplified)) = memo.get(&symbol.id()) {
        if original == symbol {
            return Ok(simplified.clone());
        }
    }

    let rebuilt = symbol.map_children(|child| simplify_tree(child, memo))?;
    let simplified = simplify_node(&rebuilt)?;

    if simplified.domain() != symbol.domain() {
        return Err(SimplificationError::DomainChanged {
            before: symbol.domain().clone(),
            after: simplified.domain().clone(),
        });
    }
    if simplified.len() != symbol.len() {
        return Err(SimplificationError::ShapeChanged {
            before: symbol.len(),
            after: simplified.len(),
        });
    }

    memo.insert(symbol.id(), (symbol.clone(), simplified.clone()));
    Ok(simplified)
}

/// Applies at most one local rewrite to a node whose children are already simplified.
pub(crate) fn simplify_node(symbol: &Symbol) -> Result<Symbol, ConstructionError> {
    let candidate = match fold_constant(symbol) {
        Some(folded) => folded,
        None => match rewrite(symbol)? {
            Some(rewritten) => rewritten,
            None => return Ok(symbol.clone()),
        },
    };
    Ok(conform(candidate, symbol)?.unwrap_or_else(|| symbol.clone()))
}

/// Evaluates a node whose children are all constants.
///
/// Nodes that fail to evaluate (division by zero, `ln` of a negative value,
/// ...) are left alone, so the error still surfaces at evaluation time.
fn fold_constant(symbol: &Symbol) -> Option<Symbol> {
    let children = symbol.children();
    if children.is_empty() || !children.iter().all(|c| c.is_constant()) {
        return None;
    }
    let value = evaluate::evaluate_constant(symbol)?;
    let column = value.index_axis(Axis(1), 0);
    if column.len() == 1 {
        Some(Symbol::scalar(column[0]))
    } else {
        Some(Symbol::vector(column.to_owned(), symbol.domain().clone()))
    }
}

fn rewrite(symbol: &Symbol) -> Result<Option<Symbol>, ConstructionError> {
    let rewritten = match symbol.kind() {
        SymbolKind::Neg(x) => match x.kind() {
            SymbolKind::Neg(inner) => Some(inner.clone()),
            _ => None,
        },
        SymbolKind::Add(l, r) => {
            if r.is_zero() {
                Some(l.clone())
            } else if l.is_zero() {
                Some(r.clone())
            } else if let SymbolKind::Neg(y) = r.kind() {
                Some(Symbol::binary(BinaryOperator::Subtraction, l, y)?)
            } else {
                None
            }
        }
        SymbolKind::Sub(l, r) => {
            if r.is_zero() {
                Some(l.clone())
            } else if l.is_zero() {
                Some(r.negate())
            } else if let SymbolKind::Neg(y) = r.kind() {
                Some(Symbol::binary(BinaryOperator::Addition, l, y)?)
            } else {
                None
            }
        }
        SymbolKind::Mul(l, r) => {
            if l.is_zero() || r.is_zero() {
                Some(Symbol::zero())
            } else if l.is_one() {
                Some(r.clone())
            } else if r.is_one() {
                Some(l.clone())
            } else if l.is_minus_one() {
                Some(r.negate())
            } else if r.is_minus_one() {
                Some(l.negate())
            } else {
                None
            }
        }
        SymbolKind::Div(l, r) => {
            if r.is_one() {
                Some(l.clone())
            } else if r.is_minus_one() {
                Some(l.negate())
            } else {
                None
            }
        }
        SymbolKind::Pow(l, r) => {
            if r.is_zero() {
                Some(Symbol::one())
            } else if r.is_one() {
                Some(l.clone())
            } else {
                None
            }
        }
        SymbolKind::MatMul(_, x) if x.is_zero() => Some(Symbol::zero()),
        _ => None,
    };
    Ok(rewritten)
}

/// Fits a rewrite candidate to the domain and length of the node it replaces.
///
/// Constants are reshaped: a scalar replacing a vector of known length becomes
/// a filled vector, and one replacing a symbol of unknown length becomes a
/// broadcast. Any other mismatch rejects the rewrite.
fn conform(candidate: Symbol, original: &Symbol) -> Result<Option<Symbol>, ConstructionError> {
    if candidate.domain() == original.domain() && candidate.len() == original.len() {
        return Ok(Some(candidate));
    }
    let domain = original.domain().clone();
    let fitted = match (candidate.kind(), original.len()) {
        (SymbolKind::Scalar(c), Some(1)) => Some(Symbol::scalar_on(*c, domain)),
        (SymbolKind::Scalar(c), Some(n)) => Some(Symbol::vector(Array1::from_elem(n, *c), domain)),
        (SymbolKind::Scalar(c), None) if !domain.is_empty() => {
            Some(Symbol::scalar(*c).broadcast(domain)?)
        }
        (SymbolKind::Vector(values), Some(n)) if values.len() == n => {
            Some(Symbol::vector((**values).clone(), domain))
        }
        (SymbolKind::Vector(values), Some(n)) if values.len() == 1 => {
            Some(Symbol::vector(Array1::from_elem(n, values[0]), domain))
        }
        _ => None,
    };
    Ok(fitted)
}

pub(crate) fn add(left: &Symbol, right: &Symbol) -> Result<Symbol, ConstructionError> {
    simplify_node(&Symbol::binary(BinaryOperator::Addition, left, right)?)
}

pub(crate) fn sub(left: &Symbol, right: &Symbol) -> Result<Symbol, ConstructionError> {
    simplify_node(&Symbol::binary(BinaryOperator::Subtraction, left, right)?)
}

pub(crate) fn mul(left: &Symbol, right: &Symbol) -> Result<Symbol, ConstructionError> {
    simplify_node(&Symbol::binary(BinaryOperator::Multiplication, left, right)?)
}

pub(crate) fn div(left: &Symbol, right: &Symbol) -> Result<Symbol, ConstructionError> {
    simplify_node(&Symbol::binary(BinaryOperator::Division, left, right)?)
}

pub(crate) fn pow(base: &Symbol, exponent: &Symbol) -> Result<Symbol, ConstructionError> {
    simplify_node(&Symbol::binary(BinaryOperator::Power, base, exponent)?)
}

pub(crate) fn neg(operand: &Symbol) -> Result<Symbol, ConstructionError> {
    simplify_node(&operand.negate())
}
