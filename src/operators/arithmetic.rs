//! Operator overloads for building symbol trees.
//!
//! `+`, `-`, `*`, `/` and unary `-` work between symbols, references to
//! symbols and `f64` constants. Every node they build goes through one local
//! simplification step, so `x * 1` is `x` and `2 * 3` is `6`; use
//! `Symbol::binary` to keep a node exactly as written.
//!
//! Operators cannot return errors, so a domain or shape mismatch panics with
//! the `ConstructionError` message; use the checked `Symbol::try_*` methods
//! when operands are not known to be compatible.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::errors::ConstructionError;
use crate::simplify;
use crate::symbol::Symbol;

fn constructed(result: Result<Symbol, ConstructionError>) -> Symbol {
    match result {
        Ok(symbol) => symbol,
        Err(err) => panic!("invalid symbol construction: {err}"),
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $checked:ident) => {
        impl $trait<Symbol> for Symbol {
            type Output = Symbol;
            fn $method(self, rhs: Symbol) -> Symbol {
                constructed(self.$checked(&rhs))
            }
        }

        impl $trait<&Symbol> for Symbol {
            type Output = Symbol;
            fn $method(self, rhs: &Symbol) -> Symbol {
                constructed(self.$checked(rhs))
            }
        }

        impl $trait<Symbol> for &Symbol {
            type Output = Symbol;
            fn $method(self, rhs: Symbol) -> Symbol {
                constructed(self.$checked(&rhs))
            }
        }

        impl $trait<&Symbol> for &Symbol {
            type Output = Symbol;
            fn $method(self, rhs: &Symbol) -> Symbol {
                constructed(self.$checked(rhs))
            }
        }

        impl $trait<f64> for Symbol {
            type Output = Symbol;
            fn $method(self, rhs: f64) -> Symbol {
                constructed(self.$checked(&Symbol::scalar(rhs)))
            }
        }

        impl $trait<f64> for &Symbol {
            type Output = Symbol;
            fn $method(self, rhs: f64) -> Symbol {
                constructed(self.$checked(&Symbol::scalar(rhs)))
            }
        }

        impl $trait<Symbol> for f64 {
            type Output = Symbol;
            fn $method(self, rhs: Symbol) -> Symbol {
                constructed(Symbol::scalar(self).$checked(&rhs))
            }
        }

        impl $trait<&Symbol> for f64 {
            type Output = Symbol;
            fn $method(self, rhs: &Symbol) -> Symbol {
                constructed(Symbol::scalar(self).$checked(rhs))
            }
        }
    };
}

impl_binary_operator!(Add, add, try_add);
impl_binary_operator!(Sub, sub, try_sub);
impl_binary_operator!(Mul, mul, try_mul);
impl_binary_operator!(Div, div, try_div);

impl Neg for Symbol {
    type Output = Symbol;
    fn neg(self) -> Symbol {
        constructed(simplify::neg(&self))
    }
}

impl Neg for &Symbol {
    type Output = Symbol;
    fn neg(self) -> Symbol {
        constructed(simplify::neg(self))
    }
}
