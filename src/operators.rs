//! Elementary operations available in symbol trees.
//!
//! Each function kind maps to one rule module holding its value and its
//! derivative, so adding a function means adding a variant here and a rule
//! module, nothing else.

pub mod arithmetic;

mod abs;
mod exp;
mod ln;
pub(crate) mod pow;
mod sqrt;
mod trigonometric;

use std::fmt;

use crate::errors::{ConstructionError, EvaluationError};
use crate::symbol::Symbol;

/// Elementary functions applied elementwise to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Exp,
    Ln,
    Sqrt,
    Sin,
    Cos,
    Tanh,
    Abs,
}

impl Function {
    pub const ALL: [Function; 7] = [
        Function::Exp,
        Function::Ln,
        Function::Sqrt,
        Function::Sin,
        Function::Cos,
        Function::Tanh,
        Function::Abs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Sqrt => "sqrt",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tanh => "tanh",
            Function::Abs => "abs",
        }
    }

    /// Looks a function up by name. `log` is accepted as the natural logarithm.
    pub fn from_name(name: &str) -> Option<Function> {
        match name {
            "log" => Some(Function::Ln),
            _ => Self::ALL.into_iter().find(|f| f.name() == name),
        }
    }

    /// Value of the function at `x`.
    ///
    /// # Errors
    /// Returns `EvaluationError::OutOfDomain` for `ln` of a non-positive value
    /// and `sqrt` of a negative value.
    pub fn apply(self, x: f64) -> Result<f64, EvaluationError> {
        match self {
            Function::Exp => Ok(exp::eval(x)),
            Function::Ln => ln::eval(x),
            Function::Sqrt => sqrt::eval(x),
            Function::Sin => Ok(trigonometric::sin(x)),
            Function::Cos => Ok(trigonometric::cos(x)),
            Function::Tanh => Ok(trigonometric::tanh(x)),
            Function::Abs => Ok(abs::eval(x)),
        }
    }

    /// Derivative of the function with respect to its argument, at `arg`.
    pub fn derivative(self, arg: &Symbol) -> Result<Symbol, ConstructionError> {
        match self {
            Function::Exp => Ok(exp::derivative(arg)),
            Function::Ln => ln::derivative(arg),
            Function::Sqrt => sqrt::derivative(arg),
            Function::Sin => Ok(trigonometric::sin_derivative(arg)),
            Function::Cos => Ok(trigonometric::cos_derivative(arg)),
            Function::Tanh => trigonometric::tanh_derivative(arg),
            Function::Abs => abs::derivative(arg),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
