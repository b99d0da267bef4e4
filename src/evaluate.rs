//! Numerical evaluation of symbol trees.
//!
//! A tree is evaluated against a `State`: the flat state vector `y` (one column
//! per batch entry) and the values of named parameters. Every node evaluates to
//! a `(len, batch)` array; operands with one row or one column are broadcast
//! against larger ones.
//!
//! Evaluation fails instead of producing NaN when:
//! - a state slice lies outside `y`, or a parameter has no value
//! - a node only has meaning before discretisation (variables, grad, div)
//! - a division by zero occurs
//! - `ln` or `sqrt` is applied outside its domain
//! - a power of finite operands is not finite
//!
//! The `Evaluator` caches node values by structural id, so subtrees shared
//! between several expressions (or repeated inside one) are computed once per
//! state.

use std::collections::HashMap;

use log::trace;
use ndarray::{s, Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;

use crate::backends::vector::Vector;
use crate::errors::EvaluationError;
use crate::symbol::{BinaryOperator, Symbol, SymbolKind};
use crate::types::{ParameterMap, Value};

/// The point at which a tree is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    y: Array2<f64>,
    t: f64,
    parameters: ParameterMap,
}

impl State {
    /// A single state vector.
    pub fn new<V: Vector + ?Sized>(y: &V) -> Self {
        let y = y.to_array().insert_axis(Axis(1));
        Self::from_batch(y)
    }

    /// A batch of states, one per column of `y`.
    pub fn from_batch(y: Array2<f64>) -> Self {
        Self {
            y,
            t: 0.0,
            parameters: ParameterMap::new(),
        }
    }

    /// A state with no entries, for trees that do not read `y`.
    pub fn empty() -> Self {
        Self::from_batch(Array2::zeros((0, 1)))
    }

    pub fn with_time(mut self, t: f64) -> Self {
        self.t = t;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn y(&self) -> &Array2<f64> {
        &self.y
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn n_states(&self) -> usize {
        self.y.nrows()
    }

    pub fn batch_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }
}

/// Evaluates trees against one state, caching shared subtrees.
pub struct Evaluator<'a> {
    state: &'a State,
    cache: HashMap<u64, (Symbol, Value)>,
    use_cache: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(state: &'a State) -> Self {
        Self {
            state,
            cache: HashMap::new(),
            use_cache: true,
        }
    }

    /// Turns subtree caching on or off.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        if !enabled {
            self.cache.clear();
        }
        self
    }

    /// Number of cached node values.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Evaluates `symbol`, reusing any value already computed for an equal subtree.
    pub fn evaluate(&mut self, symbol: &Symbol) -> Result<Value, EvaluationError> {
        if !self.use_cache || symbol.is_leaf() {
            return self.compute(symbol);
        }
        if let Some((cached_symbol, value)) = self.cache.get(&symbol.id()) {
            if cached_symbol == symbol {
                trace!("evaluation cache hit for {symbol}");
                return Ok(value.clone());
            }
        }
        let value = self.compute(symbol)?;
        self.cache
            .insert(symbol.id(), (symbol.clone(), value.clone()));
        Ok(value)
    }

    fn compute(&mut self, symbol: &Symbol) -> Result<Value, EvaluationError> {
        match symbol.kind() {
            SymbolKind::Scalar(value) => Ok(Array2::from_elem((1, 1), *value)),
            SymbolKind::StateVector(slice) => {
                if slice.stop() > self.state.n_states() {
                    return Err(EvaluationError::MissingState {
                        slice: *slice,
                        available: self.state.n_states(),
                    });
                }
                Ok(self.state.y.slice(s![slice.range(), ..]).to_owned())
            }
            SymbolKind::Parameter(name) => self
                .state
                .parameter(name)
                .map(|value| Array2::from_elem((1, 1), value))
                .ok_or_else(|| EvaluationError::MissingParameter(name.clone())),
            SymbolKind::Vector(values) => Ok(values.view().insert_axis(Axis(1)).to_owned()),
            SymbolKind::Variable(name) | SymbolKind::SpatialVariable { name, .. } => {
                Err(EvaluationError::Unevaluable {
                    kind: symbol.kind().name(),
                    name: name.clone(),
                })
            }
            SymbolKind::Gradient(x) | SymbolKind::Divergence(x) => {
                Err(EvaluationError::Unevaluable {
                    kind: symbol.kind().name(),
                    name: x.to_string(),
                })
            }
            SymbolKind::Neg(x) => Ok(-self.evaluate(x)?),
            SymbolKind::Function(function, x) => {
                let mut value = self.evaluate(x)?;
                for entry in value.iter_mut() {
                    *entry = function.apply(*entry)?;
                }
                Ok(value)
            }
            SymbolKind::MatMul(matrix, x) => {
                let operand = self.evaluate(x)?;
                let columns = operand.ncols();
                let view = operand
                    .broadcast((matrix.ncols(), columns))
                    .ok_or(EvaluationError::ShapeMismatch {
                        left: matrix.dim(),
                        right: operand.dim(),
                    })?;
                Ok(matrix.dot(&view))
            }
            SymbolKind::Concatenation(children) => {
                let values = children
                    .iter()
                    .map(|child| self.evaluate(child))
                    .collect::<Result<Vec<_>, _>>()?;
                concatenate_rows(&values)
            }
            SymbolKind::Broadcast { child, size } => {
                let value = self.evaluate(child)?;
                match size {
                    Some(n) if value.nrows() == 1 && *n != 1 => {
                        let columns = value.ncols();
                        let view = value.broadcast((*n, columns)).ok_or(
                            EvaluationError::ShapeMismatch {
                                left: value.dim(),
                                right: (*n, columns),
                            },
                        )?;
                        Ok(view.to_owned())
                    }
                    _ => Ok(value),
                }
            }
            _ => match symbol.binary_parts() {
                Some((operator, l, r)) => {
                    let left = self.evaluate(l)?;
                    let right = self.evaluate(r)?;
                    apply_binary(operator, &left, &right)
                }
                None => Err(EvaluationError::Unevaluable {
                    kind: symbol.kind().name(),
                    name: symbol.to_string(),
                }),
            },
        }
    }
}

fn broadcast_dim(left: usize, right: usize) -> Option<usize> {
    match (left, right) {
        (l, r) if l == r => Some(l),
        (1, r) => Some(r),
        (l, 1) => Some(l),
        _ => None,
    }
}

fn broadcast_pair<'v>(
    left: &'v Value,
    right: &'v Value,
) -> Result<(ArrayView2<'v, f64>, ArrayView2<'v, f64>), EvaluationError> {
    let mismatch = || EvaluationError::ShapeMismatch {
        left: left.dim(),
        right: right.dim(),
    };
    let rows = broadcast_dim(left.nrows(), right.nrows()).ok_or_else(mismatch)?;
    let columns = broadcast_dim(left.ncols(), right.ncols()).ok_or_else(mismatch)?;
    let l = left.broadcast((rows, columns)).ok_or_else(mismatch)?;
    let r = right.broadcast((rows, columns)).ok_or_else(mismatch)?;
    Ok((l, r))
}

/// Applies a binary operator elementwise with broadcasting.
pub(crate) fn apply_binary(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, EvaluationError> {
    let (l, r) = broadcast_pair(left, right)?;
    match operator {
        BinaryOperator::Division if r.iter().any(|v| *v == 0.0) => {
            Err(EvaluationError::DivisionByZero)
        }
        BinaryOperator::Power => {
            let mut out = Array2::zeros(l.dim());
            let mut failure = None;
            Zip::from(&mut out)
                .and(&l)
                .and(&r)
                .for_each(|o, &base, &exponent| {
                    let value = operator.apply(base, exponent);
                    match crate::operators::pow::check(base, exponent, value) {
                        Ok(value) => *o = value,
                        Err(err) => failure = Some(err),
                    }
                });
            match failure {
                Some(err) => Err(err),
                None => Ok(out),
            }
        }
        _ => Ok(Zip::from(&l)
            .and(&r)
            .map_collect(|&a, &b| operator.apply(a, b))),
    }
}

fn concatenate_rows(values: &[Value]) -> Result<Value, EvaluationError> {
    let columns = values
        .iter()
        .map(|v| v.ncols())
        .try_fold(1, broadcast_dim)
        .ok_or(EvaluationError::ShapeMismatch {
            left: values.first().map_or((0, 0), |v| v.dim()),
            right: values.last().map_or((0, 0), |v| v.dim()),
        })?;
    let rows: usize = values.iter().map(|v| v.nrows()).sum();
    let mut out = Array2::zeros((rows, columns));
    let mut row = 0;
    for value in values {
        let rows = value.nrows();
        let view = value
            .broadcast((rows, columns))
            .ok_or(EvaluationError::ShapeMismatch {
                left: value.dim(),
                right: (rows, columns),
            })?;
        out.slice_mut(s![row..row + rows, ..]).assign(&view);
        row += rows;
    }
    Ok(out)
}

/// Evaluates a tree that reads neither state nor parameters.
///
/// Returns `None` if the tree fails to evaluate.
pub(crate) fn evaluate_constant(symbol: &Symbol) -> Option<Value> {
    let state = State::empty();
    Evaluator::new(&state).evaluate(symbol).ok()
}

impl Symbol {
    /// Evaluates the tree on a state.
    ///
    /// # Arguments
    /// * `state` - State vector(s) and parameter values
    ///
    /// # Returns
    /// A `(len, batch)` array of values
    ///
    /// # Example
    /// ```
    /// use battsym::prelude::*;
    ///
    /// let a = Symbol::state_vector(0..1).unwrap();
    /// let b = Symbol::state_vector(1..2).unwrap();
    /// let value = (&a * &b).evaluate(&State::new(&[5.0, 3.0])).unwrap();
    /// assert_eq!(value[[0, 0]], 15.0);
    /// ```
    pub fn evaluate(&self, state: &State) -> Result<Value, EvaluationError> {
        Evaluator::new(state).evaluate(self)
    }

    /// Evaluates the tree on many independent states in parallel.
    pub fn evaluate_many(&self, states: &[State]) -> Vec<Result<Value, EvaluationError>> {
        states.par_iter().map(|state| self.evaluate(state)).collect()
    }
}
