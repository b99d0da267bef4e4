//! Systems of right-hand sides over one state vector.
//!
//! An `ExpressionSystem` holds discretised equations that all read the same
//! flat state `y`. Evaluating the system concatenates the equations' values;
//! the Jacobian is assembled from symbolic derivatives with respect to each
//! single state entry, which are built once when the system is created.
//!
//! # Features
//!
//! - Concatenated evaluation into a fresh or pre-allocated buffer
//! - Parallel evaluation of many states
//! - Jacobian columns computed symbolically (in parallel) at construction
//! - Dense Jacobians written into any `Matrix` backend
//! - Named parameters bound at evaluation time
//!
//! # Example
//!
//! ```
//! use battsym::prelude::*;
//!
//! let a = Symbol::state_vector(0..1).unwrap();
//! let b = Symbol::state_vector(1..2).unwrap();
//! let system = ExpressionSystem::new(vec![&a * &b, &a + 2.0 * &b], 2).unwrap();
//!
//! assert_eq!(system.eval(&[5.0, 3.0]).unwrap(), vec![15.0, 11.0]);
//!
//! // Derivatives of both equations with respect to y[1]
//! assert_eq!(system.gradient(&[5.0, 3.0], 1).unwrap(), vec![5.0, 2.0]);
//! ```

use std::fmt;

use colored::Colorize;
use log::debug;
use rayon::prelude::*;

use crate::backends::matrix::Matrix;
use crate::backends::vector::Vector;
use crate::errors::{ConstructionError, EvaluationError, ExpressionError};
use crate::evaluate::{Evaluator, State};
use crate::symbol::Symbol;
use crate::types::ParameterMap;

/// Equations evaluated together against one state vector.
#[derive(Debug, Clone)]
pub struct ExpressionSystem {
    /// Simplified equations, in output order
    equations: Vec<Symbol>,
    /// Row at which each equation's values start in the output
    offsets: Vec<usize>,
    output_len: usize,
    state_len: usize,
    parameters: ParameterMap,
    /// `jacobian_columns[j][i]` is the derivative of equation `i` with respect to `y[j]`
    jacobian_columns: Vec<Vec<Symbol>>,
}

impl ExpressionSystem {
    /// Creates a system from discretised equations.
    ///
    /// # Arguments
    /// * `equations` - Right-hand sides; each must have a known length
    /// * `state_len` - Length of the state vector the equations read
    ///
    /// # Returns
    /// A system with its Jacobian columns already differentiated
    ///
    /// # Errors
    /// Returns `ExpressionError::Construction` if an equation has no known
    /// length or reads outside the state, and `ExpressionError::UnsupportedOperation`
    /// if an equation cannot be differentiated.
    pub fn new(equations: Vec<Symbol>, state_len: usize) -> Result<Self, ExpressionError> {
        let mut offsets = Vec::with_capacity(equations.len());
        let mut output_len = 0;
        for (index, equation) in equations.iter().enumerate() {
            let len = equation
                .len()
                .ok_or(ConstructionError::UnsizedEquation { index })?;
            if let Some(slice) = equation
                .state_slices()
                .iter()
                .find(|slice| slice.stop() > state_len)
            {
                return Err(ConstructionError::StateOutOfRange {
                    slice: *slice,
                    state_len,
                }
                .into());
            }
            offsets.push(output_len);
            output_len += len;
        }

        let equations: Vec<Symbol> = equations.iter().map(Symbol::simplify).collect();

        let jacobian_columns = (0..state_len)
            .into_par_iter()
            .map(|j| {
                let variable = Symbol::state_vector(j..j + 1)?;
                equations
                    .iter()
                    .map(|equation| {
                        if equation
                            .state_slices()
                            .iter()
                            .any(|slice| slice.range().contains(&j))
                        {
                            equation.diff(&variable)
                        } else {
                            Ok(Symbol::zero())
                        }
                    })
                    .collect::<Result<Vec<_>, ExpressionError>>()
            })
            .collect::<Result<Vec<_>, ExpressionError>>()?;

        debug!(
            "built system of {} equations ({} outputs) over {} states",
            equations.len(),
            output_len,
            state_len
        );

        Ok(Self {
            equations,
            offsets,
            output_len,
            state_len,
            parameters: ParameterMap::new(),
            jacobian_columns,
        })
    }

    /// Binds named parameters used by the equations.
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: f64) {
        self.parameters.insert(name.into(), value);
    }

    /// Evaluates all equations into a pre-allocated buffer.
    ///
    /// # Arguments
    /// * `y` - State vector, of length `state_len()`
    /// * `results` - Buffer of length `output_len()`
    ///
    /// # Errors
    /// Returns `ExpressionError::InvalidInputLength` or
    /// `ExpressionError::InvalidOutputLength` for wrongly sized arguments, or
    /// the evaluation error of the first failing equation.
    ///
    /// # Example
    /// ```
    /// # use battsym::prelude::*;
    /// let a = Symbol::state_vector(0..1).unwrap();
    /// let system = ExpressionSystem::new(vec![&a * 2.0, -&a], 1).unwrap();
    ///
    /// let mut results = vec![0.0; 2];
    /// system.eval_into(&[4.0], &mut results).unwrap();
    /// assert_eq!(results, vec![8.0, -4.0]);
    /// ```
    pub fn eval_into<V: Vector + ?Sized>(
        &self,
        y: &V,
        results: &mut [f64],
    ) -> Result<(), ExpressionError> {
        self.validate_input_length(y.len())?;
        if results.len() != self.output_len {
            return Err(ExpressionError::InvalidOutputLength {
                expected: self.output_len,
                got: results.len(),
            });
        }
        let state = self.state(y);
        let mut evaluator = Evaluator::new(&state);
        self.write_values(&mut evaluator, &self.equations, results)?;
        Ok(())
    }

    /// Evaluates all equations and returns their concatenated values.
    pub fn eval<V: Vector + ?Sized>(&self, y: &V) -> Result<Vec<f64>, ExpressionError> {
        let mut results = vec![0.0; self.output_len];
        self.eval_into(y, &mut results)?;
        Ok(results)
    }

    /// Evaluates the system for many states in parallel.
    ///
    /// # Example
    /// ```
    /// # use battsym::prelude::*;
    /// let a = Symbol::state_vector(0..1).unwrap();
    /// let b = Symbol::state_vector(1..2).unwrap();
    /// let system = ExpressionSystem::new(vec![&a + &b, &a * &b], 2).unwrap();
    ///
    /// let input_sets = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
    /// let results = system.eval_parallel(&input_sets).unwrap();
    /// assert_eq!(results[2], vec![11.0, 30.0]);
    /// ```
    pub fn eval_parallel(
        &self,
        input_sets: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, ExpressionError> {
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        let chunk_size = (input_sets.len() / (num_threads * 4)).max(1);

        input_sets
            .par_chunks(chunk_size)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|inputs| self.eval(inputs))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }

    /// Derivatives of every output with respect to one state entry.
    ///
    /// This is column `index` of the Jacobian.
    ///
    /// # Errors
    /// Returns `ExpressionError::StateIndexOutOfRange` if `index >= state_len()`.
    pub fn gradient<V: Vector + ?Sized>(
        &self,
        y: &V,
        index: usize,
    ) -> Result<Vec<f64>, ExpressionError> {
        self.validate_input_length(y.len())?;
        let column = self.jacobian_columns.get(index).ok_or(
            ExpressionError::StateIndexOutOfRange {
                index,
                len: self.state_len,
            },
        )?;
        let state = self.state(y);
        let mut evaluator = Evaluator::new(&state);
        let mut results = vec![0.0; self.output_len];
        self.write_values(&mut evaluator, column, &mut results)?;
        Ok(results)
    }

    /// The dense Jacobian `d output / d y`, of size `output_len() x state_len()`.
    ///
    /// # Example
    /// ```
    /// # use battsym::prelude::*;
    /// let a = Symbol::state_vector(0..1).unwrap();
    /// let b = Symbol::state_vector(1..2).unwrap();
    /// let system = ExpressionSystem::new(vec![&a * &b, &a / &b], 2).unwrap();
    ///
    /// let jacobian: Vec<Vec<f64>> = system.jacobian(&[6.0, 2.0]).unwrap();
    /// assert_eq!(jacobian, vec![vec![2.0, 6.0], vec![0.5, -1.5]]);
    /// ```
    pub fn jacobian<M: Matrix, V: Vector + ?Sized>(&self, y: &V) -> Result<M, ExpressionError> {
        self.validate_input_length(y.len())?;
        let state = self.state(y);
        let mut evaluator = Evaluator::new(&state);
        let mut matrix = M::zeros(self.output_len, self.state_len);
        let mut column = vec![0.0; self.output_len];
        for (j, derivatives) in self.jacobian_columns.iter().enumerate() {
            self.write_values(&mut evaluator, derivatives, &mut column)?;
            for (i, value) in column.iter().enumerate() {
                if *value != 0.0 {
                    matrix.set(i, j, *value);
                }
            }
        }
        Ok(matrix)
    }

    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    /// Total number of output rows.
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn state_len(&self) -> usize {
        self.state_len
    }

    /// The simplified equations.
    pub fn equations(&self) -> &[Symbol] {
        &self.equations
    }

    fn state<V: Vector + ?Sized>(&self, y: &V) -> State {
        State::new(y).with_parameters(
            self.parameters
                .iter()
                .map(|(name, value)| (name.clone(), *value)),
        )
    }

    /// Evaluates one symbol per equation into the matching output rows.
    /// Single-row values are repeated over the equation's rows.
    fn write_values(
        &self,
        evaluator: &mut Evaluator<'_>,
        symbols: &[Symbol],
        out: &mut [f64],
    ) -> Result<(), ExpressionError> {
        for ((symbol, equation), &offset) in symbols.iter().zip(&self.equations).zip(&self.offsets)
        {
            let rows = equation.len().unwrap_or(1);
            let value = evaluator.evaluate(symbol)?;
            let target = &mut out[offset..offset + rows];
            match value.nrows() {
                n if n == rows => target
                    .iter_mut()
                    .zip(value.column(0))
                    .for_each(|(t, v)| *t = *v),
                1 => target.fill(value[[0, 0]]),
                _ => {
                    return Err(EvaluationError::ShapeMismatch {
                        left: value.dim(),
                        right: (rows, 1),
                    }
                    .into())
                }
            }
        }
        Ok(())
    }

    /// Validates that the state has the length the system was built for.
    fn validate_input_length(&self, len: usize) -> Result<(), ExpressionError> {
        if len != self.state_len {
            return Err(ExpressionError::InvalidInputLength {
                expected: self.state_len,
                got: len,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ExpressionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(
            f,
            "    {}: {} ({} outputs)",
            "Equations".cyan(),
            self.equations.len(),
            self.output_len
        )?;
        writeln!(f, "    {}: {}", "States".cyan(), self.state_len)?;
        for (i, equation) in self.equations.iter().enumerate() {
            writeln!(f, "    {} {}", format!("[{i}]").cyan(), equation)?;
        }
        writeln!(f, "}}")
    }
}
