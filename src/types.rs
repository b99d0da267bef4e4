use std::collections::HashMap;

use ndarray::Array2;

/// Value of an evaluated symbol.
///
/// This represents a `(len, batch)` array:
/// - One row per entry of the symbol (a scalar has a single row)
/// - One column per state in the batch
pub type Value = Array2<f64>;

/// Type alias for the named parameter values bound at evaluation time.
pub type ParameterMap = HashMap<String, f64>;
