//! Symbolic expression trees for electrochemical battery models.
//!
//! This crate builds, differentiates, simplifies and evaluates expression trees
//! over scalars, slices of a state vector and spatial fields. Trees written with
//! continuous variables and `grad` / `div` are turned into evaluable ones by a
//! mesh-based discretisation, and collected into systems with exact Jacobians.
//! Expressions can also be parsed from strings with the
//! [evalexpr](https://github.com/ISibboI/evalexpr) parser.
//!
//! # Features
//!
//! - Immutable, shareable symbol trees with structural ids
//! - Domain and shape checks at construction time
//! - Symbolic differentiation with respect to state vector slices
//! - Exact simplification (constant folding and identity rules)
//! - Batched, cached numerical evaluation
//! - Finite-volume discretisation of gradient and divergence
//!
//! # Example
//!
//! ```rust
//! use battsym::prelude::*;
//!
//! let a = Symbol::state_vector(0..1).unwrap();
//! let b = Symbol::state_vector(1..2).unwrap();
//! let f = &a * b.pow(a.clone());
//!
//! let state = State::new(&[5.0, 3.0]);
//! assert_eq!(f.evaluate(&state).unwrap()[[0, 0]], 1215.0);
//!
//! // d/db (a * b^a) = a^2 * b^(a - 1)
//! let df = f.diff(&b).unwrap();
//! assert_eq!(df.evaluate(&state).unwrap()[[0, 0]], 2025.0);
//! ```

pub use symbol::Symbol;
pub use system::ExpressionSystem;

pub mod prelude {
    pub use crate::backends::matrix::Matrix;
    pub use crate::backends::vector::Vector;
    pub use crate::discretisation::{
        Discretisation, FiniteVolume, Geometry, Mesh, SpatialMethod, SubMesh,
    };
    pub use crate::domain::Domain;
    pub use crate::errors::{
        ConstructionError, ConvertError, DiscretisationError, EvaluationError, ExpressionError,
        SimplificationError, UnsupportedOperationError,
    };
    pub use crate::evaluate::{Evaluator, State};
    pub use crate::operators::Function;
    pub use crate::symbol::{CoordSys, StateSlice, Symbol, SymbolKind};
    pub use crate::system::ExpressionSystem;
}

/// Input and output containers for state vectors and Jacobians
pub mod backends {
    pub mod matrix;
    pub mod vector;
}
/// Building symbol trees from expression strings
pub mod convert;
/// Symbolic differentiation
pub mod diff;
/// Meshes and spatial discretisation
pub mod discretisation;
/// Spatial domains and region ordering
pub mod domain;
/// Error types for the various failure modes
pub mod errors;
/// Numerical evaluation
pub mod evaluate;
/// Elementary functions, powers and operator overloads
pub mod operators;
/// Exact simplification
pub mod simplify;
/// The symbol tree
pub mod symbol;
/// Systems of equations over one state vector
pub mod system;
/// Shared type aliases
pub mod types;
