//! Error types for the battsym crate.
//!
//! This module defines the errors raised while building, differentiating,
//! simplifying, evaluating and discretising symbol trees. The main error types are:
//!
//! - `ConstructionError`: An ill-formed tree was requested (domain or shape mismatch)
//! - `UnsupportedOperationError`: An operation has no rule for a node kind
//! - `EvaluationError`: A tree could not be evaluated on a given state
//! - `SimplificationError`: A rewrite would have changed a tree's domain or shape
//! - `ConvertError`: Errors during conversion from evalexpr AST to symbols
//! - `DiscretisationError`: Errors while replacing continuous symbols by discrete ones
//! - `ExpressionError`: High-level errors wrapping all of the above
//!
//! Each error type implements the standard Error trait and provides detailed error messages.

use evalexpr::{DefaultNumericTypes, EvalexprError};
use thiserror::Error;

use crate::domain::Domain;
use crate::symbol::StateSlice;

/// Errors raised when a node is built from incompatible operands.
///
/// Construction errors are always reported at build time, never deferred to
/// evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    /// Both operands have a domain and the domains differ
    #[error("cannot combine symbols on domains {left} and {right}")]
    DomainMismatch { left: Domain, right: Domain },
    /// Operand lengths are neither equal nor broadcastable
    #[error("cannot combine operands of length {left} and {right}")]
    ShapeMismatch { left: usize, right: usize },
    /// A region was listed twice in one domain
    #[error("region '{0}' appears more than once in a domain")]
    DuplicateRegion(String),
    /// A concatenation child has no domain
    #[error("concatenation child {index} has no domain")]
    UndefinedChildDomain { index: usize },
    /// Two concatenation children share a region
    #[error("concatenation children overlap on region '{0}'")]
    OverlappingDomains(String),
    /// Concatenation children are not in canonical region order
    #[error("concatenation domains {found} are not in canonical order {expected}")]
    NonCanonicalOrder { found: Domain, expected: Domain },
    /// Concatenation children do not cover the requested domain exactly
    #[error("concatenation domains {found} do not partition {expected}")]
    PartitionMismatch { expected: Domain, found: Domain },
    #[error("concatenation needs at least one child")]
    EmptyConcatenation,
    /// Only domain-less symbols can be broadcast onto a domain
    #[error("cannot broadcast a symbol on {from} to {to}")]
    NotBroadcastable { from: Domain, to: Domain },
    /// Spatial operators need an operand living on a domain
    #[error("{operator} requires an operand with a domain")]
    MissingSpatialDomain { operator: &'static str },
    #[error("invalid state slice [{start}, {stop})")]
    InvalidSlice { start: usize, stop: usize },
    /// Two state vectors in one tree overlap without being identical
    #[error("state slices {first} and {second} partially overlap")]
    OverlappingStateVectors {
        first: StateSlice,
        second: StateSlice,
    },
    #[error("matrix with {columns} columns cannot multiply an operand of length {len}")]
    MatrixShape { columns: usize, len: usize },
    #[error("state slice {slice} lies outside a state of length {state_len}")]
    StateOutOfRange { slice: StateSlice, state_len: usize },
    /// A node was rebuilt with the wrong number of children
    #[error("expected {expected} children, got {got}")]
    ChildCount { expected: usize, got: usize },
    /// An equation handed to an expression system has no known length
    #[error("equation {index} has no known length; discretise it first")]
    UnsizedEquation { index: usize },
}

/// Errors raised when an operation is not defined for a node kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnsupportedOperationError {
    /// The node kind has no derivative rule registered
    #[error("no derivative rule registered for {kind} '{name}'")]
    NoDerivativeRule { kind: &'static str, name: String },
    /// Differentiation variables must be state vectors or scalars
    #[error("cannot differentiate with respect to a {0}; expected a state vector or scalar")]
    InvalidVariable(&'static str),
}

/// Errors raised while evaluating a tree on a state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("state slice {slice} is out of range for a state with {available} rows")]
    MissingState { slice: StateSlice, available: usize },
    #[error("no value bound for parameter '{0}'")]
    MissingParameter(String),
    /// The node only has meaning before discretisation
    #[error("{kind} '{name}' cannot be evaluated before discretisation")]
    Unevaluable { kind: &'static str, name: String },
    #[error("division by zero")]
    DivisionByZero,
    /// An elementary function was applied outside its domain
    #[error("{function} is undefined at {value}")]
    OutOfDomain { function: &'static str, value: f64 },
    #[error("{operation} produced a non-finite value from finite operands")]
    NonFinite { operation: &'static str },
    #[error("operand shapes {left:?} and {right:?} are not broadcast-compatible")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// Raised when a simplification would change a tree's domain or shape.
///
/// `Symbol::simplify` never returns this error: it logs it and keeps the
/// unsimplified tree instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimplificationError {
    #[error("simplification changed the domain from {before} to {after}")]
    DomainChanged { before: Domain, after: Domain },
    #[error("simplification changed the length from {before:?} to {after:?}")]
    ShapeChanged {
        before: Option<usize>,
        after: Option<usize>,
    },
    /// A simplified child could not be placed back into its parent
    #[error("failed to rebuild a simplified node")]
    Rebuild(#[from] ConstructionError),
}

/// Errors that can occur during conversion from evalexpr AST to symbols.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Error when encountering an operator that is not supported by our implementation
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// Error when encountering a function that is not supported by our implementation
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),
    /// Error when a function is called with anything but a single argument
    #[error("Function {name} expects one argument, got {got}")]
    FunctionArity { name: String, got: usize },
    /// Error when the root node does not have exactly one child
    #[error("Expected single child for root node: {0}")]
    RootNode(String),
    /// Error when a constant value is not a number
    #[error("Expected numeric constant: {0}")]
    ConstOperator(String),
    /// Error when an identifier has no bound symbol
    #[error("Variable not found: {0}")]
    VariableNotFound(String),
    /// Error when the parsed operands cannot be combined
    #[error("Failed to construct symbol")]
    Construction(#[from] ConstructionError),
}

/// Errors raised while discretising a continuous model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscretisationError {
    /// No mesh (or no point count) exists for a region
    #[error("no mesh defined for region '{0}'")]
    MissingMesh(String),
    /// A variable appears in a tree but was never given a state slice
    #[error("variable '{0}' has not been assigned a state slice")]
    UnassignedVariable(String),
    /// Only `Variable` symbols can be assigned state slices
    #[error("'{0}' is not a variable")]
    NotAVariable(String),
    /// A spatial operator received an operand of the wrong discrete length
    #[error("{operator} expects an operand of length {expected}, got {got:?}")]
    OperandShape {
        operator: &'static str,
        expected: usize,
        got: Option<usize>,
    },
    #[error("Failed to construct discretised symbol")]
    Construction(#[from] ConstructionError),
}

/// High-level errors that can occur when working with expressions and systems.
///
/// This enum wraps the lower-level errors from parsing, construction,
/// differentiation and evaluation.
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// Error when parsing the initial expression string with evalexpr
    #[error("Failed to build Evalexpr AST")]
    Parse(#[from] EvalexprError<DefaultNumericTypes>),
    /// Error when converting from evalexpr AST to symbols
    #[error("Failed to build symbol tree")]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error(transparent)]
    UnsupportedOperation(#[from] UnsupportedOperationError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Discretisation(#[from] DiscretisationError),
    /// Error when the input length is not the same as the state length
    #[error("Invalid input length: expected {expected}, got {got}")]
    InvalidInputLength { expected: usize, got: usize },
    /// Error when the output buffer does not match the system's output length
    #[error("Invalid output length: expected {expected}, got {got}")]
    InvalidOutputLength { expected: usize, got: usize },
    /// Error when asking for a derivative with respect to a state entry that doesn't exist
    #[error("State index {index} out of range for a state of length {len}")]
    StateIndexOutOfRange { index: usize, len: usize },
}
