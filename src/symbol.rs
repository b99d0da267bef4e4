//! Symbol module for representing battery model expressions.
//!
//! This module defines the core tree types used to describe the equations of an
//! electrochemical model before anything is computed. The main types are:
//!
//! - `Symbol`: A cheap-to-clone, immutable handle to a tree node
//! - `SymbolKind`: An enum describing what a node is and what its children are
//! - `StateSlice`: A contiguous half-open range of the flat state vector
//!
//! Nodes are shared through `Arc`, so subtrees reused in several places (for
//! example a derivative containing the original expression) are never copied.
//!
//! # Tree Structure
//! The tree is built recursively with each node being one of:
//! - Leaf nodes: Scalar, StateVector, SpatialVariable, Parameter, Variable, Vector
//! - Unary operations: Neg, Function (exp, ln, sin, ...), Gradient, Divergence, MatMul
//! - Binary operations: Add, Sub, Mul, Div, Pow
//! - N-ary nodes: Concatenation, Broadcast
//!
//! # Node metadata
//! Every node carries, fixed at construction:
//! - a `Domain` derived from its children
//! - a length, when known (`None` for continuous symbols not yet discretised)
//! - the state slices it reads, used to reject partially overlapping slices
//! - a structural id: structurally equal trees always get the same id
//!
//! Construction validates domains and shapes. Checked constructors (`try_add`,
//! `concatenate`, `broadcast`, ...) return `ConstructionError`; the arithmetic
//! operators panic with the same error.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

use itertools::Itertools;
use ndarray::{Array1, Array2};

use crate::domain::Domain;
use crate::errors::ConstructionError;
use crate::operators::{pow, Function};
use crate::simplify;

/// A contiguous, half-open range `[start, stop)` of the state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateSlice {
    start: usize,
    stop: usize,
}

impl StateSlice {
    /// Creates a slice covering `start..stop`.
    ///
    /// # Errors
    /// Returns `ConstructionError::InvalidSlice` if the slice would be empty.
    pub fn new(start: usize, stop: usize) -> Result<Self, ConstructionError> {
        if stop <= start {
            return Err(ConstructionError::InvalidSlice { start, stop });
        }
        Ok(Self { start, stop })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn stop(&self) -> usize {
        self.stop
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.stop
    }

    pub fn is_disjoint(&self, other: &StateSlice) -> bool {
        self.stop <= other.start || other.stop <= self.start
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &StateSlice) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }
}

impl fmt::Display for StateSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y[{}:{}]", self.start, self.stop)
    }
}

/// Coordinate system of a spatial variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoordSys {
    #[default]
    Cartesian,
    SphericalPolar,
}

impl fmt::Display for CoordSys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSys::Cartesian => write!(f, "cartesian"),
            CoordSys::SphericalPolar => write!(f, "spherical polar"),
        }
    }
}

/// The five elementwise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Power,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Addition => "+",
            BinaryOperator::Subtraction => "-",
            BinaryOperator::Multiplication => "*",
            BinaryOperator::Division => "/",
            BinaryOperator::Power => "**",
        }
    }

    /// Applies the operation to a pair of values.
    ///
    /// Both the evaluator and constant folding go through this function, so a
    /// folded constant is bit-identical to the evaluated value.
    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOperator::Addition => left + right,
            BinaryOperator::Subtraction => left - right,
            BinaryOperator::Multiplication => left * right,
            BinaryOperator::Division => left / right,
            BinaryOperator::Power => pow::eval(left, right),
        }
    }
}

/// Spatial differential operators, replaced by matrices at discretisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialOperator {
    Gradient,
    Divergence,
}

impl SpatialOperator {
    pub fn name(self) -> &'static str {
        match self {
            SpatialOperator::Gradient => "grad",
            SpatialOperator::Divergence => "div",
        }
    }
}

/// What a tree node is.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    /// A constant value
    Scalar(f64),
    /// A slice of the state vector
    StateVector(StateSlice),
    /// A coordinate (x, r) on a domain, replaced by mesh nodes at discretisation
    SpatialVariable { name: String, coord_sys: CoordSys },
    /// A named constant bound at evaluation time
    Parameter(String),
    /// A continuous unknown, replaced by a state vector at discretisation
    Variable(String),
    /// A constant array
    Vector(Arc<Array1<f64>>),
    /// Negation of a symbol
    Neg(Symbol),
    /// An elementary function applied elementwise
    Function(Function, Symbol),
    /// Spatial gradient, before discretisation
    Gradient(Symbol),
    /// Spatial divergence, before discretisation
    Divergence(Symbol),
    /// A constant matrix applied to a symbol
    MatMul(Arc<Array2<f64>>, Symbol),
    /// Addition of two symbols
    Add(Symbol, Symbol),
    /// Subtraction of two symbols
    Sub(Symbol, Symbol),
    /// Multiplication of two symbols
    Mul(Symbol, Symbol),
    /// Division of two symbols
    Div(Symbol, Symbol),
    /// Exponentiation of a symbol by another symbol
    Pow(Symbol, Symbol),
    /// Children on disjoint domains joined into one symbol
    Concatenation(Vec<Symbol>),
    /// A domain-less symbol lifted onto the node's domain
    Broadcast { child: Symbol, size: Option<usize> },
}

impl SymbolKind {
    /// Direct children, in order.
    pub fn children(&self) -> Vec<&Symbol> {
        match self {
            SymbolKind::Scalar(_)
            | SymbolKind::StateVector(_)
            | SymbolKind::SpatialVariable { .. }
            | SymbolKind::Parameter(_)
            | SymbolKind::Variable(_)
            | SymbolKind::Vector(_) => Vec::new(),
            SymbolKind::Neg(x)
            | SymbolKind::Function(_, x)
            | SymbolKind::Gradient(x)
            | SymbolKind::Divergence(x)
            | SymbolKind::MatMul(_, x)
            | SymbolKind::Broadcast { child: x, .. } => vec![x],
            SymbolKind::Add(l, r)
            | SymbolKind::Sub(l, r)
            | SymbolKind::Mul(l, r)
            | SymbolKind::Div(l, r)
            | SymbolKind::Pow(l, r) => vec![l, r],
            SymbolKind::Concatenation(children) => children.iter().collect(),
        }
    }

    /// Short lowercase name of the node kind, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            SymbolKind::Scalar(_) => "scalar",
            SymbolKind::StateVector(_) => "state vector",
            SymbolKind::SpatialVariable { .. } => "spatial variable",
            SymbolKind::Parameter(_) => "parameter",
            SymbolKind::Variable(_) => "variable",
            SymbolKind::Vector(_) => "vector",
            SymbolKind::Neg(_) => "negation",
            SymbolKind::Function(..) => "function",
            SymbolKind::Gradient(_) => "gradient",
            SymbolKind::Divergence(_) => "divergence",
            SymbolKind::MatMul(..) => "matrix multiplication",
            SymbolKind::Add(..) => "addition",
            SymbolKind::Sub(..) => "subtraction",
            SymbolKind::Mul(..) => "multiplication",
            SymbolKind::Div(..) => "division",
            SymbolKind::Pow(..) => "power",
            SymbolKind::Concatenation(_) => "concatenation",
            SymbolKind::Broadcast { .. } => "broadcast",
        }
    }
}

#[derive(Debug)]
struct Node {
    kind: SymbolKind,
    domain: Domain,
    len: Option<usize>,
    slices: Vec<StateSlice>,
    id: u64,
}

/// An immutable, shareable node of an expression tree.
///
/// Cloning a `Symbol` clones a reference, not the tree. Two symbols compare
/// equal when they have the same id, domain, kind and payload, and their
/// children have the same ids. Comparison never walks below the children.
#[derive(Clone)]
pub struct Symbol(Arc<Node>);

fn hash_f64<H: Hasher>(value: f64, state: &mut H) {
    // -0.0 and 0.0 are the same constant
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_bits().hash(state);
}

fn structural_id(kind: &SymbolKind, domain: &Domain) -> u64 {
    let mut hasher = DefaultHasher::new();
    std::mem::discriminant(kind).hash(&mut hasher);
    match kind {
        SymbolKind::Scalar(value) => hash_f64(*value, &mut hasher),
        SymbolKind::StateVector(slice) => slice.hash(&mut hasher),
        SymbolKind::SpatialVariable { name, coord_sys } => {
            name.hash(&mut hasher);
            coord_sys.hash(&mut hasher);
        }
        SymbolKind::Parameter(name) | SymbolKind::Variable(name) => name.hash(&mut hasher),
        SymbolKind::Vector(values) => {
            values.len().hash(&mut hasher);
            values.iter().for_each(|v| hash_f64(*v, &mut hasher));
        }
        SymbolKind::Function(function, child) => {
            function.hash(&mut hasher);
            child.id().hash(&mut hasher);
        }
        SymbolKind::MatMul(matrix, child) => {
            matrix.dim().hash(&mut hasher);
            matrix.iter().for_each(|v| hash_f64(*v, &mut hasher));
            child.id().hash(&mut hasher);
        }
        SymbolKind::Broadcast { child, size } => {
            child.id().hash(&mut hasher);
            size.hash(&mut hasher);
        }
        other => other
            .children()
            .iter()
            .for_each(|child| child.id().hash(&mut hasher)),
    }
    domain.hash(&mut hasher);
    hasher.finish()
}

/// Length of the result of an elementwise operation on operands of the given lengths.
fn combine_len(
    left: Option<usize>,
    right: Option<usize>,
) -> Result<Option<usize>, ConstructionError> {
    match (left, right) {
        (Some(l), Some(r)) if l == r || r == 1 => Ok(Some(l)),
        (Some(1), Some(r)) => Ok(Some(r)),
        (Some(l), Some(r)) => Err(ConstructionError::ShapeMismatch { left: l, right: r }),
        (Some(1), None) | (None, Some(1)) | (None, None) => Ok(None),
        (Some(n), None) | (None, Some(n)) => Ok(Some(n)),
    }
}

/// Union of the state slices read by several subtrees.
///
/// Slices must be identical or disjoint; a partial overlap is rejected.
fn merge_slices<'a, I>(groups: I) -> Result<Vec<StateSlice>, ConstructionError>
where
    I: IntoIterator<Item = &'a [StateSlice]>,
{
    let merged: Vec<StateSlice> = groups
        .into_iter()
        .flatten()
        .copied()
        .sorted()
        .dedup()
        .collect();
    if let Some((first, second)) = merged
        .iter()
        .tuple_combinations()
        .find(|(a, b)| !a.is_disjoint(b))
    {
        return Err(ConstructionError::OverlappingStateVectors {
            first: *first,
            second: *second,
        });
    }
    Ok(merged)
}

impl Symbol {
    fn from_parts(
        kind: SymbolKind,
        domain: Domain,
        len: Option<usize>,
        slices: Vec<StateSlice>,
    ) -> Symbol {
        let id = structural_id(&kind, &domain);
        Symbol(Arc::new(Node {
            kind,
            domain,
            len,
            slices,
            id,
        }))
    }

    /// A constant with no domain.
    pub fn scalar(value: f64) -> Symbol {
        Self::scalar_on(value, Domain::empty())
    }

    /// A constant on a domain.
    pub fn scalar_on(value: f64, domain: Domain) -> Symbol {
        let value = if value == 0.0 { 0.0 } else { value };
        Self::from_parts(SymbolKind::Scalar(value), domain, Some(1), Vec::new())
    }

    pub fn zero() -> Symbol {
        Self::scalar(0.0)
    }

    pub fn one() -> Symbol {
        Self::scalar(1.0)
    }

    /// A slice of the state vector with no domain.
    ///
    /// # Example
    /// ```
    /// use battsym::prelude::*;
    ///
    /// let a = Symbol::state_vector(0..1).unwrap();
    /// assert_eq!(a.len(), Some(1));
    /// assert_eq!(a.to_string(), "y[0:1]");
    /// ```
    pub fn state_vector(range: Range<usize>) -> Result<Symbol, ConstructionError> {
        Self::state_vector_on(range, Domain::empty())
    }

    /// A slice of the state vector on a domain.
    pub fn state_vector_on(
        range: Range<usize>,
        domain: Domain,
    ) -> Result<Symbol, ConstructionError> {
        let slice = StateSlice::new(range.start, range.end)?;
        Ok(Self::from_parts(
            SymbolKind::StateVector(slice),
            domain,
            Some(slice.len()),
            vec![slice],
        ))
    }

    /// A named scalar constant, bound when the tree is evaluated.
    pub fn parameter(name: impl Into<String>) -> Symbol {
        Self::from_parts(
            SymbolKind::Parameter(name.into()),
            Domain::empty(),
            Some(1),
            Vec::new(),
        )
    }

    /// A continuous unknown. Variables on a domain have no length until they
    /// are discretised.
    pub fn variable(name: impl Into<String>, domain: Domain) -> Symbol {
        let len = if domain.is_empty() { Some(1) } else { None };
        Self::from_parts(SymbolKind::Variable(name.into()), domain, len, Vec::new())
    }

    /// A coordinate over a domain.
    ///
    /// # Errors
    /// Returns `ConstructionError::MissingSpatialDomain` if `domain` is empty.
    pub fn spatial_variable(
        name: impl Into<String>,
        domain: Domain,
        coord_sys: CoordSys,
    ) -> Result<Symbol, ConstructionError> {
        if domain.is_empty() {
            return Err(ConstructionError::MissingSpatialDomain {
                operator: "spatial variable",
            });
        }
        Ok(Self::from_parts(
            SymbolKind::SpatialVariable {
                name: name.into(),
                coord_sys,
            },
            domain,
            None,
            Vec::new(),
        ))
    }

    /// A constant array on a domain.
    pub fn vector(values: Array1<f64>, domain: Domain) -> Symbol {
        let len = values.len();
        Self::from_parts(
            SymbolKind::Vector(Arc::new(values)),
            domain,
            Some(len),
            Vec::new(),
        )
    }

    /// Negation. Never fails: the result has the operand's domain and shape.
    pub fn negate(&self) -> Symbol {
        Self::from_parts(
            SymbolKind::Neg(self.clone()),
            self.domain().clone(),
            self.len(),
            self.0.slices.clone(),
        )
    }

    /// Applies an elementary function elementwise.
    pub fn apply_function(&self, function: Function) -> Symbol {
        Self::from_parts(
            SymbolKind::Function(function, self.clone()),
            self.domain().clone(),
            self.len(),
            self.0.slices.clone(),
        )
    }

    pub fn exp(&self) -> Symbol {
        self.apply_function(Function::Exp)
    }

    pub fn ln(&self) -> Symbol {
        self.apply_function(Function::Ln)
    }

    pub fn sqrt(&self) -> Symbol {
        self.apply_function(Function::Sqrt)
    }

    pub fn sin(&self) -> Symbol {
        self.apply_function(Function::Sin)
    }

    pub fn cos(&self) -> Symbol {
        self.apply_function(Function::Cos)
    }

    pub fn tanh(&self) -> Symbol {
        self.apply_function(Function::Tanh)
    }

    pub fn abs(&self) -> Symbol {
        self.apply_function(Function::Abs)
    }

    fn spatial(&self, operator: SpatialOperator) -> Result<Symbol, ConstructionError> {
        if self.domain().is_empty() {
            return Err(ConstructionError::MissingSpatialDomain {
                operator: operator.name(),
            });
        }
        let kind = match operator {
            SpatialOperator::Gradient => SymbolKind::Gradient(self.clone()),
            SpatialOperator::Divergence => SymbolKind::Divergence(self.clone()),
        };
        Ok(Self::from_parts(
            kind,
            self.domain().clone(),
            None,
            self.0.slices.clone(),
        ))
    }

    /// Spatial gradient of a symbol living on a domain.
    pub fn gradient(&self) -> Result<Symbol, ConstructionError> {
        self.spatial(SpatialOperator::Gradient)
    }

    /// Spatial divergence of a symbol living on a domain.
    pub fn divergence(&self) -> Result<Symbol, ConstructionError> {
        self.spatial(SpatialOperator::Divergence)
    }

    /// Multiplies `operand` by a constant matrix.
    ///
    /// A length-1 operand is broadcast to the matrix's column count.
    pub fn matmul(matrix: Array2<f64>, operand: &Symbol) -> Result<Symbol, ConstructionError> {
        Self::matmul_shared(Arc::new(matrix), operand)
    }

    /// Like `matmul`, reusing an already shared matrix.
    pub fn matmul_shared(
        matrix: Arc<Array2<f64>>,
        operand: &Symbol,
    ) -> Result<Symbol, ConstructionError> {
        if let Some(len) = operand.len() {
            if len != 1 && len != matrix.ncols() {
                return Err(ConstructionError::MatrixShape {
                    columns: matrix.ncols(),
                    len,
                });
            }
        }
        let rows = matrix.nrows();
        Ok(Self::from_parts(
            SymbolKind::MatMul(matrix, operand.clone()),
            operand.domain().clone(),
            Some(rows),
            operand.0.slices.clone(),
        ))
    }

    /// Builds a binary node after checking domains, shapes and state slices.
    ///
    /// The node is kept exactly as given. The `try_*` methods and the
    /// arithmetic operators build through this and then apply one local
    /// simplification step.
    pub fn binary(
        operator: BinaryOperator,
        left: &Symbol,
        right: &Symbol,
    ) -> Result<Symbol, ConstructionError> {
        let domain = left.domain().combine(right.domain())?;
        let len = combine_len(left.len(), right.len())?;
        let slices = merge_slices([left.state_slices(), right.state_slices()])?;
        let (l, r) = (left.clone(), right.clone());
        let kind = match operator {
            BinaryOperator::Addition => SymbolKind::Add(l, r),
            BinaryOperator::Subtraction => SymbolKind::Sub(l, r),
            BinaryOperator::Multiplication => SymbolKind::Mul(l, r),
            BinaryOperator::Division => SymbolKind::Div(l, r),
            BinaryOperator::Power => SymbolKind::Pow(l, r),
        };
        Ok(Self::from_parts(kind, domain, len, slices))
    }

    pub fn try_add(&self, rhs: &Symbol) -> Result<Symbol, ConstructionError> {
        simplify::add(self, rhs)
    }

    pub fn try_sub(&self, rhs: &Symbol) -> Result<Symbol, ConstructionError> {
        simplify::sub(self, rhs)
    }

    pub fn try_mul(&self, rhs: &Symbol) -> Result<Symbol, ConstructionError> {
        simplify::mul(self, rhs)
    }

    pub fn try_div(&self, rhs: &Symbol) -> Result<Symbol, ConstructionError> {
        simplify::div(self, rhs)
    }

    pub fn try_pow(&self, exponent: &Symbol) -> Result<Symbol, ConstructionError> {
        simplify::pow(self, exponent)
    }

    /// Raises `self` to `exponent`.
    ///
    /// # Panics
    /// Panics if the operands cannot be combined; see `try_pow`.
    pub fn pow(&self, exponent: impl Into<Symbol>) -> Symbol {
        let exponent = exponent.into();
        match self.try_pow(&exponent) {
            Ok(symbol) => symbol,
            Err(err) => panic!("invalid symbol construction: {err}"),
        }
    }

    /// Joins children living on disjoint domains.
    ///
    /// # Arguments
    /// * `children` - Symbols with non-empty, pairwise-disjoint domains, in canonical region order
    ///
    /// # Returns
    /// A symbol whose domain is the union of the children's domains
    ///
    /// # Errors
    /// Returns a `ConstructionError` if a child has no domain, two children
    /// overlap, or the regions are out of order.
    pub fn concatenate(children: Vec<Symbol>) -> Result<Symbol, ConstructionError> {
        let domains: Vec<&Domain> = children.iter().map(|c| c.domain()).collect();
        let domain = Domain::concatenate(&domains)?;
        let len = children
            .iter()
            .map(|c| c.len())
            .sum::<Option<usize>>();
        let slices = merge_slices(children.iter().map(|c| c.state_slices()))?;
        Ok(Self::from_parts(
            SymbolKind::Concatenation(children),
            domain,
            len,
            slices,
        ))
    }

    /// Joins children that must partition `target` exactly.
    pub fn concatenate_on(
        children: Vec<Symbol>,
        target: &Domain,
    ) -> Result<Symbol, ConstructionError> {
        let domains: Vec<&Domain> = children.iter().map(|c| c.domain()).collect();
        target.check_partition(&domains)?;
        Self::concatenate(children)
    }

    /// Lifts a domain-less symbol onto `domain`.
    pub fn broadcast(&self, domain: Domain) -> Result<Symbol, ConstructionError> {
        self.broadcast_sized(domain, None)
    }

    /// Lifts a domain-less symbol onto `domain` with a known discrete size.
    pub fn broadcast_sized(
        &self,
        domain: Domain,
        size: Option<usize>,
    ) -> Result<Symbol, ConstructionError> {
        if size.is_none() && self.domain() == &domain {
            return Ok(self.clone());
        }
        if domain.is_empty() || !self.domain().is_empty() {
            return Err(ConstructionError::NotBroadcastable {
                from: self.domain().clone(),
                to: domain,
            });
        }
        let len = match (self.len(), size) {
            (Some(k), Some(n)) if k != 1 && k != n => {
                return Err(ConstructionError::ShapeMismatch { left: k, right: n });
            }
            (_, Some(n)) => Some(n),
            (Some(1), None) | (None, None) => None,
            (Some(k), None) => Some(k),
        };
        Ok(Self::from_parts(
            SymbolKind::Broadcast {
                child: self.clone(),
                size,
            },
            domain,
            len,
            self.0.slices.clone(),
        ))
    }

    pub fn kind(&self) -> &SymbolKind {
        &self.0.kind
    }

    pub fn domain(&self) -> &Domain {
        &self.0.domain
    }

    /// Number of entries, when known.
    pub fn len(&self) -> Option<usize> {
        self.0.len
    }

    /// Structural hash. Equal trees have equal ids.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Sorted, disjoint state slices read anywhere in this tree.
    pub fn state_slices(&self) -> &[StateSlice] {
        &self.0.slices
    }

    pub fn children(&self) -> Vec<&Symbol> {
        self.0.kind.children()
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// True for scalars and vectors.
    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), SymbolKind::Scalar(_) | SymbolKind::Vector(_))
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self.kind() {
            SymbolKind::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    fn is_constant_value(&self, target: f64) -> bool {
        match self.kind() {
            SymbolKind::Scalar(value) => *value == target,
            SymbolKind::Vector(values) => {
                !values.is_empty() && values.iter().all(|v| *v == target)
            }
            _ => false,
        }
    }

    /// True for a scalar zero or an all-zero vector.
    pub fn is_zero(&self) -> bool {
        self.is_constant_value(0.0)
    }

    /// True for a scalar one or an all-one vector.
    pub fn is_one(&self) -> bool {
        self.is_constant_value(1.0)
    }

    pub fn is_minus_one(&self) -> bool {
        self.is_constant_value(-1.0)
    }

    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of nodes in the tree, counting shared subtrees every time they occur.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }

    /// The operator and operands of a binary node.
    pub fn binary_parts(&self) -> Option<(BinaryOperator, &Symbol, &Symbol)> {
        match self.kind() {
            SymbolKind::Add(l, r) => Some((BinaryOperator::Addition, l, r)),
            SymbolKind::Sub(l, r) => Some((BinaryOperator::Subtraction, l, r)),
            SymbolKind::Mul(l, r) => Some((BinaryOperator::Multiplication, l, r)),
            SymbolKind::Div(l, r) => Some((BinaryOperator::Division, l, r)),
            SymbolKind::Pow(l, r) => Some((BinaryOperator::Power, l, r)),
            _ => None,
        }
    }

    /// The spatial operator and operand of a gradient or divergence node.
    pub fn spatial_operator(&self) -> Option<(SpatialOperator, &Symbol)> {
        match self.kind() {
            SymbolKind::Gradient(x) => Some((SpatialOperator::Gradient, x)),
            SymbolKind::Divergence(x) => Some((SpatialOperator::Divergence, x)),
            _ => None,
        }
    }

    /// Rebuilds this node with new children, re-running every construction check.
    ///
    /// # Errors
    /// Returns `ConstructionError::ChildCount` if `children` has the wrong
    /// arity, or any error the node's constructor can raise.
    pub fn with_children(&self, children: Vec<Symbol>) -> Result<Symbol, ConstructionError> {
        match (self.kind(), children.as_slice()) {
            (SymbolKind::Neg(_), [x]) => Ok(x.negate()),
            (SymbolKind::Function(function, _), [x]) => Ok(x.apply_function(*function)),
            (SymbolKind::Gradient(_), [x]) => x.gradient(),
            (SymbolKind::Divergence(_), [x]) => x.divergence(),
            (SymbolKind::MatMul(matrix, _), [x]) => Symbol::matmul_shared(matrix.clone(), x),
            (SymbolKind::Broadcast { size, .. }, [x]) => {
                x.broadcast_sized(self.domain().clone(), *size)
            }
            (SymbolKind::Concatenation(_), _) => Symbol::concatenate(children.to_vec()),
            (_, [l, r]) => match self.binary_parts() {
                Some((operator, _, _)) => Symbol::binary(operator, l, r),
                None => Err(ConstructionError::ChildCount {
                    expected: self.children().len(),
                    got: 2,
                }),
            },
            (_, []) if self.is_leaf() => Ok(self.clone()),
            _ => Err(ConstructionError::ChildCount {
                expected: self.children().len(),
                got: children.len(),
            }),
        }
    }

    /// Applies `f` to every direct child and rebuilds the node.
    ///
    /// Returns `self` unchanged (same allocation) when `f` hands back every
    /// child untouched.
    pub fn map_children<E, F>(&self, mut f: F) -> Result<Symbol, E>
    where
        F: FnMut(&Symbol) -> Result<Symbol, E>,
        E: From<ConstructionError>,
    {
        let children = self.children();
        if children.is_empty() {
            return Ok(self.clone());
        }
        let mapped = children
            .iter()
            .map(|child| f(child))
            .collect::<Result<Vec<_>, E>>()?;
        if mapped.iter().zip(&children).all(|(new, old)| new.ptr_eq(old)) {
            return Ok(self.clone());
        }
        Ok(self.with_children(mapped)?)
    }

    /// Replaces every subtree matching a predicate.
    ///
    /// # Arguments
    /// * `predicate` - A closure that determines which nodes to replace
    /// * `replacement` - The symbol to insert where the predicate matches
    ///
    /// # Returns
    /// A new tree with the replacements applied
    pub fn replace<F>(&self, predicate: &F, replacement: &Symbol) -> Result<Symbol, ConstructionError>
    where
        F: Fn(&Symbol) -> bool,
    {
        if predicate(self) {
            return Ok(replacement.clone());
        }
        self.map_children(|child| child.replace(predicate, replacement))
    }
}

/// Bitwise float equality with `-0.0 == 0.0`, matching `hash_f64`.
fn same_f64(left: f64, right: f64) -> bool {
    left == right || left.to_bits() == right.to_bits()
}

/// Children are the same subtree when they share an allocation or an id.
fn same_child(left: &Symbol, right: &Symbol) -> bool {
    left.ptr_eq(right) || left.id() == right.id()
}

/// Compares two nodes one level deep: payloads by value, children by id.
fn same_node(left: &SymbolKind, right: &SymbolKind) -> bool {
    match (left, right) {
        (SymbolKind::Scalar(a), SymbolKind::Scalar(b)) => same_f64(*a, *b),
        (SymbolKind::StateVector(a), SymbolKind::StateVector(b)) => a == b,
        (
            SymbolKind::SpatialVariable { name: a, coord_sys: ca },
            SymbolKind::SpatialVariable { name: b, coord_sys: cb },
        ) => a == b && ca == cb,
        (SymbolKind::Parameter(a), SymbolKind::Parameter(b))
        | (SymbolKind::Variable(a), SymbolKind::Variable(b)) => a == b,
        (SymbolKind::Vector(a), SymbolKind::Vector(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| same_f64(*x, *y))
        }
        (SymbolKind::Neg(a), SymbolKind::Neg(b))
        | (SymbolKind::Gradient(a), SymbolKind::Gradient(b))
        | (SymbolKind::Divergence(a), SymbolKind::Divergence(b)) => same_child(a, b),
        (SymbolKind::Function(fa, a), SymbolKind::Function(fb, b)) => {
            fa == fb && same_child(a, b)
        }
        (SymbolKind::MatMul(ma, a), SymbolKind::MatMul(mb, b)) => {
            (Arc::ptr_eq(ma, mb) || ma == mb) && same_child(a, b)
        }
        (SymbolKind::Add(la, ra), SymbolKind::Add(lb, rb))
        | (SymbolKind::Sub(la, ra), SymbolKind::Sub(lb, rb))
        | (SymbolKind::Mul(la, ra), SymbolKind::Mul(lb, rb))
        | (SymbolKind::Div(la, ra), SymbolKind::Div(lb, rb))
        | (SymbolKind::Pow(la, ra), SymbolKind::Pow(lb, rb)) => {
            same_child(la, lb) && same_child(ra, rb)
        }
        (SymbolKind::Concatenation(a), SymbolKind::Concatenation(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_child(x, y))
        }
        (
            SymbolKind::Broadcast { child: a, size: sa },
            SymbolKind::Broadcast { child: b, size: sb },
        ) => sa == sb && same_child(a, b),
        _ => false,
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.id() == other.id()
                && self.len() == other.len()
                && self.domain() == other.domain()
                && same_node(self.kind(), other.kind()))
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl From<f64> for Symbol {
    fn from(value: f64) -> Self {
        Symbol::scalar(value)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain().is_empty() {
            write!(f, "Symbol({self})")
        } else {
            write!(f, "Symbol({self} on {})", self.domain())
        }
    }
}

/// Implements string formatting for symbols.
///
/// - Scalars are formatted as numbers, state vectors as `y[start:stop]`
/// - Named leaves are formatted as their names
/// - Binary operations are wrapped in parentheses, with `**` for powers
/// - Functions and spatial operators use function call notation
impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            SymbolKind::Scalar(value) => write!(f, "{value}"),
            SymbolKind::StateVector(slice) => write!(f, "{slice}"),
            SymbolKind::SpatialVariable { name, .. }
            | SymbolKind::Parameter(name)
            | SymbolKind::Variable(name) => write!(f, "{name}"),
            SymbolKind::Vector(values) if values.len() <= 6 => {
                write!(f, "[{}]", values.iter().join(", "))
            }
            SymbolKind::Vector(values) => write!(f, "vector[{}]", values.len()),
            SymbolKind::Neg(x) => write!(f, "-{x}"),
            SymbolKind::Function(function, x) => write!(f, "{}({x})", function.name()),
            SymbolKind::Gradient(x) => write!(f, "grad({x})"),
            SymbolKind::Divergence(x) => write!(f, "div({x})"),
            SymbolKind::MatMul(matrix, x) => {
                write!(f, "(mat[{}x{}] @ {x})", matrix.nrows(), matrix.ncols())
            }
            SymbolKind::Concatenation(children) => {
                write!(f, "concat({})", children.iter().join(", "))
            }
            SymbolKind::Broadcast { child, .. } => write!(f, "broadcast({child})"),
            _ => match self.binary_parts() {
                Some((operator, l, r)) => write!(f, "({l} {} {r})", operator.symbol()),
                None => write!(f, "{}", self.kind().name()),
            },
        }
    }
}
