//! Replacing continuous symbols by discrete ones on a mesh.
//!
//! A model is written with `Variable`s, spatial variables and the `grad` /
//! `div` operators. `Discretisation` turns such a tree into one that can be
//! evaluated:
//!
//! - each `Variable` becomes a `StateVector` slice, sized by the mesh
//! - each spatial variable becomes the `Vector` of mesh node positions
//! - `grad` and `div` become constant matrix multiplications
//! - unsized broadcasts get the node count of their domain
//!
//! The matrices come from a `SpatialMethod`; `FiniteVolume` is provided.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, trace, warn};
use ndarray::{Array1, Array2};

use crate::domain::{
    Domain, NEGATIVE_ELECTRODE, NEGATIVE_PARTICLE, POSITIVE_ELECTRODE, POSITIVE_PARTICLE,
    SEPARATOR,
};
use crate::errors::DiscretisationError;
use crate::symbol::{CoordSys, StateSlice, Symbol, SymbolKind};

const EDGE_TOLERANCE: f64 = 1e-12;

/// Extent and coordinate system of one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
    pub coord_sys: CoordSys,
}

/// The extent of every region a model may live on.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    regions: HashMap<String, Interval>,
}

impl Geometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a region.
    pub fn with_region(
        mut self,
        name: impl Into<String>,
        start: f64,
        end: f64,
        coord_sys: CoordSys,
    ) -> Self {
        self.regions.insert(
            name.into(),
            Interval {
                start,
                end,
                coord_sys,
            },
        );
        self
    }

    /// A cell with electrodes and separator laid end to end, and unit-radius
    /// spherical particles.
    ///
    /// # Arguments
    /// * `l_n` - Negative electrode thickness
    /// * `l_s` - Separator thickness
    /// * `l_p` - Positive electrode thickness
    pub fn battery_cell(l_n: f64, l_s: f64, l_p: f64) -> Self {
        Self::new()
            .with_region(NEGATIVE_ELECTRODE, 0.0, l_n, CoordSys::Cartesian)
            .with_region(SEPARATOR, l_n, l_n + l_s, CoordSys::Cartesian)
            .with_region(
                POSITIVE_ELECTRODE,
                l_n + l_s,
                l_n + l_s + l_p,
                CoordSys::Cartesian,
            )
            .with_region(NEGATIVE_PARTICLE, 0.0, 1.0, CoordSys::SphericalPolar)
            .with_region(POSITIVE_PARTICLE, 0.0, 1.0, CoordSys::SphericalPolar)
    }

    pub fn interval(&self, region: &str) -> Option<&Interval> {
        self.regions.get(region)
    }
}

/// A 1D mesh: cell edges and the cell centres (nodes) between them.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    edges: Array1<f64>,
    nodes: Array1<f64>,
    coord_sys: CoordSys,
}

impl SubMesh {
    /// `npts` equal cells over an interval.
    pub fn uniform(interval: &Interval, npts: usize) -> Self {
        let edges = Array1::linspace(interval.start, interval.end, npts + 1);
        Self::from_edges(edges, interval.coord_sys)
    }

    fn from_edges(edges: Array1<f64>, coord_sys: CoordSys) -> Self {
        let nodes = edges
            .iter()
            .tuple_windows()
            .map(|(left, right)| (left + right) / 2.0)
            .collect();
        Self {
            edges,
            nodes,
            coord_sys,
        }
    }

    /// Joins the meshes of adjacent regions; the shared edge appears once.
    fn join(parts: &[&SubMesh]) -> Self {
        let mut edges: Vec<f64> = Vec::new();
        for part in parts {
            match (edges.last().copied(), part.edges.first().copied()) {
                (Some(last), Some(first)) => {
                    if (last - first).abs() > EDGE_TOLERANCE {
                        warn!("joining meshes with a gap between {last} and {first}");
                    }
                    edges.extend(part.edges.iter().skip(1));
                }
                _ => edges.extend(part.edges.iter()),
            }
        }
        let coord_sys = parts.first().map(|p| p.coord_sys).unwrap_or_default();
        Self::from_edges(Array1::from(edges), coord_sys)
    }

    /// Number of nodes.
    pub fn npts(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &Array1<f64> {
        &self.edges
    }

    pub fn nodes(&self) -> &Array1<f64> {
        &self.nodes
    }

    pub fn coord_sys(&self) -> CoordSys {
        self.coord_sys
    }
}

/// Sub-meshes for a set of regions.
#[derive(Debug, Clone)]
pub struct Mesh {
    submeshes: HashMap<String, SubMesh>,
}

impl Mesh {
    /// Builds a uniform sub-mesh for every region in `npts`.
    ///
    /// # Errors
    /// Returns `DiscretisationError::MissingMesh` if a region is not in the
    /// geometry or is given no points.
    pub fn new(
        geometry: &Geometry,
        npts: &HashMap<String, usize>,
    ) -> Result<Self, DiscretisationError> {
        let submeshes = npts
            .iter()
            .map(|(region, &n)| {
                let interval = geometry
                    .interval(region)
                    .filter(|_| n > 0)
                    .ok_or_else(|| DiscretisationError::MissingMesh(region.clone()))?;
                Ok((region.clone(), SubMesh::uniform(interval, n)))
            })
            .collect::<Result<HashMap<_, _>, DiscretisationError>>()?;
        Ok(Self { submeshes })
    }

    /// The mesh over a domain, joining its regions in order.
    pub fn submesh(&self, domain: &Domain) -> Result<SubMesh, DiscretisationError> {
        if domain.is_empty() {
            return Err(DiscretisationError::MissingMesh(domain.to_string()));
        }
        let parts = domain
            .regions()
            .iter()
            .map(|region| {
                self.submeshes
                    .get(region)
                    .ok_or_else(|| DiscretisationError::MissingMesh(region.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SubMesh::join(&parts))
    }

    /// Number of nodes over a domain.
    pub fn npts(&self, domain: &Domain) -> Result<usize, DiscretisationError> {
        domain
            .regions()
            .iter()
            .map(|region| {
                self.submeshes
                    .get(region)
                    .map(SubMesh::npts)
                    .ok_or_else(|| DiscretisationError::MissingMesh(region.clone()))
            })
            .sum()
    }
}

/// Turns continuous spatial nodes into discrete ones.
///
/// Operands passed to `gradient` and `divergence` are already discretised.
pub trait SpatialMethod {
    fn spatial_variable(&self, symbol: &Symbol, mesh: &Mesh)
        -> Result<Symbol, DiscretisationError>;

    fn gradient(
        &self,
        domain: &Domain,
        operand: &Symbol,
        mesh: &Mesh,
    ) -> Result<Symbol, DiscretisationError>;

    fn divergence(
        &self,
        domain: &Domain,
        operand: &Symbol,
        mesh: &Mesh,
    ) -> Result<Symbol, DiscretisationError>;

    /// Gives a broadcast the node count of its domain.
    fn broadcast(
        &self,
        child: &Symbol,
        domain: &Domain,
        mesh: &Mesh,
    ) -> Result<Symbol, DiscretisationError> {
        let size = mesh.npts(domain)?;
        Ok(child.broadcast_sized(domain.clone(), Some(size))?)
    }
}

/// Cell-centred finite volumes.
///
/// Values live on the nodes; gradients live on the interior edges. The
/// divergence assumes zero flux through both boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiniteVolume;

impl FiniteVolume {
    /// The `(n - 1) x n` matrix taking node values to interior-edge gradients.
    pub fn gradient_matrix(submesh: &SubMesh) -> Array2<f64> {
        let n = submesh.npts();
        let nodes = submesh.nodes();
        let mut matrix = Array2::zeros((n.saturating_sub(1), n));
        for j in 0..n.saturating_sub(1) {
            let h = nodes[j + 1] - nodes[j];
            matrix[[j, j]] = -1.0 / h;
            matrix[[j, j + 1]] = 1.0 / h;
        }
        matrix
    }

    /// The `n x (n - 1)` matrix taking interior-edge fluxes to node divergences.
    pub fn divergence_matrix(submesh: &SubMesh) -> Array2<f64> {
        let n = submesh.npts();
        let edges = submesh.edges();
        let mut matrix = Array2::zeros((n, n.saturating_sub(1)));
        for i in 0..n {
            let (left, right) = (edges[i], edges[i + 1]);
            let (into_left, out_right) = match submesh.coord_sys() {
                CoordSys::Cartesian => {
                    let dx = right - left;
                    (1.0 / dx, 1.0 / dx)
                }
                CoordSys::SphericalPolar => {
                    let volume = (right.powi(3) - left.powi(3)) / 3.0;
                    (left * left / volume, right * right / volume)
                }
            };
            if i + 1 < n {
                matrix[[i, i]] = out_right;
            }
            if i > 0 {
                matrix[[i, i - 1]] = -into_left;
            }
        }
        matrix
    }
}

fn check_operand(
    operator: &'static str,
    expected: usize,
    operand: &Symbol,
) -> Result<(), DiscretisationError> {
    match operand.len() {
        Some(len) if len == expected || len == 1 => Ok(()),
        got => Err(DiscretisationError::OperandShape {
            operator,
            expected,
            got,
        }),
    }
}

impl SpatialMethod for FiniteVolume {
    fn spatial_variable(
        &self,
        symbol: &Symbol,
        mesh: &Mesh,
    ) -> Result<Symbol, DiscretisationError> {
        let submesh = mesh.submesh(symbol.domain())?;
        Ok(Symbol::vector(
            submesh.nodes().clone(),
            symbol.domain().clone(),
        ))
    }

    fn gradient(
        &self,
        domain: &Domain,
        operand: &Symbol,
        mesh: &Mesh,
    ) -> Result<Symbol, DiscretisationError> {
        let submesh = mesh.submesh(domain)?;
        check_operand("grad", submesh.npts(), operand)?;
        let matrix = Self::gradient_matrix(&submesh);
        Ok(Symbol::matmul_shared(Arc::new(matrix), operand)?)
    }

    fn divergence(
        &self,
        domain: &Domain,
        operand: &Symbol,
        mesh: &Mesh,
    ) -> Result<Symbol, DiscretisationError> {
        let submesh = mesh.submesh(domain)?;
        check_operand("div", submesh.npts().saturating_sub(1), operand)?;
        let matrix = Self::divergence_matrix(&submesh);
        Ok(Symbol::matmul_shared(Arc::new(matrix), operand)?)
    }
}

/// Assigns state slices to variables and rewrites trees onto a mesh.
///
/// # Example
/// ```
/// use battsym::prelude::*;
/// use std::collections::HashMap;
///
/// let geometry = Geometry::battery_cell(1.0, 1.0, 1.0);
/// let npts = HashMap::from([("separator".to_string(), 4)]);
/// let mesh = Mesh::new(&geometry, &npts).unwrap();
///
/// let c = Symbol::variable("c", Domain::region("separator"));
/// let mut disc = Discretisation::new(mesh, FiniteVolume);
/// disc.set_variables(&[c.clone()]).unwrap();
///
/// let rhs = disc.process(&c.gradient().unwrap().divergence().unwrap()).unwrap();
/// assert_eq!(rhs.len(), Some(4));
/// ```
pub struct Discretisation<M: SpatialMethod = FiniteVolume> {
    mesh: Mesh,
    method: M,
    variables: HashMap<u64, (Symbol, Symbol)>,
    state_len: usize,
}

impl<M: SpatialMethod> Discretisation<M> {
    pub fn new(mesh: Mesh, method: M) -> Self {
        Self {
            mesh,
            method,
            variables: HashMap::new(),
            state_len: 0,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Gives each variable the next free slice of the state vector.
    ///
    /// A variable on a domain gets one entry per mesh node; a variable
    /// without a domain gets one entry. Variables already assigned keep
    /// their slice.
    ///
    /// # Errors
    /// Returns `DiscretisationError::NotAVariable` for any other symbol and
    /// `DiscretisationError::MissingMesh` if a domain has no mesh.
    pub fn set_variables(&mut self, variables: &[Symbol]) -> Result<(), DiscretisationError> {
        for variable in variables {
            let SymbolKind::Variable(name) = variable.kind() else {
                return Err(DiscretisationError::NotAVariable(variable.to_string()));
            };
            if self.slice_of(variable).is_some() {
                continue;
            }
            let size = if variable.domain().is_empty() {
                1
            } else {
                self.mesh.npts(variable.domain())?
            };
            let range = self.state_len..self.state_len + size;
            let state_vector = Symbol::state_vector_on(range, variable.domain().clone())?;
            debug!("assigned {state_vector} to variable '{name}'");
            self.variables
                .insert(variable.id(), (variable.clone(), state_vector));
            self.state_len += size;
        }
        Ok(())
    }

    /// Total length of the state vector assigned so far.
    pub fn state_len(&self) -> usize {
        self.state_len
    }

    /// The slice assigned to a variable, if any.
    pub fn slice_of(&self, variable: &Symbol) -> Option<StateSlice> {
        self.variables
            .get(&variable.id())
            .filter(|(known, _)| known == variable)
            .and_then(|(_, state_vector)| match state_vector.kind() {
                SymbolKind::StateVector(slice) => Some(*slice),
                _ => None,
            })
    }

    /// Rewrites a tree onto the mesh and simplifies the result.
    ///
    /// # Errors
    /// Returns a `DiscretisationError` if a variable has no slice, a region
    /// has no mesh, or a spatial operator gets an operand of the wrong size.
    pub fn process(&self, symbol: &Symbol) -> Result<Symbol, DiscretisationError> {
        let mut processor = Processor {
            discretisation: self,
            memo: HashMap::new(),
        };
        let discretised = processor.process(symbol)?;
        debug!(
            "discretised tree {:x} through {} distinct subtrees",
            symbol.id(),
            processor.memo.len()
        );
        Ok(discretised.simplify())
    }

    /// Processes several trees, sharing work between common subtrees.
    pub fn process_all(&self, symbols: &[Symbol]) -> Result<Vec<Symbol>, DiscretisationError> {
        let mut processor = Processor {
            discretisation: self,
            memo: HashMap::new(),
        };
        symbols
            .iter()
            .map(|symbol| Ok(processor.process(symbol)?.simplify()))
            .collect()
    }
}

struct Processor<'d, M: SpatialMethod> {
    discretisation: &'d Discretisation<M>,
    memo: HashMap<u64, (Symbol, Symbol)>,
}

impl<M: SpatialMethod> Processor<'_, M> {
    fn process(&mut self, symbol: &Symbol) -> Result<Symbol, DiscretisationError> {
        if let Some((original, done)) = self.memo.get(&symbol.id()) {
            if original == symbol {
                return Ok(done.clone());
            }
        }
        let done = self.rewrite(symbol)?;
        trace!("{symbol} -> {done}");
        self.memo
            .insert(symbol.id(), (symbol.clone(), done.clone()));
        Ok(done)
    }

    fn rewrite(&mut self, symbol: &Symbol) -> Result<Symbol, DiscretisationError> {
        let disc = self.discretisation;
        match symbol.kind() {
            SymbolKind::Variable(name) => disc
                .variables
                .get(&symbol.id())
                .filter(|(known, _)| known == symbol)
                .map(|(_, state_vector)| state_vector.clone())
                .ok_or_else(|| DiscretisationError::UnassignedVariable(name.clone())),
            SymbolKind::SpatialVariable { .. } => {
                disc.method.spatial_variable(symbol, &disc.mesh)
            }
            SymbolKind::Gradient(operand) => {
                let operand = self.process(operand)?;
                disc.method.gradient(symbol.domain(), &operand, &disc.mesh)
            }
            SymbolKind::Divergence(operand) => {
                let operand = self.process(operand)?;
                disc.method
                    .divergence(symbol.domain(), &operand, &disc.mesh)
            }
            SymbolKind::Broadcast { child, .. } => {
                let child = self.process(child)?;
                disc.method.broadcast(&child, symbol.domain(), &disc.mesh)
            }
            _ => symbol.map_children(|child| self.process(child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::State;
    use ndarray::array;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-10,
            "expected {expected}, got {actual}"
        );
    }

    fn mesh(npts: &[(&str, usize)]) -> Mesh {
        let geometry = Geometry::battery_cell(3.0, 1.0, 2.0);
        let npts = npts
            .iter()
            .map(|(region, n)| (region.to_string(), *n))
            .collect();
        Mesh::new(&geometry, &npts).unwrap()
    }

    #[test]
    fn test_uniform_submesh() {
        let interval = Interval {
            start: 0.0,
            end: 3.0,
            coord_sys: CoordSys::Cartesian,
        };
        let submesh = SubMesh::uniform(&interval, 3);
        assert_eq!(submesh.edges(), &array![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(submesh.nodes(), &array![0.5, 1.5, 2.5]);
        assert_eq!(submesh.npts(), 3);
    }

    #[test]
    fn test_joined_submesh() -> Result<(), Box<dyn std::error::Error>> {
        let mesh = mesh(&[(NEGATIVE_ELECTRODE, 3), (SEPARATOR, 2), (POSITIVE_ELECTRODE, 4)]);
        let cell = Domain::new([NEGATIVE_ELECTRODE, SEPARATOR, POSITIVE_ELECTRODE])?;
        let submesh = mesh.submesh(&cell)?;

        assert_eq!(submesh.npts(), 9);
        assert_eq!(submesh.edges().len(), 10);
        assert_eq!(mesh.npts(&cell)?, 9);
        assert_close(submesh.edges()[3], 3.0);
        assert_close(submesh.edges()[5], 4.0);
        assert_close(submesh.edges()[9], 6.0);
        Ok(())
    }

    #[test]
    fn test_missing_mesh() {
        let geometry = Geometry::battery_cell(1.0, 1.0, 1.0);
        let npts = HashMap::from([("anode tab".to_string(), 3)]);
        assert!(matches!(
            Mesh::new(&geometry, &npts),
            Err(DiscretisationError::MissingMesh(region)) if region == "anode tab"
        ));

        let mesh = mesh(&[(NEGATIVE_ELECTRODE, 3)]);
        assert!(matches!(
            mesh.submesh(&Domain::region(SEPARATOR)),
            Err(DiscretisationError::MissingMesh(_))
        ));
    }

    #[test]
    fn test_finite_volume_matrices() {
        let mesh = mesh(&[(NEGATIVE_ELECTRODE, 3)]);
        let submesh = mesh.submesh(&Domain::region(NEGATIVE_ELECTRODE)).unwrap();

        let grad = FiniteVolume::gradient_matrix(&submesh);
        assert_eq!(grad, array![[-1.0, 1.0, 0.0], [0.0, -1.0, 1.0]]);

        let div = FiniteVolume::divergence_matrix(&submesh);
        assert_eq!(div, array![[1.0, 0.0], [-1.0, 1.0], [0.0, -1.0]]);
    }

    #[test]
    fn test_spherical_divergence_conserves() {
        let mesh = mesh(&[(NEGATIVE_PARTICLE, 5)]);
        let submesh = mesh.submesh(&Domain::region(NEGATIVE_PARTICLE)).unwrap();
        let div = FiniteVolume::divergence_matrix(&submesh);
        let edges = submesh.edges();
        let volumes: Array1<f64> = edges
            .iter()
            .tuple_windows()
            .map(|(l, r)| (r.powi(3) - l.powi(3)) / 3.0)
            .collect();

        // with zero boundary flux, volume-weighted divergence sums to zero
        let fluxes = array![0.3, -1.2, 2.0, 0.7];
        let total = volumes.dot(&div.dot(&fluxes));
        assert_close(total, 0.0);
    }

    #[test]
    fn test_process_diffusion() -> Result<(), Box<dyn std::error::Error>> {
        let domain = Domain::region(NEGATIVE_ELECTRODE);
        let c = Symbol::variable("c", domain.clone());
        let mut disc = Discretisation::new(mesh(&[(NEGATIVE_ELECTRODE, 3)]), FiniteVolume);
        disc.set_variables(&[c.clone()])?;
        assert_eq!(disc.state_len(), 3);
        assert_eq!(disc.slice_of(&c), Some(StateSlice::new(0, 3)?));

        let rhs = disc.process(&c.gradient()?.divergence()?)?;
        assert_eq!(rhs.len(), Some(3));
        assert_eq!(rhs.domain(), &domain);

        let value = rhs.evaluate(&State::new(&[1.0, 2.0, 4.0]))?;
        assert_close(value[[0, 0]], 1.0);
        assert_close(value[[1, 0]], 1.0);
        assert_close(value[[2, 0]], -2.0);
        Ok(())
    }

    #[test]
    fn test_process_all_reuses_equal_subtrees() -> Result<(), Box<dyn std::error::Error>> {
        let domain = Domain::region(NEGATIVE_ELECTRODE);
        let c = Symbol::variable("c", domain.clone());
        let mut disc = Discretisation::new(mesh(&[(NEGATIVE_ELECTRODE, 3)]), FiniteVolume);
        disc.set_variables(&[c.clone()])?;

        // two separately built copies of a deeply shared tree
        let tower = |c: Symbol| (0..40).fold(c, |acc, _| &acc * &acc);
        let first = tower(c.clone());
        let second = tower(Symbol::variable("c", domain.clone()));
        assert!(!first.ptr_eq(&second));
        assert_eq!(first, second);

        let diffusion = c.gradient()?.divergence()?;
        let processed = disc.process_all(&[first, second, diffusion])?;
        assert_eq!(processed[0], processed[1]);
        assert_ne!(processed[0], processed[2]);

        let state = State::new(&[1.0, 1.0, 1.0]);
        assert_eq!(processed[1].evaluate(&state)?, array![[1.0], [1.0], [1.0]]);
        let flux = processed[2].evaluate(&state)?;
        assert!(flux.iter().all(|v| v.abs() < 1e-12));
        Ok(())
    }

    #[test]
    fn test_jacobian_column_of_discretised_operator() -> Result<(), Box<dyn std::error::Error>> {
        let c = Symbol::variable("c", Domain::region(NEGATIVE_ELECTRODE));
        let mut disc = Discretisation::new(mesh(&[(NEGATIVE_ELECTRODE, 3)]), FiniteVolume);
        disc.set_variables(&[c.clone()])?;
        let rhs = disc.process(&c.gradient()?.divergence()?)?;

        let column = rhs.diff(&Symbol::state_vector(1..2)?)?;
        let value = column.evaluate(&State::new(&[0.0, 0.0, 0.0]))?;
        assert_eq!(value.nrows(), 3);
        assert_close(value[[0, 0]], 1.0);
        assert_close(value[[1, 0]], -2.0);
        assert_close(value[[2, 0]], 1.0);
        Ok(())
    }

    #[test]
    fn test_spatial_variable_and_broadcast() -> Result<(), Box<dyn std::error::Error>> {
        let domain = Domain::region(SEPARATOR);
        let disc: Discretisation = Discretisation::new(mesh(&[(SEPARATOR, 2)]), FiniteVolume);

        let x = Symbol::spatial_variable("x_s", domain.clone(), CoordSys::Cartesian)?;
        let k = Symbol::parameter("k").broadcast(domain.clone())?;
        let rhs = disc.process(&(&x * &k))?;
        assert_eq!(rhs.len(), Some(2));

        let value = rhs.evaluate(&State::empty().with_parameter("k", 2.0))?;
        assert_close(value[[0, 0]], 6.5);
        assert_close(value[[1, 0]], 7.5);
        Ok(())
    }

    #[test]
    fn test_variable_errors() -> Result<(), Box<dyn std::error::Error>> {
        let mut disc = Discretisation::new(mesh(&[(NEGATIVE_ELECTRODE, 3)]), FiniteVolume);
        let c = Symbol::variable("c", Domain::region(NEGATIVE_ELECTRODE));

        assert!(matches!(
            disc.process(&c),
            Err(DiscretisationError::UnassignedVariable(name)) if name == "c"
        ));
        assert!(matches!(
            disc.set_variables(&[Symbol::parameter("k")]),
            Err(DiscretisationError::NotAVariable(_))
        ));

        let t = Symbol::variable("T", Domain::empty());
        disc.set_variables(&[c.clone(), t.clone(), c.clone()])?;
        assert_eq!(disc.slice_of(&t), Some(StateSlice::new(3, 4)?));
        assert_eq!(disc.state_len(), 4);
        Ok(())
    }

    #[test]
    fn test_operand_shape() -> Result<(), Box<dyn std::error::Error>> {
        let domain = Domain::region(NEGATIVE_ELECTRODE);
        let disc: Discretisation = Discretisation::new(mesh(&[(NEGATIVE_ELECTRODE, 3)]), FiniteVolume);
        let wrong = Symbol::vector(array![1.0, 2.0, 3.0, 4.0], domain);
        assert!(matches!(
            disc.process(&wrong.gradient()?),
            Err(DiscretisationError::OperandShape {
                operator: "grad",
                expected: 3,
                got: Some(4)
            })
        ));
        Ok(())
    }
}
