//! # Electrolyte Diffusion Simulation Benchmark
//!
//! Integrates a finite-volume model of electrolyte diffusion across a cell:
//!
//! eps * dc/dt = div(D * grad(c)) + j
//!
//! with porosity `eps` and a reaction source `j` that is positive in the
//! negative electrode and negative in the positive electrode.
//!
//! ## Implementations Compared
//!
//! 1. **Direct Implementation**: hand-written finite-volume stencil.
//! 2. **Symbolic Implementation**: the same model written as symbols,
//!    discretised by `battsym` and evaluated through an `ExpressionSystem`.
//!
//! ## Benchmark Details
//!
//! - **ODE Solver**: Dormand-Prince 5th order (Dopri5) adaptive step-size method
//! - **Mesh**: 4 + 3 + 5 cells of width 0.1
//! - **Time Range**: 0.0 to 0.5
//! - **Tolerances**: Absolute 1e-8, Relative 1e-6

use std::collections::HashMap;
use std::hint::black_box;

use battsym::discretisation::{Discretisation, FiniteVolume, Geometry, Mesh};
use battsym::domain::{Domain, NEGATIVE_ELECTRODE, POSITIVE_ELECTRODE, SEPARATOR, WHOLE_CELL};
use battsym::{ExpressionSystem, Symbol};
use criterion::{criterion_group, criterion_main, Criterion};
use ode_solvers::dopri5::*;
use ode_solvers::*;

const N_STATES: usize = 12;
const DX: f64 = 0.1;
const DIFFUSIVITY: f64 = 1.5;
const SOURCE: f64 = 2.0;
const POROSITY: [f64; 3] = [0.3, 1.0, 0.4];

type Concentrations = SVector<f64, N_STATES>;

fn region_of(i: usize) -> usize {
    match i {
        0..=3 => 0,
        4..=6 => 1,
        _ => 2,
    }
}

/// Hand-written finite volumes with zero flux at both ends.
struct DirectSystem;

impl System<f64, Concentrations> for DirectSystem {
    #[inline(always)]
    fn system(&self, _t: f64, y: &Concentrations, dy: &mut Concentrations) {
        for i in 0..N_STATES {
            let flux_in = if i > 0 {
                DIFFUSIVITY * (y[i] - y[i - 1]) / DX
            } else {
                0.0
            };
            let flux_out = if i + 1 < N_STATES {
                DIFFUSIVITY * (y[i + 1] - y[i]) / DX
            } else {
                0.0
            };
            let region = region_of(i);
            let source = match region {
                0 => SOURCE,
                1 => 0.0,
                _ => -SOURCE,
            };
            dy[i] = ((flux_out - flux_in) / DX + source) / POROSITY[region];
        }
    }
}

/// The same model, discretised from symbols.
struct SymbolicSystem<'a> {
    system: &'a ExpressionSystem,
}

impl System<f64, Concentrations> for SymbolicSystem<'_> {
    #[inline(always)]
    fn system(&self, _t: f64, y: &Concentrations, dy: &mut Concentrations) {
        self.system
            .eval_into(y.as_slice(), dy.as_mut_slice())
            .expect("evaluation failed");
    }
}

fn piecewise(values: [Symbol; 3]) -> Symbol {
    let regions = [NEGATIVE_ELECTRODE, SEPARATOR, POSITIVE_ELECTRODE];
    let children = values
        .into_iter()
        .zip(regions)
        .map(|(value, region)| value.broadcast(Domain::region(region)).unwrap())
        .collect();
    Symbol::concatenate(children).unwrap()
}

fn electrolyte_system() -> ExpressionSystem {
    let c_e = Symbol::variable("c_e", Domain::new(WHOLE_CELL).unwrap());
    let porosity = piecewise(POROSITY.map(Symbol::scalar));
    let j = Symbol::parameter("j");
    let source = piecewise([j.clone(), Symbol::zero(), -&j]);
    let flux = Symbol::parameter("D") * c_e.gradient().unwrap();
    let rhs = (flux.divergence().unwrap() + source) / porosity;

    let geometry = Geometry::battery_cell(0.4, 0.3, 0.5);
    let npts = HashMap::from([
        (NEGATIVE_ELECTRODE.to_string(), 4),
        (SEPARATOR.to_string(), 3),
        (POSITIVE_ELECTRODE.to_string(), 5),
    ]);
    let mut discretisation = Discretisation::new(Mesh::new(&geometry, &npts).unwrap(), FiniteVolume);
    discretisation.set_variables(&[c_e]).unwrap();
    let rhs = discretisation.process(&rhs).unwrap();

    ExpressionSystem::new(vec![rhs], discretisation.state_len())
        .expect("Failed to create expression system")
        .with_parameters([("D", DIFFUSIVITY), ("j", SOURCE)])
}

fn run_simulation<S: System<f64, Concentrations>>(system: S) {
    let y0 = Concentrations::from_element(1.0);
    let mut stepper = Dopri5::new(system, 0.0, 0.5, 0.001, y0, 1.0e-8, 1.0e-6);
    let _ = stepper.integrate();
}

fn benchmark_simulations(c: &mut Criterion) {
    let system = electrolyte_system();

    let mut group = c.benchmark_group("Electrolyte Diffusion Simulation");

    group.bench_function("Direct Implementation", |b| {
        b.iter(|| run_simulation(black_box(DirectSystem)))
    });

    group.bench_function("Symbolic Implementation", |b| {
        b.iter(|| run_simulation(black_box(SymbolicSystem { system: &system })))
    });

    group.bench_function("Jacobian Assembly", |b| {
        let y = vec![1.0; N_STATES];
        b.iter(|| {
            let jacobian: Vec<Vec<f64>> = system.jacobian(black_box(&y)).unwrap();
            jacobian
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_simulations);
criterion_main!(benches);
