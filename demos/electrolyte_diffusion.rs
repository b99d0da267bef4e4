//! This example shows the full path from a continuous battery model to a
//! time integration:
//! 1. Write electrolyte diffusion across a cell with symbols (variables,
//!    grad/div, piecewise porosity and reaction source)
//! 2. Discretise it with finite volumes on a mesh of the cell
//! 3. Collect the result in an `ExpressionSystem` and integrate it with
//!    dopri5 from ode_solvers
//!
//! The model is
//!     eps * dc/dt = div(D * grad(c)) + j
//! where `eps` is the porosity of each region and `j` is a reaction source,
//! positive in the negative electrode and negative in the positive electrode.
//! With zero flux at both current collectors, the total amount of salt
//! changes only through the source.
//!
//! Run with: `cargo run --example electrolyte_diffusion`

use std::collections::HashMap;

use battsym::discretisation::{Discretisation, FiniteVolume, Geometry, Mesh};
use battsym::domain::{Domain, NEGATIVE_ELECTRODE, POSITIVE_ELECTRODE, SEPARATOR, WHOLE_CELL};
use battsym::evaluate::State;
use battsym::{ExpressionSystem, Symbol};
use ode_solvers::dopri5::*;
use ode_solvers::*;

const N_STATES: usize = 12;

type Concentrations = SVector<f64, N_STATES>;

/// Electrolyte diffusion as an ODE system for the solver.
struct ElectrolyteDiffusion {
    system: ExpressionSystem,
}

impl System<f64, Concentrations> for ElectrolyteDiffusion {
    fn system(&self, _t: f64, y: &Concentrations, dy: &mut Concentrations) {
        self.system
            .eval_into(y.as_slice(), dy.as_mut_slice())
            .expect("Failed to evaluate the electrolyte model");
    }
}

/// A value per electrode region, broadcast and joined over the cell.
fn piecewise(n: Symbol, s: Symbol, p: Symbol) -> Result<Symbol, Box<dyn std::error::Error>> {
    Ok(Symbol::concatenate(vec![
        n.broadcast(Domain::region(NEGATIVE_ELECTRODE))?,
        s.broadcast(Domain::region(SEPARATOR))?,
        p.broadcast(Domain::region(POSITIVE_ELECTRODE))?,
    ])?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Continuous model
    let c_e = Symbol::variable("c_e", Domain::new(WHOLE_CELL)?);
    let porosity = piecewise(
        Symbol::parameter("eps_n"),
        Symbol::scalar(1.0),
        Symbol::parameter("eps_p"),
    )?;
    let j = Symbol::parameter("j");
    let source = piecewise(j.clone(), Symbol::zero(), -&j)?;
    let flux = Symbol::parameter("D") * c_e.gradient()?;
    let rhs = (flux.divergence()? + &source) / &porosity;
    println!("Continuous model:\n  dc_e/dt = {}\n", rhs);

    // Mesh of the cell: 4 + 3 + 5 cells
    let geometry = Geometry::battery_cell(0.4, 0.3, 0.5);
    let npts = HashMap::from([
        (NEGATIVE_ELECTRODE.to_string(), 4),
        (SEPARATOR.to_string(), 3),
        (POSITIVE_ELECTRODE.to_string(), 5),
    ]);
    let mesh = Mesh::new(&geometry, &npts)?;
    let mut discretisation = Discretisation::new(mesh, FiniteVolume);
    discretisation.set_variables(&[c_e.clone()])?;
    let rhs = discretisation.process(&rhs)?;
    let porosity = discretisation.process(&porosity)?;

    let system = ExpressionSystem::new(vec![rhs], discretisation.state_len())?.with_parameters([
        ("D", 1.5),
        ("j", 0.5),
        ("eps_n", 0.3),
        ("eps_p", 0.4),
    ]);
    println!("Discretised system:\n{}", system);

    // Integrate
    let y0 = Concentrations::from_element(1.0);
    let mut stepper = Dopri5::new(
        ElectrolyteDiffusion {
            system: system.clone(),
        },
        0.0,
        1.0,
        0.001,
        y0,
        1.0e-8,
        1.0e-6,
    );
    let stats = stepper.integrate()?;
    println!("Number of evaluations: {}", stats.num_eval);
    println!("Number of accepted steps: {}", stats.accepted_steps);
    println!("Number of rejected steps: {}", stats.rejected_steps);

    let y_final = stepper.y_out().last().copied().unwrap_or(y0);
    println!("\nFinal concentration profile:");
    for (i, c) in y_final.iter().enumerate() {
        println!("  c_e[{:2}] = {:.6}", i, c);
    }

    // Salt balance: sum(eps * c * dx) changes by the integrated source
    let widths = 0.1;
    let eps = porosity.evaluate(&State::empty().with_parameters([("eps_n", 0.3), ("eps_p", 0.4)]))?;
    let salt = |y: &Concentrations| -> f64 {
        y.iter()
            .zip(eps.column(0))
            .map(|(c, e)| c * e * widths)
            .sum()
    };
    println!(
        "\nSalt: initial {:.6}, final {:.6} (source adds {:.6})",
        salt(&y0),
        salt(&y_final),
        0.5 * (0.4 - 0.5)
    );

    // Jacobian at the final state
    let jacobian: Vec<Vec<f64>> = system.jacobian(y_final.as_slice())?;
    println!("\nJacobian diagonal:");
    for (i, row) in jacobian.iter().enumerate() {
        println!("  J[{:2}][{:2}] = {:.3}", i, i, row[i]);
    }

    Ok(())
}
