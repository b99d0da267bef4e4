use std::collections::HashMap;

use battsym::domain::{NEGATIVE_ELECTRODE, NEGATIVE_PARTICLE, POSITIVE_ELECTRODE, SEPARATOR, WHOLE_CELL};
use battsym::prelude::*;
use ndarray::{Array1, Array2};

fn mesh() -> Mesh {
    let geometry = Geometry::battery_cell(0.4, 0.3, 0.5);
    let npts = HashMap::from([
        (NEGATIVE_ELECTRODE.to_string(), 4),
        (SEPARATOR.to_string(), 3),
        (POSITIVE_ELECTRODE.to_string(), 5),
        (NEGATIVE_PARTICLE.to_string(), 6),
    ]);
    Mesh::new(&geometry, &npts).unwrap()
}

/// One value per electrode region, concatenated over the cell.
fn piecewise(n: Symbol, s: Symbol, p: Symbol) -> Symbol {
    Symbol::concatenate(vec![
        n.broadcast(Domain::region(NEGATIVE_ELECTRODE)).unwrap(),
        s.broadcast(Domain::region(SEPARATOR)).unwrap(),
        p.broadcast(Domain::region(POSITIVE_ELECTRODE)).unwrap(),
    ])
    .unwrap()
}

fn parameters() -> [(&'static str, f64); 4] {
    [("D", 1.5), ("j", 2.0), ("eps_n", 0.3), ("eps_p", 0.4)]
}

struct ElectrolyteModel {
    discretisation: Discretisation,
    rhs: Symbol,
    porosity: Symbol,
    source: Symbol,
}

/// eps * dc/dt = div(D * grad(c)) + j, with a source in each electrode.
fn electrolyte_model() -> Result<ElectrolyteModel, Box<dyn std::error::Error>> {
    let cell = Domain::new(WHOLE_CELL)?;
    let c_e = Symbol::variable("c_e", cell);
    let porosity = piecewise(
        Symbol::parameter("eps_n"),
        Symbol::scalar(1.0),
        Symbol::parameter("eps_p"),
    );
    let j = Symbol::parameter("j");
    let source = piecewise(j.clone(), Symbol::zero(), -&j);
    let flux = Symbol::parameter("D") * c_e.gradient()?;
    let rhs = (flux.divergence()? + &source) / &porosity;

    let mut discretisation = Discretisation::new(mesh(), FiniteVolume);
    discretisation.set_variables(&[c_e])?;
    let mut processed = discretisation.process_all(&[rhs, porosity, source])?;
    let source = processed.remove(2);
    let porosity = processed.remove(1);
    let rhs = processed.remove(0);
    Ok(ElectrolyteModel {
        discretisation,
        rhs,
        porosity,
        source,
    })
}

fn column(value: Array2<f64>) -> Array1<f64> {
    value.column(0).to_owned()
}

fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "{actual} != {expected}"
    );
}

fn sample_state(n: usize) -> Vec<f64> {
    (0..n).map(|i| 2.0 + (i as f64).sin()).collect()
}

#[test]
fn discretised_model_has_cell_shape() -> Result<(), Box<dyn std::error::Error>> {
    let model = electrolyte_model()?;
    assert_eq!(model.discretisation.state_len(), 12);
    assert_eq!(model.rhs.len(), Some(12));
    assert_eq!(model.rhs.domain(), &Domain::new(WHOLE_CELL)?);
    Ok(())
}

#[test]
fn uniform_concentration_only_sees_the_source() -> Result<(), Box<dyn std::error::Error>> {
    let model = electrolyte_model()?;
    let state = State::new(&[1.0; 12]).with_parameters(parameters());
    let rhs = column(model.rhs.evaluate(&state)?);

    for i in 0..4 {
        assert_close(rhs[i], 2.0 / 0.3);
    }
    for i in 4..7 {
        assert_close(rhs[i], 0.0);
    }
    for i in 7..12 {
        assert_close(rhs[i], -2.0 / 0.4);
    }
    Ok(())
}

#[test]
fn diffusion_conserves_mass() -> Result<(), Box<dyn std::error::Error>> {
    let model = electrolyte_model()?;
    let cell = Domain::new(WHOLE_CELL)?;
    let edges = model.discretisation.mesh().submesh(&cell)?.edges().clone();
    let widths: Array1<f64> = edges
        .windows(2)
        .into_iter()
        .map(|w| w[1] - w[0])
        .collect();

    let state = State::new(&sample_state(12)).with_parameters(parameters());
    let rhs = column(model.rhs.evaluate(&state)?);
    let porosity = column(model.porosity.evaluate(&state)?);
    let source = column(model.source.evaluate(&state)?);

    let accumulated = (&rhs * &porosity * &widths).sum();
    let injected = (&source * &widths).sum();
    assert_close(accumulated, injected);
    Ok(())
}

#[test]
fn system_jacobian_reproduces_linear_model() -> Result<(), Box<dyn std::error::Error>> {
    let model = electrolyte_model()?;
    let system = ExpressionSystem::new(vec![model.rhs.clone()], model.discretisation.state_len())?
        .with_parameters(parameters());

    let y = sample_state(12);
    let jacobian: Array2<f64> = system.jacobian(&y)?;
    let at_zero = Array1::from(system.eval(&[0.0; 12])?);
    let at_y = Array1::from(system.eval(&y)?);
    let predicted = jacobian.dot(&Array1::from(y.clone())) + &at_zero;
    for (p, a) in predicted.iter().zip(at_y.iter()) {
        assert_close(*p, *a);
    }

    // three-point stencil: nothing couples entries two apart
    assert_eq!(jacobian[[0, 2]], 0.0);
    assert_eq!(jacobian[[9, 5]], 0.0);
    // separator interior: -2 D / (dx^2 eps)
    assert_close(jacobian[[5, 5]], -2.0 * 1.5 / 0.01);
    assert_close(jacobian[[5, 4]], 1.5 / 0.01);
    Ok(())
}

#[test]
fn particle_diffusion_conserves_in_spherical_coordinates() -> Result<(), Box<dyn std::error::Error>> {
    let particle = Domain::region(NEGATIVE_PARTICLE);
    let c_s = Symbol::variable("c_s", particle.clone());
    let r = Symbol::spatial_variable("r_n", particle.clone(), CoordSys::SphericalPolar)?;

    let mut discretisation = Discretisation::new(mesh(), FiniteVolume);
    discretisation.set_variables(&[c_s.clone()])?;
    let rhs = discretisation.process(&c_s.gradient()?.divergence()?)?;
    let radius = discretisation.process(&r)?;

    let state = State::new(&sample_state(6));
    let rhs = column(rhs.evaluate(&state)?);
    let edges = discretisation.mesh().submesh(&particle)?.edges().clone();
    let volumes: Array1<f64> = edges
        .windows(2)
        .into_iter()
        .map(|w| (w[1].powi(3) - w[0].powi(3)) / 3.0)
        .collect();
    assert_close((&rhs * &volumes).sum(), 0.0);

    let nodes = column(radius.evaluate(&State::empty())?);
    assert_eq!(nodes.len(), 6);
    assert_close(nodes[0], 1.0 / 12.0);
    Ok(())
}

#[test]
fn parsed_expressions_discretise_like_built_ones() -> Result<(), Box<dyn std::error::Error>> {
    let cell = Domain::new(WHOLE_CELL)?;
    let c_e = Symbol::variable("c_e", cell);
    let bindings = HashMap::from([
        ("c".to_string(), c_e.clone()),
        ("k".to_string(), Symbol::parameter("k")),
    ]);
    let parsed = Symbol::parse("k * c^2 - exp(-c)", &bindings)?;
    let built = Symbol::parameter("k") * c_e.pow(2.0) - (-&c_e).exp();
    assert_eq!(parsed, built);

    let mut discretisation = Discretisation::new(mesh(), FiniteVolume);
    discretisation.set_variables(&[c_e])?;
    let value = discretisation
        .process(&parsed)?
        .evaluate(&State::new(&[2.0; 12]).with_parameter("k", 0.5))?;
    assert_eq!(value.nrows(), 12);
    assert_close(value[[11, 0]], 2.0 - (-2.0f64).exp());
    Ok(())
}
