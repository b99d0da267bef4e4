use battsym::prelude::*;

fn sv(start: usize) -> Symbol {
    Symbol::state_vector(start..start + 1).unwrap()
}

fn expressions() -> Vec<Symbol> {
    let (a, b) = (sv(0), sv(1));
    vec![
        &a * b.pow(a.clone()),
        (&a * 2.0 + 5.0 * (-&b)) / (&a * &b),
        ((&a * 4.0).cos() / 2.0).sin() * (4.0 * (&b / 3.0).exp()).cos(),
        (&a + 2.0 * &b + &a * &b).exp() + &a * b.exp(),
        (&a - &b).pow(2.0) / (1.0 + &a * &a),
        (&a * &b).sqrt() - b.ln() * a.tanh(),
        (&a * 1.0 + 0.0) * (&b - &b + 3.0),
    ]
}

fn states() -> Vec<State> {
    vec![
        State::new(&[5.0, 3.0, 1.0]),
        State::new(&[0.5, 1.5, 2.0]),
        State::new(&[2.0, 0.25, -1.0]),
    ]
}

fn at(expr: &Symbol, state: &State) -> f64 {
    expr.evaluate(state).unwrap()[[0, 0]]
}

fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-10 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "{actual} != {expected}"
    );
}

#[test]
fn derivative_of_sum_is_sum_of_derivatives() -> Result<(), Box<dyn std::error::Error>> {
    let exprs = expressions();
    for variable in [sv(0), sv(1)] {
        for (f, g) in exprs.iter().zip(exprs.iter().skip(1)) {
            let whole = (f + g).diff(&variable)?;
            let parts = (f.diff(&variable)?, g.diff(&variable)?);
            for state in states() {
                assert_close(at(&whole, &state), at(&parts.0, &state) + at(&parts.1, &state));
            }
        }
    }
    Ok(())
}

#[test]
fn derivative_with_respect_to_absent_state_is_zero() -> Result<(), Box<dyn std::error::Error>> {
    let c = sv(2);
    for f in expressions() {
        let derivative = f.diff(&c)?;
        assert_eq!(derivative.id(), Symbol::zero().id(), "{f}");
        for state in states() {
            assert_eq!(at(&derivative, &state), 0.0);
        }
    }
    Ok(())
}

#[test]
fn simplify_is_idempotent_and_value_preserving() {
    for f in expressions() {
        let once = f.simplify();
        assert_eq!(once.simplify(), once, "not idempotent: {f}");
        for state in states() {
            assert_eq!(at(&once, &state), at(&f, &state), "{f} changed value");
        }
    }
}

#[test]
fn derivatives_are_already_simplified() -> Result<(), Box<dyn std::error::Error>> {
    for f in expressions() {
        let derivative = f.diff(&sv(0))?;
        assert_eq!(derivative.simplify(), derivative, "{derivative}");
    }
    Ok(())
}

#[test]
fn evaluation_errors_leave_tree_reusable() -> Result<(), Box<dyn std::error::Error>> {
    let (a, b) = (sv(0), sv(1));
    let f = a.ln() / &b;

    assert!(matches!(
        f.evaluate(&State::new(&[1.0, 0.0])),
        Err(EvaluationError::DivisionByZero)
    ));
    assert!(matches!(
        f.evaluate(&State::new(&[-1.0, 2.0])),
        Err(EvaluationError::OutOfDomain { .. })
    ));
    assert!(matches!(
        f.evaluate(&State::new(&[1.0])),
        Err(EvaluationError::MissingState { .. })
    ));
    assert_eq!(f.evaluate(&State::new(&[1.0, 2.0]))?[[0, 0]], 0.0);
    Ok(())
}

#[test]
fn unsupported_differentiation_is_reported() {
    let (a, b) = (sv(0), sv(1));
    let variable = Symbol::variable("c", Domain::region("separator"));

    assert!(matches!(
        (&a * &b).diff(&Symbol::parameter("k")),
        Err(ExpressionError::UnsupportedOperation(
            UnsupportedOperationError::InvalidVariable(_)
        ))
    ));
    assert!(matches!(
        (&variable * 2.0).diff(&a),
        Err(ExpressionError::UnsupportedOperation(
            UnsupportedOperationError::NoDerivativeRule { .. }
        ))
    ));
}

#[test]
fn bad_concatenations_fail_at_construction() -> Result<(), Box<dyn std::error::Error>> {
    let n = Symbol::variable("c_n", Domain::region("negative electrode"));
    let s = Symbol::variable("c_s", Domain::region("separator"));
    let p = Symbol::variable("c_p", Domain::region("positive electrode"));
    let cell = Domain::new(["negative electrode", "separator", "positive electrode"])?;

    assert!(Symbol::concatenate_on(vec![n.clone(), s.clone(), p.clone()], &cell).is_ok());
    assert!(matches!(
        Symbol::concatenate_on(vec![n.clone(), p.clone()], &cell),
        Err(ConstructionError::PartitionMismatch { .. })
    ));
    assert!(matches!(
        Symbol::concatenate(vec![n.clone(), n.clone()]),
        Err(ConstructionError::OverlappingDomains(_))
    ));
    assert!(matches!(
        Symbol::concatenate(vec![p, n]),
        Err(ConstructionError::NonCanonicalOrder { .. })
    ));
    assert!(matches!(
        Symbol::concatenate(vec![s, Symbol::scalar(1.0)]),
        Err(ConstructionError::UndefinedChildDomain { index: 1 })
    ));
    Ok(())
}
