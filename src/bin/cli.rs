use std::collections::HashMap;
use std::process;

use battsym::convert::{build_symbol, extract_identifiers};
use battsym::prelude::*;
use clap::Parser;
use evalexpr::{build_operator_tree, Node};
use log::debug;

#[derive(Parser)]
#[command(name = "battsym")]
#[command(about = "Simplify, evaluate and differentiate an expression over a state vector")]
#[command(version)]
struct Args {
    /// Expression to process, e.g. "a * b^a"
    expression: String,

    /// State values, one per identifier that is not a parameter, in alphabetical order
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    state: Vec<f64>,

    /// Identifier to differentiate with respect to
    #[arg(long)]
    wrt: Option<String>,

    /// Parameter value as name=value; may be repeated
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, f64)>,
}

fn parse_param(text: &str) -> Result<(String, f64), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{text}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid value for '{name}': {err}"))?;
    Ok((name.trim().to_string(), value))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let node: Node = build_operator_tree(&args.expression)?;
    let parameters: HashMap<String, f64> = args.params.iter().cloned().collect();

    // Every identifier that is not a parameter reads one state entry
    let states: Vec<String> = extract_identifiers(&node)
        .into_iter()
        .filter(|name| !parameters.contains_key(name))
        .collect();
    let mut bindings = HashMap::new();
    for (i, name) in states.iter().enumerate() {
        bindings.insert(name.clone(), Symbol::state_vector(i..i + 1)?);
    }
    for name in parameters.keys() {
        bindings.insert(name.clone(), Symbol::parameter(name.as_str()));
    }
    debug!("state order: {states:?}");

    let expr = build_symbol(&node, &bindings)?;
    let simplified = expr.simplify();
    println!("expression: {}", simplified);

    let state = if args.state.is_empty() && states.is_empty() {
        Some(State::empty())
    } else if args.state.len() == states.len() {
        Some(State::new(&args.state))
    } else if args.state.is_empty() {
        None
    } else {
        return Err(Box::new(ExpressionError::InvalidInputLength {
            expected: states.len(),
            got: args.state.len(),
        }));
    };
    let state = state.map(|s| s.with_parameters(parameters.clone()));

    if let Some(state) = &state {
        println!("value: {}", format_value(&simplified.evaluate(state)?));
    }

    if let Some(wrt) = &args.wrt {
        let variable = bindings
            .get(wrt)
            .ok_or_else(|| ConvertError::VariableNotFound(wrt.clone()))?;
        let derivative = simplified.diff(variable)?;
        println!("d/d{}: {}", wrt, derivative);
        if let Some(state) = &state {
            println!("d/d{} value: {}", wrt, format_value(&derivative.evaluate(state)?));
        }
    }
    Ok(())
}

fn format_value(value: &ndarray::Array2<f64>) -> String {
    match value.len() {
        1 => value[[0, 0]].to_string(),
        _ => format!("{:?}", value.column(0).to_vec()),
    }
}
