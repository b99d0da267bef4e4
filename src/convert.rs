//! Conversion module for transforming evalexpr AST nodes into symbol trees.
//!
//! This module lets expressions be written as strings (`"a * b ^ a"`,
//! `"exp(c / 3) - k"`) and turned into `Symbol` trees. Every identifier must be
//! bound to a symbol beforehand; the binding decides whether it is a state
//! vector, a parameter or anything else.
//!
//! The main entry point is the `build_symbol` function which recursively traverses the
//! evalexpr AST and builds up the symbol tree with the checked constructors, so
//! incompatible operands are reported as `ConvertError::Construction`.

use std::collections::{BTreeSet, HashMap};

use evalexpr::{build_operator_tree, Node, Operator};

use crate::errors::{ConstructionError, ConvertError, ExpressionError};
use crate::operators::Function;
use crate::simplify;
use crate::symbol::Symbol;

/// Converts an evalexpr AST node into a symbol tree.
///
/// # Arguments
/// * `node` - The evalexpr AST node to convert
/// * `bindings` - The symbol each identifier stands for
///
/// # Returns
/// * `Result<Symbol, ConvertError>` - The converted tree or an error if conversion fails
///
/// # Examples of supported operations:
/// * Basic arithmetic: +, -, *, /
/// * Exponentiation: x^y for any operands
/// * Constants: integer and floating point numbers
/// * Functions: exp, ln (or log), sqrt, sin, cos, tanh, abs
pub fn build_symbol(
    node: &Node,
    bindings: &HashMap<String, Symbol>,
) -> Result<Symbol, ConvertError> {
    match node.operator() {
        // Addition operator - folds the children into a series of binary additions
        Operator::Add => {
            let children = node.children();
            children
                .iter()
                .skip(1)
                .try_fold(first_child(node, bindings)?, |acc, child| {
                    Ok(acc.try_add(&build_symbol(child, bindings)?)?)
                })
        }
        // Multiplication operator - folds the children into a series of binary multiplications
        Operator::Mul => {
            let children = node.children();
            children.iter().skip(1).try_fold(
                first_child(node, bindings)?,
                |acc, child| -> Result<Symbol, ConvertError> {
                    Ok(acc.try_mul(&build_symbol(child, bindings)?)?)
                },
            )
        }
        Operator::Sub => {
            let (left, right) = two_children(node, bindings)?;
            Ok(left.try_sub(&right)?)
        }
        Operator::Div => {
            let (left, right) = two_children(node, bindings)?;
            Ok(left.try_div(&right)?)
        }
        Operator::Exp => {
            let (base, exponent) = two_children(node, bindings)?;
            Ok(base.try_pow(&exponent)?)
        }
        Operator::Neg => Ok(simplify::neg(&first_child(node, bindings)?)?),
        // Constant value - integers are widened to floats
        Operator::Const { value } => match value {
            evalexpr::Value::Float(f) => Ok(Symbol::scalar(*f)),
            evalexpr::Value::Int(i) => Ok(Symbol::scalar(*i as f64)),
            _ => Err(ConvertError::ConstOperator(format!("{value:?}"))),
        },
        // Identifier - looks up the bound symbol
        Operator::VariableIdentifierRead { identifier } => bindings
            .get(identifier.as_str())
            .cloned()
            .ok_or_else(|| ConvertError::VariableNotFound(identifier.to_string())),
        Operator::FunctionIdentifier { identifier } => {
            let function = Function::from_name(identifier)
                .ok_or_else(|| ConvertError::UnsupportedFunction(identifier.to_string()))?;
            let children = node.children();
            if children.len() != 1 {
                return Err(ConvertError::FunctionArity {
                    name: identifier.to_string(),
                    got: children.len(),
                });
            }
            Ok(build_symbol(&children[0], bindings)?.apply_function(function))
        }
        // Root node - should have exactly one child
        Operator::RootNode => {
            let children = node.children();
            if children.len() == 1 {
                build_symbol(&children[0], bindings)
            } else {
                Err(ConvertError::RootNode(format!("{children:?}")))
            }
        }
        // Any other operator is unsupported
        _ => Err(ConvertError::UnsupportedOperator(format!(
            "{:?}",
            node.operator()
        ))),
    }
}

fn first_child(node: &Node, bindings: &HashMap<String, Symbol>) -> Result<Symbol, ConvertError> {
    match node.children().first() {
        Some(child) => build_symbol(child, bindings),
        None => Err(ConvertError::UnsupportedOperator(format!(
            "{:?} without operands",
            node.operator()
        ))),
    }
}

fn two_children(
    node: &Node,
    bindings: &HashMap<String, Symbol>,
) -> Result<(Symbol, Symbol), ConvertError> {
    match node.children() {
        [left, right] => Ok((build_symbol(left, bindings)?, build_symbol(right, bindings)?)),
        children => Err(ConvertError::UnsupportedOperator(format!(
            "{:?} with {} operands",
            node.operator(),
            children.len()
        ))),
    }
}

/// Extracts the unique identifiers read by an expression, sorted alphabetically.
pub fn extract_identifiers(node: &Node) -> Vec<String> {
    let mut identifiers = BTreeSet::new();
    extract_identifiers_from_node(node, &mut identifiers);
    identifiers.into_iter().collect()
}

fn extract_identifiers_from_node(node: &Node, identifiers: &mut BTreeSet<String>) {
    match node.operator() {
        Operator::VariableIdentifierRead { identifier } => {
            identifiers.insert(identifier.to_string());
        }
        _ => {
            for child in node.children() {
                extract_identifiers_from_node(child, identifiers);
            }
        }
    }
}

/// Binds each name to a length-1 state vector, in the order given.
///
/// # Example
/// ```
/// # use battsym::convert::state_bindings;
/// let bindings = state_bindings(&["a".to_string(), "b".to_string()]).unwrap();
/// assert_eq!(bindings["b"].to_string(), "y[1:2]");
/// ```
pub fn state_bindings(names: &[String]) -> Result<HashMap<String, Symbol>, ConstructionError> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Ok((name.clone(), Symbol::state_vector(i..i + 1)?)))
        .collect()
}

impl Symbol {
    /// Parses an expression string into a symbol tree.
    ///
    /// # Arguments
    /// * `expression` - The expression, in evalexpr syntax (`^` for powers)
    /// * `bindings` - The symbol each identifier stands for
    ///
    /// # Example
    /// ```
    /// use battsym::prelude::*;
    /// use std::collections::HashMap;
    ///
    /// let bindings = HashMap::from([
    ///     ("a".to_string(), Symbol::state_vector(0..1).unwrap()),
    ///     ("k".to_string(), Symbol::parameter("k")),
    /// ]);
    /// let expr = Symbol::parse("k * exp(a)", &bindings).unwrap();
    /// assert_eq!(expr.to_string(), "(k * exp(y[0:1]))");
    /// ```
    pub fn parse(
        expression: &str,
        bindings: &HashMap<String, Symbol>,
    ) -> Result<Symbol, ExpressionError> {
        let node: Node = build_operator_tree(expression)?;
        Ok(build_symbol(&node, bindings)?)
    }
}
