use super::parser::parse;
use crate::ast::{Program, Statement};
use crate::error::ParseError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The variables an expression reads (`inputs`) and assigns (`outputs`),
/// each unique and in first-occurrence order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpressionIO {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl ExpressionIO {
    /// Walks the statement list without evaluating anything.
    ///
    /// An assignment contributes its target to `outputs` and every variable
    /// on its right-hand side to `inputs`, so `x = x` lists `x` in both.
    /// A bare expression only contributes inputs.
    pub fn from_program(program: &Program) -> Self {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for statement in &program.statements {
            match statement {
                Statement::Assign { target, value } => {
                    outputs.push(target.clone());
                    value.collect_identifiers(&mut inputs);
                }
                Statement::Expr(expr) => expr.collect_identifiers(&mut inputs),
            }
        }
        Self {
            inputs: inputs.into_iter().unique().collect(),
            outputs: outputs.into_iter().unique().collect(),
        }
    }
}

/// Infers the inputs and outputs of expression source text.
pub fn analyze(source: &str) -> Result<ExpressionIO, ParseError> {
    parse(source).map(|program| ExpressionIO::from_program(&program))
}
