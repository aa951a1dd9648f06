use crate::ast::Value;
use crate::graph::{GraphId, NodeId};
use itertools::Itertools;
use thiserror::Error;

/// A syntax error in expression source text.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Errors that can occur while compiling a single flow graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(
        "Cycle detected at node '{node_id}' in graph '{graph_id}' (path: {})",
        .path.iter().join(" -> ")
    )]
    Cycle {
        node_id: NodeId,
        graph_id: GraphId,
        /// The traversal path that closed the cycle, ending at `node_id`.
        path: Vec<NodeId>,
    },

    #[error(
        "Input {input_index} of node '{node_id}' points to node '{producer_id}', which is not part of graph '{graph_id}'"
    )]
    MissingProducer {
        node_id: NodeId,
        input_index: usize,
        producer_id: NodeId,
        graph_id: GraphId,
    },

    #[error(
        "Input {input_index} of node '{node_id}' points to output {output_index} of '{producer_id}', which only has {available} outputs"
    )]
    InvalidOutputIndex {
        node_id: NodeId,
        input_index: usize,
        producer_id: NodeId,
        output_index: usize,
        available: usize,
    },

    #[error("Node '{node_id}' is listed in graph '{graph_id}' but has no definition")]
    NodeNotFound { node_id: NodeId, graph_id: GraphId },

    #[error("Expression on node '{node_id}' failed to parse: {source}")]
    Expression {
        node_id: NodeId,
        #[source]
        source: ParseError,
    },

    /// A node's ports no longer carry the names its source or property
    /// target implies, e.g. after the provider changed a property's shape.
    #[error(
        "{direction} ports of node '{node_id}' do not match its definition (expected: [{}], found: [{}])",
        .expected.iter().join(", "),
        .found.iter().join(", ")
    )]
    PortMismatch {
        node_id: NodeId,
        direction: &'static str,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl CompileError {
    /// The node a diagnostic should be attached to in the editor.
    pub fn node_id(&self) -> &str {
        match self {
            CompileError::Cycle { node_id, .. }
            | CompileError::MissingProducer { node_id, .. }
            | CompileError::InvalidOutputIndex { node_id, .. }
            | CompileError::NodeNotFound { node_id, .. }
            | CompileError::Expression { node_id, .. }
            | CompileError::PortMismatch { node_id, .. } => node_id,
        }
    }
}

/// Errors that can occur while ordering the graphs of one layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Cycle detected between graphs: {}", .graph_ids.iter().join(" -> "))]
    Cycle { graph_ids: Vec<GraphId> },

    #[error("Graph '{0}' has not been compiled")]
    NotCompiled(GraphId),
}

/// Errors that can occur while evaluating a compiled graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Variable '{0}' is not defined in the expression scope")]
    InputNotFound(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{function}' expects {expected} arguments, but received {found}")]
    ArityMismatch {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("No value was computed for output {output_index} of node '{node_id}'")]
    MissingValue { node_id: NodeId, output_index: usize },

    #[error("Node '{0}' does not match the compiled graph; recompile before evaluating")]
    NotCompiled(NodeId),

    #[error("Expression on node '{node_id}' failed: {source}")]
    Expression {
        node_id: NodeId,
        #[source]
        source: Box<EvaluationError>,
    },
}

/// Errors raised by the editor mutation API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Graph '{0}' not found")]
    GraphNotFound(GraphId),

    #[error("Graph '{0}' already exists")]
    DuplicateGraph(GraphId),

    #[error("Node '{0}' not found")]
    NodeNotFound(NodeId),

    #[error("Node '{0}' already exists")]
    DuplicateNode(NodeId),

    #[error("Node '{node_id}' has no input {input_index}")]
    InputOutOfRange { node_id: NodeId, input_index: usize },

    #[error("Node '{producer_id}' has no output {output_index}")]
    OutputOutOfRange {
        producer_id: NodeId,
        output_index: usize,
    },

    #[error("Node '{producer_id}' belongs to another graph than '{node_id}'")]
    ForeignProducer { node_id: NodeId, producer_id: NodeId },

    #[error("Node '{0}' is not an expression node")]
    NotAnExpression(NodeId),

    #[error("Invalid expression on node '{node_id}': {source}")]
    Expression {
        node_id: NodeId,
        #[source]
        source: ParseError,
    },
}

/// Umbrella error for session-level operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Evaluation of graph '{graph_id}' failed: {source}")]
    Evaluation {
        graph_id: GraphId,
        #[source]
        source: EvaluationError,
    },

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("Layer '{0}' has no graphs")]
    UnknownLayer(String),

    #[error("Layer '{0}' has not been prepared since its last edit")]
    NotPrepared(String),
}
