//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the
//! flowgraph crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowgraph::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let properties = StaticProperties::from_file("path/to/properties.json")?;
//! let mut session = Session::builder().with_provider(properties).build();
//! // ... add graphs and nodes through the session ...
//! for layer_id in session.prepare_all()? {
//!     let pass = session.evaluate_layer(&layer_id, &LayerContext::new(0))?;
//!     println!("{:?}", pass.writes);
//! }
//! # Ok(())
//! # }
//! ```

// Core compilation and evaluation
pub use crate::compiler::{CompiledGraph, Compiler, ExternalChange};
pub use crate::evaluator::{EvaluationContext, Evaluator, GraphEvaluation};
pub use crate::scheduler::schedule;
pub use crate::session::{LayerContext, LayerEvaluation, Session};

// Data model
pub use crate::ast::{Value, ValueType};
pub use crate::graph::{Document, FlowGraph, FlowNode, GraphKind, NodeKind, Pointer};
pub use crate::provider::{PropertyProvider, PropertyTarget, StaticProperties};

// Expression language
pub use crate::expression::{ExpressionIO, analyze};

// Error types
pub use crate::error::{
    CompileError, EditError, EvaluationError, FlowError, ParseError, ScheduleError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
