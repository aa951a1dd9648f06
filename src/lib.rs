//! # Flowgraph - Node Graph Compilation and Evaluation Engine
//!
//! **Flowgraph** turns editable node graphs that drive animated layer
//! properties into deterministic, re-evaluable programs. Graphs may be partial
//! or cyclic while they are being edited; compilation rejects cycles, orders
//! nodes so producers run before consumers, and records which external signals
//! (frame index, array-modifier instance, upstream property values) a graph
//! depends on.
//!
//! ## Core Workflow
//!
//! 1.  **Build a Document**: Add graphs and nodes through the editor API on a
//!     [`Session`](session::Session). Edges are pointers from an input to an
//!     output of another node in the same graph.
//! 2.  **Prepare**: `prepare_layer` compiles every stale graph of a layer and
//!     orders the graphs so that property writers run before property readers.
//! 3.  **Evaluate**: `evaluate_layer` runs one pass for a frame and returns the
//!     outputs of every node and the values written to each property.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgraph::prelude::*;
//!
//! fn main() -> std::result::Result<(), FlowError> {
//!     let provider = StaticProperties::new().with_value("opacity", 0.25);
//!     let mut session = Session::builder().with_provider(provider).build();
//!
//!     session.add_graph("g1", GraphKind::Layer { layer_id: "layer".into() })?;
//!     session.add_node("g1", FlowNode::new("time", NodeKind::Composition))?;
//!     session.add_node(
//!         "g1",
//!         FlowNode::expression("wave", "out = sin(frame / 10) * 0.5 + 0.5")
//!             .map_err(|e| EditError::Expression { node_id: "wave".into(), source: e })?
//!             .with_pointer(0, "time", 0),
//!     )?;
//!     let target = PropertyTarget::Scalar("opacity".into());
//!     session.add_node(
//!         "g1",
//!         FlowNode::property_output("write", "opacity", &target).with_pointer(0, "wave", 0),
//!     )?;
//!
//!     session.prepare_layer("layer")?;
//!     let pass = session.evaluate_layer("layer", &LayerContext::new(12))?;
//!     println!("opacity = {}", pass.writes["opacity"]);
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod graph;
pub mod prelude;
pub mod provider;
pub mod scheduler;
pub mod session;
