//! Common test utilities for building flow graphs and sessions.
use ahash::AHashMap;
use flowgraph::graph::NodeId;
use flowgraph::prelude::*;

/// Collects `nodes` into a layer graph plus the node arena it indexes.
#[allow(dead_code)]
pub fn graph_of(id: &str, nodes: Vec<FlowNode>) -> (FlowGraph, AHashMap<NodeId, FlowNode>) {
    let mut graph = FlowGraph::layer(id, "layer");
    let mut arena = AHashMap::new();
    for node in nodes {
        graph.node_ids.push(node.id.clone());
        arena.insert(node.id.clone(), node);
    }
    (graph, arena)
}

/// Compiles against a provider that treats every property as a scalar.
#[allow(dead_code)]
pub fn compile(
    graph: &FlowGraph,
    arena: &AHashMap<NodeId, FlowNode>,
) -> std::result::Result<CompiledGraph, CompileError> {
    Compiler::builder(graph, arena, &StaticProperties::new())
        .build()
        .compile()
}

/// Compiles and evaluates a graph in one go.
#[allow(dead_code)]
pub fn evaluate(
    graph: &FlowGraph,
    arena: &AHashMap<NodeId, FlowNode>,
    context: &EvaluationContext,
) -> GraphEvaluation {
    let compiled = compile(graph, arena).expect("Failed to compile");
    Evaluator::new(&compiled, arena)
        .evaluate(context)
        .expect("Failed to evaluate")
}

#[allow(dead_code)]
pub fn number(id: &str, value: f64) -> FlowNode {
    FlowNode::new(id, NodeKind::Number).with_literal(0, value)
}

/// `clamp(a + b, 0, 4)` with `a = 2`, `b = 3`.
#[allow(dead_code)]
pub fn create_clamped_sum() -> Vec<FlowNode> {
    vec![
        number("a", 2.0),
        number("b", 3.0),
        FlowNode::new("sum", NodeKind::Add)
            .with_pointer(0, "a", 0)
            .with_pointer(1, "b", 0),
        FlowNode::new("clamp", NodeKind::Clamp)
            .with_pointer(0, "sum", 0)
            .with_literal(1, 0.0)
            .with_literal(2, 4.0),
    ]
}

/// `join = (src * 2) + (src + 1)`: two paths re-converge on `join`.
#[allow(dead_code)]
pub fn create_diamond() -> Vec<FlowNode> {
    vec![
        FlowNode::new("join", NodeKind::Add)
            .with_pointer(0, "left", 0)
            .with_pointer(1, "right", 0),
        FlowNode::new("left", NodeKind::Multiply)
            .with_pointer(0, "src", 0)
            .with_literal(1, 2.0),
        FlowNode::new("right", NodeKind::Add)
            .with_pointer(0, "src", 0)
            .with_literal(1, 1.0),
        number("src", 5.0),
    ]
}

#[allow(dead_code)]
pub fn expression(id: &str, source: &str) -> FlowNode {
    FlowNode::expression(id, source).expect("Failed to parse expression")
}

#[allow(dead_code)]
pub fn scalar(property_id: &str) -> PropertyTarget {
    PropertyTarget::Scalar(property_id.to_string())
}

/// A layer graph `writer` that writes `speed = frame * 2`, and a layer graph
/// `reader` that writes `offset = speed + 1`. The reader is added first.
#[allow(dead_code)]
pub fn create_speed_session() -> Session {
    let mut session = Session::builder().build();
    let layer = || GraphKind::Layer {
        layer_id: "layer".to_string(),
    };

    session.add_graph("reader", layer()).expect("add reader");
    session
        .add_node("reader", FlowNode::property_input("speed_in", "speed", &scalar("speed")))
        .expect("add speed_in");
    session
        .add_node(
            "reader",
            FlowNode::new("plus_one", NodeKind::Add)
                .with_pointer(0, "speed_in", 0)
                .with_literal(1, 1.0),
        )
        .expect("add plus_one");
    session
        .add_node(
            "reader",
            FlowNode::property_output("offset_out", "offset", &scalar("offset"))
                .with_pointer(0, "plus_one", 0),
        )
        .expect("add offset_out");

    session.add_graph("writer", layer()).expect("add writer");
    session
        .add_node("writer", FlowNode::new("time", NodeKind::Composition))
        .expect("add time");
    session
        .add_node(
            "writer",
            FlowNode::new("double", NodeKind::Multiply)
                .with_pointer(0, "time", 0)
                .with_literal(1, 2.0),
        )
        .expect("add double");
    session
        .add_node(
            "writer",
            FlowNode::property_output("speed_out", "speed", &scalar("speed"))
                .with_pointer(0, "double", 0),
        )
        .expect("add speed_out");
    session
}
