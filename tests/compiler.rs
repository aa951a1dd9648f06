//! Tests for graph compilation: compute order, cycles, externals and
//! affected externals.
mod common;
use ahash::AHashMap;
use common::*;
use flowgraph::graph::NodeId;
use flowgraph::prelude::*;
use flowgraph::provider::PropertyShape;
use std::collections::{BTreeSet, VecDeque};

fn assert_topological(compiled: &CompiledGraph, arena: &AHashMap<NodeId, FlowNode>) {
    for id in &compiled.compute_order {
        let consumer = compiled.position(id).unwrap();
        for (_, pointer) in arena[id].pointers() {
            let producer = compiled.position(&pointer.node_id).unwrap();
            assert!(
                producer < consumer,
                "'{}' must come before '{}' in {:?}",
                pointer.node_id,
                id,
                compiled.compute_order
            );
        }
    }
}

#[test]
fn test_compute_order_is_topological() {
    let (graph, arena) = graph_of("g", create_clamped_sum());
    let compiled = compile(&graph, &arena).expect("Failed to compile");

    assert_eq!(compiled.compute_order.len(), 4);
    assert_topological(&compiled, &arena);
    assert_eq!(compiled.compute_order.last().unwrap(), "clamp");
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let (graph, arena) = graph_of("g", create_diamond());
    let compiled = compile(&graph, &arena).expect("Diamond should compile");

    assert_topological(&compiled, &arena);
    assert_eq!(compiled.compute_order, vec!["src", "left", "right", "join"]);
    assert_eq!(compiled.next["src"], vec!["left", "right"]);
    assert_eq!(compiled.next["left"], vec!["join"]);
    assert!(compiled.next["join"].is_empty());
}

#[test]
fn test_next_lists_each_consumer_once() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("x", 3.0),
            FlowNode::new("square", NodeKind::Multiply)
                .with_pointer(0, "x", 0)
                .with_pointer(1, "x", 0),
        ],
    );
    let compiled = compile(&graph, &arena).unwrap();
    assert_eq!(compiled.next["x"], vec!["square"]);
}

#[test]
fn test_isolated_nodes_are_compiled() {
    let mut nodes = create_clamped_sum();
    nodes.push(number("lonely", 1.0));
    nodes.push(FlowNode::new("sink", NodeKind::RadiansToDegrees));
    let (graph, arena) = graph_of("g", nodes);

    let compiled = compile(&graph, &arena).unwrap();
    assert_eq!(compiled.compute_order.len(), 6);
    assert!(compiled.position("lonely").is_some());
    assert!(compiled.position("sink").is_some());
}

#[test]
fn test_cycle_is_rejected() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("seed", 1.0),
            FlowNode::new("a", NodeKind::Add)
                .with_pointer(0, "seed", 0)
                .with_pointer(1, "c", 0),
            FlowNode::new("b", NodeKind::Multiply).with_pointer(0, "a", 0),
            FlowNode::new("c", NodeKind::Subtract).with_pointer(0, "b", 0),
        ],
    );

    match compile(&graph, &arena).unwrap_err() {
        CompileError::Cycle {
            node_id,
            graph_id,
            path,
        } => {
            assert!(["a", "b", "c"].contains(&node_id.as_str()));
            assert_eq!(graph_id, "g");
            assert_eq!(path.first(), path.last());
            assert_eq!(path.len(), 4);
        }
        other => panic!("Expected Cycle error, got {:?}", other),
    }
}

#[test]
fn test_self_loop_is_a_cycle() {
    let (graph, arena) = graph_of(
        "g",
        vec![FlowNode::new("loop", NodeKind::Add).with_pointer(0, "loop", 0)],
    );
    let err = compile(&graph, &arena).unwrap_err();
    assert_eq!(err.node_id(), "loop");
    assert!(matches!(err, CompileError::Cycle { .. }));
}

#[test]
fn test_pointer_outside_graph_is_reported() {
    let (graph, mut arena) = graph_of(
        "g",
        vec![FlowNode::new("consumer", NodeKind::Add).with_pointer(1, "elsewhere", 0)],
    );
    // Present in the arena but not a member of the graph.
    arena.insert("elsewhere".to_string(), number("elsewhere", 1.0));

    let err = compile(&graph, &arena).unwrap_err();
    assert_eq!(
        err,
        CompileError::MissingProducer {
            node_id: "consumer".to_string(),
            input_index: 1,
            producer_id: "elsewhere".to_string(),
            graph_id: "g".to_string(),
        }
    );
}

#[test]
fn test_pointer_to_missing_output_is_reported() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("x", 1.0),
            FlowNode::new("consumer", NodeKind::Add).with_pointer(0, "x", 3),
        ],
    );
    match compile(&graph, &arena).unwrap_err() {
        CompileError::InvalidOutputIndex {
            producer_id,
            output_index,
            available,
            ..
        } => {
            assert_eq!(producer_id, "x");
            assert_eq!(output_index, 3);
            assert_eq!(available, 1);
        }
        other => panic!("Expected InvalidOutputIndex error, got {:?}", other),
    }
}

#[test]
fn test_listed_node_without_definition() {
    let (mut graph, arena) = graph_of("g", create_clamped_sum());
    graph.node_ids.push("ghost".to_string());
    let err = compile(&graph, &arena).unwrap_err();
    assert_eq!(
        err,
        CompileError::NodeNotFound {
            node_id: "ghost".to_string(),
            graph_id: "g".to_string(),
        }
    );
}

#[test]
fn test_compilation_is_deterministic() {
    let (graph, arena) = graph_of("g", create_diamond());
    let first = compile(&graph, &arena).unwrap();
    let second = compile(&graph, &arena).unwrap();
    assert_eq!(first.compute_order, second.compute_order);
    assert_eq!(first, second);
}

#[test]
fn test_expression_parse_error_fails_compilation() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("x", 1.0),
            FlowNode::new(
                "broken",
                NodeKind::Expression {
                    source: "out = (x +".to_string(),
                },
            ),
        ],
    );
    match compile(&graph, &arena).unwrap_err() {
        CompileError::Expression { node_id, source } => {
            assert_eq!(node_id, "broken");
            assert_eq!(source.line, 1);
        }
        other => panic!("Expected Expression error, got {:?}", other),
    }
}

#[test]
fn test_expression_ports_must_match_the_source() {
    let mut renamed = expression("e", "out = a * 2");
    renamed.outputs[0].name = "result".to_string();
    let (graph, arena) = graph_of("g", vec![renamed]);
    match compile(&graph, &arena).unwrap_err() {
        CompileError::PortMismatch { node_id, direction, expected, found } => {
            assert_eq!(node_id, "e");
            assert_eq!(direction, "Output");
            assert_eq!(expected, vec!["out"]);
            assert_eq!(found, vec!["result"]);
        }
        other => panic!("Expected PortMismatch error, got {:?}", other),
    }

    let mut missing_input = expression("e", "out = a + b");
    missing_input.inputs.pop();
    let (graph, arena) = graph_of("g", vec![missing_input]);
    let err = compile(&graph, &arena).unwrap_err();
    assert_eq!(err.node_id(), "e");
    assert_eq!(
        err.to_string(),
        "Input ports of node 'e' do not match its definition (expected: [a, b], found: [a])"
    );
}

#[test]
fn test_reused_expression_ports_are_still_checked() {
    let (graph, mut arena) = graph_of("g", vec![expression("e", "y = x * 2")]);
    let compiled = compile(&graph, &arena).unwrap();

    arena.get_mut("e").unwrap().outputs.clear();
    let err = Compiler::builder(&graph, &arena, &StaticProperties::new())
        .with_previous(&compiled)
        .build()
        .compile()
        .unwrap_err();
    assert!(matches!(err, CompileError::PortMismatch { direction: "Output", .. }), "{:?}", err);
}

#[test]
fn test_property_ports_must_match_the_resolved_target() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("x", 1.0),
            FlowNode::property_output("out", "position", &scalar("position")).with_pointer(0, "x", 0),
        ],
    );
    assert!(compile(&graph, &arena).is_ok());

    let reshaped = StaticProperties::new().with_shape(
        "position",
        PropertyShape::Compound(["position.x".to_string(), "position.y".to_string()]),
    );
    match Compiler::builder(&graph, &arena, &reshaped).build().compile().unwrap_err() {
        CompileError::PortMismatch { node_id, direction, expected, found } => {
            assert_eq!(node_id, "out");
            assert_eq!(direction, "Input");
            assert_eq!(expected, vec!["position.x", "position.y"]);
            assert_eq!(found, vec!["position"]);
        }
        other => panic!("Expected PortMismatch error, got {:?}", other),
    }
}

#[test]
fn test_expression_programs_are_compiled_once() {
    let (graph, arena) = graph_of(
        "g",
        vec![number("x", 1.0), expression("e", "y = x * 2").with_pointer(0, "x", 0)],
    );
    let compiled = compile(&graph, &arena).unwrap();
    let e = &compiled.expressions["e"];
    assert_eq!(e.io.inputs, vec!["x"]);
    assert_eq!(e.io.outputs, vec!["y"]);

    let reused = Compiler::builder(&graph, &arena, &StaticProperties::new())
        .with_previous(&compiled)
        .build()
        .compile()
        .unwrap();
    assert_eq!(reused, compiled);
}

#[test]
fn test_externals_index() {
    let provider = StaticProperties::new().with_shape(
        "position",
        PropertyShape::Compound(["position.x".to_string(), "position.y".to_string()]),
    );
    let target = provider.resolve_target("position");
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("time", NodeKind::Composition),
            FlowNode::new("instance", NodeKind::ArrayModifierIndex),
            FlowNode::property_input("pos", "position", &target),
            FlowNode::new("unrelated", NodeKind::Number),
        ],
    );
    let compiled = Compiler::builder(&graph, &arena, &provider)
        .build()
        .compile()
        .unwrap();

    let externals = &compiled.externals;
    assert!(externals.frame_index.contains("time"));
    assert_eq!(externals.frame_index.len(), 1);
    assert!(externals.array_modifier_index.contains("instance"));
    assert!(externals.property_value["position.x"].contains("pos"));
    assert!(externals.property_value["position.y"].contains("pos"));
    assert!(!externals.property_value.contains_key("position"));
    assert!(externals.array_modifier_count.is_empty());
    assert_eq!(compiled.property_targets["pos"], vec!["position.x", "position.y"]);
    assert_eq!(
        compiled.read_properties(),
        BTreeSet::from(["position.x".to_string(), "position.y".to_string()])
    );
}

#[test]
fn test_array_modifier_graph_registers_every_node() {
    let mut graph = FlowGraph::array_modifier("copies", "layer", "repeat");
    let mut arena = AHashMap::new();
    for node in create_clamped_sum() {
        graph.node_ids.push(node.id.clone());
        arena.insert(node.id.clone(), node);
    }
    let compiled = compile(&graph, &arena).unwrap();

    let registered = &compiled.externals.array_modifier_count["repeat"];
    assert_eq!(registered.len(), 4);
    assert!(compiled.is_affected_by(&ExternalChange::ArrayModifierCount("repeat".into())));
    assert!(!compiled.is_affected_by(&ExternalChange::ArrayModifierCount("other".into())));
}

#[test]
fn test_affected_externals_only_count_wired_inputs() {
    let provider = StaticProperties::new().with_shape(
        "position",
        PropertyShape::Compound(["position.x".to_string(), "position.y".to_string()]),
    );
    let target = provider.resolve_target("position");
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("x", 4.0),
            FlowNode::new("scaled", NodeKind::Multiply).with_pointer(0, "x", 0),
            number("idle", 1.0),
            FlowNode::property_output("out", "position", &target).with_pointer(0, "scaled", 0),
        ],
    );
    let compiled = Compiler::builder(&graph, &arena, &provider)
        .build()
        .compile()
        .unwrap();

    let only_x = BTreeSet::from(["position.x".to_string()]);
    assert_eq!(compiled.affected_externals["out"], only_x);
    assert_eq!(compiled.affected_externals["scaled"], only_x);
    assert_eq!(compiled.affected_externals["x"], only_x);
    assert!(compiled.affected_externals["idle"].is_empty());
    assert_eq!(compiled.written_properties(), only_x);
}

#[test]
fn test_affected_externals_are_backed_by_a_path() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("time", NodeKind::Composition),
            number("k", 3.0),
            FlowNode::new("a", NodeKind::Multiply)
                .with_pointer(0, "time", 0)
                .with_pointer(1, "k", 0),
            FlowNode::new("b", NodeKind::Add).with_pointer(0, "k", 0),
            FlowNode::property_output("write_a", "alpha", &scalar("alpha")).with_pointer(0, "a", 0),
            FlowNode::property_output("write_b", "beta", &scalar("beta")).with_pointer(0, "b", 0),
            FlowNode::property_output("unwired", "gamma", &scalar("gamma")),
        ],
    );
    let compiled = compile(&graph, &arena).unwrap();

    assert_eq!(
        compiled.affected_externals["k"],
        BTreeSet::from(["alpha".to_string(), "beta".to_string()])
    );
    assert!(compiled.affected_externals["unwired"].is_empty());

    for (node, properties) in &compiled.affected_externals {
        for property in properties {
            // Breadth-first search along `next` for a writer of `property`.
            let mut queue = VecDeque::from([node.clone()]);
            let mut found = false;
            while let Some(current) = queue.pop_front() {
                let writes = arena[&current].kind.property_id() == Some(property.as_str())
                    && matches!(arena[&current].kind, NodeKind::PropertyOutput { .. });
                if writes {
                    found = true;
                    break;
                }
                queue.extend(compiled.next[&current].iter().cloned());
            }
            assert!(found, "no path from '{}' to a writer of '{}'", node, property);
        }
    }
}

#[test]
fn test_is_affected_by_frame_and_properties() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("time", NodeKind::Composition),
            FlowNode::property_input("read", "opacity", &scalar("opacity")),
        ],
    );
    let compiled = compile(&graph, &arena).unwrap();
    assert!(compiled.is_affected_by(&ExternalChange::FrameIndex));
    assert!(compiled.is_affected_by(&ExternalChange::PropertyValue("opacity".into())));
    assert!(!compiled.is_affected_by(&ExternalChange::PropertyValue("scale".into())));
    assert!(!compiled.is_affected_by(&ExternalChange::ArrayModifierIndex));

    let (graph, arena) = graph_of("static", create_clamped_sum());
    let compiled = compile(&graph, &arena).unwrap();
    assert!(!compiled.is_affected_by(&ExternalChange::FrameIndex));
}

#[test]
fn test_display_lists_order_and_externals() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("time", NodeKind::Composition),
            FlowNode::property_output("write", "alpha", &scalar("alpha")).with_pointer(0, "time", 0),
        ],
    );
    let text = compile(&graph, &arena).unwrap().to_string();
    assert!(text.starts_with("graph 'g'\n"));
    assert!(text.contains("0: time -> write  writes {alpha}"));
    assert!(text.contains("frameIndex: time"));
}
