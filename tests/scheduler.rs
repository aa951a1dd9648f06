//! Tests for ordering graphs that communicate through property values.
mod common;
use common::*;
use flowgraph::prelude::*;

/// A graph reading each of `reads` and writing each of `writes`.
fn graph_io(id: &str, reads: &[&str], writes: &[&str]) -> CompiledGraph {
    let mut nodes = Vec::new();
    for (i, property) in reads.iter().enumerate() {
        nodes.push(FlowNode::property_input(format!("{}_in{}", id, i), *property, &scalar(property)));
    }
    nodes.push(FlowNode::new(format!("{}_mid", id), NodeKind::Add));
    for (i, property) in writes.iter().enumerate() {
        nodes.push(
            FlowNode::property_output(format!("{}_out{}", id, i), *property, &scalar(property))
                .with_pointer(0, format!("{}_mid", id), 0),
        );
    }
    let (graph, arena) = graph_of(id, nodes);
    compile(&graph, &arena).expect("Failed to compile")
}

#[test]
fn test_writer_runs_before_reader() {
    let reader = graph_io("reader", &["speed"], &["offset"]);
    let writer = graph_io("writer", &[], &["speed"]);

    let order = schedule(&[&reader, &writer]).unwrap();
    assert_eq!(order, vec!["writer", "reader"]);
}

#[test]
fn test_chain_of_three() {
    let c = graph_io("c", &["b_out"], &[]);
    let b = graph_io("b", &["a_out"], &["b_out"]);
    let a = graph_io("a", &[], &["a_out"]);

    let order = schedule(&[&c, &b, &a]).unwrap();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn test_independent_graphs_keep_input_order() {
    let x = graph_io("x", &["p"], &["q"]);
    let y = graph_io("y", &["r"], &["s"]);
    let z = graph_io("z", &[], &[]);

    assert_eq!(schedule(&[&x, &y, &z]).unwrap(), vec!["x", "y", "z"]);
    assert_eq!(schedule(&[&z, &y, &x]).unwrap(), vec!["z", "y", "x"]);
}

#[test]
fn test_reading_own_write_is_not_a_dependency() {
    let feedback = graph_io("feedback", &["level"], &["level"]);
    assert_eq!(schedule(&[&feedback]).unwrap(), vec!["feedback"]);
}

#[test]
fn test_unwired_output_does_not_create_an_edge() {
    let reader = graph_io("reader", &["speed"], &[]);
    let (graph, arena) = graph_of(
        "idle",
        vec![FlowNode::property_output("idle_out", "speed", &scalar("speed"))],
    );
    let idle = compile(&graph, &arena).unwrap();

    assert_eq!(schedule(&[&reader, &idle]).unwrap(), vec!["reader", "idle"]);
}

#[test]
fn test_cross_graph_cycle_is_rejected() {
    let a = graph_io("a", &["q"], &["p"]);
    let b = graph_io("b", &["p"], &["q"]);

    match schedule(&[&a, &b]).unwrap_err() {
        ScheduleError::Cycle { graph_ids } => {
            assert_eq!(graph_ids, vec!["a", "b", "a"]);
        }
        other => panic!("Expected Cycle error, got {:?}", other),
    }
}

#[test]
fn test_cycle_error_message_lists_graphs() {
    let a = graph_io("a", &["q"], &["p"]);
    let b = graph_io("b", &["p"], &["q"]);
    let err = schedule(&[&b, &a]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cycle detected between graphs: b -> a -> b"
    );
}
