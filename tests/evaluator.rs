//! Tests for node evaluation: compute functions, input resolution, externals
//! and expression nodes.
mod common;
use common::*;
use flowgraph::prelude::*;
use flowgraph::provider::PropertyShape;

fn number_output(result: &GraphEvaluation, node_id: &str, index: usize) -> f64 {
    match result.output(node_id, index) {
        Some(Value::Number(n)) => *n,
        other => panic!("Expected a number at {}[{}], got {:?}", node_id, index, other),
    }
}

#[test]
fn test_evaluates_chain_in_compute_order() {
    let (graph, arena) = graph_of("g", create_clamped_sum());
    let provider = StaticProperties::new();
    let result = evaluate(&graph, &arena, &EvaluationContext::new(0, &provider));

    assert_eq!(number_output(&result, "sum", 0), 5.0);
    assert_eq!(number_output(&result, "clamp", 0), 4.0);
}

#[test]
fn test_diamond_evaluates_shared_producer_once() {
    let (graph, arena) = graph_of("g", create_diamond());
    let provider = StaticProperties::new();
    let result = evaluate(&graph, &arena, &EvaluationContext::new(0, &provider));
    // (5 * 2) + (5 + 1)
    assert_eq!(number_output(&result, "join", 0), 16.0);
}

#[test]
fn test_pointer_takes_precedence_over_literal() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("x", 7.0),
            FlowNode::new("sub", NodeKind::Subtract)
                .with_literal(0, 100.0)
                .with_pointer(0, "x", 0)
                .with_literal(1, 2.0),
        ],
    );
    let provider = StaticProperties::new();
    let result = evaluate(&graph, &arena, &EvaluationContext::new(0, &provider));
    assert_eq!(number_output(&result, "sub", 0), 5.0);
}

#[test]
fn test_numeric_nodes() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("lerp", NodeKind::Lerp)
                .with_literal(0, 0.0)
                .with_literal(1, 10.0)
                .with_literal(2, 1.5),
            FlowNode::new("to_rad", NodeKind::DegreesToRadians).with_literal(0, 180.0),
            FlowNode::new("to_deg", NodeKind::RadiansToDegrees)
                .with_literal(0, std::f64::consts::FRAC_PI_2),
            FlowNode::new("clamp_low", NodeKind::Clamp)
                .with_literal(0, -3.0)
                .with_literal(1, -1.0)
                .with_literal(2, 1.0),
            FlowNode::new("div", NodeKind::Divide)
                .with_literal(0, 1.0)
                .with_literal(1, 0.0),
            FlowNode::new("nan", NodeKind::Divide)
                .with_literal(0, 0.0)
                .with_literal(1, 0.0),
            FlowNode::new("clamp_nan", NodeKind::Clamp)
                .with_pointer(0, "nan", 0)
                .with_literal(2, 1.0),
        ],
    );
    let provider = StaticProperties::new();
    let result = evaluate(&graph, &arena, &EvaluationContext::new(0, &provider));

    // Lerp extrapolates outside 0..=1.
    assert_eq!(number_output(&result, "lerp", 0), 15.0);
    assert!((number_output(&result, "to_rad", 0) - std::f64::consts::PI).abs() < 1e-12);
    assert!((number_output(&result, "to_deg", 0) - 90.0).abs() < 1e-12);
    assert_eq!(number_output(&result, "clamp_low", 0), -1.0);
    assert_eq!(number_output(&result, "div", 0), f64::INFINITY);
    assert!(number_output(&result, "nan", 0).is_nan());
    assert!(number_output(&result, "clamp_nan", 0).is_nan());
}

#[test]
fn test_vector_rect_and_color_nodes() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("v", NodeKind::Vector2Compose)
                .with_literal(0, 1.0)
                .with_literal(1, 2.0),
            FlowNode::new("sum", NodeKind::Vector2Add)
                .with_pointer(0, "v", 0)
                .with_literal(1, [10.0, 20.0]),
            FlowNode::new("mix", NodeKind::Vector2Lerp)
                .with_pointer(0, "v", 0)
                .with_pointer(1, "sum", 0)
                .with_literal(2, 0.5),
            FlowNode::new("parts", NodeKind::Vector2Decompose).with_pointer(0, "sum", 0),
            FlowNode::new("rect", NodeKind::RectTranslate)
                .with_literal(0, Value::Rect([0.0, 0.0, 100.0, 50.0]))
                .with_pointer(1, "v", 0),
            FlowNode::new("color", NodeKind::ColorCompose)
                .with_literal(0, 0.1)
                .with_literal(1, 0.2)
                .with_literal(2, 0.3)
                .with_literal(3, 0.4),
            FlowNode::new("channels", NodeKind::ColorDecompose).with_pointer(0, "color", 0),
            FlowNode::new("red", NodeKind::HslToColor)
                .with_literal(0, 0.0)
                .with_literal(1, 1.0)
                .with_literal(2, 0.5)
                .with_literal(3, 1.0),
        ],
    );
    let provider = StaticProperties::new();
    let result = evaluate(&graph, &arena, &EvaluationContext::new(0, &provider));

    assert_eq!(result.output("sum", 0), Some(&Value::Vector2([11.0, 22.0])));
    assert_eq!(result.output("mix", 0), Some(&Value::Vector2([6.0, 12.0])));
    assert_eq!(number_output(&result, "parts", 0), 11.0);
    assert_eq!(number_output(&result, "parts", 1), 22.0);
    assert_eq!(
        result.output("rect", 0),
        Some(&Value::Rect([1.0, 2.0, 100.0, 50.0]))
    );
    assert_eq!(number_output(&result, "channels", 3), 0.4);
    assert_eq!(result.outputs("channels").map(|o| o.len()), Some(4));
    let red = result.output("red", 0).map(Value::as_color).unwrap();
    for (channel, expected) in red.iter().zip([1.0, 0.0, 0.0, 1.0]) {
        assert!((channel - expected).abs() < 1e-9, "{:?}", red);
    }
}

#[test]
fn test_frame_index_seeds_composition_nodes() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("time", NodeKind::Composition).with_literal(0, 99.0),
            FlowNode::new("double", NodeKind::Multiply)
                .with_pointer(0, "time", 0)
                .with_literal(1, 2.0),
        ],
    );
    let provider = StaticProperties::new();
    let result = evaluate(&graph, &arena, &EvaluationContext::new(12, &provider));
    assert_eq!(number_output(&result, "time", 0), 12.0);
    assert_eq!(number_output(&result, "double", 0), 24.0);
}

#[test]
fn test_array_modifier_index_uses_instance_context() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("instance", NodeKind::ArrayModifierIndex)
                .with_literal(0, -1.0)
                .with_literal(1, -1.0),
        ],
    );
    let provider = StaticProperties::new();
    let compiled = compile(&graph, &arena).unwrap();
    let evaluator = Evaluator::new(&compiled, &arena);

    let inside = evaluator
        .evaluate(&EvaluationContext::new(0, &provider).with_array_modifier(2, 5))
        .unwrap();
    assert_eq!(number_output(&inside, "instance", 0), 2.0);
    assert_eq!(number_output(&inside, "instance", 1), 5.0);

    // Without an instance the literals stay in place.
    let outside = evaluator
        .evaluate(&EvaluationContext::new(0, &provider))
        .unwrap();
    assert_eq!(number_output(&outside, "instance", 0), -1.0);
}

#[test]
fn test_property_input_reads_provider_members() {
    let provider = StaticProperties::new()
        .with_shape(
            "position",
            PropertyShape::Compound(["position.x".to_string(), "position.y".to_string()]),
        )
        .with_value("position.x", 3.0)
        .with_value("position.y", 4.0);
    let target = provider.resolve_target("position");
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::property_input("pos", "position", &target),
            FlowNode::new("sum", NodeKind::Add)
                .with_pointer(0, "pos", 0)
                .with_pointer(1, "pos", 1),
            FlowNode::property_input("unknown", "missing", &scalar("missing")),
        ],
    );
    let compiled = Compiler::builder(&graph, &arena, &provider)
        .build()
        .compile()
        .unwrap();
    let result = Evaluator::new(&compiled, &arena)
        .evaluate(&EvaluationContext::new(0, &provider))
        .unwrap();

    assert_eq!(number_output(&result, "sum", 0), 7.0);
    assert_eq!(result.output("unknown", 0), Some(&Value::Null));
}

#[test]
fn test_property_writes_only_include_wired_inputs() {
    let provider = StaticProperties::new().with_shape(
        "scale",
        PropertyShape::Group(vec![
            "scale.x".to_string(),
            "scale.y".to_string(),
            "scale.z".to_string(),
        ]),
    );
    let target = provider.resolve_target("scale");
    let (graph, arena) = graph_of(
        "g",
        vec![
            number("two", 2.0),
            FlowNode::property_output("write", "scale", &target)
                .with_pointer(0, "two", 0)
                .with_literal(1, 9.0)
                .with_pointer(2, "two", 0),
        ],
    );
    let compiled = Compiler::builder(&graph, &arena, &provider)
        .build()
        .compile()
        .unwrap();
    let result = Evaluator::new(&compiled, &arena)
        .evaluate(&EvaluationContext::new(0, &provider))
        .unwrap();

    assert_eq!(
        result.property_writes(),
        &[
            ("scale.x".to_string(), Value::Number(2.0)),
            ("scale.z".to_string(), Value::Number(2.0)),
        ]
    );
}

#[test]
fn test_expression_node_binds_inputs_and_reads_outputs() {
    let (graph, arena) = graph_of(
        "g",
        vec![
            FlowNode::new("time", NodeKind::Composition),
            expression("wave", "scaled = frame * gain\nshifted = scaled + 1; unused_read = gain")
                .with_pointer(0, "time", 0)
                .with_literal(1, 0.5),
            FlowNode::new("after", NodeKind::Add).with_pointer(0, "wave", 1),
        ],
    );
    assert_eq!(
        arena["wave"].inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
        vec!["frame", "gain", "scaled"]
    );
    let provider = StaticProperties::new();
    let result = evaluate(&graph, &arena, &EvaluationContext::new(10, &provider));

    assert_eq!(number_output(&result, "wave", 0), 5.0);
    assert_eq!(number_output(&result, "wave", 1), 6.0);
    assert_eq!(number_output(&result, "wave", 2), 0.5);
    assert_eq!(number_output(&result, "after", 0), 6.0);
}

#[test]
fn test_expression_runtime_error_names_the_node() {
    let (graph, arena) = graph_of("g", vec![expression("bad", "out = {x: 1} * 2")]);
    let provider = StaticProperties::new();
    let compiled = compile(&graph, &arena).unwrap();
    let err = Evaluator::new(&compiled, &arena)
        .evaluate(&EvaluationContext::new(0, &provider))
        .unwrap_err();

    match err {
        EvaluationError::Expression { node_id, source } => {
            assert_eq!(node_id, "bad");
            assert!(
                matches!(*source, EvaluationError::TypeMismatch { ref operation, .. } if operation == "*"),
                "{:?}",
                source
            );
        }
        other => panic!("Expected Expression error, got {:?}", other),
    }
}

#[test]
fn test_evaluation_is_idempotent() {
    let mut nodes = create_diamond();
    nodes.push(FlowNode::new("time", NodeKind::Composition));
    nodes.push(
        expression("noise", "out = sin(t * 12.9898) * 43758.5453; nan = 0 / 0")
            .with_pointer(0, "time", 0),
    );
    let (graph, arena) = graph_of("g", nodes);
    let provider = StaticProperties::new();
    let compiled = compile(&graph, &arena).unwrap();
    let evaluator = Evaluator::new(&compiled, &arena);
    let context = EvaluationContext::new(37, &provider);

    let first = evaluator.evaluate(&context).unwrap();
    let second = evaluator.evaluate(&context).unwrap();
    for id in &compiled.compute_order {
        let (a, b) = (first.outputs(id).unwrap(), second.outputs(id).unwrap());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!(x.bit_eq(y), "output of '{}' changed: {} vs {}", id, x, y);
        }
    }
}
