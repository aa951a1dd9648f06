use clap::Parser;
use flowgraph::graph::LayerId;
use flowgraph::prelude::*;
use itertools::Itertools;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

// --- JSON Deserialization Structs (Input Format Specific) ---
// Ports are derived from the node kind; the file only names literals and
// pointers by input name.

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    properties: StaticProperties,
    graphs: Vec<RawGraph>,
    nodes: Vec<RawNode>,
}

#[derive(Deserialize)]
struct RawGraph {
    id: String,
    kind: GraphKind,
    #[serde(alias = "nodeIds")]
    node_ids: Vec<String>,
}

#[derive(Deserialize)]
struct RawNode {
    id: String,
    kind: NodeKind,
    #[serde(default)]
    literals: BTreeMap<String, Value>,
    #[serde(default)]
    pointers: BTreeMap<String, Pointer>,
}

impl RawNode {
    fn into_node(self, provider: &dyn PropertyProvider) -> std::result::Result<FlowNode, String> {
        let mut node = match &self.kind {
            NodeKind::Expression { source } => FlowNode::expression(self.id.clone(), source)
                .map_err(|e| format!("Expression on node '{}': {}", self.id, e))?,
            NodeKind::PropertyInput { property_id } => {
                let target = provider.resolve_target(property_id);
                FlowNode::property_input(self.id.clone(), property_id.clone(), &target)
            }
            NodeKind::PropertyOutput { property_id } => {
                let target = provider.resolve_target(property_id);
                FlowNode::property_output(self.id.clone(), property_id.clone(), &target)
            }
            kind => FlowNode::new(self.id.clone(), kind.clone()),
        };
        for (name, value) in self.literals {
            let index = input_index(&node, &name)?;
            node = node.with_literal(index, value);
        }
        for (name, pointer) in self.pointers {
            let index = input_index(&node, &name)?;
            node = node.with_pointer(index, pointer.node_id, pointer.output_index);
        }
        Ok(node)
    }
}

fn input_index(node: &FlowNode, name: &str) -> std::result::Result<usize, String> {
    node.input_index(name).ok_or_else(|| {
        format!(
            "Node '{}' has no input '{}' (inputs: {})",
            node.id,
            name,
            node.inputs.iter().map(|i| &i.name).join(", ")
        )
    })
}

/// Compile and evaluate the flow graphs of a document
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the document JSON file (`properties`, `graphs`, `nodes`)
    document_path: String,

    /// Frame to evaluate
    #[arg(short, long, default_value_t = 0, conflicts_with = "frames")]
    frame: i64,

    /// Inclusive frame range to evaluate, e.g. `0..24`
    #[arg(long, value_parser = parse_frame_range)]
    frames: Option<(i64, i64)>,

    /// Only evaluate this layer
    #[arg(short, long)]
    layer: Option<LayerId>,

    /// Instance count for an array-modifier owner property, e.g. `copies=4`
    #[arg(short, long = "count", value_parser = parse_count)]
    counts: Vec<(String, u32)>,

    /// Print compute orders and layer schedules
    #[arg(long)]
    order: bool,
}

fn parse_frame_range(s: &str) -> std::result::Result<(i64, i64), String> {
    let (start, end) = s
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, found '{}'", s))?;
    let start: i64 = start.trim().parse().map_err(|e| format!("invalid start: {}", e))?;
    let end: i64 = end.trim().parse().map_err(|e| format!("invalid end: {}", e))?;
    if end < start {
        return Err(format!("empty range {}..{}", start, end));
    }
    Ok((start, end))
}

fn parse_count(s: &str) -> std::result::Result<(String, u32), String> {
    let (property, count) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PROPERTY=COUNT, found '{}'", s))?;
    let count: u32 = count.trim().parse().map_err(|e| format!("invalid count: {}", e))?;
    Ok((property.trim().to_string(), count))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. Loading ---
    let load_start = Instant::now();
    let json = fs::read_to_string(&cli.document_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read document '{}': {}",
            &cli.document_path, e
        ))
    });
    let raw: RawDocument = serde_json::from_str(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse document JSON: {}", e)));
    let mut session = build_session(raw).unwrap_or_else(|e| exit_with_error(&e));
    let load_duration = load_start.elapsed();

    // --- 2. Compilation and Scheduling ---
    let compile_start = Instant::now();
    let layers = match &cli.layer {
        Some(layer_id) => vec![layer_id.clone()],
        None => session.document().layers(),
    };
    for layer_id in &layers {
        session
            .prepare_layer(layer_id)
            .unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)));
    }
    let compile_duration = compile_start.elapsed();

    if cli.order {
        for layer_id in &layers {
            let schedule = session.schedule(layer_id).unwrap_or_default();
            println!("Layer '{}': {}", layer_id, schedule.iter().join(" -> "));
            for graph_id in schedule {
                if let Some(compiled) = session.compiled(graph_id) {
                    print!("{}", compiled);
                }
            }
        }
        println!();
    }

    // --- 3. Evaluation ---
    let frames = match cli.frames {
        Some((start, end)) => (start..=end).collect_vec(),
        None => vec![cli.frame],
    };
    let eval_start = Instant::now();
    for frame in frames {
        let mut context = LayerContext::new(frame);
        for (property, count) in &cli.counts {
            context = context.with_count(property.clone(), *count);
        }
        let requests = layers
            .iter()
            .map(|layer_id| (layer_id.clone(), context.clone()))
            .collect_vec();
        for result in session.evaluate_layers(&requests) {
            let pass =
                result.unwrap_or_else(|e| exit_with_error(&format!("Evaluation failed: {}", e)));
            print_pass(frame, &pass);
        }
    }
    let eval_duration = eval_start.elapsed();

    println!("\n--- Performance Summary ---");
    println!("Loading:              {:?}", load_duration);
    println!("Compilation:          {:?}", compile_duration);
    println!("Evaluation:           {:?}", eval_duration);
    println!("-----------------------------");
    println!("Total Execution:      {:?}", total_start.elapsed());
}

fn build_session(raw: RawDocument) -> std::result::Result<Session, String> {
    let mut session = Session::builder()
        .with_provider(raw.properties)
        .parallel(true)
        .build();
    let mut nodes: BTreeMap<String, RawNode> =
        raw.nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

    for graph in raw.graphs {
        session
            .add_graph(graph.id.clone(), graph.kind)
            .map_err(|e| e.to_string())?;
        for node_id in graph.node_ids {
            let raw_node = nodes.remove(&node_id).ok_or_else(|| {
                format!("Graph '{}' lists unknown node '{}'", graph.id, node_id)
            })?;
            let node = raw_node.into_node(session.provider())?;
            session.add_node(&graph.id, node).map_err(|e| e.to_string())?;
        }
    }
    if !nodes.is_empty() {
        log::warn!(
            "Ignoring nodes that belong to no graph: {}",
            nodes.keys().join(", ")
        );
    }
    Ok(session)
}

fn print_pass(frame: i64, pass: &LayerEvaluation) {
    println!("[frame {}] layer '{}'", frame, pass.layer_id);
    for (property, value) in pass.writes.iter().sorted_by_key(|(k, _)| *k) {
        println!("  {} = {}", property, value);
    }
    for (index, writes) in pass.instance_writes.iter().enumerate() {
        for (property, value) in writes.iter().sorted_by_key(|(k, _)| *k) {
            println!("  [{}] {} = {}", index, property, value);
        }
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
