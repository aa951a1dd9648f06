//! Turns one editable flow graph into a [`CompiledGraph`]: a compute order,
//! the consumer map derived from pointers, the externals index and the set of
//! properties each node transitively writes.

use crate::ast::Program;
use crate::error::CompileError;
use crate::expression::{self, ExpressionIO};
use crate::graph::{FlowGraph, FlowNode, GraphId, GraphKind, NodeId, NodeKind, PropertyId};
use crate::provider::PropertyProvider;
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt;

mod externals;
pub(crate) mod order;

pub use externals::Externals;
use order::{TraversalError, post_order};

/// The parsed form of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    pub source: String,
    pub program: Program,
    pub io: ExpressionIO,
}

/// An external signal whose value changed since the last pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalChange {
    FrameIndex,
    ArrayModifierIndex,
    ArrayModifierCount(PropertyId),
    PropertyValue(PropertyId),
}

/// Derived, disposable data for one graph. Never patched, only replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGraph {
    pub graph_id: GraphId,
    pub kind: GraphKind,
    /// Producers strictly before their consumers.
    pub compute_order: Vec<NodeId>,
    /// Producer to its distinct consumers, in compute order.
    pub next: AHashMap<NodeId, Vec<NodeId>>,
    pub affected_externals: AHashMap<NodeId, BTreeSet<PropertyId>>,
    pub externals: Externals,
    /// Resolved member ids of every property node, in port order.
    pub property_targets: AHashMap<NodeId, Vec<PropertyId>>,
    pub expressions: AHashMap<NodeId, CompiledExpression>,
}

impl CompiledGraph {
    pub fn is_affected_by(&self, change: &ExternalChange) -> bool {
        match change {
            ExternalChange::FrameIndex => !self.externals.frame_index.is_empty(),
            ExternalChange::ArrayModifierIndex => !self.externals.array_modifier_index.is_empty(),
            ExternalChange::ArrayModifierCount(property_id) => self
                .externals
                .array_modifier_count
                .get(property_id)
                .is_some_and(|nodes| !nodes.is_empty()),
            ExternalChange::PropertyValue(property_id) => {
                self.externals.property_value.contains_key(property_id)
            }
        }
    }

    /// Every property some node of this graph writes.
    pub fn written_properties(&self) -> BTreeSet<PropertyId> {
        self.affected_externals
            .values()
            .flat_map(|set| set.iter().cloned())
            .collect()
    }

    pub fn read_properties(&self) -> BTreeSet<PropertyId> {
        self.externals.property_value.keys().cloned().collect()
    }

    /// Position of `node_id` in the compute order.
    pub fn position(&self, node_id: &str) -> Option<usize> {
        self.compute_order.iter().position(|id| id == node_id)
    }
}

impl fmt::Display for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph '{}'", self.graph_id)?;
        for (i, id) in self.compute_order.iter().enumerate() {
            let consumers = self.next.get(id).map(|n| n.join(", ")).unwrap_or_default();
            write!(f, "  {:>3}: {}", i, id)?;
            if !consumers.is_empty() {
                write!(f, " -> {}", consumers)?;
            }
            if let Some(written) = self.affected_externals.get(id).filter(|s| !s.is_empty()) {
                write!(f, "  writes {{{}}}", written.iter().join(", "))?;
            }
            writeln!(f)?;
        }
        let sorted = |set: &AHashSet<NodeId>| set.iter().sorted().join(", ");
        if !self.externals.frame_index.is_empty() {
            writeln!(f, "  frameIndex: {}", sorted(&self.externals.frame_index))?;
        }
        if !self.externals.array_modifier_index.is_empty() {
            writeln!(f, "  arrayModifierIndex: {}", sorted(&self.externals.array_modifier_index))?;
        }
        for (property, nodes) in self.externals.array_modifier_count.iter().sorted_by_key(|(k, _)| *k) {
            writeln!(f, "  arrayModifierCount[{}]: {}", property, sorted(nodes))?;
        }
        for (property, nodes) in self.externals.property_value.iter().sorted_by_key(|(k, _)| *k) {
            writeln!(f, "  propertyValue[{}]: {}", property, sorted(nodes))?;
        }
        Ok(())
    }
}

pub struct Compiler<'a> {
    graph: &'a FlowGraph,
    nodes: &'a AHashMap<NodeId, FlowNode>,
    provider: &'a dyn PropertyProvider,
    previous: Option<&'a CompiledGraph>,
}

pub struct CompilerBuilder<'a> {
    graph: &'a FlowGraph,
    nodes: &'a AHashMap<NodeId, FlowNode>,
    provider: &'a dyn PropertyProvider,
    previous: Option<&'a CompiledGraph>,
}

impl<'a> CompilerBuilder<'a> {
    pub fn new(
        graph: &'a FlowGraph,
        nodes: &'a AHashMap<NodeId, FlowNode>,
        provider: &'a dyn PropertyProvider,
    ) -> Self {
        Self {
            graph,
            nodes,
            provider,
            previous: None,
        }
    }

    /// Reuses the parsed programs of a stale compilation of the same graph
    /// for expression nodes whose source has not changed.
    pub fn with_previous(mut self, previous: &'a CompiledGraph) -> Self {
        if previous.graph_id == self.graph.id {
            self.previous = Some(previous);
        }
        self
    }

    pub fn build(self) -> Compiler<'a> {
        Compiler {
            graph: self.graph,
            nodes: self.nodes,
            provider: self.provider,
            previous: self.previous,
        }
    }
}

impl<'a> Compiler<'a> {
    pub fn builder(
        graph: &'a FlowGraph,
        nodes: &'a AHashMap<NodeId, FlowNode>,
        provider: &'a dyn PropertyProvider,
    ) -> CompilerBuilder<'a> {
        CompilerBuilder::new(graph, nodes, provider)
    }

    pub fn compile(self) -> Result<CompiledGraph, CompileError> {
        let graph = self.graph;
        let members: AHashSet<&str> = graph.node_ids.iter().map(String::as_str).collect();

        let expressions = self.parse_expressions()?;
        let compute_order = post_order(&graph.node_ids, |id: &NodeId| self.producers(&members, id))
            .map_err(|e| match e {
                TraversalError::Cycle { key, path } => CompileError::Cycle {
                    node_id: key,
                    graph_id: graph.id.clone(),
                    path,
                },
                TraversalError::Dependency(e) => e,
            })?;

        let mut next: AHashMap<NodeId, Vec<NodeId>> = compute_order
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();
        for id in &compute_order {
            for (_, pointer) in self.node(id)?.pointers() {
                let consumers = next.entry(pointer.node_id.clone()).or_default();
                if !consumers.contains(id) {
                    consumers.push(id.clone());
                }
            }
        }

        let mut property_targets = AHashMap::new();
        for id in &compute_order {
            let node = self.node(id)?;
            if let Some(property_id) = node.kind.property_id() {
                let members = self.provider.resolve_target(property_id).members();
                check_ports(node, &members, &members)?;
                property_targets.insert(id.clone(), members);
            }
        }

        let externals = Externals::index(graph, &compute_order, self.nodes, &property_targets);
        let affected_externals =
            externals::affected_externals(&compute_order, self.nodes, &next, &property_targets);

        let compiled = CompiledGraph {
            graph_id: graph.id.clone(),
            kind: graph.kind.clone(),
            compute_order,
            next,
            affected_externals,
            externals,
            property_targets,
            expressions,
        };
        log::debug!(
            "Compiled graph '{}': {} nodes, reads [{}], writes [{}]",
            compiled.graph_id,
            compiled.compute_order.len(),
            compiled.read_properties().iter().join(", "),
            compiled.written_properties().iter().join(", ")
        );
        Ok(compiled)
    }

    fn node(&self, node_id: &str) -> Result<&'a FlowNode, CompileError> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| CompileError::NodeNotFound {
                node_id: node_id.to_string(),
                graph_id: self.graph.id.clone(),
            })
    }

    /// The distinct producers `node_id` points at, after checking that each
    /// pointer stays inside the graph and names an existing output.
    fn producers(&self, members: &AHashSet<&str>, node_id: &NodeId) -> Result<Vec<NodeId>, CompileError> {
        let node = self.node(node_id)?;
        let mut producers = Vec::new();
        for (input_index, pointer) in node.pointers() {
            let producer = self
                .nodes
                .get(&pointer.node_id)
                .filter(|_| members.contains(pointer.node_id.as_str()))
                .ok_or_else(|| CompileError::MissingProducer {
                    node_id: node_id.clone(),
                    input_index,
                    producer_id: pointer.node_id.clone(),
                    graph_id: self.graph.id.clone(),
                })?;
            if pointer.output_index >= producer.outputs.len() {
                return Err(CompileError::InvalidOutputIndex {
                    node_id: node_id.clone(),
                    input_index,
                    producer_id: pointer.node_id.clone(),
                    output_index: pointer.output_index,
                    available: producer.outputs.len(),
                });
            }
            if !producers.contains(&pointer.node_id) {
                producers.push(pointer.node_id.clone());
            }
        }
        Ok(producers)
    }

    fn parse_expressions(&self) -> Result<AHashMap<NodeId, CompiledExpression>, CompileError> {
        let mut expressions = AHashMap::new();
        for id in &self.graph.node_ids {
            let node = self.node(id)?;
            let NodeKind::Expression { source } = &node.kind else {
                continue;
            };
            let reused = self
                .previous
                .and_then(|previous| previous.expressions.get(id))
                .filter(|compiled| compiled.source == *source);
            let compiled = match reused {
                Some(compiled) => compiled.clone(),
                None => {
                    let program = expression::parse(source).map_err(|source| {
                        CompileError::Expression {
                            node_id: id.clone(),
                            source,
                        }
                    })?;
                    CompiledExpression {
                        source: source.clone(),
                        io: ExpressionIO::from_program(&program),
                        program,
                    }
                }
            };
            check_ports(node, &compiled.io.inputs, &compiled.io.outputs)?;
            expressions.insert(id.clone(), compiled);
        }
        Ok(expressions)
    }
}

/// Evaluation binds ports by name and position, so they must match exactly.
fn check_ports(node: &FlowNode, inputs: &[String], outputs: &[String]) -> Result<(), CompileError> {
    let mismatch = |direction, expected: &[String], found: Vec<String>| CompileError::PortMismatch {
        node_id: node.id.clone(),
        direction,
        expected: expected.to_vec(),
        found,
    };
    if !node.inputs.iter().map(|i| &i.name).eq(inputs) {
        let found = node.inputs.iter().map(|i| i.name.clone()).collect();
        return Err(mismatch("Input", inputs, found));
    }
    if !node.outputs.iter().map(|o| &o.name).eq(outputs) {
        let found = node.outputs.iter().map(|o| o.name.clone()).collect();
        return Err(mismatch("Output", outputs, found));
    }
    Ok(())
}
