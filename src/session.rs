//! The owner of graph lifetime: the document, its compiled graphs and the
//! per-layer schedules, kept consistent across edits.

use crate::ast::Value;
use crate::compiler::{CompiledGraph, Compiler, ExternalChange};
use crate::error::{EditError, FlowError, ScheduleError};
use crate::evaluator::{EvaluationContext, Evaluator, GraphEvaluation};
use crate::graph::{Document, FlowNode, GraphId, GraphKind, LayerId, Pointer, PropertyId};
use crate::provider::{PropertyProvider, PropertyTarget, StaticProperties};
use crate::scheduler;
use ahash::AHashMap;
use itertools::Itertools;
use rayon::prelude::*;

#[cfg(feature = "debug-tools")]
use std::fs;

/// External values for one pass over a layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerContext {
    pub frame_index: i64,
    /// Instance count of each array-modifier owner property. Missing owners
    /// have no instances.
    pub array_counts: AHashMap<PropertyId, u32>,
}

impl LayerContext {
    pub fn new(frame_index: i64) -> Self {
        Self {
            frame_index,
            array_counts: AHashMap::new(),
        }
    }

    pub fn with_count(mut self, property_id: impl Into<PropertyId>, count: u32) -> Self {
        self.array_counts.insert(property_id.into(), count);
        self
    }
}

/// The result of one pass over a layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerEvaluation {
    pub layer_id: LayerId,
    pub order: Vec<GraphId>,
    /// One pass per graph; array-modifier graphs have one per instance.
    pub passes: AHashMap<GraphId, Vec<GraphEvaluation>>,
    /// Writes of ordinary layer graphs, last write wins.
    pub writes: AHashMap<PropertyId, Value>,
    /// Writes of array-modifier graphs, by instance index.
    pub instance_writes: Vec<AHashMap<PropertyId, Value>>,
}

impl LayerEvaluation {
    /// The single pass of an ordinary graph, or the first instance of an
    /// array-modifier graph.
    pub fn graph(&self, graph_id: &str) -> Option<&GraphEvaluation> {
        self.passes.get(graph_id).and_then(|passes| passes.first())
    }

    pub fn instances(&self, graph_id: &str) -> &[GraphEvaluation] {
        self.passes.get(graph_id).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Earlier writes of the current pass layered over the base provider.
struct Overlay<'a> {
    base: &'a dyn PropertyProvider,
    shared: &'a AHashMap<PropertyId, Value>,
    instance: Option<&'a AHashMap<PropertyId, Value>>,
}

impl PropertyProvider for Overlay<'_> {
    fn property_value(&self, property_id: &str) -> Value {
        self.instance
            .and_then(|writes| writes.get(property_id))
            .or_else(|| self.shared.get(property_id))
            .cloned()
            .unwrap_or_else(|| self.base.property_value(property_id))
    }

    fn resolve_target(&self, property_id: &str) -> PropertyTarget {
        self.base.resolve_target(property_id)
    }
}

pub struct SessionBuilder {
    document: Document,
    provider: Box<dyn PropertyProvider>,
    parallel: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            provider: Box::new(StaticProperties::new()),
            parallel: false,
        }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }

    pub fn with_provider(mut self, provider: impl PropertyProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    /// Evaluate independent layers on the rayon thread pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn build(self) -> Session {
        Session {
            document: self.document,
            provider: self.provider,
            parallel: self.parallel,
            compiled: AHashMap::new(),
            stale: AHashMap::new(),
            schedules: AHashMap::new(),
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns a [`Document`] and the derived data built from it.
///
/// Every edit goes through the session so that the compiled graph it dirtied
/// and the schedule of the owning layer are dropped together.
pub struct Session {
    document: Document,
    provider: Box<dyn PropertyProvider>,
    parallel: bool,
    compiled: AHashMap<GraphId, CompiledGraph>,
    /// Invalidated compilations, kept so unchanged expressions are not re-parsed.
    stale: AHashMap<GraphId, CompiledGraph>,
    schedules: AHashMap<LayerId, Vec<GraphId>>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn provider(&self) -> &dyn PropertyProvider {
        self.provider.as_ref()
    }

    /// Swaps the property provider. Property targets may resolve differently,
    /// so every compiled graph is dropped.
    pub fn set_provider(&mut self, provider: impl PropertyProvider + 'static) {
        self.provider = Box::new(provider);
        self.stale.extend(self.compiled.drain());
        self.schedules.clear();
    }

    /// The current compilation of `graph_id`, if it is not stale.
    pub fn compiled(&self, graph_id: &str) -> Option<&CompiledGraph> {
        self.compiled.get(graph_id)
    }

    pub fn schedule(&self, layer_id: &str) -> Option<&[GraphId]> {
        self.schedules.get(layer_id).map(Vec::as_slice)
    }

    // --- Editor API ---

    pub fn add_graph(&mut self, graph_id: impl Into<GraphId>, kind: GraphKind) -> Result<GraphId, FlowError> {
        let result = self.document.add_graph(graph_id, kind);
        self.edited(result)
    }

    pub fn remove_graph(&mut self, graph_id: &str) -> Result<GraphId, FlowError> {
        // Invalidate first so the owning layer is still known.
        self.invalidate(graph_id);
        let graph_id = self.document.remove_graph(graph_id)?;
        self.stale.remove(&graph_id);
        Ok(graph_id)
    }

    pub fn add_node(&mut self, graph_id: &str, node: FlowNode) -> Result<GraphId, FlowError> {
        let result = self.document.add_node(graph_id, node);
        self.edited(result)
    }

    pub fn remove_node(&mut self, node_id: &str) -> Result<GraphId, FlowError> {
        let result = self.document.remove_node(node_id);
        self.edited(result)
    }

    pub fn set_pointer(&mut self, node_id: &str, input_index: usize, pointer: Pointer) -> Result<GraphId, FlowError> {
        let result = self.document.set_pointer(node_id, input_index, pointer);
        self.edited(result)
    }

    pub fn clear_pointer(&mut self, node_id: &str, input_index: usize) -> Result<GraphId, FlowError> {
        let result = self.document.clear_pointer(node_id, input_index);
        self.edited(result)
    }

    pub fn set_literal(
        &mut self,
        node_id: &str,
        input_index: usize,
        value: impl Into<Value>,
    ) -> Result<GraphId, FlowError> {
        let result = self.document.set_literal(node_id, input_index, value);
        self.edited(result)
    }

    pub fn set_expression(&mut self, node_id: &str, source: &str) -> Result<GraphId, FlowError> {
        let result = self.document.set_expression(node_id, source);
        self.edited(result)
    }

    fn edited(&mut self, result: Result<GraphId, EditError>) -> Result<GraphId, FlowError> {
        let graph_id = result?;
        self.invalidate(&graph_id);
        Ok(graph_id)
    }

    fn invalidate(&mut self, graph_id: &str) {
        let layer_id = self
            .document
            .graph(graph_id)
            .map(|g| g.layer_id().to_string())
            .or_else(|| self.compiled.get(graph_id).map(|c| c.kind.layer_id().to_string()));
        if let Some(compiled) = self.compiled.remove(graph_id) {
            log::debug!("Invalidated compiled graph '{}'", graph_id);
            self.stale.insert(graph_id.to_string(), compiled);
        }
        if let Some(layer_id) = layer_id {
            if self.schedules.remove(&layer_id).is_some() {
                log::debug!("Invalidated schedule of layer '{}'", layer_id);
            }
        }
    }

    // --- Compilation ---

    /// Compiles `graph_id` unless a current compilation is cached.
    pub fn compile_graph(&mut self, graph_id: &str) -> Result<&CompiledGraph, FlowError> {
        if !self.compiled.contains_key(graph_id) {
            let graph = self
                .document
                .graph(graph_id)
                .ok_or_else(|| EditError::GraphNotFound(graph_id.to_string()))?;
            let mut builder = Compiler::builder(graph, self.document.nodes(), self.provider.as_ref());
            if let Some(previous) = self.stale.get(graph_id) {
                builder = builder.with_previous(previous);
            }
            let compiled = builder.build().compile()?;

            #[cfg(feature = "debug-tools")]
            {
                let path = format!("tmp/graph_{}_compiled.txt", sanitize_filename(graph_id));
                if let Err(e) = write_debug_file(&path, &compiled.to_string()) {
                    log::warn!("Failed to write {}: {}", path, e);
                }
            }

            self.stale.remove(graph_id);
            self.compiled.insert(graph_id.to_string(), compiled);
        }
        self.compiled
            .get(graph_id)
            .ok_or_else(|| ScheduleError::NotCompiled(graph_id.to_string()).into())
    }

    /// Compiles every stale graph of the layer and orders them.
    pub fn prepare_layer(&mut self, layer_id: &str) -> Result<Vec<GraphId>, FlowError> {
        let graph_ids = self
            .document
            .layer_graphs(layer_id)
            .map(|g| g.id.clone())
            .collect_vec();
        if graph_ids.is_empty() {
            return Err(FlowError::UnknownLayer(layer_id.to_string()));
        }
        for graph_id in &graph_ids {
            self.compile_graph(graph_id)?;
        }
        if let Some(order) = self.schedules.get(layer_id) {
            return Ok(order.clone());
        }

        let compiled = graph_ids
            .iter()
            .map(|id| {
                self.compiled
                    .get(id)
                    .ok_or_else(|| ScheduleError::NotCompiled(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let order = scheduler::schedule(&compiled)?;
        log::info!("Prepared layer '{}' ({} graphs)", layer_id, order.len());
        self.schedules.insert(layer_id.to_string(), order.clone());
        Ok(order)
    }

    /// Prepares every layer of the document.
    pub fn prepare_all(&mut self) -> Result<Vec<LayerId>, FlowError> {
        let layers = self.document.layers();
        for layer_id in &layers {
            self.prepare_layer(layer_id)?;
        }
        Ok(layers)
    }

    // --- Evaluation ---

    /// Whether any of `changes` can alter the result of the layer. An
    /// unprepared layer always needs evaluation.
    pub fn needs_evaluation(&self, layer_id: &str, changes: &[ExternalChange]) -> bool {
        let Some(order) = self.schedules.get(layer_id) else {
            return true;
        };
        order.iter().any(|graph_id| match self.compiled.get(graph_id) {
            Some(compiled) => changes.iter().any(|change| compiled.is_affected_by(change)),
            None => true,
        })
    }

    /// Runs one pass over a prepared layer.
    ///
    /// Graphs run in scheduled order. Each later graph sees the writes of the
    /// earlier ones through the provider; an instance of an array-modifier
    /// graph additionally sees the writes of the same instance index.
    pub fn evaluate_layer(&self, layer_id: &str, context: &LayerContext) -> Result<LayerEvaluation, FlowError> {
        let order = self
            .schedules
            .get(layer_id)
            .ok_or_else(|| FlowError::NotPrepared(layer_id.to_string()))?;

        let mut evaluation = LayerEvaluation {
            layer_id: layer_id.to_string(),
            order: order.clone(),
            ..LayerEvaluation::default()
        };
        for graph_id in order {
            let compiled = self
                .compiled
                .get(graph_id)
                .ok_or_else(|| ScheduleError::NotCompiled(graph_id.clone()))?;
            let evaluator = Evaluator::new(compiled, self.document.nodes());
            let failed = |source| FlowError::Evaluation {
                graph_id: graph_id.clone(),
                source,
            };

            match &compiled.kind {
                GraphKind::Layer { .. } => {
                    let overlay = Overlay {
                        base: self.provider.as_ref(),
                        shared: &evaluation.writes,
                        instance: None,
                    };
                    let pass = evaluator
                        .evaluate(&EvaluationContext::new(context.frame_index, &overlay))
                        .map_err(failed)?;
                    evaluation.writes.extend(pass.property_writes().iter().cloned());
                    evaluation.passes.insert(graph_id.clone(), vec![pass]);
                }
                GraphKind::ArrayModifier { property_id, .. } => {
                    let count = context.array_counts.get(property_id).copied().unwrap_or(0);
                    let mut passes = Vec::with_capacity(count as usize);
                    for index in 0..count {
                        let overlay = Overlay {
                            base: self.provider.as_ref(),
                            shared: &evaluation.writes,
                            instance: evaluation.instance_writes.get(index as usize),
                        };
                        let pass_context = EvaluationContext::new(context.frame_index, &overlay)
                            .with_array_modifier(index, count);
                        passes.push(evaluator.evaluate(&pass_context).map_err(failed)?);
                    }
                    if evaluation.instance_writes.len() < passes.len() {
                        evaluation
                            .instance_writes
                            .resize_with(passes.len(), AHashMap::new);
                    }
                    for (writes, pass) in evaluation.instance_writes.iter_mut().zip(&passes) {
                        writes.extend(pass.property_writes().iter().cloned());
                    }
                    evaluation.passes.insert(graph_id.clone(), passes);
                }
            }
        }
        Ok(evaluation)
    }

    /// Evaluates several prepared layers, on the rayon pool when the session
    /// was built with `parallel(true)`.
    pub fn evaluate_layers(
        &self,
        requests: &[(LayerId, LayerContext)],
    ) -> Vec<Result<LayerEvaluation, FlowError>> {
        if self.parallel {
            requests
                .par_iter()
                .map(|(layer_id, context)| self.evaluate_layer(layer_id, context))
                .collect()
        } else {
            requests
                .iter()
                .map(|(layer_id, context)| self.evaluate_layer(layer_id, context))
                .collect()
        }
    }
}

#[cfg(feature = "debug-tools")]
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
}

#[cfg(feature = "debug-tools")]
fn write_debug_file(path: &str, content: &str) -> std::io::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}
