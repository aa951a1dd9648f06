use crate::ast::Value;
use crate::compiler::CompiledGraph;
use crate::error::EvaluationError;
use crate::expression::{self, Scope};
use crate::graph::{FlowNode, Input, NodeId, NodeKind, PropertyId};
use crate::provider::PropertyProvider;
use ahash::AHashMap;

pub mod ops;

/// The iteration an array-modifier graph is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayModifierContext {
    pub index: u32,
    pub count: u32,
}

/// External values for one evaluation pass.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub frame_index: i64,
    /// `None` outside array-modifier graphs.
    pub array_modifier: Option<ArrayModifierContext>,
    pub provider: &'a dyn PropertyProvider,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(frame_index: i64, provider: &'a dyn PropertyProvider) -> Self {
        Self {
            frame_index,
            array_modifier: None,
            provider,
        }
    }

    pub fn with_array_modifier(mut self, index: u32, count: u32) -> Self {
        self.array_modifier = Some(ArrayModifierContext { index, count });
        self
    }
}

/// Every output computed in one pass, plus the values property-output nodes
/// hand to their target properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphEvaluation {
    outputs: AHashMap<NodeId, Vec<Value>>,
    writes: Vec<(PropertyId, Value)>,
}

impl GraphEvaluation {
    pub fn output(&self, node_id: &str, index: usize) -> Option<&Value> {
        self.outputs.get(node_id).and_then(|values| values.get(index))
    }

    pub fn outputs(&self, node_id: &str) -> Option<&[Value]> {
        self.outputs.get(node_id).map(Vec::as_slice)
    }

    /// `(member property id, value)` for every wired property-output input,
    /// in compute order.
    pub fn property_writes(&self) -> &[(PropertyId, Value)] {
        &self.writes
    }
}

/// Runs a compiled graph against the literals and pointers of its nodes.
///
/// Evaluation never mutates the nodes, so one evaluator can serve any number
/// of passes.
pub struct Evaluator<'a> {
    compiled: &'a CompiledGraph,
    nodes: &'a AHashMap<NodeId, FlowNode>,
}

impl<'a> Evaluator<'a> {
    pub fn new(compiled: &'a CompiledGraph, nodes: &'a AHashMap<NodeId, FlowNode>) -> Self {
        Self { compiled, nodes }
    }

    pub fn evaluate(&self, context: &EvaluationContext) -> Result<GraphEvaluation, EvaluationError> {
        let mut result = GraphEvaluation::default();
        for id in &self.compiled.compute_order {
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| EvaluationError::NotCompiled(id.clone()))?;
            let inputs = node
                .inputs
                .iter()
                .enumerate()
                .map(|(index, input)| self.resolve(node, index, input, context, &result.outputs))
                .collect::<Result<Vec<_>, _>>()?;

            let outputs = match &node.kind {
                NodeKind::Expression { .. } => self.run_expression(node, &inputs)?,
                kind => ops::compute(kind, &inputs),
            };

            if let NodeKind::PropertyOutput { .. } = node.kind {
                let members = self.compiled.property_targets.get(id).into_iter().flatten();
                for ((member, input), value) in members.zip(&node.inputs).zip(&inputs) {
                    if input.pointer.is_some() {
                        result.writes.push((member.clone(), value.clone()));
                    }
                }
            }
            result.outputs.insert(id.clone(), outputs);
        }
        log::trace!(
            "Evaluated graph '{}' at frame {} ({} writes)",
            self.compiled.graph_id,
            context.frame_index,
            result.writes.len()
        );
        Ok(result)
    }

    /// Pointer value first, then an external seed, then the literal.
    fn resolve(
        &self,
        node: &FlowNode,
        index: usize,
        input: &Input,
        context: &EvaluationContext,
        computed: &AHashMap<NodeId, Vec<Value>>,
    ) -> Result<Value, EvaluationError> {
        if let Some(pointer) = &input.pointer {
            return computed
                .get(&pointer.node_id)
                .and_then(|values| values.get(pointer.output_index))
                .cloned()
                .ok_or_else(|| EvaluationError::MissingValue {
                    node_id: pointer.node_id.clone(),
                    output_index: pointer.output_index,
                });
        }
        Ok(self
            .external(node, index, context)
            .unwrap_or_else(|| input.value.clone()))
    }

    fn external(&self, node: &FlowNode, index: usize, context: &EvaluationContext) -> Option<Value> {
        let externals = &self.compiled.externals;
        match &node.kind {
            NodeKind::Composition if index == 0 && externals.frame_index.contains(&node.id) => {
                Some(Value::Number(context.frame_index as f64))
            }
            NodeKind::ArrayModifierIndex if externals.array_modifier_index.contains(&node.id) => {
                let instance = context.array_modifier?;
                match index {
                    0 => Some(Value::Number(f64::from(instance.index))),
                    1 => Some(Value::Number(f64::from(instance.count))),
                    _ => None,
                }
            }
            NodeKind::PropertyInput { .. } => {
                let member = self.compiled.property_targets.get(&node.id)?.get(index)?;
                externals
                    .property_value
                    .get(member)?
                    .contains(&node.id)
                    .then(|| context.provider.property_value(member))
            }
            _ => None,
        }
    }

    /// Binds the resolved inputs by name, runs the program and reads each
    /// output back by name. An output the program never assigned is `Null`.
    fn run_expression(&self, node: &FlowNode, inputs: &[Value]) -> Result<Vec<Value>, EvaluationError> {
        let compiled = self
            .compiled
            .expressions
            .get(&node.id)
            .ok_or_else(|| EvaluationError::NotCompiled(node.id.clone()))?;

        let mut scope = Scope::new();
        for name in &compiled.io.inputs {
            scope.set(name.clone(), Value::Null);
        }
        for (input, value) in node.inputs.iter().zip(inputs) {
            scope.set(input.name.clone(), value.clone());
        }

        expression::run(&compiled.program, &mut scope).map_err(|e| EvaluationError::Expression {
            node_id: node.id.clone(),
            source: Box::new(e),
        })?;

        Ok(node
            .outputs
            .iter()
            .map(|output| scope.get(&output.name).cloned().unwrap_or_default())
            .collect())
    }
}
