//! Orders the graphs of one layer so that every graph writing a property runs
//! before the graphs reading it.

use crate::compiler::CompiledGraph;
use crate::compiler::order::{TraversalError, post_order};
use crate::error::ScheduleError;
use crate::graph::{GraphId, PropertyId};
use ahash::AHashMap;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::convert::Infallible;

/// Returns the ids of `graphs` in evaluation order.
///
/// Graph B depends on graph A when A is a different graph and some property
/// A writes is read by B. Graphs with no such relation keep their relative
/// input order.
pub fn schedule(graphs: &[&CompiledGraph]) -> Result<Vec<GraphId>, ScheduleError> {
    let footprints: Vec<(&GraphId, BTreeSet<PropertyId>, BTreeSet<PropertyId>)> = graphs
        .iter()
        .map(|g| (&g.graph_id, g.written_properties(), g.read_properties()))
        .collect();

    let mut dependencies: AHashMap<GraphId, Vec<GraphId>> = AHashMap::new();
    for (reader, _, reads) in &footprints {
        let writers = footprints
            .iter()
            .filter(|(writer, writes, _)| writer != reader && !writes.is_disjoint(reads))
            .map(|(writer, _, _)| (*writer).clone())
            .collect();
        dependencies.insert((*reader).clone(), writers);
    }

    let seeds = graphs.iter().map(|g| g.graph_id.clone()).collect_vec();
    let order = post_order(&seeds, |id: &GraphId| {
        Ok::<_, Infallible>(dependencies.get(id).cloned().unwrap_or_default())
    })
    .map_err(|e| match e {
        TraversalError::Cycle { path, .. } => ScheduleError::Cycle { graph_ids: path },
        TraversalError::Dependency(never) => match never {},
    })?;

    log::debug!("Graph schedule: {}", order.iter().join(" -> "));
    Ok(order)
}
