//! Bound inference over declared accesses.
//!
//! Walks the graph from a root stage towards its producers in reverse id
//! order (consumers before producers), accumulating for every stage the union
//! of the regions its consumers read. Stages for which `through` is false still
//! receive a demand but do not forward it: they are computed elsewhere.
use crate::buffer::Region;
use crate::graph::{StageGraph, StageId};

/// Demand per stage (indexed by id) when `root` is computed over `region`.
pub fn infer(
    graph: &StageGraph,
    root: StageId,
    region: Region,
    through: impl Fn(StageId) -> bool,
) -> Vec<Option<Region>> {
    let mut demand: Vec<Option<Region>> = vec![None; graph.len()];
    if region.is_empty() {
        return demand;
    }
    demand[root.index()] = Some(region);
    for id in graph.ids().rev() {
        if id > root {
            continue;
        }
        let Some(r) = demand[id.index()] else {
            continue;
        };
        if id != root && !through(id) {
            continue;
        }
        for access in graph.stage(id).accesses() {
            let need = access.required(&r);
            let slot = &mut demand[access.producer.index()];
            *slot = Some(match *slot {
                Some(prev) => prev.union(&need),
                None => need,
            });
        }
    }
    demand
}
