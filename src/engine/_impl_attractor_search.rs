use biodivine_lib_param_bn::biodivine_std::traits::Set;
use biodivine_lib_param_bn::symbolic_async_graph::{GraphColoredVertices, SymbolicAsyncGraph};
use biodivine_lib_param_bn::VariableId;
use log::trace;

/// Find all terminal strongly connected components of the asynchronous graph restricted
/// to the given `universe`.
///
/// The `universe` must be forward-closed (typically all vertices of one colour). Each
/// iteration picks a pivot, saturates its forward and backward reachable sets and removes
/// the whole backward basin from the universe. The remaining universe stays forward-closed,
/// since every vertex that can reach the basin is in the basin. The forward set is a
/// terminal component exactly when it is contained in the backward set.
pub(super) fn terminal_components(
    graph: &SymbolicAsyncGraph,
    variables: &[VariableId],
    mut universe: GraphColoredVertices,
) -> Vec<GraphColoredVertices> {
    let mut components = Vec::new();
    // Vertices that are known to lead into a terminal component which is not yet found.
    let mut below = graph.mk_empty_colored_vertices();
    while !universe.is_empty() {
        let pivot = if below.is_empty() {
            universe.pick_vertex()
        } else {
            below.pick_vertex()
        };
        let fwd = fwd_saturation(graph, variables, &universe, pivot.clone());
        let bwd = bwd_saturation(graph, variables, &universe, pivot);
        let escaping = fwd.minus(&bwd);
        if escaping.is_empty() {
            trace!(
                "Terminal component with {} states.",
                fwd.approx_cardinality()
            );
            components.push(fwd);
            below = graph.mk_empty_colored_vertices();
        } else {
            below = escaping;
        }
        universe = universe.minus(&bwd);
        below = below.intersect(&universe);
    }
    components
}

/// Saturation-based forward reachability inside `universe`.
fn fwd_saturation(
    graph: &SymbolicAsyncGraph,
    variables: &[VariableId],
    universe: &GraphColoredVertices,
    mut fwd: GraphColoredVertices,
) -> GraphColoredVertices {
    'fwd: loop {
        for var in variables.iter().rev() {
            let successors = graph.var_post(*var, &fwd).intersect(universe);
            if !successors.is_subset(&fwd) {
                fwd = fwd.union(&successors);
                continue 'fwd;
            }
        }
        return fwd;
    }
}

/// Saturation-based backward reachability inside `universe`.
fn bwd_saturation(
    graph: &SymbolicAsyncGraph,
    variables: &[VariableId],
    universe: &GraphColoredVertices,
    mut bwd: GraphColoredVertices,
) -> GraphColoredVertices {
    'bwd: loop {
        for var in variables.iter().rev() {
            let predecessors = graph.var_pre(*var, &bwd).intersect(universe);
            if !predecessors.is_subset(&bwd) {
                bwd = bwd.union(&predecessors);
                continue 'bwd;
            }
        }
        return bwd;
    }
}
