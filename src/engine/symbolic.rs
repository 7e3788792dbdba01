use crate::engine::_impl_attractor_search::terminal_components;
use crate::engine::{canonical_order, AttractorEngine, InstanceIterator};
use crate::model::ModelHandle;
use crate::{Attractor, AttractorId, EnrichmentError, Instance, InstanceKey, NodeActivity, State};
use biodivine_lib_param_bn::biodivine_std::bitvector::BitVector;
use biodivine_lib_param_bn::biodivine_std::traits::Set;
use biodivine_lib_param_bn::symbolic_async_graph::{
    GraphColoredVertices, GraphColors, SymbolicAsyncGraph,
};
use biodivine_lib_param_bn::{BooleanNetwork, VariableId};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

/// Default limit on explicitly materialised states of one attractor.
pub const DEFAULT_MAX_STATES: usize = 256;

/// An `AttractorEngine` which encodes the whole parameter space of a `BooleanNetwork`
/// symbolically and resolves instances as singleton colours of a `SymbolicAsyncGraph`.
pub struct SymbolicEngine {
    network: BooleanNetwork,
    graph: SymbolicAsyncGraph,
    variables: Vec<VariableId>,
    // True for variables whose update function is missing or contains parameters.
    parametrised: Vec<bool>,
    max_states: usize,
}

/// Walks the unit colour set, always taking the BDD witness of the remaining colours.
struct ColorIterator<'a> {
    engine: &'a SymbolicEngine,
    remaining: GraphColors,
    next_index: usize,
}

impl SymbolicEngine {
    pub fn new(network: BooleanNetwork) -> Result<SymbolicEngine, EnrichmentError> {
        if network.num_vars() == 0 {
            return Err(EnrichmentError::Model("Network has no variables.".to_string()));
        }
        let graph = SymbolicAsyncGraph::new(&network).map_err(EnrichmentError::Model)?;
        let variables: Vec<VariableId> = network.variables().collect();
        let parametrised = variables
            .iter()
            .map(|var| match network.get_update_function(*var) {
                Some(function) => !function.collect_parameters().is_empty(),
                None => true,
            })
            .collect();
        Ok(SymbolicEngine {
            network,
            graph,
            variables,
            parametrised,
            max_states: DEFAULT_MAX_STATES,
        })
    }

    /// Load a network from an `.aeon`, `.bnet` or `.sbml` file.
    pub fn try_from_file<P: AsRef<Path>>(path: P) -> Result<SymbolicEngine, EnrichmentError> {
        let path = path.as_ref();
        let network = BooleanNetwork::try_from_file(path).map_err(|e| {
            EnrichmentError::Model(format!("Cannot load `{}`: {}", path.display(), e))
        })?;
        SymbolicEngine::new(network)
    }

    /// Limit the number of explicitly listed states per attractor (at least one).
    pub fn with_max_states(mut self, max_states: usize) -> SymbolicEngine {
        self.max_states = max_states.max(1);
        self
    }

    pub fn network(&self) -> &BooleanNetwork {
        &self.network
    }

    pub fn graph(&self) -> &SymbolicAsyncGraph {
        &self.graph
    }

    /// Number of symbolic parameter variables, i.e. bits of every `InstanceKey`.
    pub fn key_width(&self) -> usize {
        self.graph.symbolic_context().parameter_variables().len()
    }

    /// Describe the underlying network as a `ModelHandle`.
    pub fn model_handle(&self, name: &str) -> Result<ModelHandle, EnrichmentError> {
        ModelHandle::from_network(name, &self.network, self.key_width())
    }

    fn check_model(&self, model: &ModelHandle) -> Result<(), EnrichmentError> {
        if model.key_width() != self.key_width() || model.num_nodes() != self.variables.len() {
            return Err(EnrichmentError::Model(format!(
                "Model `{}` does not describe the network of this engine.",
                model.name()
            )));
        }
        Ok(())
    }

    /// Key of a singleton colour: the values of all parameter variables in its witness.
    fn key_of(&self, color: &GraphColors) -> InstanceKey {
        let parameters = self.graph.symbolic_context().parameter_variables();
        match color.as_bdd().sat_witness() {
            Some(valuation) => InstanceKey::new(parameters.iter().map(|v| valuation[*v]).collect()),
            None => InstanceKey::new(vec![false; parameters.len()]),
        }
    }

    /// Rebuild the singleton colour described by `key`.
    fn color_of(&self, key: &InstanceKey) -> Result<GraphColors, String> {
        let context = self.graph.symbolic_context();
        let parameters = context.parameter_variables();
        if parameters.len() != key.len() {
            return Err(format!(
                "Key {} has {} bits, expected {}.",
                key,
                key.len(),
                parameters.len()
            ));
        }
        let bdd_variables = context.bdd_variable_set();
        let mut bdd = bdd_variables.mk_true();
        for (var, value) in parameters.iter().zip(key.bits()) {
            bdd = bdd.and(&bdd_variables.mk_literal(*var, *value));
        }
        let color = self.graph.mk_unit_colors().copy(bdd);
        let color = color.intersect(self.graph.unit_colors());
        if color.is_empty() {
            Err(format!("Key {} is not an admissible parametrisation.", key))
        } else {
            Ok(color)
        }
    }

    /// Render the update functions of parametrised variables in the witness network of
    /// the given colour.
    fn rules_of(&self, color: &GraphColors) -> BTreeMap<String, String> {
        let witness = self.graph.pick_witness(color);
        let mut rules = BTreeMap::new();
        for (var, parametrised) in self.variables.iter().zip(&self.parametrised) {
            if !parametrised {
                continue;
            }
            if let Some(function) = witness.get_update_function(*var) {
                rules.insert(
                    witness.get_variable_name(*var).clone(),
                    function.to_string(&witness),
                );
            }
        }
        rules
    }

    /// Summarise one terminal component symbolically: per-node activity, the
    /// lexicographically smallest state and the (saturated) state count. At most
    /// `max_states` states are listed explicitly.
    #[allow(deprecated)]
    fn summarize(
        &self,
        key: &InstanceKey,
        component: &GraphColoredVertices,
        literals: &[(GraphColoredVertices, GraphColoredVertices)],
    ) -> Attractor {
        let activity = literals
            .iter()
            .map(|(is_false, is_true)| {
                let can_be_false = !component.intersect(is_false).is_empty();
                let can_be_true = !component.intersect(is_true).is_empty();
                match (can_be_false, can_be_true) {
                    (true, true) => NodeActivity::Oscillating,
                    (false, _) => NodeActivity::Fixed(true),
                    (true, false) => NodeActivity::Fixed(false),
                }
            })
            .collect();

        let mut remaining = component.clone();
        let mut smallest = Vec::with_capacity(literals.len());
        for (is_false, is_true) in literals {
            let low = remaining.intersect(is_false);
            if low.is_empty() {
                smallest.push(true);
                remaining = remaining.intersect(is_true);
            } else {
                smallest.push(false);
                remaining = low;
            }
        }

        let vertices = component.vertices();
        let cardinality = vertices.approx_cardinality();
        let state_count = if cardinality.is_finite() && cardinality < u64::MAX as f64 {
            cardinality.round() as u64
        } else {
            u64::MAX
        };
        let mut states: Vec<State> = vertices
            .materialize()
            .iter()
            .take(self.max_states)
            .map(|it| State::new(it.values()))
            .collect();
        states.sort();

        Attractor::from_parts(
            AttractorId::new(key.clone(), 0),
            State::new(smallest),
            states,
            state_count,
            activity,
        )
    }
}

impl Iterator for ColorIterator<'_> {
    type Item = Instance;

    fn next(&mut self) -> Option<Instance> {
        if self.remaining.is_empty() {
            return None;
        }
        let color = self.remaining.pick_singleton();
        self.remaining = self.remaining.minus(&color);
        let instance = Instance::new(self.next_index, self.engine.key_of(&color))
            .with_rules(self.engine.rules_of(&color));
        self.next_index += 1;
        Some(instance)
    }
}

impl AttractorEngine for SymbolicEngine {
    fn instances<'a>(
        &'a self,
        model: &'a ModelHandle,
    ) -> Result<InstanceIterator<'a>, EnrichmentError> {
        self.check_model(model)?;
        Ok(Box::new(ColorIterator {
            engine: self,
            remaining: self.graph.mk_unit_colors(),
            next_index: 0,
        }))
    }

    fn instance_space_size(&self, model: &ModelHandle) -> Option<u64> {
        self.check_model(model).ok()?;
        let count = self.graph.unit_colors().approx_cardinality();
        if count.is_finite() && count < u64::MAX as f64 {
            Some(count.round() as u64)
        } else {
            Some(u64::MAX)
        }
    }

    fn attractors(
        &self,
        model: &ModelHandle,
        instance: &Instance,
    ) -> Result<Vec<Attractor>, EnrichmentError> {
        self.check_model(model)?;
        let key = instance.key();
        let color = self.color_of(key).map_err(|message| EnrichmentError::Engine {
            instance: key.clone(),
            message,
        })?;
        let universe = self.graph.unit_colored_vertices().intersect_colors(&color);
        let components = terminal_components(&self.graph, &self.variables, universe);
        debug!(
            "Instance {} has {} terminal components.",
            key,
            components.len()
        );

        let literals: Vec<(GraphColoredVertices, GraphColoredVertices)> = self
            .variables
            .iter()
            .map(|var| {
                (
                    self.graph.fix_network_variable(*var, false),
                    self.graph.fix_network_variable(*var, true),
                )
            })
            .collect();
        let mut attractors: Vec<Attractor> = components
            .iter()
            .map(|component| self.summarize(key, component, &literals))
            .collect();
        canonical_order(&mut attractors);
        Ok(attractors)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{validate_attractors, AttractorEngine, SymbolicEngine};
    use crate::{AttractorKind, NodeActivity};
    use biodivine_lib_param_bn::biodivine_std::traits::Set;
    use biodivine_lib_param_bn::symbolic_async_graph::GraphColors;
    use biodivine_lib_param_bn::BooleanNetwork;
    use std::collections::{BTreeSet, HashSet};
    use std::convert::TryFrom;

    fn engine(model: &str) -> SymbolicEngine {
        SymbolicEngine::new(BooleanNetwork::try_from(model).unwrap()).unwrap()
    }

    #[test]
    fn negative_loop_is_one_cycle() {
        let engine = engine(
            r"
            b -> a
            a -| b
            $a: b
            $b: !a
        ",
        );
        let model = engine.model_handle("loop").unwrap();
        assert!(model.is_fully_specified());
        let instances: Vec<_> = engine.instances(&model).unwrap().collect();
        assert_eq!(1, instances.len());
        assert_eq!(Some(1), engine.instance_space_size(&model));

        let attractors = engine.attractors(&model, &instances[0]).unwrap();
        assert_eq!(1, attractors.len());
        assert_eq!(AttractorKind::Cyclic, attractors[0].kind());
        assert_eq!(4, attractors[0].state_count());
        assert_eq!(4, attractors[0].states().len());
        assert_eq!("00", attractors[0].smallest_state().to_string());
        assert_eq!(
            &[NodeActivity::Oscillating, NodeActivity::Oscillating],
            attractors[0].activity()
        );
        assert!(validate_attractors(&model, &instances[0], &attractors).is_ok());
    }

    #[test]
    fn implicit_function_instances() {
        let engine = engine(
            r"
            a -> a
            a -?? b
            $a: a
        ",
        );
        let model = engine.model_handle("switch").unwrap();
        assert_eq!(2, model.key_width());
        let instances: Vec<_> = engine.instances(&model).unwrap().collect();
        assert_eq!(4, instances.len());
        let keys: HashSet<_> = instances.iter().map(|it| it.key().clone()).collect();
        assert_eq!(4, keys.len());
        for (i, instance) in instances.iter().enumerate() {
            assert_eq!(i, instance.index());
            assert!(instance.rules().contains_key("b"));
            assert!(!instance.rules().contains_key("a"));
            // `a` is constant, so every instance has one fixed point for each value of `a`.
            let attractors = engine.attractors(&model, instance).unwrap();
            assert_eq!(2, attractors.len());
            assert!(attractors.iter().all(|it| it.kind() == AttractorKind::FixedPoint));
            assert_eq!(Some(&false), attractors[0].smallest_state().values().first());
            assert_eq!(Some(&true), attractors[1].smallest_state().values().first());
            assert!(validate_attractors(&model, instance, &attractors).is_ok());
        }
    }

    #[test]
    fn enumeration_is_restartable() {
        let engine = engine(
            r"
            a -> a
            a -?? b
            $a: a
        ",
        );
        let model = engine.model_handle("switch").unwrap();
        let first: Vec<_> = engine.instances(&model).unwrap().collect();
        let second: Vec<_> = engine.instances(&model).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn state_materialisation_is_capped() {
        let engine = engine(
            r"
            b -> a
            a -| b
            $a: b
            $b: !a
        ",
        )
        .with_max_states(2);
        let model = engine.model_handle("loop").unwrap();
        let instance = engine.instances(&model).unwrap().next().unwrap();
        let attractors = engine.attractors(&model, &instance).unwrap();
        assert_eq!(2, attractors[0].states().len());
        assert_eq!(4, attractors[0].state_count());
        assert!(attractors[0].is_truncated());
    }

    /// Asynchronous successors of every state under one colour. A state is a bit mask
    /// where bit `i` is the value of the `i`-th network variable.
    fn explicit_successors(engine: &SymbolicEngine, color: &GraphColors) -> Vec<Vec<usize>> {
        let graph = engine.graph();
        let variables = &engine.variables;
        (0..(1usize << variables.len()))
            .map(|state| {
                let mut vertex = graph.unit_colored_vertices().intersect_colors(color);
                for (i, var) in variables.iter().enumerate() {
                    let value = (state >> i) & 1 == 1;
                    vertex = vertex.intersect(&graph.fix_network_variable(*var, value));
                }
                assert!(!vertex.is_empty());
                variables
                    .iter()
                    .enumerate()
                    .filter(|(_, var)| !graph.var_post(**var, &vertex).is_empty())
                    .map(|(i, _)| state ^ (1 << i))
                    .collect()
            })
            .collect()
    }

    fn reachable(successors: &[Vec<usize>], from: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([from]);
        let mut stack = vec![from];
        while let Some(state) = stack.pop() {
            for next in &successors[state] {
                if seen.insert(*next) {
                    stack.push(*next);
                }
            }
        }
        seen
    }

    /// Terminal components by definition: `s` is in one iff every state reachable from
    /// `s` can reach `s` back.
    fn explicit_terminal_components(successors: &[Vec<usize>]) -> BTreeSet<BTreeSet<usize>> {
        let reach: Vec<BTreeSet<usize>> = (0..successors.len())
            .map(|state| reachable(successors, state))
            .collect();
        (0..successors.len())
            .filter(|state| reach[*state].iter().all(|it| reach[*it].contains(state)))
            .map(|state| reach[state].clone())
            .collect()
    }

    #[test]
    fn attractors_match_explicit_state_graph() {
        // `c` and `d` are implicit: 5 admissible functions for `c`, 16 for `d`.
        let engine = engine(
            r"
            a -> b
            b -| a
            a -> c
            b -?? c
            c -?? d
            d -?? d
            $a: !b
            $b: a
        ",
        )
        .with_max_states(16);
        let model = engine.model_handle("implicit").unwrap();
        let instances: Vec<_> = engine.instances(&model).unwrap().collect();
        assert_eq!(80, instances.len());
        for instance in &instances {
            let color = engine.color_of(instance.key()).unwrap();
            let successors = explicit_successors(&engine, &color);
            let expected = explicit_terminal_components(&successors);

            let attractors = engine.attractors(&model, instance).unwrap();
            assert!(validate_attractors(&model, instance, &attractors).is_ok());
            let mut found = BTreeSet::new();
            for attractor in &attractors {
                assert!(!attractor.is_truncated());
                let states: BTreeSet<usize> = attractor
                    .states()
                    .iter()
                    .map(|state| {
                        state
                            .values()
                            .iter()
                            .enumerate()
                            .filter(|(_, value)| **value)
                            .map(|(i, _)| 1usize << i)
                            .sum::<usize>()
                    })
                    .collect();
                assert_eq!(attractor.state_count(), states.len() as u64);
                for state in &states {
                    assert!(
                        successors[*state].iter().all(|it| states.contains(it)),
                        "A transition leaves attractor {} of {}.",
                        attractor.index(),
                        instance.key()
                    );
                }
                found.insert(states);
            }
            assert_eq!(expected, found, "instance {}", instance.key());
        }
    }

    #[test]
    fn foreign_model_is_rejected() {
        let engine = engine(
            r"
            a -> a
            $a: a
        ",
        );
        let other = crate::test_utils::scenario_model();
        assert!(engine.instances(&other).is_err());
    }
}
