use crate::{Attractor, AttractorId, AttractorKind, InstanceKey, NodeActivity, State};
use std::fmt::{Display, Formatter};

impl AttractorId {
    pub fn new(instance: InstanceKey, index: usize) -> AttractorId {
        AttractorId { instance, index }
    }

    pub fn instance(&self) -> &InstanceKey {
        &self.instance
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Display for AttractorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.instance, self.index)
    }
}

impl NodeActivity {
    /// True if the node attains `value` in at least one state of the attractor.
    pub fn can_be(&self, value: bool) -> bool {
        match self {
            NodeActivity::Fixed(fixed) => *fixed == value,
            NodeActivity::Oscillating => true,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, NodeActivity::Fixed(_))
    }

    /// **(internal)** Merge the activity observed in two sets of states.
    pub(crate) fn merge(self, other: NodeActivity) -> NodeActivity {
        if self == other {
            self
        } else {
            NodeActivity::Oscillating
        }
    }
}

impl Attractor {
    /// Build an attractor from an explicit list of its states.
    ///
    /// States are sorted into canonical order and deduplicated. The list must be non-empty
    /// and all states must have the same width.
    pub fn from_states(
        instance: InstanceKey,
        index: usize,
        mut states: Vec<State>,
    ) -> Result<Attractor, String> {
        states.sort();
        states.dedup();
        let Some(first) = states.first() else {
            return Err(format!("Attractor {}/{} has no states.", instance, index));
        };
        let width = first.len();
        if let Some(bad) = states.iter().find(|it| it.len() != width) {
            return Err(format!(
                "Attractor {}/{} mixes states of width {} and {}.",
                instance,
                index,
                width,
                bad.len()
            ));
        }
        let mut activity: Vec<NodeActivity> =
            first.values().iter().map(|v| NodeActivity::Fixed(*v)).collect();
        for state in &states[1..] {
            for (node, value) in state.values().iter().enumerate() {
                activity[node] = activity[node].merge(NodeActivity::Fixed(*value));
            }
        }
        Ok(Attractor {
            id: AttractorId::new(instance, index),
            smallest_state: first.clone(),
            state_count: states.len() as u64,
            states,
            activity,
        })
    }

    /// **(internal)** Assemble an attractor whose summary was computed symbolically.
    pub(crate) fn from_parts(
        id: AttractorId,
        smallest_state: State,
        states: Vec<State>,
        state_count: u64,
        activity: Vec<NodeActivity>,
    ) -> Attractor {
        Attractor {
            id,
            smallest_state,
            states,
            state_count,
            activity,
        }
    }

    pub fn id(&self) -> &AttractorId {
        &self.id
    }

    pub fn index(&self) -> usize {
        self.id.index
    }

    pub fn instance(&self) -> &InstanceKey {
        &self.id.instance
    }

    /// The explicitly materialised states, in canonical order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// The lexicographically smallest state of the attractor (used for ordering).
    pub fn smallest_state(&self) -> &State {
        &self.smallest_state
    }

    /// The number of states of the attractor (saturates at `u64::MAX`).
    pub fn state_count(&self) -> u64 {
        self.state_count
    }

    pub fn is_truncated(&self) -> bool {
        (self.states.len() as u64) < self.state_count
    }

    pub fn activity(&self) -> &[NodeActivity] {
        &self.activity
    }

    pub fn kind(&self) -> AttractorKind {
        if self.state_count == 1 {
            AttractorKind::FixedPoint
        } else {
            AttractorKind::Cyclic
        }
    }

    /// Positions of nodes with value `1` in at least one state.
    pub fn active_nodes(&self) -> Vec<usize> {
        self.nodes_where(|it| it.can_be(true))
    }

    /// Positions of nodes with value `0` in at least one state.
    pub fn inactive_nodes(&self) -> Vec<usize> {
        self.nodes_where(|it| it.can_be(false))
    }

    pub fn stable_nodes(&self) -> Vec<usize> {
        self.nodes_where(|it| it.is_stable())
    }

    /// Positions of nodes fixed to `1` in every state.
    pub fn stable_active_nodes(&self) -> Vec<usize> {
        self.nodes_where(|it| *it == NodeActivity::Fixed(true))
    }

    pub fn oscillating_nodes(&self) -> Vec<usize> {
        self.nodes_where(|it| !it.is_stable())
    }

    fn nodes_where<F: Fn(&NodeActivity) -> bool>(&self, predicate: F) -> Vec<usize> {
        self.activity
            .iter()
            .enumerate()
            .filter(|(_, it)| predicate(it))
            .map(|(i, _)| i)
            .collect()
    }

    /// **(internal)** Attractor indices are assigned once the canonical order is known.
    pub(crate) fn set_index(&mut self, index: usize) {
        self.id.index = index;
    }
}
