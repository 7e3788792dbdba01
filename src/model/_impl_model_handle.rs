use crate::model::{ModelHandle, NodeSpec, ParameterSpec};
use crate::{EnrichmentError, InstanceKey, State};
use biodivine_lib_param_bn::BooleanNetwork;
use fxhash::FxHashMap;

impl NodeSpec {
    pub fn new(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            regulators: Vec::new(),
            rule: None,
            parametrised: false,
        }
    }

    pub fn with_regulators(mut self, regulators: &[&str]) -> NodeSpec {
        self.regulators = regulators.iter().map(|it| it.to_string()).collect();
        self
    }

    /// Attach a textual update rule. A node without a rule is considered parametrised.
    pub fn with_rule(mut self, rule: &str) -> NodeSpec {
        self.rule = Some(rule.to_string());
        self
    }

    /// Mark the node as depending on a free parameter.
    pub fn parametrised(mut self) -> NodeSpec {
        self.parametrised = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regulators(&self) -> &[String] {
        &self.regulators
    }

    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    /// True if the update rule of this node is (at least partially) unspecified.
    pub fn is_parametrised(&self) -> bool {
        self.parametrised || self.rule.is_none()
    }
}

impl ParameterSpec {
    pub fn new(name: &str, arity: u32, implicit: bool) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            arity,
            implicit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> u32 {
        self.arity
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }
}

impl ModelHandle {
    /// Create a new model handle, checking that the node set is non-empty, node names are
    /// unique and every regulator is a declared node.
    pub fn new(
        name: &str,
        nodes: Vec<NodeSpec>,
        parameters: Vec<ParameterSpec>,
        key_width: usize,
    ) -> Result<ModelHandle, EnrichmentError> {
        if nodes.is_empty() {
            return Err(EnrichmentError::Model(format!(
                "Model `{}` has no nodes.",
                name
            )));
        }
        let mut node_index = FxHashMap::default();
        for (i, node) in nodes.iter().enumerate() {
            if node_index.insert(node.name.clone(), i).is_some() {
                return Err(EnrichmentError::Model(format!(
                    "Duplicate node `{}` in model `{}`.",
                    node.name, name
                )));
            }
        }
        for node in &nodes {
            if let Some(unknown) = node
                .regulators
                .iter()
                .find(|it| !node_index.contains_key(it.as_str()))
            {
                return Err(EnrichmentError::Model(format!(
                    "Node `{}` is regulated by unknown node `{}`.",
                    node.name, unknown
                )));
            }
        }
        Ok(ModelHandle {
            name: name.to_string(),
            nodes,
            parameters,
            key_width,
            node_index,
        })
    }

    /// Describe a `BooleanNetwork`. The `key_width` is the number of symbolic parameter
    /// variables the engine uses to encode one instance.
    pub fn from_network(
        name: &str,
        network: &BooleanNetwork,
        key_width: usize,
    ) -> Result<ModelHandle, EnrichmentError> {
        let mut nodes = Vec::with_capacity(network.num_vars());
        for var in network.variables() {
            let regulators: Vec<String> = network
                .regulators(var)
                .into_iter()
                .map(|it| network.get_variable_name(it).clone())
                .collect();
            let mut node = NodeSpec {
                name: network.get_variable_name(var).clone(),
                regulators,
                rule: None,
                parametrised: false,
            };
            if let Some(function) = network.get_update_function(var) {
                node.parametrised = !function.collect_parameters().is_empty();
                node.rule = Some(function.to_string(network));
            }
            nodes.push(node);
        }

        let mut parameters: Vec<ParameterSpec> = network
            .parameters()
            .map(|id| {
                let parameter = network.get_parameter(id);
                ParameterSpec::new(parameter.get_name(), parameter.get_arity(), false)
            })
            .collect();
        for var in network.implicit_parameters() {
            let arity = network.regulators(var).len() as u32;
            parameters.push(ParameterSpec::new(
                network.get_variable_name(var),
                arity,
                true,
            ));
        }

        ModelHandle::new(name, nodes, parameters, key_width)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_name(&self, node: usize) -> &str {
        &self.nodes[node].name
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|it| it.name.clone()).collect()
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.node_index.get(name).cloned()
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn key_width(&self) -> usize {
        self.key_width
    }

    /// A model without free parameters has exactly one instance.
    pub fn is_fully_specified(&self) -> bool {
        self.key_width == 0
    }

    /// Nodes without any regulators (model inputs).
    pub fn roots(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|i| self.nodes[*i].regulators.is_empty())
            .collect()
    }

    /// Nodes that do not regulate any other node (model outputs). Self-loops are ignored.
    pub fn leaves(&self) -> Vec<usize> {
        let mut regulates_other = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for regulator in &node.regulators {
                if regulator != &node.name {
                    if let Some(i) = self.find_node(regulator) {
                        regulates_other[i] = true;
                    }
                }
            }
        }
        (0..self.nodes.len())
            .filter(|i| !regulates_other[*i])
            .collect()
    }

    /// Check that an instance key references exactly the parameters of this model.
    pub fn check_key(&self, key: &InstanceKey) -> Result<(), String> {
        if key.len() == self.key_width {
            Ok(())
        } else {
            Err(format!(
                "Instance key {} has {} parameter bits, model `{}` declares {}.",
                key,
                key.len(),
                self.name,
                self.key_width
            ))
        }
    }

    /// Check that a state assigns exactly the nodes of this model.
    pub fn check_state(&self, state: &State) -> Result<(), String> {
        if state.len() == self.nodes.len() {
            Ok(())
        } else {
            Err(format!(
                "State {} has {} values, model `{}` declares {} nodes.",
                state,
                state.len(),
                self.name,
                self.nodes.len()
            ))
        }
    }
}
