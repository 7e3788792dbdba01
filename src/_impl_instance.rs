use crate::{Instance, InstanceKey};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

impl InstanceKey {
    pub fn new(bits: Vec<bool>) -> InstanceKey {
        InstanceKey(bits)
    }

    /// Values of the individual parameter bits.
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Keys are printed as `#` followed by the parameter bits, e.g. `#0110`.
impl Display for InstanceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#")?;
        for bit in &self.0 {
            write!(f, "{}", if *bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl Instance {
    pub fn new(index: usize, key: InstanceKey) -> Instance {
        Instance {
            index,
            key,
            rules: BTreeMap::new(),
        }
    }

    /// Attach the rendered update rules (node name to rule) of this instance.
    pub fn with_rules(mut self, rules: BTreeMap<String, String>) -> Instance {
        self.rules = rules;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    pub fn rules(&self) -> &BTreeMap<String, String> {
        &self.rules
    }

    /// **(internal)** Instances produced by an engine are re-indexed by the enumerator.
    pub(crate) fn reindex(mut self, index: usize) -> Instance {
        self.index = index;
        self
    }
}
