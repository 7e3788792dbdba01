//! Capped, deterministic enumeration of the instances of a partially specified network.
//!
//! The instance space can be exponential in the number of free parameters, so the
//! enumerator never pulls more than `cap + 1` instances from the engine: the extra
//! instance only proves that the space is larger than the cap.

use crate::engine::AttractorEngine;
use crate::model::ModelHandle;
use crate::{EnrichmentError, Instance, InstanceKey};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What to do when the instance space is larger than the cap.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail with `EnrichmentError::ResourceExceeded`.
    #[default]
    Abort,
    /// Keep the first `cap` instances and report the truncation.
    Truncate,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EnumerationLimit {
    cap: Option<usize>,
    overflow: OverflowPolicy,
}

/// Instances produced by one enumeration, re-indexed from zero.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EnumeratedInstances {
    instances: Vec<Instance>,
    truncated: bool,
    duplicates: usize,
}

pub struct InstanceEnumerator<'a> {
    engine: &'a dyn AttractorEngine,
    limit: EnumerationLimit,
}

impl EnumerationLimit {
    pub fn unlimited() -> EnumerationLimit {
        EnumerationLimit {
            cap: None,
            overflow: OverflowPolicy::Abort,
        }
    }

    pub fn capped(cap: usize, overflow: OverflowPolicy) -> EnumerationLimit {
        EnumerationLimit {
            cap: Some(cap),
            overflow,
        }
    }

    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }
}

impl EnumeratedInstances {
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn into_instances(self) -> Vec<Instance> {
        self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// True if the cap cut the enumeration short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Number of instances dropped because their key was already seen.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

impl<'a> InstanceEnumerator<'a> {
    pub fn new(engine: &'a dyn AttractorEngine, limit: EnumerationLimit) -> InstanceEnumerator<'a> {
        InstanceEnumerator { engine, limit }
    }

    /// Enumerate the instances of `model`.
    ///
    /// The result is deduplicated by key (first occurrence wins) and every instance is
    /// indexed by its position. A model without admissible instances is an error.
    pub fn enumerate(&self, model: &ModelHandle) -> Result<EnumeratedInstances, EnrichmentError> {
        if let (Some(cap), OverflowPolicy::Abort) = (self.limit.cap, self.limit.overflow) {
            if let Some(size) = self.engine.instance_space_size(model) {
                if size > cap as u64 {
                    return Err(EnrichmentError::ResourceExceeded {
                        cap,
                        observed: format!("{} instances", size),
                    });
                }
            }
        }

        let mut seen: BTreeSet<InstanceKey> = BTreeSet::new();
        let mut result = EnumeratedInstances::default();
        for instance in self.engine.instances(model)? {
            model.check_key(instance.key()).map_err(EnrichmentError::Model)?;
            if seen.contains(instance.key()) {
                debug!("Dropping duplicate instance {}.", instance.key());
                result.duplicates += 1;
                continue;
            }
            if let Some(cap) = self.limit.cap {
                if result.instances.len() == cap {
                    match self.limit.overflow {
                        OverflowPolicy::Abort => {
                            return Err(EnrichmentError::ResourceExceeded {
                                cap,
                                observed: format!("at least {} instances", cap + 1),
                            });
                        }
                        OverflowPolicy::Truncate => {
                            info!("Instance enumeration truncated at {} instances.", cap);
                            result.truncated = true;
                            break;
                        }
                    }
                }
            }
            seen.insert(instance.key().clone());
            let index = result.instances.len();
            result.instances.push(instance.reindex(index));
        }

        if result.instances.is_empty() {
            return Err(EnrichmentError::Model(format!(
                "Model `{}` has no admissible instances.",
                model.name()
            )));
        }
        info!(
            "Enumerated {} instances of `{}`.",
            result.instances.len(),
            model.name()
        );
        Ok(result)
    }
}
