//! Groups instances by the fixed points they exhibit.
//!
//! Two instances belong to the same combination if they have exactly the same set of
//! fixed-point attractors. Cyclic attractors are ignored.

use crate::engine::InstanceEvaluation;
use crate::{AttractorKind, InstanceKey};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FixedPointCombination {
    /// Fixed points rendered as bit strings, in canonical order.
    pub fixed_points: Vec<String>,
    pub instances: Vec<InstanceKey>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct FixedPointCombinations {
    combinations: Vec<FixedPointCombination>,
}

impl FixedPointCombinations {
    pub fn collect(evaluations: &[InstanceEvaluation]) -> FixedPointCombinations {
        let mut groups: BTreeMap<Vec<String>, Vec<InstanceKey>> = BTreeMap::new();
        for evaluation in evaluations {
            let fixed_points: Vec<String> = evaluation
                .attractors()
                .iter()
                .filter(|it| it.kind() == AttractorKind::FixedPoint)
                .map(|it| it.smallest_state().to_string())
                .collect();
            groups
                .entry(fixed_points)
                .or_default()
                .push(evaluation.instance().key().clone());
        }
        let combinations = groups
            .into_iter()
            .map(|(fixed_points, mut instances)| {
                instances.sort();
                FixedPointCombination {
                    fixed_points,
                    instances,
                }
            })
            .collect();
        FixedPointCombinations { combinations }
    }

    pub fn combinations(&self) -> &[FixedPointCombination] {
        &self.combinations
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }
}

impl Display for FixedPointCombinations {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, combination) in self.combinations.iter().enumerate() {
            let points = if combination.fixed_points.is_empty() {
                "(none)".to_string()
            } else {
                combination.fixed_points.join(" ")
            };
            writeln!(
                f,
                "Combination {}: {} fixed point(s) [{}] in {} instance(s)",
                i,
                combination.fixed_points.len(),
                points,
                combination.instances.len()
            )?;
        }
        Ok(())
    }
}
