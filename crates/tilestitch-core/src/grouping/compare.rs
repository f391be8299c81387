use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StitchError};
use crate::view::{Attribute, ViewDescription};

/// How each attribute takes part in a registration run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingSpec {
    /// Attributes collapsed into one processing unit.
    #[serde(default)]
    pub grouping_factors: BTreeSet<Attribute>,
    /// Attributes processed independently; compared groups must agree on them.
    #[serde(default)]
    pub application_axes: BTreeSet<Attribute>,
    /// Attributes registered across; compared groups must differ on one.
    #[serde(default)]
    pub comparison_axes: BTreeSet<Attribute>,
}

impl GroupingSpec {
    pub fn validate(&self) -> Result<()> {
        if let Some(a) = self
            .application_axes
            .intersection(&self.comparison_axes)
            .next()
        {
            return Err(StitchError::InvalidArgument(format!(
                "{} is both an application axis and a comparison axis",
                a
            )));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.grouping_factors.clear();
        self.application_axes.clear();
        self.comparison_axes.clear();
    }
}

/// True if some attribute in `axes` takes different values for some member
/// of `a` and some member of `b`.
pub fn groups_differ(
    a: &[ViewDescription],
    b: &[ViewDescription],
    axes: &BTreeSet<Attribute>,
) -> bool {
    axes.iter().any(|&axis| {
        a.iter()
            .any(|va| b.iter().any(|vb| va.attribute(axis) != vb.attribute(axis)))
    })
}

/// Index pairs `(i, j)`, `i < j`, of groups that agree on every application
/// axis and differ on at least one comparison axis.
pub fn candidate_pairs(
    groups: &[Vec<ViewDescription>],
    application_axes: &BTreeSet<Attribute>,
    comparison_axes: &BTreeSet<Attribute>,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            if !groups_differ(&groups[i], &groups[j], application_axes)
                && groups_differ(&groups[i], &groups[j], comparison_axes)
            {
                pairs.push((i, j));
            }
        }
    }
    pairs
}
