use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StitchError};
use crate::pipeline::config::GlobalOptimizationParameters;
use crate::register::PairwiseResult;
use crate::view::{GroupedView, ViewId, ViewRegistrations};

/// Transform estimated per view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformModel {
    Translation2D,
    Translation3D,
}

impl TransformModel {
    pub fn for_dimensions(ndim: usize) -> Self {
        if ndim == 2 {
            Self::Translation2D
        } else {
            Self::Translation3D
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Self::Translation2D => 2,
            Self::Translation3D => 3,
        }
    }
}

impl fmt::Display for TransformModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Translation2D => write!(f, "Translation 2D"),
            Self::Translation3D => write!(f, "Translation 3D"),
        }
    }
}

/// Everything a global optimiser consumes.
#[derive(Clone, Debug)]
pub struct GlobalProblem {
    pub model: TransformModel,
    pub pairs: Vec<PairwiseResult>,
    /// Views whose translation stays at its initial value.
    pub fixed: Vec<ViewId>,
    /// Sets of views that move together.
    pub groups: Vec<Vec<ViewId>>,
    /// Starting translation of every view taking part.
    pub initial: BTreeMap<ViewId, Vec<f64>>,
    pub params: GlobalOptimizationParameters,
}

impl GlobalProblem {
    pub fn new(
        model: TransformModel,
        pairs: Vec<PairwiseResult>,
        fixed: Vec<ViewId>,
        groups: Vec<Vec<ViewId>>,
        initial: BTreeMap<ViewId, Vec<f64>>,
        params: GlobalOptimizationParameters,
    ) -> Result<Self> {
        let ndim = model.dimensions();
        for p in &pairs {
            if p.shift.len() != ndim {
                return Err(StitchError::DimensionMismatch {
                    expected: ndim,
                    actual: p.shift.len(),
                });
            }
            for v in [p.view_a, p.view_b] {
                if !initial.contains_key(&v) {
                    return Err(StitchError::MissingView(v));
                }
            }
        }
        for v in fixed.iter().chain(groups.iter().flatten()) {
            if !initial.contains_key(v) {
                return Err(StitchError::MissingView(*v));
            }
        }
        for t in initial.values() {
            if t.len() != ndim {
                return Err(StitchError::DimensionMismatch {
                    expected: ndim,
                    actual: t.len(),
                });
            }
        }

        Ok(Self {
            model,
            pairs,
            fixed,
            groups,
            initial,
            params,
        })
    }

    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.initial.keys().copied()
    }

    /// Views the optimiser is free to move.
    pub fn unconstrained(&self) -> Vec<ViewId> {
        let fixed: BTreeSet<ViewId> = self.fixed.iter().copied().collect();
        self.views().filter(|v| !fixed.contains(v)).collect()
    }
}

/// Residual of one pairwise link after optimisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkError {
    pub view_a: ViewId,
    pub view_b: ViewId,
    pub error: f64,
}

/// Optimised translations plus diagnostics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlobalSolution {
    pub translations: BTreeMap<ViewId, Vec<f64>>,
    /// Links still in use and their residuals.
    pub links: Vec<LinkError>,
    /// Links discarded as outliers.
    pub removed: Vec<LinkError>,
    pub iterations: usize,
}

impl GlobalSolution {
    pub fn mean_error(&self) -> f64 {
        if self.links.is_empty() {
            0.0
        } else {
            self.links.iter().map(|l| l.error).sum::<f64>() / self.links.len() as f64
        }
    }

    pub fn max_error(&self) -> f64 {
        self.links.iter().map(|l| l.error).fold(0.0, f64::max)
    }

    /// Write the solution back. Every member of a grouped view moves by the
    /// same amount as its representative, keeping offsets between members.
    pub fn apply(&self, registrations: &mut ViewRegistrations, grouped: &[GroupedView]) -> Result<()> {
        let by_id: HashMap<ViewId, &GroupedView> = grouped.iter().map(|g| (g.id(), g)).collect();

        for (id, translation) in &self.translations {
            let old = registrations.get(*id)?.translation_for(translation.len());
            let delta: Vec<f64> = translation.iter().zip(&old).map(|(n, o)| n - o).collect();

            let members = match by_id.get(id) {
                Some(g) => g.view_ids(),
                None => vec![*id],
            };
            for member in members {
                let mut registration = registrations.get(member)?.clone();
                for (d, shift) in delta.iter().enumerate() {
                    match registration.translation.get_mut(d) {
                        Some(t) => *t += shift,
                        None => registration.translation.push(*shift),
                    }
                }
                registrations.insert(member, registration);
            }
        }
        Ok(())
    }
}

/// A global optimiser.
pub trait GlobalOptimizer {
    fn optimize(&self, problem: &GlobalProblem) -> Result<GlobalSolution>;
}
