//! Spatial overlap between views placed at their current translations.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, StitchError};
use crate::view::{GroupedView, ViewId};

/// Whether the boxes `[translation, translation + dims)` of two views
/// intersect on every axis.
pub fn overlaps(
    dims_a: &[usize],
    translation_a: &[f64],
    dims_b: &[usize],
    translation_b: &[f64],
) -> bool {
    let ndim = dims_a.len().min(dims_b.len());
    (0..ndim).all(|d| {
        let (min_a, max_a) = interval(dims_a, translation_a, d);
        let (min_b, max_b) = interval(dims_b, translation_b, d);
        min_a < max_b && min_b < max_a
    })
}

/// Intersection volume divided by the volume of the smaller box, in `[0, 1]`.
pub fn overlap_fraction(
    dims_a: &[usize],
    translation_a: &[f64],
    dims_b: &[usize],
    translation_b: &[f64],
) -> f64 {
    let ndim = dims_a.len().min(dims_b.len());
    let mut intersection = 1.0;
    let mut volume_a = 1.0;
    let mut volume_b = 1.0;
    for d in 0..ndim {
        let (min_a, max_a) = interval(dims_a, translation_a, d);
        let (min_b, max_b) = interval(dims_b, translation_b, d);
        intersection *= (max_a.min(max_b) - min_a.max(min_b)).max(0.0);
        volume_a *= max_a - min_a;
        volume_b *= max_b - min_b;
    }
    let smaller = volume_a.min(volume_b);
    if smaller <= 0.0 {
        0.0
    } else {
        intersection / smaller
    }
}

fn interval(dims: &[usize], translation: &[f64], d: usize) -> (f64, f64) {
    let t = translation.get(d).copied().unwrap_or(0.0);
    (t, t + dims[d] as f64)
}

/// Constraints the overlap search must respect.
#[derive(Clone, Debug, Default)]
pub struct PairConstraints {
    fixed: HashSet<ViewId>,
    group_of: HashMap<ViewId, usize>,
}

impl PairConstraints {
    pub fn new(fixed: &[ViewId], grouped: &[Vec<ViewId>]) -> Self {
        let mut group_of = HashMap::new();
        for (i, group) in grouped.iter().enumerate() {
            for v in group {
                group_of.insert(*v, i);
            }
        }
        Self {
            fixed: fixed.iter().copied().collect(),
            group_of,
        }
    }

    /// Pairs that may be registered independently: not both pinned, and not
    /// moved together by the same grouping constraint.
    pub fn allows(&self, a: ViewId, b: ViewId) -> bool {
        if self.fixed.contains(&a) && self.fixed.contains(&b) {
            return false;
        }
        match (self.group_of.get(&a), self.group_of.get(&b)) {
            (Some(ga), Some(gb)) => ga != gb,
            _ => true,
        }
    }
}

/// Keep the pairs whose views overlap by more than `min_overlap_fraction`
/// (any overlap when zero) and that `constraints` allow.
///
/// Views are looked up by their representative id in `sizes` and
/// `translations`.
pub fn retain_overlapping(
    pairs: Vec<(GroupedView, GroupedView)>,
    sizes: &HashMap<ViewId, Vec<usize>>,
    translations: &HashMap<ViewId, Vec<f64>>,
    constraints: &PairConstraints,
    min_overlap_fraction: f64,
) -> Result<Vec<(GroupedView, GroupedView)>> {
    let mut kept = Vec::with_capacity(pairs.len());
    for (a, b) in pairs {
        let (id_a, id_b) = (a.id(), b.id());
        if !constraints.allows(id_a, id_b) {
            continue;
        }
        let dims_a = sizes.get(&id_a).ok_or(StitchError::MissingView(id_a))?;
        let dims_b = sizes.get(&id_b).ok_or(StitchError::MissingView(id_b))?;
        let tr_a = translations.get(&id_a).ok_or(StitchError::MissingView(id_a))?;
        let tr_b = translations.get(&id_b).ok_or(StitchError::MissingView(id_b))?;

        if !overlaps(dims_a, tr_a, dims_b, tr_b) {
            continue;
        }
        if min_overlap_fraction > 0.0
            && overlap_fraction(dims_a, tr_a, dims_b, tr_b) < min_overlap_fraction
        {
            continue;
        }
        kept.push((a, b));
    }
    Ok(kept)
}

/// Every unordered pair of distinct `views` that overlaps spatially,
/// excluding pairs of fixed views and pairs inside one grouping constraint.
pub fn overlapping_pairs(
    sizes: &HashMap<ViewId, Vec<usize>>,
    translations: &HashMap<ViewId, Vec<f64>>,
    views: &[GroupedView],
    fixed_views: &[ViewId],
    grouped_views: &[Vec<ViewId>],
) -> Result<Vec<(GroupedView, GroupedView)>> {
    let mut all = Vec::new();
    for i in 0..views.len() {
        for j in (i + 1)..views.len() {
            all.push((views[i].clone(), views[j].clone()));
        }
    }
    let constraints = PairConstraints::new(fixed_views, grouped_views);
    retain_overlapping(all, sizes, translations, &constraints, 0.0)
}
