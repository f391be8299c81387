use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{info, warn};

use crate::aggregate::{AggregationAction, GroupedViewAggregator};
use crate::consts::REGISTRATION_DIMENSIONS;
use crate::error::{Result, StitchError};
use crate::grouping::grouped_views;
use crate::io::ImageSource;
use crate::overlap::{retain_overlapping, PairConstraints};
use crate::register::{compute_pairs_with_progress, CombineMode};
use crate::session::{FilteringAndGrouping, Interaction};
use crate::solver::{GlobalOptimizer, GlobalProblem, TransformModel};
use crate::view::{Attribute, AttributeValue, GroupedView, SpimDataset, ViewId};

use super::config::{CombineStrategy, FixedViews, StitchingConfig};
use super::types::{NoOpReporter, PipelineStage, ProgressReporter, StitchingOutput, StitchingPlan};

/// Run filtering, grouping, pair selection, pairwise registration and
/// global optimisation on `dataset`.
pub fn run_stitching(
    config: &StitchingConfig,
    dataset: &SpimDataset,
    source: &dyn ImageSource,
    optimizer: &dyn GlobalOptimizer,
) -> Result<StitchingOutput> {
    run_stitching_reported(config, dataset, source, optimizer, &NoOpReporter)
}

/// [`run_stitching`] with a progress reporter.
pub fn run_stitching_reported(
    config: &StitchingConfig,
    dataset: &SpimDataset,
    source: &dyn ImageSource,
    optimizer: &dyn GlobalOptimizer,
    reporter: &dyn ProgressReporter,
) -> Result<StitchingOutput> {
    let plan = plan_reported(config, dataset, reporter)?;

    reporter.begin_stage(PipelineStage::PairwiseRegistration, Some(plan.pairs.len()));
    let results = compute_pairs_with_progress(
        &plan.pairs,
        &config.pairwise,
        &dataset.registrations,
        source,
        &plan.combine,
        &config.downsample,
        |done| reporter.advance(done),
    )?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::GlobalOptimization, None);
    let known: HashSet<ViewId> = plan.views.iter().map(GroupedView::id).collect();
    let groups: Vec<Vec<ViewId>> = config
        .constraint_groups
        .iter()
        .map(|g| g.iter().copied().filter(|v| known.contains(v)).collect::<Vec<_>>())
        .filter(|g| !g.is_empty())
        .collect();
    let initial: BTreeMap<ViewId, Vec<f64>> = plan.translations.into_iter().collect();
    let problem = GlobalProblem::new(
        TransformModel::for_dimensions(plan.ndim),
        results.clone(),
        plan.fixed,
        groups,
        initial,
        config.global.clone(),
    )?;
    let solution = optimizer.optimize(&problem)?;

    let mut registrations = dataset.registrations.clone();
    solution.apply(&mut registrations, &plan.views)?;
    reporter.finish_stage();

    Ok(StitchingOutput {
        views: plan.views,
        pairs: plan.pairs,
        results,
        problem,
        solution,
        registrations,
    })
}

/// Filter, group and select pairs without reading any pixels.
pub fn plan_stitching(config: &StitchingConfig, dataset: &SpimDataset) -> Result<StitchingPlan> {
    plan_reported(config, dataset, &NoOpReporter)
}

fn plan_reported(
    config: &StitchingConfig,
    dataset: &SpimDataset,
    reporter: &dyn ProgressReporter,
) -> Result<StitchingPlan> {
    reporter.begin_stage(PipelineStage::Filtering, Some(dataset.views.len()));
    let mut session = FilteringAndGrouping::new(dataset);
    for (attribute, ids) in config.filters.iter() {
        if let Some(ids) = ids {
            let allowed = allowed_instances(dataset, attribute, ids);
            session.add_filter(attribute, allowed);
        }
    }
    let filtered = session.filtered_views();
    if filtered.is_empty() {
        return Err(StitchError::InvalidArgument(
            "no views left after filtering".into(),
        ));
    }
    info!(kept = filtered.len(), total = dataset.views.len(), "Filtered views");
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Grouping, None);
    session
        .apply_grouping_choices(Interaction::Confirmed(config.grouping.clone()))
        .ensure_applied()?;
    let views = grouped_views(&session.grouped_views(true))?;
    let comparisons = session.comparisons()?;
    let combine = combine_mode(config, session.grouping_factors());
    info!(
        groups = views.len(),
        comparisons = comparisons.len(),
        combine = %config.combine,
        "Grouped views"
    );
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::PairSelection, Some(comparisons.len()));
    let ndim = views
        .iter()
        .map(|g| g.representative().size().len())
        .max()
        .unwrap_or(REGISTRATION_DIMENSIONS)
        .min(REGISTRATION_DIMENSIONS);
    let ids: Vec<ViewId> = views.iter().map(GroupedView::id).collect();
    let sizes: HashMap<ViewId, Vec<usize>> = views
        .iter()
        .map(|g| (g.id(), g.representative().size().to_vec()))
        .collect();
    let translations = dataset.registrations.translations(&ids, ndim)?;
    let fixed = fixed_views(&config.fixed, &views, session.application_axes());
    let pairs = select_pairs(
        comparisons,
        &sizes,
        &translations,
        &fixed,
        &config.constraint_groups,
        config.pair_selection.min_overlap_fraction,
    )?;
    info!(pairs = pairs.len(), fixed = fixed.len(), "Selected overlapping pairs");
    reporter.finish_stage();

    Ok(StitchingPlan {
        views,
        pairs,
        fixed,
        combine,
        ndim,
        translations,
    })
}

fn allowed_instances(dataset: &SpimDataset, attribute: Attribute, ids: &[u32]) -> Vec<AttributeValue> {
    let present: BTreeSet<AttributeValue> = dataset
        .views
        .iter()
        .map(|vd| vd.attribute(attribute).clone())
        .collect();
    for id in ids {
        if !present.iter().any(|v| v.id == *id) {
            warn!(%attribute, id, "Filter names an instance that is not in the dataset");
        }
    }
    present.into_iter().filter(|v| ids.contains(&v.id)).collect()
}

fn combine_mode(config: &StitchingConfig, grouping_factors: &BTreeSet<Attribute>) -> CombineMode {
    match config.combine {
        CombineStrategy::Representative => CombineMode::Representative,
        CombineStrategy::Average => CombineMode::Average,
        CombineStrategy::Aggregate => {
            let mut aggregator = GroupedViewAggregator::new();
            for &attribute in grouping_factors {
                let action = config
                    .aggregation
                    .get(attribute)
                    .clone()
                    .unwrap_or(AggregationAction::Average);
                aggregator.add_action(attribute, action);
            }
            CombineMode::Aggregate(aggregator)
        }
    }
}

/// Views the global solver keeps in place.
///
/// [`FixedViews::First`] fixes the first grouped view of every set of views
/// sharing the same application-axis values. Explicit ids that are not a
/// grouped view of this run are ignored.
pub fn fixed_views(
    strategy: &FixedViews,
    views: &[GroupedView],
    application_axes: &BTreeSet<Attribute>,
) -> Vec<ViewId> {
    match strategy {
        FixedViews::First => {
            let mut seen: HashSet<Vec<AttributeValue>> = HashSet::new();
            views
                .iter()
                .filter(|g| {
                    let key: Vec<AttributeValue> = application_axes
                        .iter()
                        .map(|a| g.representative().attribute(*a).clone())
                        .collect();
                    seen.insert(key)
                })
                .map(GroupedView::id)
                .collect()
        }
        FixedViews::Views(ids) => {
            let known: HashSet<ViewId> = views.iter().map(GroupedView::id).collect();
            ids.iter()
                .copied()
                .filter(|id| {
                    let present = known.contains(id);
                    if !present {
                        warn!(view = %id, "Fixed view is not part of this run");
                    }
                    present
                })
                .collect()
        }
    }
}

/// Narrow candidate comparisons down to pairs worth registering: spatially
/// overlapping by at least `min_overlap_fraction`, not both fixed, and not
/// inside one constraint group.
pub fn select_pairs(
    comparisons: Vec<(GroupedView, GroupedView)>,
    sizes: &HashMap<ViewId, Vec<usize>>,
    translations: &HashMap<ViewId, Vec<f64>>,
    fixed: &[ViewId],
    constraint_groups: &[Vec<ViewId>],
    min_overlap_fraction: f64,
) -> Result<Vec<(GroupedView, GroupedView)>> {
    let constraints = PairConstraints::new(fixed, constraint_groups);
    retain_overlapping(
        comparisons,
        sizes,
        translations,
        &constraints,
        min_overlap_fraction,
    )
}
