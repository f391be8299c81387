mod common;

use std::sync::Mutex;

use approx::assert_abs_diff_eq;
use tilestitch_core::aggregate::AggregationAction;
use tilestitch_core::pipeline::config::{CombineStrategy, FixedViews, StitchingConfig};
use tilestitch_core::pipeline::{
    plan_stitching, run_stitching, run_stitching_reported, PipelineStage, ProgressReporter,
};
use tilestitch_core::solver::RelaxationSolver;
use tilestitch_core::view::ViewId;

use common::{tile_grid, TileGrid};

/// 3 x 2 tiles of 96 px at spacing 72: edge neighbours share 25%, corner
/// neighbours 6.25%.
fn grid() -> TileGrid {
    tile_grid(3, 2, 96, 72)
}

fn config() -> StitchingConfig {
    let mut config = StitchingConfig::default();
    config.pair_selection.min_overlap_fraction = 0.1;
    config
}

fn tile_of(grid: &TileGrid, view: ViewId) -> usize {
    (view.setup / grid.channels) as usize
}

#[derive(Default)]
struct RecordingReporter {
    stages: Mutex<Vec<PipelineStage>>,
    advanced: Mutex<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: PipelineStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }

    fn advance(&self, items_done: usize) {
        *self.advanced.lock().unwrap() = items_done;
    }
}

#[test]
fn test_plan_selects_edge_neighbours() {
    let grid = grid();
    let plan = plan_stitching(&config(), &grid.dataset).unwrap();

    assert_eq!(plan.views.len(), 6);
    assert!(plan.views.iter().all(|g| g.len() == 2));
    assert_eq!(plan.pairs.len(), 7);
    assert_eq!(plan.fixed, vec![grid.view(0, 0)]);
    assert_eq!(plan.ndim, 2);
}

#[test]
fn test_any_overlap_also_selects_corner_neighbours() {
    let grid = grid();
    let plan = plan_stitching(&StitchingConfig::default(), &grid.dataset).unwrap();
    // 7 edge pairs plus 4 diagonal pairs
    assert_eq!(plan.pairs.len(), 11);
}

#[test]
fn test_grid_stitching_recovers_tile_positions() {
    let grid = grid();
    let output = run_stitching(&config(), &grid.dataset, &grid.source, &RelaxationSolver::new())
        .unwrap();

    assert_eq!(output.results.len(), 7);
    for result in &output.results {
        let a = grid.origins[tile_of(&grid, result.view_a)];
        let b = grid.origins[tile_of(&grid, result.view_b)];
        assert_abs_diff_eq!(result.shift[0], (b[0] - a[0]) as f64, epsilon = 1.0);
        assert_abs_diff_eq!(result.shift[1], (b[1] - a[1]) as f64, epsilon = 1.0);
        assert!(result.correlation > 0.9, "correlation {}", result.correlation);
    }

    assert_eq!(output.problem.fixed.len(), 1);
    assert_eq!(output.problem.unconstrained().len(), 5);
    assert!(output.solution.removed.is_empty());

    // Both channels of every tile end up at the true origin
    for tile in 0..6u32 {
        let origin = grid.origins[tile as usize];
        for channel in 0..grid.channels {
            let t = &output
                .registrations
                .get(grid.view(tile, channel))
                .unwrap()
                .translation;
            assert_abs_diff_eq!(t[0], origin[0] as f64, epsilon = 1.0);
            assert_abs_diff_eq!(t[1], origin[1] as f64, epsilon = 1.0);
            assert_eq!(t[2], 0.0);
        }
    }
}

#[test]
fn test_aggregate_combine_registers_same_pairs() {
    let grid = grid();
    let mut config = config();
    config.combine = CombineStrategy::Aggregate;
    config.aggregation.channel = Some(AggregationAction::PickBrightest);

    let output = run_stitching(&config, &grid.dataset, &grid.source, &RelaxationSolver::new())
        .unwrap();
    assert_eq!(output.results.len(), 7);
}

#[test]
fn test_filter_restricts_views_and_pairs() {
    let grid = grid();
    let mut config = config();
    config.filters.tile = Some(vec![0, 1]);

    let plan = plan_stitching(&config, &grid.dataset).unwrap();
    assert_eq!(plan.views.len(), 2);
    assert_eq!(plan.pairs.len(), 1);
}

#[test]
fn test_filter_removing_everything_is_an_error() {
    let grid = grid();
    let mut config = config();
    config.filters.channel = Some(vec![9]);
    assert!(plan_stitching(&config, &grid.dataset).is_err());
}

#[test]
fn test_pairs_of_fixed_views_are_not_registered() {
    let grid = grid();
    let mut config = config();
    config.fixed = FixedViews::Views((0..6).map(|t| grid.view(t, 0)).collect());

    let output = run_stitching(&config, &grid.dataset, &grid.source, &RelaxationSolver::new())
        .unwrap();
    assert!(output.pairs.is_empty());
    assert!(output.results.is_empty());
    assert_eq!(output.registrations, grid.dataset.registrations);
}

#[test]
fn test_reporter_sees_every_stage() {
    let grid = grid();
    let reporter = RecordingReporter::default();

    run_stitching_reported(
        &config(),
        &grid.dataset,
        &grid.source,
        &RelaxationSolver::new(),
        &reporter,
    )
    .unwrap();

    assert_eq!(
        *reporter.stages.lock().unwrap(),
        vec![
            PipelineStage::Filtering,
            PipelineStage::Grouping,
            PipelineStage::PairSelection,
            PipelineStage::PairwiseRegistration,
            PipelineStage::GlobalOptimization,
        ]
    );
    assert_eq!(*reporter.advanced.lock().unwrap(), 7);
}
