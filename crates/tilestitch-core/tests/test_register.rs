mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_abs_diff_eq;
use ndarray::ArrayD;
use tilestitch_core::error::{Result, StitchError};
use tilestitch_core::io::{ImageSource, InMemoryImageSource};
use tilestitch_core::pipeline::config::PairwiseStitchingParameters;
use tilestitch_core::register::{
    build_worker_pool, compute_pairs, compute_stitching, cross_correlation, get_shift,
    phase_correlation, CombineMode,
};
use tilestitch_core::register::peaks::find_peaks;
use tilestitch_core::view::{GroupedView, ViewId, ViewRegistration};

use common::{noise_tile, tile_grid};

/// Counts image loads.
struct CountingSource {
    inner: InMemoryImageSource,
    loads: AtomicUsize,
}

impl ImageSource for CountingSource {
    fn image(&self, view: ViewId, downsample: &[usize]) -> Result<ArrayD<f32>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.image(view, downsample)
    }

    fn size(&self, view: ViewId) -> Option<Vec<usize>> {
        self.inner.size(view)
    }
}

#[test]
fn test_phase_correlation_peak_at_shift() {
    let reference = noise_tile([0, 0], [32, 32], 1.0, 0.0);
    // target(x) = reference(x - 3, y + 2)
    let target = noise_tile([-3, 2], [32, 32], 1.0, 0.0);

    let surface = phase_correlation(&reference, &target).unwrap();
    let peaks = find_peaks(&surface, 1);

    assert_eq!(peaks[0].position, vec![3, 30]);
}

#[test]
fn test_phase_correlation_rejects_unequal_shapes() {
    let a = noise_tile([0, 0], [8, 8], 1.0, 0.0);
    let b = noise_tile([0, 0], [8, 9], 1.0, 0.0);
    assert!(phase_correlation(&a, &b).is_err());
}

#[test]
fn test_cross_correlation_of_matching_overlap() {
    let reference = noise_tile([0, 0], [32, 32], 1.0, 0.0);
    let target = noise_tile([-3, 2], [32, 32], 0.5, 0.1);

    let (r, count) = cross_correlation(&reference, &target, &[3, -2], 0.0).unwrap();
    assert_abs_diff_eq!(r, 1.0, epsilon = 1e-4);
    assert_eq!(count, 29 * 30);

    // Below the minimum overlap
    assert!(cross_correlation(&reference, &target, &[30, 0], 0.5).is_none());
}

#[test]
fn test_cross_correlation_stays_within_unit_range() {
    let reference = noise_tile([0, 0], [40, 40], 1.0, 0.0);
    let target = noise_tile([0, 0], [40, 40], 3.0, -0.7);

    let (r, _) = cross_correlation(&reference, &target, &[0, 0], 0.0).unwrap();
    assert!(r <= 1.0);
    let (r, _) = cross_correlation(&reference, &target.mapv(|v| -v), &[0, 0], 0.0).unwrap();
    assert!(r >= -1.0);
}

#[test]
fn test_tiny_overlap_is_never_verified() {
    let reference = noise_tile([0, 0], [96, 24], 1.0, 0.0);
    let unrelated = noise_tile([500, 900], [96, 24], 1.0, 0.0);

    // Two pixels correlate perfectly whatever their content
    assert!(cross_correlation(&reference, &unrelated, &[95, 22], 0.0).is_none());
    let defaults = PairwiseStitchingParameters::default();
    assert!(cross_correlation(&reference, &unrelated, &[90, 20], defaults.min_overlap).is_none());
}

#[test]
fn test_get_shift_prefers_true_offset_over_wrapped_alias() {
    // Vertical neighbours 72 px apart, placed one pixel left and two down
    let image_a = noise_tile([0, 0], [96, 96], 1.0, 0.0);
    let image_b = noise_tile([0, 72], [96, 96], 1.0, 0.0);
    let pool = build_worker_pool().unwrap();

    let shift = get_shift(
        &image_a,
        &image_b,
        &[0.0, 0.0],
        &[-1.0, 74.0],
        &PairwiseStitchingParameters::default(),
        &[1, 1],
        &pool,
    )
    .unwrap()
    .expect("shift should verify");

    assert_abs_diff_eq!(shift.shift[0], 0.0, epsilon = 0.5);
    assert_abs_diff_eq!(shift.shift[1], 72.0, epsilon = 0.5);
    assert!(shift.correlation <= 1.0);
}

#[test]
fn test_expired_deadline_keeps_highest_peak() {
    let image_a = noise_tile([0, 0], [64, 64], 1.0, 0.0);
    let image_b = noise_tile([40, 5], [64, 64], 1.0, 0.0);
    let pool = build_worker_pool().unwrap();
    let params = PairwiseStitchingParameters {
        peak_check_timeout_ms: Some(0),
        ..Default::default()
    };

    let shift = get_shift(&image_a, &image_b, &[0.0, 0.0], &[42.0, 3.0], &params, &[1, 1], &pool)
        .unwrap()
        .expect("highest peak is verified before the deadline applies");

    assert_abs_diff_eq!(shift.shift[0], 40.0, epsilon = 0.5);
    assert_abs_diff_eq!(shift.shift[1], 5.0, epsilon = 0.5);
}

#[test]
fn test_get_shift_recovers_offset_between_tiles() {
    let image_a = noise_tile([0, 0], [64, 64], 1.0, 0.0);
    let image_b = noise_tile([40, 5], [64, 64], 1.0, 0.0);
    let pool = build_worker_pool().unwrap();

    let shift = get_shift(
        &image_a,
        &image_b,
        &[0.0, 0.0],
        &[42.0, 3.0],
        &PairwiseStitchingParameters::default(),
        &[1, 1],
        &pool,
    )
    .unwrap()
    .expect("shift should verify");

    assert_abs_diff_eq!(shift.shift[0], 40.0, epsilon = 0.5);
    assert_abs_diff_eq!(shift.shift[1], 5.0, epsilon = 0.5);
    assert!(shift.correlation > 0.9);
}

#[test]
fn test_get_shift_honours_max_shift() {
    let image_a = noise_tile([0, 0], [64, 64], 1.0, 0.0);
    let image_b = noise_tile([40, 5], [64, 64], 1.0, 0.0);
    let pool = build_worker_pool().unwrap();
    let params = PairwiseStitchingParameters {
        max_shift: Some(vec![1.0, 1.0]),
        ..Default::default()
    };

    let shift = get_shift(&image_a, &image_b, &[0.0, 0.0], &[44.0, 1.0], &params, &[1, 1], &pool)
        .unwrap();
    assert!(shift.is_none());
}

#[test]
fn test_compute_stitching_scales_by_downsampling() {
    let grid = tile_grid(2, 1, 96, 72);
    let a = GroupedView::single(grid.dataset.view(grid.view(0, 0)).unwrap().clone());
    let b = GroupedView::single(grid.dataset.view(grid.view(1, 0)).unwrap().clone());
    let pool = build_worker_pool().unwrap();

    let shift = compute_stitching(
        &a,
        &b,
        grid.dataset.registrations.get(a.id()).unwrap(),
        grid.dataset.registrations.get(b.id()).unwrap(),
        &PairwiseStitchingParameters::default(),
        &grid.source,
        &CombineMode::Representative,
        &[2, 2],
        &pool,
    )
    .unwrap()
    .expect("shift should verify");

    assert_abs_diff_eq!(shift.shift[0], 72.0, epsilon = 2.0);
    assert_abs_diff_eq!(shift.shift[1], 0.0, epsilon = 2.0);
}

#[test]
fn test_non_overlapping_pair_is_skipped_without_loading() {
    let mut inner = InMemoryImageSource::new();
    let grid = tile_grid(2, 1, 32, 72);
    let a = grid.view(0, 0);
    let b = grid.view(1, 0);
    inner.insert(a, noise_tile([0, 0], [32, 32], 1.0, 0.0));
    inner.insert(b, noise_tile([72, 0], [32, 32], 1.0, 0.0));
    let source = CountingSource {
        inner,
        loads: AtomicUsize::new(0),
    };
    let pool = build_worker_pool().unwrap();

    let result = compute_stitching(
        &GroupedView::single(grid.dataset.view(a).unwrap().clone()),
        &GroupedView::single(grid.dataset.view(b).unwrap().clone()),
        &ViewRegistration::from_translation(&[0.0, 0.0, 0.0]),
        &ViewRegistration::from_translation(&[72.0, 0.0, 0.0]),
        &PairwiseStitchingParameters::default(),
        &source,
        &CombineMode::Representative,
        &[1, 1],
        &pool,
    )
    .unwrap();

    assert!(result.is_none());
    assert_eq!(source.loads.load(Ordering::SeqCst), 0);
}

#[test]
fn test_missing_image_is_an_error() {
    let grid = tile_grid(2, 1, 32, 24);
    let pairs = vec![(
        GroupedView::single(grid.dataset.view(grid.view(0, 0)).unwrap().clone()),
        GroupedView::single(grid.dataset.view(grid.view(1, 0)).unwrap().clone()),
    )];

    let result = compute_pairs(
        &pairs,
        &PairwiseStitchingParameters::default(),
        &grid.dataset.registrations,
        &InMemoryImageSource::new(),
        &CombineMode::Representative,
        &[1, 1],
    );

    assert!(matches!(result, Err(StitchError::ImageLoad { .. })));
}

#[test]
fn test_averaged_groups_need_equal_member_counts() {
    let grid = tile_grid(2, 1, 32, 24);
    let a = GroupedView::new(vec![
        grid.dataset.view(grid.view(0, 0)).unwrap().clone(),
        grid.dataset.view(grid.view(0, 1)).unwrap().clone(),
    ])
    .unwrap();
    let b = GroupedView::single(grid.dataset.view(grid.view(1, 0)).unwrap().clone());
    let pool = build_worker_pool().unwrap();

    let result = compute_stitching(
        &a,
        &b,
        grid.dataset.registrations.get(a.id()).unwrap(),
        grid.dataset.registrations.get(b.id()).unwrap(),
        &PairwiseStitchingParameters::default(),
        &grid.source,
        &CombineMode::Average,
        &[1, 1],
        &pool,
    );

    assert!(matches!(result, Err(StitchError::InvalidArgument(_))));
}
