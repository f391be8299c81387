use ndarray::ArrayD;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{average_images_on, GroupedViewAggregator};
use crate::error::{Result, StitchError};
use crate::io::ImageSource;
use crate::overlap::overlaps;
use crate::pipeline::config::PairwiseStitchingParameters;
use crate::view::{GroupedView, ViewId, ViewRegistration, ViewRegistrations};

use super::phase_correlation::{get_shift, PairwiseShift};

/// Measured offset between two views, consumed by the global solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairwiseResult {
    pub view_a: ViewId,
    pub view_b: ViewId,
    /// Position of `view_b` relative to `view_a`, full-resolution pixels.
    pub shift: Vec<f64>,
    pub correlation: f64,
}

/// How the members of a grouped view are turned into one image.
#[derive(Clone, Debug, Default)]
pub enum CombineMode {
    /// Use the first member.
    #[default]
    Representative,
    /// Per-pixel mean of all members, members of the two groups matched
    /// by position.
    Average,
    /// Apply per-attribute aggregation actions.
    Aggregate(GroupedViewAggregator),
}

/// Worker pool shared by every pair of one batch.
pub fn build_worker_pool() -> Result<ThreadPool> {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    Ok(ThreadPoolBuilder::new().num_threads(threads).build()?)
}

/// Register one pair of (grouped) views.
///
/// Returns `Ok(None)` when the views do not overlap at their current
/// translations or no correlation peak verifies. Image loading failures
/// are returned as errors.
#[allow(clippy::too_many_arguments)]
pub fn compute_stitching(
    view_a: &GroupedView,
    view_b: &GroupedView,
    registration_a: &ViewRegistration,
    registration_b: &ViewRegistration,
    params: &PairwiseStitchingParameters,
    source: &dyn ImageSource,
    combine: &CombineMode,
    downsample: &[usize],
    pool: &ThreadPool,
) -> Result<Option<PairwiseShift>> {
    if let (Some(size_a), Some(size_b)) = (source.size(view_a.id()), source.size(view_b.id())) {
        let tr_a = registration_a.translation_for(size_a.len());
        let tr_b = registration_b.translation_for(size_b.len());
        if !overlaps(&size_a, &tr_a, &size_b, &tr_b) {
            debug!(a = %view_a, b = %view_b, "Skipping pair without overlap");
            return Ok(None);
        }
    }

    let (image_a, image_b) = load_pair(view_a, view_b, source, combine, downsample)?;

    let ndim = if image_a.ndim() == 2 && image_b.ndim() == 2 {
        2
    } else if image_a.ndim() == image_b.ndim() {
        image_a.ndim()
    } else {
        return Err(StitchError::DimensionMismatch {
            expected: image_a.ndim(),
            actual: image_b.ndim(),
        });
    };

    let scale: Vec<usize> = (0..ndim)
        .map(|d| downsample.get(d).copied().unwrap_or(1).max(1))
        .collect();
    let t_a = registration_a.initial_translation(ndim, &scale);
    let t_b = registration_b.initial_translation(ndim, &scale);

    let Some(mut result) = get_shift(&image_a, &image_b, &t_a, &t_b, params, &scale, pool)? else {
        return Ok(None);
    };

    for (s, f) in result.shift.iter_mut().zip(&scale) {
        *s *= *f as f64;
    }

    info!(
        a = %view_a,
        b = %view_b,
        shift = ?result.shift,
        correlation = result.correlation,
        "Pairwise shift"
    );
    Ok(Some(result))
}

fn load_pair(
    view_a: &GroupedView,
    view_b: &GroupedView,
    source: &dyn ImageSource,
    combine: &CombineMode,
    downsample: &[usize],
) -> Result<(ArrayD<f32>, ArrayD<f32>)> {
    match combine {
        CombineMode::Representative => Ok((
            source.image(view_a.id(), downsample)?,
            source.image(view_b.id(), downsample)?,
        )),
        CombineMode::Average => load_averaged(view_a, view_b, source, downsample),
        CombineMode::Aggregate(aggregator) => Ok((
            aggregator.aggregate(view_a, source, downsample)?,
            aggregator.aggregate(view_b, source, downsample)?,
        )),
    }
}

/// Members are matched by position. Both averages are taken on the
/// interval of the first member of `view_a`; offsets between members
/// (e.g. chromatic shifts between channels) are not corrected.
fn load_averaged(
    view_a: &GroupedView,
    view_b: &GroupedView,
    source: &dyn ImageSource,
    downsample: &[usize],
) -> Result<(ArrayD<f32>, ArrayD<f32>)> {
    if view_a.len() != view_b.len() {
        return Err(StitchError::InvalidArgument(format!(
            "cannot average grouped views with {} and {} members",
            view_a.len(),
            view_b.len()
        )));
    }

    let mut images_a = Vec::with_capacity(view_a.len());
    let mut images_b = Vec::with_capacity(view_b.len());
    for (va, vb) in view_a.views().iter().zip(view_b.views()) {
        images_a.push(source.image(va.id(), downsample)?);
        images_b.push(source.image(vb.id(), downsample)?);
    }

    let interval = images_a[0].shape().to_vec();
    Ok((
        average_images_on(&images_a, &interval)?,
        average_images_on(&images_b, &interval)?,
    ))
}

/// Register every pair, dropping pairs without a usable result.
pub fn compute_pairs(
    pairs: &[(GroupedView, GroupedView)],
    params: &PairwiseStitchingParameters,
    registrations: &ViewRegistrations,
    source: &dyn ImageSource,
    combine: &CombineMode,
    downsample: &[usize],
) -> Result<Vec<PairwiseResult>> {
    compute_pairs_with_progress(
        pairs,
        params,
        registrations,
        source,
        combine,
        downsample,
        |_| {},
    )
}

/// [`compute_pairs`] with a callback receiving the number of pairs done.
///
/// One worker pool serves the whole batch and is released when the batch
/// ends, whether it completes or fails on an image load.
pub fn compute_pairs_with_progress<F>(
    pairs: &[(GroupedView, GroupedView)],
    params: &PairwiseStitchingParameters,
    registrations: &ViewRegistrations,
    source: &dyn ImageSource,
    combine: &CombineMode,
    downsample: &[usize],
    on_pair_done: F,
) -> Result<Vec<PairwiseResult>>
where
    F: Fn(usize),
{
    let pool = build_worker_pool()?;
    let mut results = Vec::with_capacity(pairs.len());

    for (i, (a, b)) in pairs.iter().enumerate() {
        debug!(a = %a, b = %b, "Computing pairwise shift");
        let outcome = compute_stitching(
            a,
            b,
            registrations.get(a.id())?,
            registrations.get(b.id())?,
            params,
            source,
            combine,
            downsample,
            &pool,
        )?;

        if let Some(shift) = outcome {
            results.push(PairwiseResult {
                view_a: a.id(),
                view_b: b.id(),
                shift: shift.shift,
                correlation: shift.correlation,
            });
        }

        on_pair_done(i + 1);
    }

    info!(
        pairs = pairs.len(),
        registered = results.len(),
        "Pairwise registration complete"
    );
    Ok(results)
}
