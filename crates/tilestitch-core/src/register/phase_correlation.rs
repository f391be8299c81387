use std::time::{Duration, Instant};

use ndarray::{ArrayD, ArrayViewD, Slice, Zip};
use num_complex::Complex;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::consts::{EPSILON, MIN_OVERLAP_PIXELS};
use crate::error::{Result, StitchError};
use crate::pipeline::config::PairwiseStitchingParameters;

use super::fft::{apply_hann, fft_nd, ifft_nd_real};
use super::peaks::{disambiguate, find_peaks, refine_peak_parabolic, signed_position};

/// Outcome of registering one pair.
#[derive(Clone, Debug, PartialEq)]
pub struct PairwiseShift {
    /// Position of the second view's origin relative to the first's.
    pub shift: Vec<f64>,
    /// Pearson correlation of the overlap at that shift.
    pub correlation: f64,
}

/// Phase-correlation surface of two equally sized arrays.
///
/// A peak at `s` means `target(x) ≈ reference(x - s)` (periodically).
pub fn phase_correlation(reference: &ArrayD<f32>, target: &ArrayD<f32>) -> Result<ArrayD<f64>> {
    if reference.shape() != target.shape() {
        return Err(StitchError::InvalidArgument(format!(
            "phase correlation needs equal shapes, got {:?} and {:?}",
            reference.shape(),
            target.shape()
        )));
    }

    let ref_fft = fft_nd(&apply_hann(reference));
    let tgt_fft = fft_nd(&apply_hann(target));

    let mut cross = ArrayD::<Complex<f64>>::zeros(ref_fft.raw_dim());
    Zip::from(&mut cross)
        .and(&ref_fft)
        .and(&tgt_fft)
        .for_each(|c, r, t| {
            let product = r.conj() * t;
            let mag = product.norm();
            *c = if mag > EPSILON {
                product / mag
            } else {
                Complex::new(0.0, 0.0)
            };
        });

    Ok(ifft_nd_real(&cross))
}

/// Pearson correlation between `reference(y)` and `target(y + shift)` over
/// the region where both are defined.
///
/// Returns `None` when the overlap holds fewer than `MIN_OVERLAP_PIXELS`
/// pixels or no more than `min_overlap` of the smaller array, or when either
/// side is constant there.
pub fn cross_correlation(
    reference: &ArrayD<f32>,
    target: &ArrayD<f32>,
    shift: &[i64],
    min_overlap: f64,
) -> Option<(f64, usize)> {
    let ndim = reference.ndim();
    if target.ndim() != ndim || shift.len() != ndim {
        return None;
    }

    let mut ref_ranges = Vec::with_capacity(ndim);
    let mut tgt_ranges = Vec::with_capacity(ndim);
    for d in 0..ndim {
        let lo = 0.max(-shift[d]);
        let hi = (reference.shape()[d] as i64).min(target.shape()[d] as i64 - shift[d]);
        if hi <= lo {
            return None;
        }
        ref_ranges.push((lo, hi));
        tgt_ranges.push((lo + shift[d], hi + shift[d]));
    }

    let ref_view = reference.slice_each_axis(|ax| {
        let (lo, hi) = ref_ranges[ax.axis.index()];
        Slice::from(lo as isize..hi as isize)
    });
    let tgt_view = target.slice_each_axis(|ax| {
        let (lo, hi) = tgt_ranges[ax.axis.index()];
        Slice::from(lo as isize..hi as isize)
    });

    let count = ref_view.len();
    let smaller = reference.len().min(target.len());
    if count < MIN_OVERLAP_PIXELS || count as f64 <= smaller as f64 * min_overlap {
        return None;
    }

    pearson(&ref_view, &tgt_view).map(|r| (r, count))
}

fn pearson(a: &ArrayViewD<f32>, b: &ArrayViewD<f32>) -> Option<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut covar = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    Zip::from(a).and(b).for_each(|&va, &vb| {
        let da = va as f64 - mean_a;
        let db = vb as f64 - mean_b;
        covar += da * db;
        var_a += da * da;
        var_b += db * db;
    });

    if var_a <= EPSILON || var_b <= EPSILON {
        return None;
    }
    Some((covar / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Estimate the offset between two images placed at initial translations
/// `translation_a` and `translation_b` (pixel units of the images).
///
/// Only the region where the two placed images overlap is correlated. The
/// returned shift is the refined position of `b` relative to `a`, or `None`
/// when the images do not overlap or no candidate peak verifies.
pub fn get_shift(
    image_a: &ArrayD<f32>,
    image_b: &ArrayD<f32>,
    translation_a: &[f64],
    translation_b: &[f64],
    params: &PairwiseStitchingParameters,
    scale: &[usize],
    pool: &ThreadPool,
) -> Result<Option<PairwiseShift>> {
    let ndim = image_a.ndim();
    if image_b.ndim() != ndim {
        return Err(StitchError::DimensionMismatch {
            expected: ndim,
            actual: image_b.ndim(),
        });
    }

    let ta: Vec<i64> = (0..ndim)
        .map(|d| translation_a.get(d).copied().unwrap_or(0.0).round() as i64)
        .collect();
    let tb: Vec<i64> = (0..ndim)
        .map(|d| translation_b.get(d).copied().unwrap_or(0.0).round() as i64)
        .collect();

    let mut roi_a = Vec::with_capacity(ndim);
    let mut roi_b = Vec::with_capacity(ndim);
    for d in 0..ndim {
        let lo = ta[d].max(tb[d]);
        let hi = (ta[d] + image_a.shape()[d] as i64).min(tb[d] + image_b.shape()[d] as i64);
        if hi <= lo {
            debug!(axis = d, "Placed images do not overlap");
            return Ok(None);
        }
        roi_a.push(((lo - ta[d]) as isize, (hi - ta[d]) as isize));
        roi_b.push(((lo - tb[d]) as isize, (hi - tb[d]) as isize));
    }

    let region_a = image_a
        .slice_each_axis(|ax| {
            let (lo, hi) = roi_a[ax.axis.index()];
            Slice::from(lo..hi)
        })
        .to_owned();
    let region_b = image_b
        .slice_each_axis(|ax| {
            let (lo, hi) = roi_b[ax.axis.index()];
            Slice::from(lo..hi)
        })
        .to_owned();

    let surface = pool.install(|| phase_correlation(&region_a, &region_b))?;
    let shape = surface.shape().to_vec();
    let peaks = find_peaks(&surface, params.peaks_to_check);

    let mut candidates: Vec<(Vec<i64>, usize)> = Vec::new();
    for (peak_idx, peak) in peaks.iter().enumerate() {
        let signed = signed_position(&peak.position, &shape);
        for shift in disambiguate(&signed, &shape) {
            if within_max_shift(&shift, params.max_shift.as_deref(), scale) {
                candidates.push((shift, peak_idx));
            }
        }
    }

    let deadline = params
        .peak_check_timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let verified: Vec<Option<Candidate>> = pool.install(|| {
        candidates
            .par_iter()
            .map(|(shift, peak_idx)| {
                if *peak_idx > 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                    return None;
                }
                cross_correlation(&region_a, &region_b, shift, params.min_overlap).map(
                    |(correlation, overlap)| Candidate {
                        correlation,
                        overlap,
                        shift: shift.clone(),
                        peak_idx: *peak_idx,
                    },
                )
            })
            .collect()
    });

    // Equal correlations go to the larger overlap, then the higher peak.
    let best = verified
        .into_iter()
        .flatten()
        .filter(|c| c.correlation >= params.min_correlation)
        .max_by(|a, b| {
            a.correlation
                .total_cmp(&b.correlation)
                .then(a.overlap.cmp(&b.overlap))
                .then(b.peak_idx.cmp(&a.peak_idx))
        });

    let Some(Candidate {
        correlation,
        shift,
        peak_idx,
        ..
    }) = best
    else {
        debug!(
            peaks = peaks.len(),
            candidates = candidates.len(),
            "No correlation peak verified"
        );
        return Ok(None);
    };

    let sub = if params.subpixel {
        refine_peak_parabolic(&surface, &peaks[peak_idx].position)
    } else {
        vec![0.0; ndim]
    };

    // The peak measures how far the content of b sits from where the
    // initial translations put it; subtract it from the initial offset.
    let refined: Vec<f64> = (0..ndim)
        .map(|d| (tb[d] - ta[d]) as f64 - (shift[d] as f64 + sub[d]))
        .collect();

    Ok(Some(PairwiseShift {
        shift: refined,
        correlation,
    }))
}

struct Candidate {
    correlation: f64,
    overlap: usize,
    shift: Vec<i64>,
    peak_idx: usize,
}

fn within_max_shift(shift: &[i64], max_shift: Option<&[f64]>, scale: &[usize]) -> bool {
    let Some(max) = max_shift else {
        return true;
    };
    shift.iter().enumerate().all(|(d, &s)| {
        let factor = scale.get(d).copied().unwrap_or(1).max(1) as f64;
        match max.get(d) {
            Some(&m) => (s as f64 * factor).abs() <= m,
            None => true,
        }
    })
}
