use ndarray::{ArrayD, ArrayViewMut1, Axis, Zip};
use num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};

use crate::consts::PARALLEL_LANE_THRESHOLD;

/// Forward N-d FFT of a real array.
pub fn fft_nd(data: &ArrayD<f32>) -> ArrayD<Complex<f64>> {
    let mut complex = data.mapv(|v| Complex::new(v as f64, 0.0));
    transform_axes(&mut complex, FftDirection::Forward);
    complex
}

/// Inverse N-d FFT, normalised, keeping the real part.
pub fn ifft_nd_real(data: &ArrayD<Complex<f64>>) -> ArrayD<f64> {
    let mut work = data.clone();
    transform_axes(&mut work, FftDirection::Inverse);
    let scale = 1.0 / work.len().max(1) as f64;
    work.mapv(|c| c.re * scale)
}

/// 1D FFT along every axis in turn. Large transforms spread their lanes
/// over the current rayon pool.
fn transform_axes(data: &mut ArrayD<Complex<f64>>, direction: FftDirection) {
    let mut planner = FftPlanner::<f64>::new();
    for d in 0..data.ndim() {
        let len = data.shape()[d];
        if len <= 1 {
            continue;
        }
        let fft = planner.plan_fft(len, direction);
        let lanes = data.len() / len;

        let transform = |mut lane: ArrayViewMut1<Complex<f64>>| {
            let mut buf: Vec<Complex<f64>> = lane.to_vec();
            fft.process(&mut buf);
            for (dst, v) in lane.iter_mut().zip(buf) {
                *dst = v;
            }
        };

        if lanes >= PARALLEL_LANE_THRESHOLD {
            Zip::from(data.lanes_mut(Axis(d))).par_for_each(&transform);
        } else {
            Zip::from(data.lanes_mut(Axis(d))).for_each(&transform);
        }
    }
}

/// Separable Hann window over every axis, reducing spectral leakage.
pub fn apply_hann(data: &ArrayD<f32>) -> ArrayD<f32> {
    let shape = data.shape().to_vec();
    let weights: Vec<Vec<f64>> = shape
        .iter()
        .map(|&n| {
            (0..n)
                .map(|i| 0.5 * (1.0 - (std::f64::consts::TAU * i as f64 / n as f64).cos()))
                .collect()
        })
        .collect();

    let mut result = data.clone();
    for (idx, v) in result.indexed_iter_mut() {
        let mut w = 1.0;
        for (d, weight) in weights.iter().enumerate() {
            if shape[d] > 1 {
                w *= weight[idx[d]];
            }
        }
        *v = (*v as f64 * w) as f32;
    }
    result
}
