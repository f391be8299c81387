use ndarray::{ArrayD, Dimension, IxDyn};

/// A local maximum of a correlation surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Peak {
    pub position: Vec<usize>,
    pub value: f64,
}

/// The `count` highest local maxima of a periodic surface, highest first.
pub fn find_peaks(surface: &ArrayD<f64>, count: usize) -> Vec<Peak> {
    if count == 0 || surface.is_empty() {
        return Vec::new();
    }
    let shape = surface.shape().to_vec();
    let offsets = neighbour_offsets(shape.len());
    let mut peaks: Vec<Peak> = Vec::with_capacity(count + 1);
    let mut neighbour = vec![0usize; shape.len()];

    for (idx, &value) in surface.indexed_iter() {
        if peaks.len() == count && value <= peaks[count - 1].value {
            continue;
        }
        let is_max = offsets.iter().all(|offset| {
            for d in 0..shape.len() {
                neighbour[d] = wrap(idx[d], offset[d], shape[d]);
            }
            surface[IxDyn(&neighbour)] <= value
        });
        if !is_max {
            continue;
        }
        let pos = peaks
            .iter()
            .position(|p| value > p.value)
            .unwrap_or(peaks.len());
        peaks.insert(
            pos,
            Peak {
                position: idx.slice().to_vec(),
                value,
            },
        );
        peaks.truncate(count);
    }

    peaks
}

/// Map an index on a periodic axis of length `n` to a signed shift in
/// `(-n/2, n/2]`.
pub fn signed_position(position: &[usize], shape: &[usize]) -> Vec<i64> {
    position
        .iter()
        .zip(shape)
        .map(|(&p, &n)| {
            if p > n / 2 {
                p as i64 - n as i64
            } else {
                p as i64
            }
        })
        .collect()
}

/// All shifts a periodic peak may stand for: on each axis the signed
/// position itself and its alias one period away.
pub fn disambiguate(signed: &[i64], shape: &[usize]) -> Vec<Vec<i64>> {
    let mut candidates: Vec<Vec<i64>> = vec![Vec::with_capacity(signed.len())];
    for (d, &s) in signed.iter().enumerate() {
        let n = shape[d] as i64;
        let mut options = vec![s];
        if s != 0 {
            options.push(if s < 0 { s + n } else { s - n });
        }
        candidates = candidates
            .into_iter()
            .flat_map(|prefix| {
                options.iter().map(move |&o| {
                    let mut c = prefix.clone();
                    c.push(o);
                    c
                })
            })
            .collect();
    }
    candidates
}

/// Refine a peak position using a parabola through its neighbours on each
/// axis. Returns per-axis fractional offsets clamped to +/- 0.5.
pub fn refine_peak_parabolic(surface: &ArrayD<f64>, position: &[usize]) -> Vec<f64> {
    let shape = surface.shape();
    let centre = surface[IxDyn(position)];
    let mut probe = position.to_vec();

    (0..position.len())
        .map(|d| {
            if shape[d] < 3 {
                return 0.0;
            }
            probe[d] = wrap(position[d], -1, shape[d]);
            let prev = surface[IxDyn(&probe)];
            probe[d] = wrap(position[d], 1, shape[d]);
            let next = surface[IxDyn(&probe)];
            probe[d] = position[d];

            let denom = prev - 2.0 * centre + next;
            if denom.abs() > 1e-12 {
                ((prev - next) / (2.0 * denom)).clamp(-0.5, 0.5)
            } else {
                0.0
            }
        })
        .collect()
}

fn wrap(index: usize, offset: i64, len: usize) -> usize {
    (index as i64 + offset).rem_euclid(len as i64) as usize
}

/// Offsets to the 3^n - 1 neighbours of a pixel.
fn neighbour_offsets(ndim: usize) -> Vec<Vec<i64>> {
    let mut offsets: Vec<Vec<i64>> = vec![Vec::new()];
    for _ in 0..ndim {
        offsets = offsets
            .into_iter()
            .flat_map(|prefix| {
                [-1i64, 0, 1].into_iter().map(move |o| {
                    let mut c = prefix.clone();
                    c.push(o);
                    c
                })
            })
            .collect();
    }
    offsets.retain(|o| o.iter().any(|&v| v != 0));
    offsets
}
