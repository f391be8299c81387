use std::collections::HashMap;

use ndarray::{ArrayD, IxDyn};

use crate::error::{Result, StitchError};
use crate::view::ViewId;

/// Read-only access to view pixel data.
///
/// Arrays are indexed by spatial axis: axis `d` of the returned array is
/// spatial dimension `d` (x, y[, z]). Downsampling is done by the source.
pub trait ImageSource: Sync {
    /// Pixel data of `view`, reduced by `downsample` along each axis.
    fn image(&self, view: ViewId, downsample: &[usize]) -> Result<ArrayD<f32>>;

    /// Full-resolution size of `view`, if the source knows it without
    /// loading pixels.
    fn size(&self, view: ViewId) -> Option<Vec<usize>> {
        let _ = view;
        None
    }
}

/// Image source backed by arrays held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryImageSource {
    images: HashMap<ViewId, ArrayD<f32>>,
}

impl InMemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, view: ViewId, data: ArrayD<f32>) {
        self.images.insert(view, data);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageSource for InMemoryImageSource {
    fn image(&self, view: ViewId, downsample: &[usize]) -> Result<ArrayD<f32>> {
        let data = self.images.get(&view).ok_or_else(|| StitchError::ImageLoad {
            view,
            reason: "no image registered for this view".into(),
        })?;
        Ok(downsample_block_mean(data, downsample))
    }

    fn size(&self, view: ViewId) -> Option<Vec<usize>> {
        self.images.get(&view).map(|d| d.shape().to_vec())
    }
}

/// Reduce `data` by averaging non-overlapping blocks of `factors` pixels.
///
/// Missing or zero factors count as 1. Partial blocks at the upper border
/// are averaged over the pixels they contain.
pub fn downsample_block_mean(data: &ArrayD<f32>, factors: &[usize]) -> ArrayD<f32> {
    let ndim = data.ndim();
    let factors: Vec<usize> = (0..ndim)
        .map(|d| factors.get(d).copied().unwrap_or(1).max(1))
        .collect();
    if factors.iter().all(|&f| f == 1) {
        return data.clone();
    }

    let out_shape: Vec<usize> = data
        .shape()
        .iter()
        .zip(&factors)
        .map(|(&s, &f)| s.div_ceil(f))
        .collect();

    let mut sum = ArrayD::<f32>::zeros(IxDyn(&out_shape));
    let mut count = ArrayD::<u32>::zeros(IxDyn(&out_shape));
    let mut target = vec![0usize; ndim];

    for (idx, &v) in data.indexed_iter() {
        for d in 0..ndim {
            target[d] = idx[d] / factors[d];
        }
        sum[IxDyn(&target)] += v;
        count[IxDyn(&target)] += 1;
    }

    sum.zip_mut_with(&count, |s, &c| {
        if c > 0 {
            *s /= c as f32;
        }
    });
    sum
}
