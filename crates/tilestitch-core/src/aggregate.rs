//! Collapsing the members of a grouped view into one representative image.
//!
//! Each grouping-factor attribute carries one [`AggregationAction`]. When a
//! comparison needs a single image for a [`GroupedView`], the actions are
//! applied attribute by attribute until one image is left.

use std::collections::BTreeMap;

use ndarray::{ArrayD, IxDyn, Slice};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StitchError};
use crate::io::ImageSource;
use crate::view::{Attribute, AttributeValue, GroupedView, ViewDescription};

/// How the instances of one attribute inside a group become one image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationAction {
    /// Per-pixel mean of all instances.
    Average,
    /// The instance with the highest mean intensity.
    PickBrightest,
    /// Always the given instance.
    PickSpecific(AttributeValue),
}

/// Per-attribute aggregation actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupedViewAggregator {
    actions: BTreeMap<Attribute, AggregationAction>,
}

impl GroupedViewAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, attribute: Attribute, action: AggregationAction) {
        self.actions.insert(attribute, action);
    }

    pub fn action(&self, attribute: Attribute) -> Option<&AggregationAction> {
        self.actions.get(&attribute)
    }

    pub fn actions(&self) -> impl Iterator<Item = (Attribute, &AggregationAction)> {
        self.actions.iter().map(|(a, action)| (*a, action))
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Produce one image for `group` by applying every configured action.
    ///
    /// Attributes without an action fall back to the first remaining member.
    pub fn aggregate(
        &self,
        group: &GroupedView,
        source: &dyn ImageSource,
        downsample: &[usize],
    ) -> Result<ArrayD<f32>> {
        if group.len() == 1 {
            return source.image(group.id(), downsample);
        }

        let mut entries: Vec<(ViewDescription, ArrayD<f32>)> = Vec::with_capacity(group.len());
        for vd in group.views() {
            entries.push((vd.clone(), source.image(vd.id(), downsample)?));
        }

        let mut collapsed: Vec<Attribute> = Vec::new();
        for (attribute, action) in self.actions() {
            collapsed.push(attribute);
            entries = collapse(entries, attribute, action, &collapsed)?;
            debug!(%attribute, remaining = entries.len(), "Aggregated grouped view");
        }

        entries
            .into_iter()
            .next()
            .map(|(_, image)| image)
            .ok_or_else(|| StitchError::InvalidArgument("grouped view has no members".into()))
    }
}

/// Collapse `entries` along `attribute`, keeping apart entries that differ
/// on any attribute not yet collapsed.
fn collapse(
    entries: Vec<(ViewDescription, ArrayD<f32>)>,
    attribute: Attribute,
    action: &AggregationAction,
    collapsed: &[Attribute],
) -> Result<Vec<(ViewDescription, ArrayD<f32>)>> {
    let key_attributes: Vec<Attribute> = Attribute::ALL
        .into_iter()
        .filter(|a| !collapsed.contains(a))
        .collect();

    let mut buckets: Vec<(Vec<AttributeValue>, Vec<(ViewDescription, ArrayD<f32>)>)> = Vec::new();
    for (vd, image) in entries {
        let key: Vec<AttributeValue> = key_attributes
            .iter()
            .map(|a| vd.attribute(*a).clone())
            .collect();
        match buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bucket)) => bucket.push((vd, image)),
            None => buckets.push((key, vec![(vd, image)])),
        }
    }

    let mut result = Vec::with_capacity(buckets.len());
    for (_, mut bucket) in buckets {
        match action {
            AggregationAction::Average => {
                let images: Vec<ArrayD<f32>> = bucket.iter().map(|(_, img)| img.clone()).collect();
                let averaged = average_images(&images)?;
                let (vd, _) = bucket.swap_remove(0);
                result.push((vd, averaged));
            }
            AggregationAction::PickBrightest => {
                let images: Vec<&ArrayD<f32>> = bucket.iter().map(|(_, img)| img).collect();
                let idx = pick_brightest(&images)?;
                result.push(bucket.swap_remove(idx));
            }
            AggregationAction::PickSpecific(value) => {
                let views: Vec<&ViewDescription> = bucket.iter().map(|(vd, _)| vd).collect();
                let idx = pick_specific(&views, attribute, value)?;
                result.push(bucket.swap_remove(idx));
            }
        }
    }
    Ok(result)
}

/// Per-pixel mean of `images` over the first image's interval.
pub fn average_images(images: &[ArrayD<f32>]) -> Result<ArrayD<f32>> {
    let first = images.first().ok_or_else(|| {
        StitchError::InvalidArgument("cannot average an empty image list".into())
    })?;
    average_images_on(images, first.shape())
}

/// Per-pixel mean of `images` over the interval `[0, interval)`.
///
/// Pixels outside an image's bounds count as zero. Images are not shifted
/// relative to each other before averaging.
pub fn average_images_on(images: &[ArrayD<f32>], interval: &[usize]) -> Result<ArrayD<f32>> {
    if images.is_empty() {
        return Err(StitchError::InvalidArgument(
            "cannot average an empty image list".into(),
        ));
    }

    let mut sum = ArrayD::<f32>::zeros(IxDyn(interval));
    for image in images {
        if image.ndim() != interval.len() {
            return Err(StitchError::DimensionMismatch {
                expected: interval.len(),
                actual: image.ndim(),
            });
        }
        let extent: Vec<usize> = interval
            .iter()
            .zip(image.shape())
            .map(|(&a, &b)| a.min(b))
            .collect();
        let mut dst = sum.slice_each_axis_mut(|ax| Slice::from(0..extent[ax.axis.index()]));
        let src = image.slice_each_axis(|ax| Slice::from(0..extent[ax.axis.index()]));
        dst += &src;
    }

    sum /= images.len() as f32;
    Ok(sum)
}

/// Mean pixel value; the brightness metric used by [`AggregationAction::PickBrightest`].
pub fn mean_intensity(image: &ArrayD<f32>) -> f64 {
    if image.is_empty() {
        return 0.0;
    }
    image.iter().map(|&v| v as f64).sum::<f64>() / image.len() as f64
}

/// Index of the image with the highest mean intensity; ties go to the earliest.
pub fn pick_brightest(images: &[&ArrayD<f32>]) -> Result<usize> {
    if images.is_empty() {
        return Err(StitchError::InvalidArgument(
            "cannot pick the brightest of zero images".into(),
        ));
    }
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, image) in images.iter().enumerate() {
        let val = mean_intensity(image);
        if val > best_val {
            best_val = val;
            best = i;
        }
    }
    Ok(best)
}

/// Index of the member whose `attribute` equals `value`.
pub fn pick_specific(
    views: &[&ViewDescription],
    attribute: Attribute,
    value: &AttributeValue,
) -> Result<usize> {
    views
        .iter()
        .position(|vd| vd.attribute(attribute) == value)
        .ok_or_else(|| {
            StitchError::InvalidArgument(format!(
                "{} {} is not present in the grouped view",
                attribute, value
            ))
        })
}
