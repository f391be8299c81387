use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationAction;
use crate::consts::{
    DEFAULT_ABSOLUTE_ERROR_THRESHOLD, DEFAULT_MIN_CORRELATION, DEFAULT_MIN_OVERLAP,
    DEFAULT_PEAKS_TO_CHECK, DEFAULT_RELATIVE_ERROR_THRESHOLD, DEFAULT_SOLVER_MAX_ITERATIONS,
    DEFAULT_SOLVER_TOLERANCE,
};
use crate::session::GroupingChoice;
use crate::view::{Attribute, ViewId};

/// One value per attribute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct AttributeChoices<T> {
    pub timepoint: T,
    pub channel: T,
    pub illumination: T,
    pub angle: T,
    pub tile: T,
}

impl<T> AttributeChoices<T> {
    pub fn from_fn(mut f: impl FnMut(Attribute) -> T) -> Self {
        Self {
            timepoint: f(Attribute::TimePoint),
            channel: f(Attribute::Channel),
            illumination: f(Attribute::Illumination),
            angle: f(Attribute::Angle),
            tile: f(Attribute::Tile),
        }
    }

    pub fn get(&self, attribute: Attribute) -> &T {
        match attribute {
            Attribute::TimePoint => &self.timepoint,
            Attribute::Channel => &self.channel,
            Attribute::Illumination => &self.illumination,
            Attribute::Angle => &self.angle,
            Attribute::Tile => &self.tile,
        }
    }

    pub fn get_mut(&mut self, attribute: Attribute) -> &mut T {
        match attribute {
            Attribute::TimePoint => &mut self.timepoint,
            Attribute::Channel => &mut self.channel,
            Attribute::Illumination => &mut self.illumination,
            Attribute::Angle => &mut self.angle,
            Attribute::Tile => &mut self.tile,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &T)> {
        Attribute::ALL.into_iter().map(move |a| (a, self.get(a)))
    }
}

/// Tuning of the pairwise phase-correlation search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwiseStitchingParameters {
    /// Highest correlation peaks verified by cross-correlation.
    pub peaks_to_check: usize,
    /// Minimum overlap (fraction of the smaller region) a candidate shift must keep.
    pub min_overlap: f64,
    /// Minimum Pearson correlation for a shift to be accepted.
    pub min_correlation: f64,
    /// Largest accepted correction per axis, in full-resolution pixels.
    pub max_shift: Option<Vec<f64>>,
    /// Refine the winning peak to sub-pixel precision.
    pub subpixel: bool,
    /// Stop verifying lower-ranked peaks after this many milliseconds. The
    /// highest peak is always verified.
    pub peak_check_timeout_ms: Option<u64>,
}

impl Default for PairwiseStitchingParameters {
    fn default() -> Self {
        Self {
            peaks_to_check: DEFAULT_PEAKS_TO_CHECK,
            min_overlap: DEFAULT_MIN_OVERLAP,
            min_correlation: DEFAULT_MIN_CORRELATION,
            max_shift: None,
            subpixel: true,
            peak_check_timeout_ms: None,
        }
    }
}

/// Tuning of the global optimisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalOptimizationParameters {
    pub max_iterations: usize,
    /// Stop once no node moves by more than this (pixels).
    pub tolerance: f64,
    /// Drop the worst link when its error exceeds the mean error by this ratio.
    pub relative_error_threshold: f64,
    /// Drop the worst link when the mean link error exceeds this (pixels).
    pub absolute_error_threshold: f64,
    /// Disable to keep every link regardless of its error.
    pub remove_outliers: bool,
}

impl Default for GlobalOptimizationParameters {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_SOLVER_MAX_ITERATIONS,
            tolerance: DEFAULT_SOLVER_TOLERANCE,
            relative_error_threshold: DEFAULT_RELATIVE_ERROR_THRESHOLD,
            absolute_error_threshold: DEFAULT_ABSOLUTE_ERROR_THRESHOLD,
            remove_outliers: true,
        }
    }
}

/// How a grouped view becomes one image for correlation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombineStrategy {
    /// First member only.
    Representative,
    /// Positional per-member average.
    #[default]
    Average,
    /// The configured per-attribute aggregation actions.
    Aggregate,
}

impl std::fmt::Display for CombineStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Representative => write!(f, "Representative"),
            Self::Average => write!(f, "Average"),
            Self::Aggregate => write!(f, "Aggregate"),
        }
    }
}

/// Which views the solver keeps in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixedViews {
    /// The first grouped view of every application partition.
    #[default]
    First,
    /// Exactly these views.
    Views(Vec<ViewId>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairSelectionConfig {
    /// Minimum overlap fraction (of the smaller view) for a pair to be registered.
    pub min_overlap_fraction: f64,
}

impl Default for PairSelectionConfig {
    fn default() -> Self {
        Self {
            min_overlap_fraction: 0.0,
        }
    }
}

/// Complete description of a stitching run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StitchingConfig {
    /// Allowed instance ids per attribute; absent means all instances.
    #[serde(default)]
    pub filters: AttributeChoices<Option<Vec<u32>>>,
    #[serde(default = "default_grouping")]
    pub grouping: AttributeChoices<GroupingChoice>,
    /// Aggregation action per grouping factor; absent means average.
    #[serde(default)]
    pub aggregation: AttributeChoices<Option<AggregationAction>>,
    #[serde(default)]
    pub combine: CombineStrategy,
    /// Per-axis downsampling applied before correlation.
    #[serde(default = "default_downsample")]
    pub downsample: Vec<usize>,
    #[serde(default)]
    pub pair_selection: PairSelectionConfig,
    #[serde(default)]
    pub pairwise: PairwiseStitchingParameters,
    #[serde(default)]
    pub fixed: FixedViews,
    /// Sets of views that move together and are never registered against each other.
    #[serde(default)]
    pub constraint_groups: Vec<Vec<ViewId>>,
    #[serde(default)]
    pub global: GlobalOptimizationParameters,
}

fn default_grouping() -> AttributeChoices<GroupingChoice> {
    AttributeChoices {
        timepoint: GroupingChoice::TreatIndividually,
        channel: GroupingChoice::Group,
        illumination: GroupingChoice::TreatIndividually,
        angle: GroupingChoice::TreatIndividually,
        tile: GroupingChoice::Compare,
    }
}

fn default_downsample() -> Vec<usize> {
    vec![1, 1, 1]
}

impl Default for StitchingConfig {
    fn default() -> Self {
        Self {
            filters: AttributeChoices::default(),
            grouping: default_grouping(),
            aggregation: AttributeChoices::default(),
            combine: CombineStrategy::default(),
            downsample: default_downsample(),
            pair_selection: PairSelectionConfig::default(),
            pairwise: PairwiseStitchingParameters::default(),
            fixed: FixedViews::default(),
            constraint_groups: Vec::new(),
            global: GlobalOptimizationParameters::default(),
        }
    }
}
