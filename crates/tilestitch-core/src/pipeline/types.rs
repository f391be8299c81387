use std::collections::HashMap;

use crate::register::{CombineMode, PairwiseResult};
use crate::solver::{GlobalProblem, GlobalSolution};
use crate::view::{GroupedView, ViewId, ViewRegistrations};

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Filtering,
    Grouping,
    PairSelection,
    PairwiseRegistration,
    GlobalOptimization,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filtering => write!(f, "Filtering views"),
            Self::Grouping => write!(f, "Grouping views"),
            Self::PairSelection => write!(f, "Selecting overlapping pairs"),
            Self::PairwiseRegistration => write!(f, "Registering pairs"),
            Self::GlobalOptimization => write!(f, "Optimizing globally"),
        }
    }
}

/// Outcome of filtering, grouping and pair selection.
#[derive(Clone, Debug)]
pub struct StitchingPlan {
    /// Grouped views taking part in the run.
    pub views: Vec<GroupedView>,
    /// Pairs to register.
    pub pairs: Vec<(GroupedView, GroupedView)>,
    pub fixed: Vec<ViewId>,
    pub combine: CombineMode,
    /// Number of spatial axes registered.
    pub ndim: usize,
    /// Current translation of every grouped view, restricted to `ndim` axes.
    pub translations: HashMap<ViewId, Vec<f64>>,
}

/// Everything a stitching run produced.
#[derive(Clone, Debug)]
pub struct StitchingOutput {
    /// Grouped views taking part in the run.
    pub views: Vec<GroupedView>,
    /// Pairs handed to pairwise registration.
    pub pairs: Vec<(GroupedView, GroupedView)>,
    /// Pairs that produced a shift.
    pub results: Vec<PairwiseResult>,
    pub problem: GlobalProblem,
    pub solution: GlobalSolution,
    /// Input registrations with the solution applied.
    pub registrations: ViewRegistrations,
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., pair count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_stitching` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
