pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{
    fixed_views, plan_stitching, run_stitching, run_stitching_reported, select_pairs,
};
pub use types::{PipelineStage, ProgressReporter, StitchingOutput, StitchingPlan};
