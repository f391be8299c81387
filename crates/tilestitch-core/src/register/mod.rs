//! Pairwise registration: translation and correlation score between two
//! overlapping views.

mod engine;
pub mod fft;
pub mod peaks;
pub mod phase_correlation;

pub use engine::{
    build_worker_pool, compute_pairs, compute_pairs_with_progress, compute_stitching,
    CombineMode, PairwiseResult,
};
pub use phase_correlation::{cross_correlation, get_shift, phase_correlation, PairwiseShift};
