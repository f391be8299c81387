/// Number of highest correlation peaks verified per pair.
pub const DEFAULT_PEAKS_TO_CHECK: usize = 5;

/// Minimum Pearson correlation a verified peak must reach.
pub const DEFAULT_MIN_CORRELATION: f64 = 0.3;

/// Default overlap (fraction of the smaller region) a candidate shift must keep.
pub const DEFAULT_MIN_OVERLAP: f64 = 0.1;

/// Candidate shifts overlapping by fewer pixels are never verified.
pub const MIN_OVERLAP_PIXELS: usize = 16;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// Spatial dimensionality assumed for registrations (2D views use the first two axes).
pub const REGISTRATION_DIMENSIONS: usize = 3;

/// Default iteration cap for the relaxation solver.
pub const DEFAULT_SOLVER_MAX_ITERATIONS: usize = 10_000;

/// Default convergence threshold (largest per-node update, in pixels).
pub const DEFAULT_SOLVER_TOLERANCE: f64 = 1e-4;

/// Default ratio between the worst and the mean link error above which the
/// worst link is dropped and the problem solved again.
pub const DEFAULT_RELATIVE_ERROR_THRESHOLD: f64 = 2.5;

/// Default mean link error (pixels) above which the worst link is dropped.
pub const DEFAULT_ABSOLUTE_ERROR_THRESHOLD: f64 = 3.5;

/// The relative threshold only removes links whose error exceeds this (pixels).
pub const OUTLIER_ERROR_FLOOR: f64 = 0.95;

/// Minimum number of FFT lanes before the transform is spread over the pool.
pub const PARALLEL_LANE_THRESHOLD: usize = 64;
