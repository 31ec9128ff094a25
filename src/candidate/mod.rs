//! Reductions from score maps to scalar scores and candidate placements.

pub mod peaks;
pub mod topk;
