//! WCET analysis: cost model, reachability and critical paths.
//!
//! The analyzer produces the [`AnalysisResults`] cache that the pipeline keeps
//! for the duration of a run. A bound is either finite and conservative or the
//! analysis fails with [`OptimizationError::AnalysisFailure`]; nothing is
//! approximated.
//!
//! [`OptimizationError::AnalysisFailure`]: crate::core::OptimizationError::AnalysisFailure

pub mod analyzer;
pub mod cost;
pub mod reachability;

pub use analyzer::{AnalysisResults, CallProfile, CriticalPath, PathEntry, WcetAnalyzer, WcetBound};
pub use reachability::{Reachable, ENTRY_POINT};
