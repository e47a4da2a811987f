// This module defines the contract every optimization pass satisfies and re-exports the
// concrete passes of the default catalog. A pass is a stateless value with four operations:
// a stable name, a cheap applicability test over the current tree and analysis cache, an
// in-place transform that reports what it did, and a determinism certificate that compares the
// pre-images journaled during the transform with the tree left behind. The pass only reports;
// the orchestrator alone decides whether the change is kept or the run is aborted.

//! Optimization pass contract and the default pass catalog.

pub mod const_fold;
pub mod dce;
pub mod effects;
pub mod wcet_guided;

pub use const_fold::ConstantFolding;
pub use dce::DeadCodeElimination;
pub use wcet_guided::{WcetGuidedConfig, WcetGuidedOptimization};

use crate::core::error::OptResult;
use crate::core::tree::{ProgramTree, TreeDelta};
use crate::wcet::AnalysisResults;
use std::collections::BTreeMap;

/// Report of a single pass execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResult {
    pub modified: bool,
    /// Estimated change of worst-case cycles; negative is an improvement.
    pub wcet_impact: i64,
    /// Change in statement and expression node count.
    pub size_impact: i64,
    pub counters: BTreeMap<&'static str, u64>,
}

impl PassResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn count(&mut self, counter: &'static str, n: u64) {
        if n > 0 {
            *self.counters.entry(counter).or_insert(0) += n;
        }
    }

    pub fn counter(&self, counter: &str) -> u64 {
        self.counters.get(counter).copied().unwrap_or(0)
    }
}

/// One unit of transformation in the pipeline.
pub trait OptimizationPass {
    /// Stable name used in statistics and diagnostics.
    fn name(&self) -> &'static str;

    /// Cheap, pure test whether `transform` could do anything.
    fn is_applicable(&self, tree: &ProgramTree, analysis: &AnalysisResults) -> bool;

    /// Transform the tree in place.
    ///
    /// Only [`OptimizationError::AnalysisFailure`] may be returned; "nothing to
    /// do" is reported through [`PassResult::modified`].
    ///
    /// [`OptimizationError::AnalysisFailure`]: crate::core::OptimizationError::AnalysisFailure
    fn transform(&self, tree: &mut ProgramTree, analysis: &AnalysisResults) -> OptResult<PassResult>;

    /// Check that the change recorded in `before` preserved observable behavior.
    /// Returns `false` rather than failing.
    fn certify_determinism(&self, before: &TreeDelta, after: &ProgramTree) -> bool;
}
