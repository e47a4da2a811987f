// This module implements the pipeline orchestrator: it owns the program tree and the analysis
// cache for the duration of a run and drives the ordered pass registry to a fixed point. Every
// pass execution happens inside a tree delta. A modification is kept only after the pass's
// determinism certificate accepts it, the tree is still consistent, a fresh WCET analysis
// succeeds, and (when bounds are preserved) no touched function degraded past the budget; any
// of those failing aborts the whole run with the matching error and no partial tree. Sweeps
// stop once a full sweep changes nothing, or after the configured maximum, in which case the
// best-effort tree is returned with a warning.

//! Optimization pipeline orchestration.
//!
//! # Usage
//!
//! ```ignore
//! let optimized = wcetopt::optimize(tree, PipelineConfig::default())?;
//! println!("{}", optimized.metadata);
//! ```

pub mod stats;

pub use stats::{OptimizationMetadata, PassStats};

use crate::core::error::{BuildError, OptResult, OptimizationError};
use crate::core::tree::{ProgramTree, TreeDelta};
use crate::passes::{
    ConstantFolding, DeadCodeElimination, OptimizationPass, WcetGuidedConfig,
    WcetGuidedOptimization,
};
use crate::wcet::{AnalysisResults, CallProfile, WcetAnalyzer};

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum sweeps over the pass registry.
    pub max_optimization_passes: usize,

    /// Reject modifications that grow a touched function's bound past the budget.
    pub preserve_wcet_bounds: bool,

    /// Allowed growth of a touched function's bound, in percent.
    pub max_wcet_degradation_percent: f64,

    pub wcet_guided: WcetGuidedConfig,

    /// Measured call frequencies used to rank critical paths.
    pub call_profile: Option<CallProfile>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_optimization_passes: 16,
            preserve_wcet_bounds: true,
            max_wcet_degradation_percent: 0.0,
            wcet_guided: WcetGuidedConfig::default(),
            call_profile: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_optimization_passes(mut self, sweeps: usize) -> Self {
        self.max_optimization_passes = sweeps;
        self
    }

    pub fn with_preserve_wcet_bounds(mut self, preserve: bool) -> Self {
        self.preserve_wcet_bounds = preserve;
        self
    }

    pub fn with_max_wcet_degradation_percent(mut self, percent: f64) -> Self {
        self.max_wcet_degradation_percent = percent;
        self
    }

    pub fn with_wcet_guided(mut self, config: WcetGuidedConfig) -> Self {
        self.wcet_guided = config;
        self
    }

    pub fn with_call_profile(mut self, profile: CallProfile) -> Self {
        self.call_profile = Some(profile);
        self
    }
}

/// The optimized tree together with the run statistics.
#[derive(Debug, Clone)]
pub struct OptimizedAst {
    pub tree: ProgramTree,
    pub metadata: OptimizationMetadata,
}

/// Ordered pass registry plus configuration.
pub struct Pipeline {
    config: PipelineConfig,
    passes: Vec<Box<dyn OptimizationPass>>,
}

impl Pipeline {
    /// Pipeline with the default catalog: dead code elimination, constant
    /// folding, then WCET-guided optimization.
    pub fn new(config: PipelineConfig) -> Self {
        let passes: Vec<Box<dyn OptimizationPass>> = vec![
            Box::new(DeadCodeElimination::new()),
            Box::new(ConstantFolding::new()),
            Box::new(WcetGuidedOptimization::new(config.wcet_guided.clone())),
        ];
        Self { config, passes }
    }

    /// Pipeline running `passes` in the given order.
    pub fn with_passes(config: PipelineConfig, passes: Vec<Box<dyn OptimizationPass>>) -> Self {
        Self { config, passes }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Optimize `tree` to a fixed point.
    pub fn run(&self, mut tree: ProgramTree) -> OptResult<OptimizedAst> {
        log::info!(
            "Optimizing {} function(s), {} global(s) with {} pass(es)",
            tree.function_count(),
            tree.global_count(),
            self.passes.len()
        );
        log::trace!("Input tree:\n{}", tree);

        tree.verify().map_err(|e| OptimizationError::analysis(offending_function(&e), e.to_string()))?;
        let analyzer = WcetAnalyzer::with_profile(self.config.call_profile.clone());
        let mut analysis = analyzer.analyze(&tree)?;

        let mut metadata = OptimizationMetadata {
            pass_stats: self.passes.iter().map(|p| PassStats::new(p.name())).collect(),
            ..Default::default()
        };

        while metadata.sweeps < self.config.max_optimization_passes {
            metadata.sweeps += 1;
            let mut changed = 0;
            for (pass, stats) in self.passes.iter().zip(metadata.pass_stats.iter_mut()) {
                if !pass.is_applicable(&tree, &analysis) {
                    log::trace!("Pass {} not applicable", pass.name());
                    stats.skipped += 1;
                    continue;
                }
                stats.runs += 1;

                tree.begin_delta();
                let result = pass.transform(&mut tree, &analysis);
                let delta = tree.take_delta();
                let result = result?;
                if !result.modified {
                    log::debug!("Pass {}: no change", pass.name());
                    continue;
                }

                if !pass.certify_determinism(&delta, &tree) {
                    return Err(OptimizationError::determinism(
                        pass.name(),
                        "determinism certificate rejected the transformation",
                    ));
                }
                tree.verify().map_err(|e| OptimizationError::determinism(pass.name(), e.to_string()))?;

                let refreshed = analyzer.analyze(&tree)?;
                if self.config.preserve_wcet_bounds {
                    self.check_degradation(&tree, &delta, &analysis, &refreshed)?;
                }
                analysis = refreshed;

                log::debug!(
                    "Pass {}: modified (WCET {:+} cycles, size {:+} nodes)",
                    pass.name(),
                    result.wcet_impact,
                    result.size_impact
                );
                stats.record(&result);
                changed += 1;
            }
            metadata.modifications += changed;

            if changed == 0 {
                metadata.converged = true;
                break;
            }
        }

        if !metadata.converged {
            log::warn!(
                "Optimization did not converge within {} sweep(s); returning best-effort tree",
                self.config.max_optimization_passes
            );
        }

        metadata.wcet_bounds = analysis
            .bounds
            .iter()
            .filter_map(|(id, bound)| tree.func(*id).map(|f| (f.name.clone(), *bound)))
            .collect();
        log::info!(
            "Optimization finished after {} sweep(s) with {} modification(s)",
            metadata.sweeps,
            metadata.modifications
        );
        log::trace!("Optimized tree:\n{}", tree);

        Ok(OptimizedAst { tree, metadata })
    }

    fn check_degradation(
        &self,
        tree: &ProgramTree,
        delta: &TreeDelta,
        before: &AnalysisResults,
        after: &AnalysisResults,
    ) -> OptResult<()> {
        for id in delta.touched_functions() {
            let (Some(old), Some(new)) = (before.bound(id), after.bound(id)) else {
                continue;
            };
            let percent = old.degradation_percent(new);
            if percent > self.config.max_wcet_degradation_percent {
                let function =
                    tree.func(id).map(|f| f.name.clone()).unwrap_or_else(|| id.to_string());
                return Err(OptimizationError::WcetDegradationExceeded {
                    function,
                    old_cycles: old.cycles(),
                    new_cycles: new.cycles(),
                    percent,
                });
            }
        }
        Ok(())
    }
}

/// Run the default pipeline over `tree`.
pub fn optimize(tree: ProgramTree, config: PipelineConfig) -> OptResult<OptimizedAst> {
    Pipeline::new(config).run(tree)
}

fn offending_function(error: &BuildError) -> String {
    match error {
        BuildError::DanglingReference { function, .. } => function.clone(),
        BuildError::ArityMismatch { caller, .. } => caller.clone(),
        BuildError::DuplicateFunction { name } | BuildError::DuplicateGlobal { name } => name.clone(),
        BuildError::UnknownFunction { id } => format!("fn#{id}"),
    }
}
