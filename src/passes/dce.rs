//! Dead code elimination.
//!
//! Deletes every function and global that is not reachable from `main`, the
//! exported functions or the exported globals. The certificate recomputes
//! reachability over the pre-pass view of the tree and requires every entry
//! that was live before to still be present and unchanged.

use super::{OptimizationPass, PassResult};
use crate::core::error::OptResult;
use crate::core::tree::{FuncId, GlobalId, ProgramTree, TreeDelta};
use crate::wcet::{reachability, AnalysisResults};
use bumpalo::Bump;

/// Heuristic cycles attributed to each removed node.
const CYCLES_PER_REMOVED_NODE: i64 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeElimination;

impl DeadCodeElimination {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizationPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn is_applicable(&self, tree: &ProgramTree, analysis: &AnalysisResults) -> bool {
        analysis.reachable_functions.len() < tree.function_count()
            || analysis.reachable_globals.len() < tree.global_count()
    }

    fn transform(&self, tree: &mut ProgramTree, _analysis: &AnalysisResults) -> OptResult<PassResult> {
        // Recomputed rather than taken from the cache so the pass never acts on stale facts.
        let arena = Bump::new();
        let live = reachability::compute(tree, &arena);

        let dead_functions: Vec<FuncId> =
            tree.functions().map(|(id, _)| id).filter(|id| !live.functions.contains(id)).collect();
        let dead_globals: Vec<GlobalId> =
            tree.globals().map(|(id, _)| id).filter(|id| !live.globals.contains(id)).collect();

        let mut result = PassResult::unchanged();
        let mut removed_nodes = 0usize;
        for id in dead_functions {
            if let Some(function) = tree.remove_function(id) {
                log::debug!("DCE: removing unreachable function `{}`", function.name);
                removed_nodes += function.node_count();
                result.count("functions_removed", 1);
            }
        }
        for id in dead_globals {
            if let Some(global) = tree.remove_global(id) {
                log::debug!("DCE: removing unreferenced global `{}`", global.name);
                result.count("globals_removed", 1);
            }
        }

        result.modified = !result.counters.is_empty();
        result.size_impact = -(removed_nodes as i64);
        result.wcet_impact = -(removed_nodes as i64) * CYCLES_PER_REMOVED_NODE;
        Ok(result)
    }

    fn certify_determinism(&self, before: &TreeDelta, after: &ProgramTree) -> bool {
        let arena = Bump::new();
        let live_before = reachability::compute_before(before, after, &arena);

        let functions_kept = live_before.functions.iter().all(|&id| {
            match (before.function_before(id, after), after.func(id)) {
                (Some(pre), Some(post)) => !before.is_touched(id) || pre == post,
                _ => false,
            }
        });
        let globals_kept = live_before.globals.iter().all(|&id| {
            match (before.global_before(id, after), after.global(id)) {
                (Some(pre), Some(post)) => pre == post,
                _ => false,
            }
        });
        if !(functions_kept && globals_kept) {
            log::debug!("DCE certificate: a live function or global was removed or changed");
        }
        functions_kept && globals_kept
    }
}
