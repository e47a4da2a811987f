// This module implements the WCET analyzer, which fills the analysis cache the orchestrator
// hands to every pass. It computes the reachable set, then orders the reachable functions
// callees-first with an iterative depth-first search (explicit stack in a scratch arena, the
// same shape as the block ordering in the native backend's analyzer), rejecting any call cycle
// that is not a directly self-recursive function carrying a recursion limit. Bounds are then
// computed bottom-up with the cost model, so a caller always sees the final bound of each
// callee. Finally one critical path per root is derived by repeatedly descending into the
// callee that dominates the cost. Optional call profiles re-rank callees on that descent but
// never change a bound.

//! Worst-case execution time analysis.

use super::cost::CostWalker;
use super::reachability::{self, is_root};
use crate::core::error::{OptResult, OptimizationError};
use crate::core::tree::{FuncId, GlobalId, ProgramTree};
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Conservative worst-case cycle count of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WcetBound(pub u64);

impl WcetBound {
    pub fn cycles(self) -> u64 {
        self.0
    }

    /// Growth from `self` to `after` in percent of `self`.
    pub fn degradation_percent(self, after: WcetBound) -> f64 {
        let (old, new) = (self.0 as f64, after.0 as f64);
        if self.0 == 0 {
            if after.0 == 0 { 0.0 } else { f64::INFINITY }
        } else {
            (new - old) / old * 100.0
        }
    }
}

impl fmt::Display for WcetBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cycles", self.0)
    }
}

/// Measured call frequencies, keyed by `(caller, callee)` names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallProfile {
    frequencies: BTreeMap<(String, String), u64>,
}

impl CallProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, caller: &str, callee: &str, frequency: u64) -> &mut Self {
        self.frequencies.insert((caller.to_string(), callee.to_string()), frequency);
        self
    }

    pub fn frequency(&self, caller: &str, callee: &str) -> Option<u64> {
        self.frequencies.get(&(caller.to_string(), callee.to_string())).copied()
    }
}

/// One function on a critical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub id: FuncId,
    pub function: String,
    /// Invocations per activation of the previous entry; 1 for the root.
    pub frequency: u64,
}

/// Cost-dominant call chain starting at a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalPath {
    pub root: String,
    pub bound: WcetBound,
    pub entries: Vec<PathEntry>,
}

impl CriticalPath {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.function.as_str()).collect()
    }

    /// `(caller, callee, frequency)` for every consecutive pair.
    pub fn edges(&self) -> impl Iterator<Item = (FuncId, FuncId, u64)> + '_ {
        self.entries.windows(2).map(|pair| (pair[0].id, pair[1].id, pair[1].frequency))
    }
}

/// Derived facts about a tree, replaced wholesale after every validated change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResults {
    pub reachable_functions: BTreeSet<FuncId>,
    pub reachable_globals: BTreeSet<GlobalId>,
    pub bounds: BTreeMap<FuncId, WcetBound>,
    pub critical_paths: Vec<CriticalPath>,
}

impl AnalysisResults {
    pub fn bound(&self, id: FuncId) -> Option<WcetBound> {
        self.bounds.get(&id).copied()
    }

    pub fn critical_functions(&self) -> BTreeSet<FuncId> {
        self.critical_paths.iter().flat_map(|p| p.entries.iter().map(|e| e.id)).collect()
    }

    pub fn is_critical(&self, id: FuncId) -> bool {
        self.critical_paths.iter().any(|p| p.entries.iter().any(|e| e.id == id))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct WcetAnalyzer {
    profile: Option<CallProfile>,
}

impl WcetAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: Option<CallProfile>) -> Self {
        Self { profile }
    }

    /// Analyze every function reachable from the roots.
    pub fn analyze(&self, tree: &ProgramTree) -> OptResult<AnalysisResults> {
        let arena = Bump::new();
        let reach = reachability::compute(tree, &arena);
        let order = callee_first_order(tree, &arena)?;

        let mut bounds = BTreeMap::new();
        let mut frequencies: BTreeMap<FuncId, BTreeMap<FuncId, u64>> = BTreeMap::new();
        for &id in order.iter() {
            let Some(function) = tree.func(id) else {
                continue;
            };
            let mut walker =
                CostWalker::new(tree, &bounds, id, &function.name, function.recursion_limit.is_some());
            let activation = walker.block(&function.body, 1)?;
            let calls = std::mem::take(&mut walker.calls);
            let cycles = match function.recursion_limit {
                Some(limit) if calls.contains_key(&id) => {
                    activation.checked_mul(limit as u64).ok_or_else(|| {
                        OptimizationError::analysis(&function.name, "cycle bound overflows u64")
                    })?
                }
                _ => activation,
            };
            log::trace!("WCET {}: {} cycles", function.name, cycles);
            bounds.insert(id, WcetBound(cycles));
            frequencies.insert(id, calls);
        }

        let critical_paths = tree
            .functions()
            .filter(|(_, f)| is_root(f))
            .filter_map(|(id, _)| self.critical_path(tree, id, &bounds, &frequencies))
            .collect();

        Ok(AnalysisResults {
            reachable_functions: reach.functions,
            reachable_globals: reach.globals,
            bounds,
            critical_paths,
        })
    }

    fn critical_path(
        &self,
        tree: &ProgramTree,
        root: FuncId,
        bounds: &BTreeMap<FuncId, WcetBound>,
        frequencies: &BTreeMap<FuncId, BTreeMap<FuncId, u64>>,
    ) -> Option<CriticalPath> {
        let root_fn = tree.func(root)?;
        let bound = *bounds.get(&root)?;
        let mut entries =
            vec![PathEntry { id: root, function: root_fn.name.clone(), frequency: 1 }];

        let mut current = root;
        while let Some(calls) = frequencies.get(&current) {
            let caller = tree.func(current)?;
            let mut best: Option<(u128, FuncId, u64)> = None;
            for (&callee, &static_freq) in calls {
                if callee == current || entries.iter().any(|e| e.id == callee) {
                    continue;
                }
                let (Some(target), Some(callee_bound)) = (tree.func(callee), bounds.get(&callee))
                else {
                    continue;
                };
                let freq = self
                    .profile
                    .as_ref()
                    .and_then(|p| p.frequency(&caller.name, &target.name))
                    .unwrap_or(static_freq);
                let rank = freq as u128 * callee_bound.cycles() as u128;
                match best {
                    Some((r, _, _)) if rank <= r => {}
                    _ => best = Some((rank, callee, freq)),
                }
            }
            let Some((_, next, frequency)) = best else {
                break;
            };
            let function = tree.func(next)?.name.clone();
            entries.push(PathEntry { id: next, function, frequency });
            current = next;
        }

        Some(CriticalPath { root: root_fn.name.clone(), bound, entries })
    }
}

/// Reachable functions ordered so that every callee precedes its callers.
fn callee_first_order<'a>(tree: &ProgramTree, arena: &'a Bump) -> OptResult<BumpVec<'a, FuncId>> {
    let slots = tree.function_slots();
    let mut state = BumpVec::from_iter_in((0..slots).map(|_| Visit::New), arena);
    let mut order = BumpVec::with_capacity_in(tree.function_count(), arena);
    let mut stack = BumpVec::new_in(arena);

    for (id, function) in tree.functions() {
        if is_root(function) {
            stack.push((id, false));
        }
    }
    // Roots are popped in id order.
    stack.reverse();

    while let Some((id, expanded)) = stack.pop() {
        let idx = id.0 as usize;
        if expanded {
            state[idx] = Visit::Done;
            order.push(id);
            continue;
        }
        if state[idx] != Visit::New {
            continue;
        }
        let Some(function) = tree.func(id) else {
            continue;
        };
        state[idx] = Visit::Active;
        stack.push((id, true));

        let callees = function.callees();
        for &callee in callees.iter().rev() {
            if callee == id {
                if function.recursion_limit.is_some() {
                    continue;
                }
                return Err(OptimizationError::analysis(&function.name, "unannotated recursion"));
            }
            let Some(target) = tree.func(callee) else {
                return Err(OptimizationError::analysis(
                    &function.name,
                    format!("call to missing function {callee}"),
                ));
            };
            match state[callee.0 as usize] {
                Visit::Active => {
                    return Err(OptimizationError::analysis(
                        &function.name,
                        format!("call cycle through `{}`", target.name),
                    ));
                }
                Visit::New => stack.push((callee, false)),
                Visit::Done => {}
            }
        }
    }
    Ok(order)
}
