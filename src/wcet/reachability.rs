//! Forward reachability over call edges and global references.
//!
//! Roots are `main`, every exported function and every exported global. The
//! worklist lives in a scratch arena and is drained in a fixed order, so the
//! result never depends on hashing or allocation addresses.

use crate::core::tree::{FuncId, Function, GlobalId, ProgramTree, TreeDelta};
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use std::collections::BTreeSet;

/// Name of the program entry point.
pub const ENTRY_POINT: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachable {
    pub functions: BTreeSet<FuncId>,
    pub globals: BTreeSet<GlobalId>,
}

pub fn is_root(function: &Function) -> bool {
    function.exported || function.name == ENTRY_POINT
}

/// Reachable set of the current tree.
pub fn compute(tree: &ProgramTree, arena: &Bump) -> Reachable {
    let global_roots = tree.globals().filter(|(_, g)| g.exported).map(|(id, _)| id);
    walk(arena, tree.function_slots(), global_roots.collect(), |id| tree.func(id))
}

/// Reachable set of the tree as it was before the pass that produced `delta`.
pub fn compute_before(delta: &TreeDelta, after: &ProgramTree, arena: &Bump) -> Reachable {
    let global_roots = (0..after.global_slots() as u32)
        .map(GlobalId)
        .filter(|id| delta.global_before(*id, after).is_some_and(|g| g.exported))
        .collect();
    walk(arena, after.function_slots(), global_roots, |id| delta.function_before(id, after))
}

fn walk<'t>(
    arena: &Bump,
    slots: usize,
    global_roots: Vec<GlobalId>,
    lookup: impl Fn(FuncId) -> Option<&'t Function>,
) -> Reachable {
    let mut reachable = Reachable::default();
    reachable.globals.extend(global_roots);

    let mut worklist = BumpVec::new_in(arena);
    for idx in 0..slots as u32 {
        let id = FuncId(idx);
        if lookup(id).is_some_and(is_root) && reachable.functions.insert(id) {
            worklist.push(id);
        }
    }

    let mut next = 0;
    while next < worklist.len() {
        let id = worklist[next];
        next += 1;
        let Some(function) = lookup(id) else {
            continue;
        };
        for callee in function.callees() {
            if lookup(callee).is_some() && reachable.functions.insert(callee) {
                worklist.push(callee);
            }
        }
        reachable.globals.extend(function.referenced_globals());
    }
    reachable
}
