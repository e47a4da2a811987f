// This module implements the program tree that every pass mutates in place. Functions and
// global variables live in arenas of slots indexed by stable integer ids, with hashbrown maps
// from names to ids; calls and global references inside bodies are id lookups, so there are
// no cyclic ownership problems between functions that call each other. Removing an entry
// vacates its slot and never reuses the id. While a pass runs, the tree keeps a journal of the
// pre-image of every function and global the pass touches (mutable access, removal or
// creation). Closing the journal produces a TreeDelta, which lets certification and WCET
// re-checks look only at what changed instead of cloning and diffing the whole tree.

//! Arena-backed program tree with change journaling.

use super::error::BuildError;
use super::ir::{walk_all_exprs, Const, Expr, Stmt, Type};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::fmt;

/// Stable function identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(pub u32);

/// Stable global variable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId(pub u32);

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<Type>,
    pub body: Vec<Stmt>,
    /// Exported functions are reachability roots.
    pub exported: bool,
    /// Maximum number of activations per outermost call of a directly
    /// self-recursive function.
    pub recursion_limit: Option<u32>,
    /// Number of call sites inlined into this function so far.
    pub inline_sites: u32,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Param>, ret: Option<Type>) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            body: Vec::new(),
            exported: false,
            recursion_limit: None,
            inline_sites: 0,
        }
    }

    pub fn node_count(&self) -> usize {
        super::ir::body_node_count(&self.body)
    }

    /// Callees in first-call order, without duplicates.
    pub fn callees(&self) -> Vec<FuncId> {
        let mut out = Vec::new();
        walk_all_exprs(&self.body, &mut |expr| {
            if let Expr::Call { callee, .. } = expr {
                if !out.contains(callee) {
                    out.push(*callee);
                }
            }
        });
        out
    }

    /// Globals read or written by the body, in first-reference order.
    pub fn referenced_globals(&self) -> Vec<GlobalId> {
        let mut out = Vec::new();
        collect_globals(&self.body, &mut out);
        out
    }
}

fn collect_globals(body: &[Stmt], out: &mut Vec<GlobalId>) {
    let push = |id: GlobalId, out: &mut Vec<GlobalId>| {
        if !out.contains(&id) {
            out.push(id);
        }
    };
    for stmt in body {
        if let Stmt::SetGlobal { global, .. } | Stmt::Store { global, .. } = stmt {
            push(*global, out);
        }
        for expr in stmt.exprs() {
            expr.walk(&mut |e| match e {
                Expr::Global(id) | Expr::Load { global: id, .. } => push(*id, out),
                _ => {}
            });
        }
        for block in stmt.blocks() {
            collect_globals(block, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: Type,
    /// Element count; 1 for a scalar.
    pub len: u32,
    pub init: Const,
    pub exported: bool,
}

#[derive(Debug, Default, Clone)]
struct Journal {
    /// `Some(pre)` for entries that existed before the pass, `None` for created ones.
    functions: BTreeMap<FuncId, Option<Function>>,
    globals: BTreeMap<GlobalId, Option<GlobalVariable>>,
}

/// Pre-images of everything a pass touched.
#[derive(Debug, Default, Clone)]
pub struct TreeDelta {
    functions: BTreeMap<FuncId, Option<Function>>,
    globals: BTreeMap<GlobalId, Option<GlobalVariable>>,
}

impl TreeDelta {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.globals.is_empty()
    }

    /// Touched functions in id order, including removed and created ones.
    pub fn touched_functions(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.functions.keys().copied()
    }

    pub fn touched_globals(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.globals.keys().copied()
    }

    pub fn is_touched(&self, id: FuncId) -> bool {
        self.functions.contains_key(&id)
    }

    /// The function as it was before the pass, seen through the post tree.
    pub fn function_before<'a>(&'a self, id: FuncId, after: &'a ProgramTree) -> Option<&'a Function> {
        match self.functions.get(&id) {
            Some(pre) => pre.as_ref(),
            None => after.func(id),
        }
    }

    pub fn global_before<'a>(
        &'a self,
        id: GlobalId,
        after: &'a ProgramTree,
    ) -> Option<&'a GlobalVariable> {
        match self.globals.get(&id) {
            Some(pre) => pre.as_ref(),
            None => after.global(id),
        }
    }
}

/// The program tree: an arena of functions and globals.
#[derive(Debug, Clone, Default)]
pub struct ProgramTree {
    functions: Vec<Option<Function>>,
    globals: Vec<Option<GlobalVariable>>,
    function_index: HashMap<String, FuncId>,
    global_index: HashMap<String, GlobalId>,
    journal: Option<Box<Journal>>,
}

impl PartialEq for ProgramTree {
    fn eq(&self, other: &Self) -> bool {
        self.functions == other.functions && self.globals == other.globals
    }
}

impl ProgramTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function; its body may reference ids added later.
    pub fn add_function(&mut self, function: Function) -> Result<FuncId, BuildError> {
        if self.function_index.contains_key(&function.name) {
            return Err(BuildError::DuplicateFunction { name: function.name });
        }
        let id = FuncId(self.functions.len() as u32);
        self.function_index.insert(function.name.clone(), id);
        self.functions.push(Some(function));
        if let Some(journal) = self.journal.as_mut() {
            journal.functions.entry(id).or_insert(None);
        }
        Ok(id)
    }

    pub fn add_global(&mut self, global: GlobalVariable) -> Result<GlobalId, BuildError> {
        if self.global_index.contains_key(&global.name) {
            return Err(BuildError::DuplicateGlobal { name: global.name });
        }
        let id = GlobalId(self.globals.len() as u32);
        self.global_index.insert(global.name.clone(), id);
        self.globals.push(Some(global));
        if let Some(journal) = self.journal.as_mut() {
            journal.globals.entry(id).or_insert(None);
        }
        Ok(id)
    }

    pub fn func(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Mutable access; journals the pre-image while a pass is running.
    pub fn func_mut(&mut self, id: FuncId) -> Option<&mut Function> {
        let slot = self.functions.get_mut(id.0 as usize)?.as_mut()?;
        if let Some(journal) = self.journal.as_mut() {
            journal.functions.entry(id).or_insert_with(|| Some(slot.clone()));
        }
        Some(slot)
    }

    pub fn function_id(&self, name: &str) -> Option<FuncId> {
        self.function_index.get(name).copied()
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.function_id(name).and_then(|id| self.func(id))
    }

    /// Live functions in id order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> + '_ {
        self.functions
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|f| (FuncId(idx as u32), f)))
    }

    pub fn function_count(&self) -> usize {
        self.function_index.len()
    }

    /// Number of slots ever allocated; every id is below this.
    pub fn function_slots(&self) -> usize {
        self.functions.len()
    }

    pub fn remove_function(&mut self, id: FuncId) -> Option<Function> {
        let removed = self.functions.get_mut(id.0 as usize)?.take()?;
        self.function_index.remove(&removed.name);
        if let Some(journal) = self.journal.as_mut() {
            journal.functions.entry(id).or_insert_with(|| Some(removed.clone()));
        }
        Some(removed)
    }

    pub fn global(&self, id: GlobalId) -> Option<&GlobalVariable> {
        self.globals.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn global_id(&self, name: &str) -> Option<GlobalId> {
        self.global_index.get(name).copied()
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &GlobalVariable)> + '_ {
        self.globals
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|g| (GlobalId(idx as u32), g)))
    }

    pub fn global_count(&self) -> usize {
        self.global_index.len()
    }

    pub fn global_slots(&self) -> usize {
        self.globals.len()
    }

    pub fn remove_global(&mut self, id: GlobalId) -> Option<GlobalVariable> {
        let removed = self.globals.get_mut(id.0 as usize)?.take()?;
        self.global_index.remove(&removed.name);
        if let Some(journal) = self.journal.as_mut() {
            journal.globals.entry(id).or_insert_with(|| Some(removed.clone()));
        }
        Some(removed)
    }

    /// Total statement and expression nodes over all live functions.
    pub fn node_count(&self) -> usize {
        self.functions().map(|(_, f)| f.node_count()).sum()
    }

    /// Start journaling changes. Any open journal is discarded.
    pub fn begin_delta(&mut self) {
        self.journal = Some(Box::default());
    }

    /// Stop journaling and return what was touched since `begin_delta`.
    pub fn take_delta(&mut self) -> TreeDelta {
        let journal = self.journal.take().unwrap_or_default();
        TreeDelta { functions: journal.functions, globals: journal.globals }
    }

    /// Check that every call and global reference resolves and call arity matches.
    pub fn verify(&self) -> Result<(), BuildError> {
        for (_, function) in self.functions() {
            let mut error = None;
            walk_all_exprs(&function.body, &mut |expr| {
                if error.is_some() {
                    return;
                }
                match expr {
                    Expr::Call { callee, args } => match self.func(*callee) {
                        None => {
                            error = Some(BuildError::DanglingReference {
                                function: function.name.clone(),
                                what: format!("callee {callee}"),
                            })
                        }
                        Some(target) if target.params.len() != args.len() => {
                            error = Some(BuildError::ArityMismatch {
                                caller: function.name.clone(),
                                callee: target.name.clone(),
                                expected: target.params.len(),
                                found: args.len(),
                            })
                        }
                        Some(_) => {}
                    },
                    Expr::Global(id) | Expr::Load { global: id, .. } if self.global(*id).is_none() => {
                        error = Some(BuildError::DanglingReference {
                            function: function.name.clone(),
                            what: format!("{id}"),
                        })
                    }
                    _ => {}
                }
            });
            if let Some(error) = error {
                return Err(error);
            }
            for id in function.referenced_globals() {
                if self.global(id).is_none() {
                    return Err(BuildError::DanglingReference {
                        function: function.name.clone(),
                        what: format!("{id}"),
                    });
                }
            }
        }
        Ok(())
    }
}
