// TreeBuilder is how front ends and tests assemble a program tree. Every function is declared
// first, which fixes its id and signature, and defined later, so bodies can call functions that
// are declared after them. Exports, recursion annotations and globals are recorded on the same
// builder, and finish runs the tree's consistency check before handing the tree out.

//! Construction helpers for program trees.
//!
//! The front end resolves names before handing a tree to the optimizer. Since
//! bodies refer to functions by id, a function is declared first (yielding its
//! id) and defined afterwards, which allows forward and mutual references.

use super::error::BuildError;
use super::ir::{Const, Stmt, Type};
use super::tree::{FuncId, Function, GlobalId, GlobalVariable, Param, ProgramTree};

#[derive(Default)]
pub struct TreeBuilder {
    tree: ProgramTree,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a function with typed parameters and an empty body.
    pub fn declare(
        &mut self,
        name: &str,
        params: &[(&str, Type)],
        ret: Option<Type>,
    ) -> Result<FuncId, BuildError> {
        let params = params
            .iter()
            .map(|(name, ty)| Param { name: (*name).to_string(), ty: *ty })
            .collect();
        self.tree.add_function(Function::new(name, params, ret))
    }

    pub fn define(&mut self, id: FuncId, body: Vec<Stmt>) -> Result<&mut Self, BuildError> {
        self.function(id)?.body = body;
        Ok(self)
    }

    pub fn export(&mut self, id: FuncId) -> Result<&mut Self, BuildError> {
        self.function(id)?.exported = true;
        Ok(self)
    }

    pub fn recursion_limit(&mut self, id: FuncId, limit: u32) -> Result<&mut Self, BuildError> {
        self.function(id)?.recursion_limit = Some(limit);
        Ok(self)
    }

    pub fn global(&mut self, name: &str, ty: Type, len: u32) -> Result<GlobalId, BuildError> {
        self.tree.add_global(GlobalVariable {
            name: name.to_string(),
            ty,
            len: len.max(1),
            init: Const::new(ty, 0),
            exported: false,
        })
    }

    pub fn exported_global(&mut self, name: &str, ty: Type) -> Result<GlobalId, BuildError> {
        self.tree.add_global(GlobalVariable {
            name: name.to_string(),
            ty,
            len: 1,
            init: Const::new(ty, 0),
            exported: true,
        })
    }

    /// Verify references and hand the tree over.
    pub fn finish(self) -> Result<ProgramTree, BuildError> {
        self.tree.verify()?;
        Ok(self.tree)
    }

    fn function(&mut self, id: FuncId) -> Result<&mut Function, BuildError> {
        self.tree.func_mut(id).ok_or(BuildError::UnknownFunction { id: id.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::Expr;

    #[test]
    fn test_forward_references() {
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], None).unwrap();
        let helper = b.declare("helper", &[("x", Type::I32)], Some(Type::I32)).unwrap();
        b.define(main, vec![Stmt::Expr(Expr::call(helper, vec![Expr::lit(Const::i32(1))]))])
            .unwrap();
        b.define(helper, vec![Stmt::ret(Expr::local("x"))]).unwrap();

        let tree = b.finish().unwrap();
        assert_eq!(tree.function_count(), 2);
        assert_eq!(tree.func(main).unwrap().callees(), vec![helper]);
    }

    #[test]
    fn test_arity_checked_on_finish() {
        let mut b = TreeBuilder::new();
        let main = b.declare("main", &[], None).unwrap();
        let helper = b.declare("helper", &[("x", Type::I32)], None).unwrap();
        b.define(main, vec![Stmt::Expr(Expr::call(helper, vec![]))]).unwrap();

        assert!(matches!(b.finish(), Err(BuildError::ArityMismatch { expected: 1, found: 0, .. })));
    }
}
