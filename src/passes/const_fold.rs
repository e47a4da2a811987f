// Constant folding replaces unary and binary nodes whose operands are literals with the literal
// the target would compute, using the exact semantics of the node's declared type (wrapping or
// saturating at its width). Folding is bottom-up so nested literal arithmetic collapses in one
// walk, and each body is iterated to a local fixed point. Division and remainder by a literal
// zero are deliberately left in place so the runtime fault is preserved. Only literal operands
// qualify; values that other analyses could prove constant are not touched here.

use super::{OptimizationPass, PassResult};
use crate::core::error::OptResult;
use crate::core::ir::{walk_all_exprs, BinOp, Const, Expr, Stmt, Type, UnOp};
use crate::core::tree::{FuncId, ProgramTree, TreeDelta};
use crate::wcet::cost;
use crate::wcet::AnalysisResults;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantFolding;

impl ConstantFolding {
    pub fn new() -> Self {
        Self
    }
}

/// Literal result of `expr` if all of its direct operands are literals.
fn try_fold(expr: &Expr) -> Option<Const> {
    match expr {
        Expr::Unary { op, ty, operand } => {
            let value = operand.as_lit()?;
            if *op != UnOp::Not && value.ty != *ty {
                return None;
            }
            Some(Const::eval_unary(*op, *ty, value))
        }
        Expr::Binary { op, ty, lhs, rhs } => {
            let (a, b) = (lhs.as_lit()?, rhs.as_lit()?);
            let shift = matches!(op, BinOp::Shl | BinOp::Shr);
            if a.ty != *ty || (!shift && b.ty != *ty) {
                return None;
            }
            Const::eval_binary(*op, *ty, a, b)
        }
        _ => None,
    }
}

/// Fold `expr` bottom-up; returns the number of nodes folded.
fn fold_expr(expr: &mut Expr) -> usize {
    let mut folded = 0;
    for child in expr.children_mut() {
        folded += fold_expr(child);
    }
    if let Some(value) = try_fold(expr) {
        *expr = Expr::Lit(value);
        folded += 1;
    }
    folded
}

fn fold_body(body: &mut [Stmt]) -> usize {
    let mut folded = 0;
    for stmt in body.iter_mut() {
        for expr in stmt.exprs_mut() {
            folded += fold_expr(expr);
        }
        for block in stmt.blocks_mut() {
            folded += fold_body(block);
        }
    }
    folded
}

fn has_foldable(body: &[Stmt]) -> bool {
    let mut found = false;
    walk_all_exprs(body, &mut |expr| found |= try_fold(expr).is_some());
    found
}

/// Local cycle cost of every expression in `body`, callee bounds excluded.
fn expression_cycles(body: &[Stmt]) -> u64 {
    let mut total = 0u64;
    walk_all_exprs(body, &mut |expr| {
        total += match expr {
            Expr::Lit(_) => cost::LITERAL,
            Expr::Local(_) => cost::LOCAL_READ,
            Expr::Global(_) => cost::GLOBAL_READ,
            Expr::Load { .. } => cost::LOAD,
            Expr::Unary { .. } => cost::ALU,
            Expr::Binary { op, .. } => cost::binary_op_cost(*op),
            Expr::Call { .. } => cost::CALL_OVERHEAD,
        };
    });
    total
}

impl OptimizationPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn is_applicable(&self, tree: &ProgramTree, _analysis: &AnalysisResults) -> bool {
        tree.functions().any(|(_, f)| has_foldable(&f.body))
    }

    fn transform(&self, tree: &mut ProgramTree, _analysis: &AnalysisResults) -> OptResult<PassResult> {
        let candidates: Vec<FuncId> =
            tree.functions().filter(|(_, f)| has_foldable(&f.body)).map(|(id, _)| id).collect();

        let mut result = PassResult::unchanged();
        for id in candidates {
            let Some(function) = tree.func_mut(id) else {
                continue;
            };
            let nodes_before = function.node_count();
            let cycles_before = expression_cycles(&function.body);

            let mut folded = 0;
            loop {
                let round = fold_body(&mut function.body);
                if round == 0 {
                    break;
                }
                folded += round;
            }
            log::debug!("constant folding: {} node(s) folded in `{}`", folded, function.name);

            result.count("constants_folded", folded as u64);
            result.size_impact += function.node_count() as i64 - nodes_before as i64;
            result.wcet_impact -= (cycles_before - expression_cycles(&function.body)) as i64;
        }
        result.modified = result.counter("constants_folded") > 0;
        Ok(result)
    }

    /// A folded value is the value the target computes at runtime.
    fn certify_determinism(&self, _before: &TreeDelta, _after: &ProgramTree) -> bool {
        true
    }
}

impl ConstantFolding {
    /// Fold a standalone expression, for callers outside the pipeline.
    pub fn fold(&self, expr: &Expr) -> Expr {
        let mut folded = expr.clone();
        fold_expr(&mut folded);
        folded
    }

    /// Fold `lhs op rhs` at type `ty`, or `None` when it must stay a runtime operation.
    pub fn fold_binary(&self, op: BinOp, ty: Type, lhs: Const, rhs: Const) -> Option<Const> {
        try_fold(&Expr::binary(op, ty, Expr::Lit(lhs), Expr::Lit(rhs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: i32) -> Expr {
        Expr::lit(Const::i32(v))
    }

    #[test]
    fn test_nested_literals_fold_in_one_walk() {
        let mut e = Expr::binary(
            BinOp::Add,
            Type::I32,
            lit(2),
            Expr::binary(BinOp::Mul, Type::I32, lit(3), lit(4)),
        );
        assert_eq!(fold_expr(&mut e), 2);
        assert_eq!(e, lit(14));
    }

    #[test]
    fn test_division_by_literal_zero_left_alone() {
        let e = Expr::binary(BinOp::Div, Type::I32, lit(1), lit(0));
        assert_eq!(ConstantFolding::new().fold(&e), e);
    }

    #[test]
    fn test_non_literal_operand_blocks_fold() {
        let e = Expr::binary(BinOp::Add, Type::I32, Expr::local("x"), lit(1));
        assert_eq!(ConstantFolding::new().fold(&e), e);
    }

    #[test]
    fn test_mismatched_operand_type_blocks_fold() {
        let e = Expr::binary(BinOp::Add, Type::I64, lit(1), lit(1));
        assert_eq!(ConstantFolding::new().fold(&e), e);
    }
}
