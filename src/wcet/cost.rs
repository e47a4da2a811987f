// This module holds the cycle cost model of the WCET analyzer and the walker that applies it to
// a function body. Every node kind has a fixed cost plus the cost of its children; loops
// multiply their per-iteration cost by the declared or exact iteration bound, branches take
// the more expensive arm, and calls add the already computed bound of the callee. All
// arithmetic is checked: a bound that does not fit in 64 bits is reported as an analysis
// failure rather than clamped. While walking, the walker also records how often each callee
// is invoked in the worst case, which the analyzer later uses to rank critical paths.

use crate::core::error::{OptResult, OptimizationError};
use crate::core::ir::{BinOp, Expr, LoopBound, Stmt, UnOp};
use crate::core::tree::{FuncId, GlobalId, ProgramTree};
use std::collections::BTreeMap;

use super::analyzer::WcetBound;

pub const LITERAL: u64 = 1;
pub const LOCAL_READ: u64 = 1;
pub const GLOBAL_READ: u64 = 2;
pub const LOAD: u64 = 4;
/// Load directly following a load of the previous element of the same global.
pub const LOAD_SEQUENTIAL: u64 = 2;
pub const ALU: u64 = 1;
pub const MUL: u64 = 3;
pub const DIV: u64 = 20;
pub const CALL_OVERHEAD: u64 = 10;
pub const ASSIGN: u64 = 1;
pub const GLOBAL_WRITE: u64 = 2;
pub const STORE: u64 = 4;
pub const IO: u64 = 8;
pub const BRANCH: u64 = 2;
pub const LOOP_ENTRY: u64 = 2;
pub const LOOP_BRANCH: u64 = 3;
pub const RETURN: u64 = 1;

pub(crate) fn binary_op_cost(op: BinOp) -> u64 {
    match op {
        BinOp::Mul => MUL,
        BinOp::Div | BinOp::Rem => DIV,
        _ => ALU,
    }
}

/// `(global, index)` of a `let x = g[k]` statement with a literal index.
pub(crate) fn literal_load(stmt: &Stmt) -> Option<(GlobalId, i128)> {
    match stmt {
        Stmt::Let { value: Expr::Load { global, index }, .. } => {
            index.as_lit().map(|k| (*global, k.value()))
        }
        _ => None,
    }
}

/// Whether `stmt` reads the element right after the one `prev` read.
pub(crate) fn is_sequential_load(prev: &Stmt, stmt: &Stmt) -> bool {
    match (literal_load(prev), literal_load(stmt)) {
        (Some((g0, k0)), Some((g1, k1))) => g0 == g1 && k1 == k0 + 1,
        _ => false,
    }
}

/// Applies the cost model to one function body.
pub(crate) struct CostWalker<'a> {
    tree: &'a ProgramTree,
    bounds: &'a BTreeMap<FuncId, WcetBound>,
    function: FuncId,
    name: &'a str,
    self_recursive: bool,
    /// Worst-case invocations of each callee per activation.
    pub calls: BTreeMap<FuncId, u64>,
}

impl<'a> CostWalker<'a> {
    pub fn new(
        tree: &'a ProgramTree,
        bounds: &'a BTreeMap<FuncId, WcetBound>,
        function: FuncId,
        name: &'a str,
        self_recursive: bool,
    ) -> Self {
        Self { tree, bounds, function, name, self_recursive, calls: BTreeMap::new() }
    }

    fn fail(&self, reason: impl Into<String>) -> OptimizationError {
        OptimizationError::analysis(self.name, reason)
    }

    fn add(&self, a: u64, b: u64) -> OptResult<u64> {
        a.checked_add(b).ok_or_else(|| self.fail("cycle bound overflows u64"))
    }

    fn mul(&self, a: u64, b: u64) -> OptResult<u64> {
        a.checked_mul(b).ok_or_else(|| self.fail("cycle bound overflows u64"))
    }

    /// Cost of a statement sequence executed `freq` times per activation.
    pub fn block(&mut self, body: &[Stmt], freq: u64) -> OptResult<u64> {
        let mut total = 0u64;
        let mut prev: Option<&Stmt> = None;
        for stmt in body {
            let mut cost = self.stmt(stmt, freq)?;
            if prev.is_some_and(|p| is_sequential_load(p, stmt)) {
                cost -= LOAD - LOAD_SEQUENTIAL;
            }
            total = self.add(total, cost)?;
            prev = Some(stmt);
        }
        Ok(total)
    }

    fn stmt(&mut self, stmt: &Stmt, freq: u64) -> OptResult<u64> {
        match stmt {
            Stmt::Let { value, .. } | Stmt::Assign { value, .. } => {
                let value = self.expr(value, freq)?;
                self.add(ASSIGN, value)
            }
            Stmt::SetGlobal { value, .. } => {
                let value = self.expr(value, freq)?;
                self.add(GLOBAL_WRITE, value)
            }
            Stmt::Store { index, value, .. } => {
                let index = self.expr(index, freq)?;
                let value = self.expr(value, freq)?;
                self.add(STORE, self.add(index, value)?)
            }
            Stmt::Io { value, .. } => {
                let value = self.expr(value, freq)?;
                self.add(IO, value)
            }
            Stmt::Expr(expr) => self.expr(expr, freq),
            Stmt::If { cond, then_body, else_body, .. } => {
                let guard = self.guard(cond, freq)?;
                let then_cost = self.block(then_body, freq)?;
                let else_cost = self.block(else_body, freq)?;
                self.add(self.add(guard, BRANCH)?, then_cost.max(else_cost))
            }
            Stmt::Loop { bound, condition, body, .. } => {
                let trips = match bound {
                    LoopBound::Exact(n) | LoopBound::Declared(n) => *n,
                    LoopBound::Unknown => {
                        return Err(self.fail("loop without a provable iteration bound"));
                    }
                };
                let inner_freq = freq.saturating_mul(trips);
                let cond = match condition {
                    Some(cond) => self.expr(cond, inner_freq.saturating_add(freq))?,
                    None => 0,
                };
                let body = self.block(body, inner_freq)?;
                let per_iteration = self.add(self.add(cond, body)?, LOOP_BRANCH)?;
                let iterations = self.mul(trips, per_iteration)?;
                self.add(self.add(LOOP_ENTRY, cond)?, iterations)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => self.expr(value, freq)?,
                    None => 0,
                };
                self.add(RETURN, value)
            }
        }
    }

    /// A leading `!` on a branch guard only flips the branch polarity.
    fn guard(&mut self, cond: &Expr, freq: u64) -> OptResult<u64> {
        match cond {
            Expr::Unary { op: UnOp::Not, operand, .. } => self.guard(operand, freq),
            other => self.expr(other, freq),
        }
    }

    fn expr(&mut self, expr: &Expr, freq: u64) -> OptResult<u64> {
        match expr {
            Expr::Lit(_) => Ok(LITERAL),
            Expr::Local(_) => Ok(LOCAL_READ),
            Expr::Global(_) => Ok(GLOBAL_READ),
            Expr::Load { index, .. } => {
                let index = self.expr(index, freq)?;
                self.add(LOAD, index)
            }
            Expr::Unary { operand, .. } => {
                let operand = self.expr(operand, freq)?;
                self.add(ALU, operand)
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let op_cost = binary_op_cost(*op);
                let lhs = self.expr(lhs, freq)?;
                let rhs = self.expr(rhs, freq)?;
                self.add(op_cost, self.add(lhs, rhs)?)
            }
            Expr::Call { callee, args } => {
                let mut cost = CALL_OVERHEAD;
                for arg in args {
                    let arg = self.expr(arg, freq)?;
                    cost = self.add(cost, arg)?;
                }
                let entry = self.calls.entry(*callee).or_insert(0);
                *entry = entry.saturating_add(freq);

                if *callee == self.function {
                    if !self.self_recursive {
                        return Err(self.fail("unannotated recursion"));
                    }
                    // One activation is charged per recursion step by the caller.
                    return Ok(cost);
                }
                match self.bounds.get(callee) {
                    Some(bound) => self.add(cost, bound.cycles()),
                    None => {
                        let callee_name = self
                            .tree
                            .func(*callee)
                            .map(|f| f.name.clone())
                            .unwrap_or_else(|| callee.to_string());
                        Err(self.fail(format!("callee `{callee_name}` has no finite bound")))
                    }
                }
            }
        }
    }
}
