// Effect traces are the observable-behavior summary used to certify the WCET-guided rewrites.
// A trace lists, in program order, every write to a global, every indexed store, every device
// I/O and every call that cannot be expanded. Reads of globals between two such effects are
// collected into an unordered set, which is what lets load grouping reorder independent loads
// without changing the trace. Loops with an exact trip count of at most MAX_EXPANDED_TRIPS and
// no exit condition are expanded in place; other loops become a nested trace. Calls to a
// function that is not already being expanded are replaced by the callee's trace, and branch
// arms are ordered by the polarity of the guard after stripping leading `!`. Local variables
// never appear, so renaming and re-binding locals is invisible here. Building a trace is
// charged one unit of work per visited statement, loop copy and call expansion; a function
// whose trace would cost more than MAX_TRACE_WORK has no trace and cannot be certified.

//! Side-effect traces for determinism certificates.

use crate::core::ir::{Const, Expr, LoopBound, Stmt, UnOp};
use crate::core::tree::{FuncId, Function, GlobalId, ProgramTree, TreeDelta};
use std::collections::BTreeSet;

/// Exact loops up to this many iterations are expanded in traces.
pub const MAX_EXPANDED_TRIPS: u64 = 64;

/// Work allowed for one trace; beyond it no trace is produced.
pub const MAX_TRACE_WORK: usize = 1 << 16;

/// A read of a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Read {
    Scalar(GlobalId),
    /// Indexed load; the index is kept when it is a literal.
    Element(GlobalId, Option<i128>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Reads performed since the previous effect, sorted.
    Reads(Vec<Read>),
    Write(GlobalId),
    Store(GlobalId),
    Io(u32),
    /// Call that could not be expanded.
    Call(FuncId),
    Loop { bound: LoopBound, body: Vec<Effect> },
    Branch { when_true: Vec<Effect>, when_false: Vec<Effect> },
}

#[derive(Default)]
struct Trace {
    events: Vec<Effect>,
    pending: BTreeSet<Read>,
}

impl Trace {
    fn read(&mut self, read: Read) {
        self.pending.insert(read);
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let reads = std::mem::take(&mut self.pending);
            self.events.push(Effect::Reads(reads.into_iter().collect()));
        }
    }

    fn finish(mut self) -> Vec<Effect> {
        self.flush();
        self.events
    }
}

struct Tracer<'l, 'a> {
    lookup: &'l dyn Fn(FuncId) -> Option<&'a Function>,
    /// Functions whose bodies are currently being expanded.
    active: Vec<FuncId>,
    budget: usize,
}

impl<'a> Tracer<'_, 'a> {
    fn charge(&mut self) -> Option<()> {
        self.budget = self.budget.checked_sub(1)?;
        Some(())
    }

    fn emit(&mut self, out: &mut Trace, effect: Effect) -> Option<()> {
        out.flush();
        out.events.push(effect);
        Some(())
    }

    fn block(&mut self, body: &[Stmt], out: &mut Trace) -> Option<()> {
        for stmt in body {
            self.stmt(stmt, out)?;
        }
        Some(())
    }

    fn stmt(&mut self, stmt: &Stmt, out: &mut Trace) -> Option<()> {
        self.charge()?;
        match stmt {
            Stmt::Let { value, .. }
            | Stmt::Assign { value, .. }
            | Stmt::Expr(value)
            | Stmt::Return(Some(value)) => self.expr(value, out),
            Stmt::Return(None) => Some(()),
            Stmt::SetGlobal { global, value } => {
                self.expr(value, out)?;
                self.emit(out, Effect::Write(*global))
            }
            Stmt::Store { global, index, value } => {
                self.expr(index, out)?;
                self.expr(value, out)?;
                self.emit(out, Effect::Store(*global))
            }
            Stmt::Io { port, value } => {
                self.expr(value, out)?;
                self.emit(out, Effect::Io(*port))
            }
            Stmt::If { cond, then_body, else_body, .. } => {
                let (guard, negated) = strip_not(cond);
                self.expr(guard, out)?;
                let mut then_trace = Trace::default();
                self.block(then_body, &mut then_trace)?;
                let mut else_trace = Trace::default();
                self.block(else_body, &mut else_trace)?;
                let (when_true, when_false) = if negated {
                    (else_trace.finish(), then_trace.finish())
                } else {
                    (then_trace.finish(), else_trace.finish())
                };
                self.emit(out, Effect::Branch { when_true, when_false })
            }
            Stmt::Loop { bound: LoopBound::Exact(n), condition: None, body, .. }
                if *n <= MAX_EXPANDED_TRIPS =>
            {
                for _ in 0..*n {
                    self.charge()?;
                    self.block(body, out)?;
                }
                Some(())
            }
            Stmt::Loop { bound, condition, body, .. } => {
                let mut inner = Trace::default();
                if let Some(cond) = condition {
                    self.expr(cond, &mut inner)?;
                }
                self.block(body, &mut inner)?;
                self.emit(out, Effect::Loop { bound: *bound, body: inner.finish() })
            }
        }
    }

    fn expr(&mut self, expr: &Expr, out: &mut Trace) -> Option<()> {
        match expr {
            Expr::Lit(_) | Expr::Local(_) => Some(()),
            Expr::Global(global) => {
                out.read(Read::Scalar(*global));
                Some(())
            }
            Expr::Load { global, index } => {
                self.expr(index, out)?;
                out.read(Read::Element(*global, index.as_lit().map(Const::value)));
                Some(())
            }
            Expr::Unary { operand, .. } => self.expr(operand, out),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs, out)?;
                self.expr(rhs, out)
            }
            Expr::Call { callee, args } => {
                for arg in args {
                    self.expr(arg, out)?;
                }
                let target =
                    if self.active.contains(callee) { None } else { (self.lookup)(*callee) };
                match target {
                    Some(function) => {
                        self.charge()?;
                        self.active.push(*callee);
                        self.block(&function.body, out)?;
                        self.active.pop();
                        Some(())
                    }
                    None => self.emit(out, Effect::Call(*callee)),
                }
            }
        }
    }
}

/// Guard with leading `!` removed, and whether an odd number was removed.
fn strip_not(mut cond: &Expr) -> (&Expr, bool) {
    let mut negated = false;
    while let Expr::Unary { op: UnOp::Not, operand, .. } = cond {
        cond = operand;
        negated = !negated;
    }
    (cond, negated)
}

fn trace_with<'a>(
    lookup: &dyn Fn(FuncId) -> Option<&'a Function>,
    id: FuncId,
    body: &[Stmt],
) -> Option<Vec<Effect>> {
    let mut tracer = Tracer { lookup, active: vec![id], budget: MAX_TRACE_WORK };
    let mut out = Trace::default();
    tracer.block(body, &mut out)?;
    Some(out.finish())
}

/// Trace of function `id` in `tree`. `None` if the function does not exist or
/// the trace is too expensive to build.
pub fn effect_trace(tree: &ProgramTree, id: FuncId) -> Option<Vec<Effect>> {
    let lookup = move |callee: FuncId| tree.func(callee);
    trace_with(&lookup, id, &tree.func(id)?.body)
}

/// Trace of function `id` in `tree` as if its body were `body`.
pub fn effect_trace_with_body(
    tree: &ProgramTree,
    id: FuncId,
    body: &[Stmt],
) -> Option<Vec<Effect>> {
    let lookup = move |callee: FuncId| tree.func(callee);
    trace_with(&lookup, id, body)
}

/// Trace of function `id` as it was before the change recorded in `delta`.
pub fn effect_trace_before(delta: &TreeDelta, after: &ProgramTree, id: FuncId) -> Option<Vec<Effect>> {
    let lookup = move |callee: FuncId| delta.function_before(callee, after);
    trace_with(&lookup, id, &delta.function_before(id, after)?.body)
}
