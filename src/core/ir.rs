// This module defines the node types of the program tree: scalar types with their declared
// overflow behavior, typed literals, and the tagged-variant expression and statement trees
// that make up function bodies. Literals store the width-truncated bit pattern of their value
// so two literals compare equal exactly when the target would hold the same bits. The
// evaluation helpers on Const implement the runtime semantics of every operator for every
// width; constant folding reuses them, which is what makes a folded value identical to the
// one the target would compute. Walk helpers give passes and analyses a single place that
// knows how to visit child nodes in evaluation order.

//! Program tree node definitions.

use super::tree::{FuncId, GlobalId};
use std::fmt;

/// Integer width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Width {
    W1,
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub const fn bits(self) -> u32 {
        match self {
            Width::W1 => 1,
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }

    pub const fn mask(self) -> u64 {
        match self {
            Width::W64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }
}

/// Behavior of arithmetic that leaves the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Overflow {
    Wrapping,
    Saturating,
}

/// Declared scalar type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    pub width: Width,
    pub signed: bool,
    pub overflow: Overflow,
}

impl Type {
    pub const BOOL: Type = Type::wrapping(Width::W1, false);
    pub const I8: Type = Type::wrapping(Width::W8, true);
    pub const I16: Type = Type::wrapping(Width::W16, true);
    pub const I32: Type = Type::wrapping(Width::W32, true);
    pub const I64: Type = Type::wrapping(Width::W64, true);
    pub const U8: Type = Type::wrapping(Width::W8, false);
    pub const U16: Type = Type::wrapping(Width::W16, false);
    pub const U32: Type = Type::wrapping(Width::W32, false);
    pub const U64: Type = Type::wrapping(Width::W64, false);

    pub const fn wrapping(width: Width, signed: bool) -> Self {
        Self { width, signed, overflow: Overflow::Wrapping }
    }

    /// Same width and signedness, saturating on overflow.
    pub const fn saturating(self) -> Self {
        Self { overflow: Overflow::Saturating, ..self }
    }

    fn min_value(self) -> i128 {
        if self.signed {
            -(1i128 << (self.width.bits() - 1))
        } else {
            0
        }
    }

    fn max_value(self) -> i128 {
        if self.signed {
            (1i128 << (self.width.bits() - 1)) - 1
        } else {
            self.width.mask() as i128
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == Width::W1 {
            write!(f, "bool")?;
        } else {
            let prefix = if self.signed { 'i' } else { 'u' };
            write!(f, "{}{}", prefix, self.width.bits())?;
        }
        if self.overflow == Overflow::Saturating {
            write!(f, "sat")?;
        }
        Ok(())
    }
}

/// Typed literal. `bits` always holds the value truncated to the type's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Const {
    pub ty: Type,
    bits: u64,
}

impl Const {
    /// Literal of `value` converted to `ty` with wrapping truncation.
    pub fn new(ty: Type, value: i128) -> Self {
        Self { ty, bits: (value as u128 as u64) & ty.width.mask() }
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Type::BOOL, value as i128)
    }

    pub fn i32(value: i32) -> Self {
        Self::new(Type::I32, value as i128)
    }

    pub fn i64(value: i64) -> Self {
        Self::new(Type::I64, value as i128)
    }

    pub fn u32(value: u32) -> Self {
        Self::new(Type::U32, value as i128)
    }

    pub fn u64(value: u64) -> Self {
        Self::new(Type::U64, value as i128)
    }

    pub fn bits(self) -> u64 {
        self.bits
    }

    /// Numeric value, sign-extended for signed types.
    pub fn value(self) -> i128 {
        if self.ty.signed {
            let shift = 128 - self.ty.width.bits();
            ((self.bits as i128) << shift) >> shift
        } else {
            self.bits as i128
        }
    }

    pub fn is_zero(self) -> bool {
        self.bits == 0
    }

    /// Bring an exact result back into the type's range.
    fn fit(ty: Type, exact: i128) -> Self {
        match ty.overflow {
            Overflow::Wrapping => Self::new(ty, exact),
            Overflow::Saturating => Self::new(ty, exact.clamp(ty.min_value(), ty.max_value())),
        }
    }

    /// Evaluate a unary operator. Never fails.
    pub fn eval_unary(op: UnOp, ty: Type, operand: Const) -> Const {
        match op {
            UnOp::Neg => Self::fit(ty, -operand.value()),
            UnOp::BitNot => Self::new(ty, !operand.bits as i128),
            UnOp::Not => Const::bool(operand.is_zero()),
        }
    }

    /// Evaluate a binary operator on operands of type `ty`.
    ///
    /// Returns `None` for a division or remainder by zero, which is left to
    /// fault at runtime.
    pub fn eval_binary(op: BinOp, ty: Type, lhs: Const, rhs: Const) -> Option<Const> {
        let (a, b) = (lhs.value(), rhs.value());
        let bits = ty.width.bits();
        let result = match op {
            BinOp::Add => Self::fit(ty, a + b),
            BinOp::Sub => Self::fit(ty, a - b),
            BinOp::Mul => match a.checked_mul(b) {
                Some(exact) => Self::fit(ty, exact),
                // Only products of two large unsigned 64-bit values leave the i128 range.
                None => match ty.overflow {
                    Overflow::Wrapping => Self::new(ty, lhs.bits.wrapping_mul(rhs.bits) as i128),
                    Overflow::Saturating => Self::new(ty, ty.max_value()),
                },
            },
            BinOp::Div | BinOp::Rem if rhs.is_zero() => return None,
            BinOp::Div => Self::fit(ty, a / b),
            BinOp::Rem => Self::fit(ty, a % b),
            BinOp::And => Self::new(ty, (lhs.bits & rhs.bits) as i128),
            BinOp::Or => Self::new(ty, (lhs.bits | rhs.bits) as i128),
            BinOp::Xor => Self::new(ty, (lhs.bits ^ rhs.bits) as i128),
            BinOp::Shl => {
                let amount = (rhs.bits % bits as u64) as u32;
                Self::new(ty, ((lhs.bits as u128) << amount) as i128)
            }
            BinOp::Shr => {
                let amount = (rhs.bits % bits as u64) as u32;
                Self::new(ty, a >> amount)
            }
            BinOp::Eq => Const::bool(a == b),
            BinOp::Ne => Const::bool(a != b),
            BinOp::Lt => Const::bool(a < b),
            BinOp::Le => Const::bool(a <= b),
            BinOp::Gt => Const::bool(a > b),
            BinOp::Ge => Const::bool(a >= b),
        };
        Some(result)
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ty == Type::BOOL {
            write!(f, "{}", !self.is_zero())
        } else {
            write!(f, "{}{}", self.value(), self.ty)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    BitNot,
    /// Logical negation, producing `bool`.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Const),
    Local(String),
    /// Scalar read of a global.
    Global(GlobalId),
    Load { global: GlobalId, index: Box<Expr> },
    Unary { op: UnOp, ty: Type, operand: Box<Expr> },
    Binary { op: BinOp, ty: Type, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { callee: FuncId, args: Vec<Expr> },
}

impl Expr {
    pub fn lit(value: Const) -> Self {
        Expr::Lit(value)
    }

    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local(name.into())
    }

    pub fn load(global: GlobalId, index: Expr) -> Self {
        Expr::Load { global, index: Box::new(index) }
    }

    pub fn unary(op: UnOp, ty: Type, operand: Expr) -> Self {
        Expr::Unary { op, ty, operand: Box::new(operand) }
    }

    pub fn binary(op: BinOp, ty: Type, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary { op, ty, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn call(callee: FuncId, args: Vec<Expr>) -> Self {
        Expr::Call { callee, args }
    }

    pub fn not(operand: Expr) -> Self {
        Expr::unary(UnOp::Not, Type::BOOL, operand)
    }

    pub fn as_lit(&self) -> Option<Const> {
        match self {
            Expr::Lit(c) => Some(*c),
            _ => None,
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Lit(_) | Expr::Local(_) | Expr::Global(_) => Vec::new(),
            Expr::Load { index, .. } => vec![index],
            Expr::Unary { operand, .. } => vec![operand],
            Expr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Expr::Call { args, .. } => args.iter().collect(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Lit(_) | Expr::Local(_) | Expr::Global(_) => Vec::new(),
            Expr::Load { index, .. } => vec![index],
            Expr::Unary { operand, .. } => vec![operand],
            Expr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Expr::Call { args, .. } => args.iter_mut().collect(),
        }
    }

    /// Visit this expression and all sub-expressions, pre-order.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }
}

/// Iteration bound of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopBound {
    /// Statically known trip count.
    Exact(u64),
    /// Declared maximum iteration count.
    Declared(u64),
    /// No provable bound.
    Unknown,
}

impl LoopBound {
    pub fn max_iterations(self) -> Option<u64> {
        match self {
            LoopBound::Exact(n) | LoopBound::Declared(n) => Some(n),
            LoopBound::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, ty: Type, value: Expr },
    Assign { name: String, value: Expr },
    SetGlobal { global: GlobalId, value: Expr },
    Store { global: GlobalId, index: Expr, value: Expr },
    /// I/O-equivalent side effect on a device port.
    Io { port: u32, value: Expr },
    Expr(Expr),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        /// Probability of the then-arm in per-mille, when known.
        then_probability: Option<u16>,
    },
    /// Runs while `condition` holds, at most `bound` times. The counter is a
    /// `u64` taking the values `0, 1, ..`.
    Loop {
        counter: Option<String>,
        bound: LoopBound,
        condition: Option<Expr>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
}

impl Stmt {
    pub fn let_(name: impl Into<String>, ty: Type, value: Expr) -> Self {
        Stmt::Let { name: name.into(), ty, value }
    }

    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign { name: name.into(), value }
    }

    pub fn if_(cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Self {
        Stmt::If { cond, then_body, else_body, then_probability: None }
    }

    pub fn counted_loop(counter: impl Into<String>, trips: u64, body: Vec<Stmt>) -> Self {
        Stmt::Loop {
            counter: Some(counter.into()),
            bound: LoopBound::Exact(trips),
            condition: None,
            body,
        }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(Some(value))
    }

    /// Expressions owned directly by this statement, in evaluation order.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Let { value, .. }
            | Stmt::Assign { value, .. }
            | Stmt::SetGlobal { value, .. }
            | Stmt::Io { value, .. }
            | Stmt::Expr(value) => vec![value],
            Stmt::Store { index, value, .. } => vec![index, value],
            Stmt::If { cond, .. } => vec![cond],
            Stmt::Loop { condition, .. } => condition.iter().collect(),
            Stmt::Return(value) => value.iter().collect(),
        }
    }

    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Stmt::Let { value, .. }
            | Stmt::Assign { value, .. }
            | Stmt::SetGlobal { value, .. }
            | Stmt::Io { value, .. }
            | Stmt::Expr(value) => vec![value],
            Stmt::Store { index, value, .. } => vec![index, value],
            Stmt::If { cond, .. } => vec![cond],
            Stmt::Loop { condition, .. } => condition.iter_mut().collect(),
            Stmt::Return(value) => value.iter_mut().collect(),
        }
    }

    /// Nested statement blocks.
    pub fn blocks(&self) -> Vec<&[Stmt]> {
        match self {
            Stmt::If { then_body, else_body, .. } => vec![then_body, else_body],
            Stmt::Loop { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }

    pub fn blocks_mut(&mut self) -> Vec<&mut Vec<Stmt>> {
        match self {
            Stmt::If { then_body, else_body, .. } => vec![then_body, else_body],
            Stmt::Loop { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }
}

/// Visit every expression root in `body` (not sub-expressions), in program order.
pub fn walk_exprs<'a>(body: &'a [Stmt], f: &mut dyn FnMut(&'a Expr)) {
    for stmt in body {
        for expr in stmt.exprs() {
            f(expr);
        }
        for block in stmt.blocks() {
            walk_exprs(block, f);
        }
    }
}

/// Visit every expression node in `body`, including sub-expressions.
pub fn walk_all_exprs<'a>(body: &'a [Stmt], f: &mut dyn FnMut(&'a Expr)) {
    walk_exprs(body, &mut |root| root.walk(&mut *f));
}

/// Number of statement and expression nodes in `body`.
pub fn body_node_count(body: &[Stmt]) -> usize {
    body.iter()
        .map(|stmt| {
            1 + stmt.exprs().iter().map(|e| e.node_count()).sum::<usize>()
                + stmt.blocks().iter().map(|b| body_node_count(b)).sum::<usize>()
        })
        .sum()
}
