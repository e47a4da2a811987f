// This module is the hub for the data structures every other part of the optimizer shares:
// the node definitions of the program tree (types, literals, expressions, statements), the
// arena that owns functions and globals under stable ids together with its change journal,
// construction helpers used by the front end, the textual printer, and the error taxonomy.
// Nothing in here knows about passes or the cost model.

//! Core program tree infrastructure.
//!
//! # Key Components
//!
//! - [`ir`]: scalar types, literals with exact width semantics, expression and
//!   statement trees
//! - [`tree`]: id-indexed arena of functions and globals, with [`TreeDelta`]
//!   journaling of everything a pass touches
//! - [`builder`]: declare-then-define construction of trees
//! - [`error`]: [`OptimizationError`] and [`BuildError`]

pub mod builder;
pub mod error;
pub mod ir;
mod printer;
pub mod tree;

pub use builder::TreeBuilder;
pub use error::{BuildError, OptResult, OptimizationError};
pub use ir::{BinOp, Const, Expr, LoopBound, Overflow, Stmt, Type, UnOp, Width};
pub use tree::{FuncId, Function, GlobalId, GlobalVariable, Param, ProgramTree, TreeDelta};
