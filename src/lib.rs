//! wcetopt - WCET-bounded optimizing backend.
//!
//! Transforms a resolved program tree through an ordered registry of
//! optimization passes until a fixed point is reached, while guaranteeing that
//! observable behavior is unchanged and that no function's worst-case
//! execution time bound grows past a configured budget. Every change a pass
//! makes is certified, re-analyzed and checked before it is kept; a violation
//! aborts the run instead of producing a partially optimized tree.
//!
//! # Primary Usage
//!
//! ```ignore
//! use wcetopt::core::{Const, Expr, Stmt, TreeBuilder, Type};
//! use wcetopt::pipeline::{optimize, PipelineConfig};
//!
//! let mut builder = TreeBuilder::new();
//! let main = builder.declare("main", &[], Some(Type::I32))?;
//! builder.define(main, vec![Stmt::ret(Expr::lit(Const::i32(0)))])?;
//! let tree = builder.finish()?;
//!
//! let optimized = optimize(tree, PipelineConfig::default())?;
//! println!("{}", optimized.metadata);
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Program tree, construction, printing and errors
//! - [`wcet`] - Cost model, reachability and WCET analysis
//! - [`passes`] - Pass contract, dead code elimination, constant folding and
//!   WCET-guided optimization
//! - [`pipeline`] - Orchestrator, configuration and run statistics

pub mod core;
pub mod passes;
pub mod pipeline;
pub mod wcet;

pub use core::{BuildError, OptResult, OptimizationError, ProgramTree, TreeBuilder};
pub use passes::{OptimizationPass, PassResult};
pub use pipeline::{optimize, OptimizationMetadata, OptimizedAst, Pipeline, PipelineConfig};
pub use wcet::{AnalysisResults, WcetAnalyzer, WcetBound};
