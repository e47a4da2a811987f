// This module defines the error taxonomy of the optimizer using the thiserror crate.
// OptimizationError carries the three fatal conditions the pipeline can hit: a pass whose
// determinism certificate (or the consistency check that follows it) rejects its own
// transformation, a touched function whose WCET bound grew past the configured budget, and a
// function whose worst-case bound cannot be proven finite. Each variant carries the structured
// detail the enclosing driver needs to build a diagnostic (pass name, function name, cycle
// counts, percentage). BuildError covers malformed trees handed in by the front end while they
// are being assembled. OptResult<T> is the convenience alias used throughout the crate.

//! Error types for the optimizer.

use thiserror::Error;

/// Fatal pipeline errors. Every variant aborts the whole run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizationError {
    #[error("pass `{pass}` violated determinism: {reason}")]
    DeterminismViolated {
        pass: String,
        reason: String,
    },

    #[error(
        "WCET of `{function}` degraded from {old_cycles} to {new_cycles} cycles ({percent:.2}%)"
    )]
    WcetDegradationExceeded {
        function: String,
        old_cycles: u64,
        new_cycles: u64,
        percent: f64,
    },

    #[error("WCET analysis of `{function}` failed: {reason}")]
    AnalysisFailure {
        function: String,
        reason: String,
    },
}

impl OptimizationError {
    pub(crate) fn analysis(function: impl Into<String>, reason: impl Into<String>) -> Self {
        OptimizationError::AnalysisFailure {
            function: function.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn determinism(pass: impl Into<String>, reason: impl Into<String>) -> Self {
        OptimizationError::DeterminismViolated {
            pass: pass.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while a program tree is being assembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("duplicate function name: {name}")]
    DuplicateFunction { name: String },

    #[error("duplicate global name: {name}")]
    DuplicateGlobal { name: String },

    #[error("unknown function id {id}")]
    UnknownFunction { id: u32 },

    #[error("`{function}` references missing {what}")]
    DanglingReference { function: String, what: String },

    #[error("call from `{caller}` to `{callee}` passes {found} arguments, expected {expected}")]
    ArityMismatch {
        caller: String,
        callee: String,
        expected: usize,
        found: usize,
    },
}

/// Result type alias for pipeline operations.
pub type OptResult<T> = Result<T, OptimizationError>;
