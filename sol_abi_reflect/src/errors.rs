use sol_abi_gen::GenError;
use thiserror::Error;

/// Result alias used across the reflection crate.
pub type ReflectResult<T> = Result<T, ReflectError>;

/// Faults raised while building reference data or running routines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReflectError {
    /// Generation failed before anything could run.
    #[error("generation failed: {0}")]
    Gen(#[from] GenError),

    /// The routine executed `revert`.
    #[error("execution reverted with {} bytes of data", data.len())]
    Revert { data: Vec<u8> },

    #[error("routine '{name}' is not in the unit")]
    UnknownRoutine { name: String },

    #[error("constant '{name}' is not in the unit")]
    UnknownConstant { name: String },

    #[error("variable '{name}' is not in scope in '{routine}'")]
    UndefinedVariable { routine: String, name: String },

    /// A call or assignment produced the wrong number of values.
    #[error("'{context}' expected {expected} values, got {got}")]
    ArityMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    #[error("step budget of {limit} exhausted")]
    StepLimit { limit: u64 },

    /// Memory or calldata access beyond what the machine allows.
    #[error("access at {offset} exceeds the {limit}-byte memory limit")]
    MemoryLimit { offset: String, limit: usize },

    /// A value does not fit the type it is paired with.
    #[error("value does not match type '{type_name}': {reason}")]
    ShapeMismatch { type_name: String, reason: String },
}
