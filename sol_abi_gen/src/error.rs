use thiserror::Error;

/// Generation-time contract violations. Any of these aborts the whole
/// generation request; generated code never has to handle them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenError {
    #[error("{query} is undefined for type '{type_name}'")]
    UndefinedSize { type_name: String, query: &'static str },
    #[error("invalid type definition: {0}")]
    InvalidType(String),
    #[error("type '{type_name}' has no member '{member}'")]
    UnknownMember { type_name: String, member: String },
    #[error("type '{child}' is not a member of '{parent}'")]
    NotAMember { parent: String, child: String },
    #[error(
        "segment offsets diverge in '{type_name}' at member {index}: calldata +{calldata} vs memory +{memory}"
    )]
    SegmentMismatch {
        type_name: String,
        index: usize,
        calldata: u64,
        memory: u64,
    },
    #[error("cannot generate {operation} for '{type_name}': unsupported shape")]
    UnsupportedShape { type_name: String, operation: &'static str },
    #[error("cannot pack '{type_name}': {reason}")]
    UnsupportedPacking { type_name: String, reason: String },
    #[error("packed layout is invalid: {0}")]
    PackingInvariant(String),
    #[error("constant '{name}' already bound to {existing}, refusing {requested}")]
    ConstantConflict {
        name: String,
        existing: String,
        requested: String,
    },
    #[error("routine '{0}' already exists with a different body")]
    RoutineConflict(String),
    #[error("cannot cast '{from}' to '{to}': calling conventions differ")]
    IncompatibleCast { from: String, to: String },
    #[error("field of {bit_length} bits at bit offset {bit_offset} does not fit in one word")]
    InvalidField { bit_offset: u32, bit_length: u32 },
    #[error("invalid generator config: {0}")]
    Config(String),
}

pub type GenResult<T> = Result<T, GenError>;
