//! Solidity ABI Type Descriptions
//!
//! This crate contains the data model handed to the transcoding generator:
//! serde-friendly type descriptions and the Solidity JSON ABI item model.
//! It performs no layout computation or code generation.

pub mod abi_json;
pub mod types;

// Re-export commonly used types at the crate root
pub use abi_json::*;
pub use types::*;
