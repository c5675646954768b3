/* Solidity ABI transcoder generator
 *
 * Builds a geometric model of ABI types, resolves member offsets in the
 * calldata, memory and packed regimes, and emits Yul routines that move
 * values between ABI encoding and Solidity memory, plus bit-field accessors
 * for packed storage and stack words.
 */

pub mod abi;
pub mod codegen;
pub mod config;
pub mod error;
pub mod packing;
pub mod transcode;

pub use abi::{TypeArena, TypeId, TypeKind};
pub use codegen::{CodeSink, CodeUnit, ShapeNames};
pub use config::{CostModel, CostPreference, GeneratorConfig, PackingConfig, PackingMode};
pub use error::{GenError, GenResult};
pub use packing::{PackedLayout, Placement, WordSource};
pub use transcode::{RoutineRef, RoutineSignature, Transcoder};
