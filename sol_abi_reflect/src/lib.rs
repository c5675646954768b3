/* ABI Transcoder Reflection Library
 *
 * Reference encoders for the ABI and Solidity memory layouts, and an
 * interpreter that runs generated Yul routines against calldata, memory
 * and storage so their behaviour can be checked value by value.
 */

pub mod errors;
pub mod interpreter;
pub mod reference;
pub mod value;

pub use errors::{ReflectError, ReflectResult};
pub use interpreter::{CopyStats, Interpreter, Machine};
pub use reference::{abi_encode, read_memory, write_memory};
pub use value::Value;
