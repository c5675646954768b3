pub mod lines;
pub mod names;
pub mod unit;
pub mod yul;

pub use lines::{Line, Lines};
pub use names::ShapeNames;
pub use unit::{CodeSink, CodeUnit, Param, Routine, RoutineKind};
pub use yul::{Block, Builtin, Expr, Stmt};
