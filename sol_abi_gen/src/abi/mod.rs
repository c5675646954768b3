pub mod arena;
pub mod classify;
pub mod geometry;
pub mod layout;
pub mod shape;

pub use arena::{TypeArena, TypeId, TypeKind, TypeNode};
pub use classify::{ArrayStrategy, Segment, StructSegments, classify_array, struct_segments};
pub use geometry::{Regime, WORD, WORD_BITS};
pub use layout::{OffsetResolver, WellKnown};
pub use shape::{ShapeId, ShapeInterner, ShapeKey};
