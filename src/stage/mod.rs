//! Stage Data Model
//!
//! The target format the lowerer emits into: a fixed opcode table
//! (`blocktype`), a value-encoding layer (`value`), and a bundled
//! minimal project to fill in (`template`).

pub mod blocktype;
pub mod template;
pub mod value;

pub use blocktype::{lookup, BlockSpec, Extension, Slot, SlotKind};
pub use template::fresh_project;
pub use value::StageValue;
