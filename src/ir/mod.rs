pub mod analysis;
pub mod constants;
pub mod instruction;
pub mod ir;
pub mod mem2reg;
pub mod module;
pub mod ops;
pub mod verify;
