/// IR constants: compile-time literal values.
///
/// `IrConst` represents the constants that can appear as instruction
/// operands. `zero(ty)` produces the well-typed zero value of a type; the
/// promotion pass uses it as the placeholder definition for a slot that is
/// read before any store reaches it.
use crate::common::types::IrType;

/// An IR constant.
#[derive(Debug, Clone, Copy)]
pub enum IrConst {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl IrConst {
    /// The zero value of `ty`. Pointer-typed slots get an integer zero,
    /// matching the width of a pointer.
    pub fn zero(ty: IrType) -> IrConst {
        match ty {
            IrType::I8 | IrType::U8 => IrConst::I8(0),
            IrType::I16 | IrType::U16 => IrConst::I16(0),
            IrType::I32 | IrType::U32 => IrConst::I32(0),
            IrType::F32 => IrConst::F32(0.0),
            IrType::F64 => IrConst::F64(0.0),
            _ => IrConst::I64(0),
        }
    }

    /// Returns true if this constant is an integer zero. Float zeroes are
    /// excluded: a byte offset is always an integer.
    pub fn is_integer_zero(&self) -> bool {
        matches!(
            self,
            IrConst::I8(0) | IrConst::I16(0) | IrConst::I32(0) | IrConst::I64(0)
        )
    }
}
