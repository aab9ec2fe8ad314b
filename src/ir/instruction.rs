/// IR instruction definitions: values, operands, instructions, terminators,
/// and basic blocks.
///
/// Key types:
/// - `BlockId`: basic block identifier (u32 index, formats as "bb{id}")
/// - `Value`: SSA value reference (u32 index)
/// - `Operand`: either a `Value` or an `IrConst`
/// - `Instruction`: the instruction enum
/// - `Terminator`: block terminators (return, branch, cond branch, switch)
/// - `BasicBlock`: a labeled instruction sequence ending in a terminator
///
/// Every operand position is an `Operand`, including the pointer of a load,
/// store, or element-pointer computation. This keeps operand rewriting
/// uniform: a pass that substitutes values never has to special-case
/// pointer slots that cannot hold a constant.
use crate::common::types::IrType;
use super::constants::IrConst;
use super::ops::{IrBinOp, IrCmpOp, IrUnaryOp};

/// A basic block identifier. A u32 index rather than a heap-allocated
/// string label, so block references are zero-cost copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// An SSA value reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(pub u32);

/// An operand (either a value reference or a constant).
#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Value(Value),
    Const(IrConst),
}

impl Operand {
    /// Returns true if this operand is a literal integer zero.
    pub fn is_zero_const(&self) -> bool {
        matches!(self, Operand::Const(c) if c.is_integer_zero())
    }

    /// The value id referenced by this operand, if it is not a constant.
    pub fn value_id(&self) -> Option<u32> {
        match self {
            Operand::Value(v) => Some(v.0),
            Operand::Const(_) => None,
        }
    }
}

/// A basic block in the CFG.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: BlockId,
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

/// An IR instruction.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Declare a stack slot: %dest = alloca ty
    /// `size` is the reserved byte count; reserving more than one element's
    /// worth makes this an array allocation. `volatile` slots must stay in
    /// memory (their values have to survive setjmp/longjmp), so the
    /// promotion pass never touches them. `name` is the source-level
    /// variable name when one is known, carried for diagnostics only.
    Alloca {
        dest: Value,
        ty: IrType,
        size: usize,
        align: usize,
        volatile: bool,
        name: Option<String>,
    },

    /// Load from memory: %dest = load ptr
    Load { dest: Value, ptr: Operand, ty: IrType },

    /// Store to memory: store val, ptr
    Store { val: Operand, ptr: Operand, ty: IrType },

    /// Element pointer: %dest = base + offset (byte offset operand).
    GetElementPtr { dest: Value, base: Operand, offset: Operand, ty: IrType },

    /// Binary operation: %dest = op lhs, rhs
    BinOp { dest: Value, op: IrBinOp, lhs: Operand, rhs: Operand, ty: IrType },

    /// Unary operation: %dest = op src
    UnaryOp { dest: Value, op: IrUnaryOp, src: Operand, ty: IrType },

    /// Comparison: %dest = cmp op lhs, rhs
    Cmp { dest: Value, op: IrCmpOp, lhs: Operand, rhs: Operand, ty: IrType },

    /// Type conversion: %dest = cast src
    Cast { dest: Value, src: Operand, from_ty: IrType, to_ty: IrType },

    /// Copy a value: %dest = src
    Copy { dest: Value, src: Operand },

    /// Direct call: %dest = call func(args...)
    Call {
        dest: Option<Value>,
        func: String,
        args: Vec<Operand>,
        return_type: IrType,
    },

    /// Address of a global: %dest = &name
    GlobalAddr { dest: Value, name: String },

    /// Conditional select: %dest = cond != 0 ? true_val : false_val
    Select {
        dest: Value,
        cond: Operand,
        true_val: Operand,
        false_val: Operand,
        ty: IrType,
    },

    /// Read of the function's `param_idx`-th parameter: %dest = paramref idx
    ParamRef { dest: Value, param_idx: usize, ty: IrType },

    /// SSA merge node. Each entry in `incoming` is (value, predecessor),
    /// one per incoming CFG edge.
    Phi {
        dest: Value,
        ty: IrType,
        incoming: Vec<(Operand, BlockId)>,
    },
}

/// Block terminator.
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Return from the function.
    Return(Option<Operand>),

    /// Unconditional branch.
    Branch(BlockId),

    /// Conditional branch.
    CondBranch { cond: Operand, true_label: BlockId, false_label: BlockId },

    /// Multi-way dispatch: `cases` maps values to targets, `default` is the
    /// fallback.
    Switch {
        val: Operand,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },

    /// Unreachable (e.g., after a noreturn call).
    Unreachable,
}

impl Instruction {
    /// The destination value defined by this instruction, if any.
    pub fn dest(&self) -> Option<Value> {
        match self {
            Instruction::Alloca { dest, .. }
            | Instruction::Load { dest, .. }
            | Instruction::GetElementPtr { dest, .. }
            | Instruction::BinOp { dest, .. }
            | Instruction::UnaryOp { dest, .. }
            | Instruction::Cmp { dest, .. }
            | Instruction::Cast { dest, .. }
            | Instruction::Copy { dest, .. }
            | Instruction::GlobalAddr { dest, .. }
            | Instruction::Select { dest, .. }
            | Instruction::ParamRef { dest, .. }
            | Instruction::Phi { dest, .. } => Some(*dest),
            Instruction::Call { dest, .. } => *dest,
            Instruction::Store { .. } => None,
        }
    }

    /// Call `f(value_id)` for every Value ID used as an operand in this
    /// instruction.
    ///
    /// This is the canonical value visitor. Passes that enumerate operands
    /// should use this to avoid duplicating the match block.
    #[inline]
    pub fn for_each_used_value(&self, mut f: impl FnMut(u32)) {
        self.for_each_operand(|op| {
            if let Operand::Value(v) = op {
                f(v.0);
            }
        });
    }

    /// Call `f` on every operand of this instruction, in operand order.
    #[inline]
    pub fn for_each_operand(&self, mut f: impl FnMut(&Operand)) {
        match self {
            Instruction::Alloca { .. }
            | Instruction::GlobalAddr { .. }
            | Instruction::ParamRef { .. } => {}
            Instruction::Load { ptr, .. } => f(ptr),
            Instruction::Store { val, ptr, .. } => {
                f(val);
                f(ptr);
            }
            Instruction::GetElementPtr { base, offset, .. } => {
                f(base);
                f(offset);
            }
            Instruction::BinOp { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Instruction::UnaryOp { src, .. }
            | Instruction::Cast { src, .. }
            | Instruction::Copy { src, .. } => f(src),
            Instruction::Call { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            Instruction::Select { cond, true_val, false_val, .. } => {
                f(cond);
                f(true_val);
                f(false_val);
            }
            Instruction::Phi { incoming, .. } => {
                for (op, _) in incoming {
                    f(op);
                }
            }
        }
    }

    /// Call `f` on a mutable reference to every operand of this instruction.
    /// Used by passes that substitute operands in place.
    #[inline]
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Instruction::Alloca { .. }
            | Instruction::GlobalAddr { .. }
            | Instruction::ParamRef { .. } => {}
            Instruction::Load { ptr, .. } => f(ptr),
            Instruction::Store { val, ptr, .. } => {
                f(val);
                f(ptr);
            }
            Instruction::GetElementPtr { base, offset, .. } => {
                f(base);
                f(offset);
            }
            Instruction::BinOp { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Instruction::UnaryOp { src, .. }
            | Instruction::Cast { src, .. }
            | Instruction::Copy { src, .. } => f(src),
            Instruction::Call { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            Instruction::Select { cond, true_val, false_val, .. } => {
                f(cond);
                f(true_val);
                f(false_val);
            }
            Instruction::Phi { incoming, .. } => {
                for (op, _) in incoming {
                    f(op);
                }
            }
        }
    }
}

impl Terminator {
    /// Successor targets of this terminator, one entry per CFG edge. A
    /// conditional branch with identical arms still contributes two edges;
    /// consumers that want distinct targets deduplicate themselves.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch(label) => vec![*label],
            Terminator::CondBranch { true_label, false_label, .. } => {
                vec![*true_label, *false_label]
            }
            Terminator::Switch { cases, default, .. } => {
                let mut succs = Vec::with_capacity(cases.len() + 1);
                succs.push(*default);
                succs.extend(cases.iter().map(|(_, label)| *label));
                succs
            }
            Terminator::Return(_) | Terminator::Unreachable => Vec::new(),
        }
    }

    /// Call `f(value_id)` for every Value ID used by this terminator.
    #[inline]
    pub fn for_each_used_value(&self, mut f: impl FnMut(u32)) {
        match self {
            Terminator::Return(Some(Operand::Value(v)))
            | Terminator::CondBranch { cond: Operand::Value(v), .. }
            | Terminator::Switch { val: Operand::Value(v), .. } => f(v.0),
            _ => {}
        }
    }

    /// Call `f` on a mutable reference to every operand of this terminator.
    #[inline]
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Terminator::Return(Some(op))
            | Terminator::CondBranch { cond: op, .. }
            | Terminator::Switch { val: op, .. } => f(op),
            _ => {}
        }
    }
}
