//! Promotion of stack-allocated scalars to SSA registers ("mem2reg").
//!
//! The crate provides a small typed IR (`ir::ir`), CFG and dominance
//! analysis (`ir::analysis`), structural verification (`ir::verify`), and
//! the promotion pass itself (`ir::mem2reg`): scalar stack slots accessed
//! only through simple loads and stores become direct value flow, with phi
//! nodes inserted at the iterated dominance frontier of their stores.
//!
//! ```
//! use mem2reg::ir::ir::*;
//! use mem2reg::ir::mem2reg::promote_function;
//! use mem2reg::common::types::IrType;
//!
//! // int f() { int x = 42; return x; }
//! let mut func = IrFunction::new("f".to_string(), IrType::I32, vec![]);
//! func.blocks.push(BasicBlock {
//!     label: BlockId(0),
//!     instructions: vec![
//!         Instruction::Alloca {
//!             dest: Value(0),
//!             ty: IrType::I32,
//!             size: 4,
//!             align: 0,
//!             volatile: false,
//!             name: Some("x".to_string()),
//!         },
//!         Instruction::Store {
//!             val: Operand::Const(IrConst::I32(42)),
//!             ptr: Operand::Value(Value(0)),
//!             ty: IrType::I32,
//!         },
//!         Instruction::Load {
//!             dest: Value(1),
//!             ptr: Operand::Value(Value(0)),
//!             ty: IrType::I32,
//!         },
//!     ],
//!     terminator: Terminator::Return(Some(Operand::Value(Value(1)))),
//! });
//!
//! assert!(promote_function(&mut func));
//! assert!(func.blocks[0].instructions.is_empty());
//! ```

pub mod common;
pub mod ir;
pub mod passes;
