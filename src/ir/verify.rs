//! Structural well-formedness checks for function CFGs.
//!
//! Passes that walk the graph assume a few invariants: every branch target
//! resolves to a block, labels are unique, and the entry block has no
//! predecessors (so "no incoming edge yet" is only ever true at the start
//! of a traversal). Violations are programmer errors in whatever produced
//! the IR, not recoverable conditions; callers abort on them.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ir::ir::{BlockId, IrFunction};

/// A structural defect in a function's CFG.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("function '{func}' has no basic blocks")]
    NoBlocks { func: String },

    #[error("function '{func}': label {label} is defined by more than one block")]
    DuplicateLabel { func: String, label: BlockId },

    #[error("function '{func}': block {from} branches to unknown label {target}")]
    UnknownTarget { func: String, from: BlockId, target: BlockId },

    #[error("function '{func}': block {from} branches to the entry block {entry}")]
    BranchToEntry { func: String, from: BlockId, entry: BlockId },
}

/// Check the structural invariants of one function's CFG.
pub fn verify_function(func: &IrFunction) -> Result<(), VerifyError> {
    if func.blocks.is_empty() {
        return Err(VerifyError::NoBlocks { func: func.name.clone() });
    }

    let mut label_to_idx: FxHashMap<BlockId, usize> = FxHashMap::default();
    for (i, block) in func.blocks.iter().enumerate() {
        if label_to_idx.insert(block.label, i).is_some() {
            return Err(VerifyError::DuplicateLabel {
                func: func.name.clone(),
                label: block.label,
            });
        }
    }

    let entry = func.blocks[0].label;
    for block in &func.blocks {
        for target in block.terminator.successors() {
            if !label_to_idx.contains_key(&target) {
                return Err(VerifyError::UnknownTarget {
                    func: func.name.clone(),
                    from: block.label,
                    target,
                });
            }
            if target == entry {
                return Err(VerifyError::BranchToEntry {
                    func: func.name.clone(),
                    from: block.label,
                    entry,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::IrType;
    use crate::ir::ir::*;

    fn func_with_blocks(blocks: Vec<BasicBlock>) -> IrFunction {
        let mut func = IrFunction::new("f".to_string(), IrType::Void, vec![]);
        func.blocks = blocks;
        func
    }

    #[test]
    fn test_empty_function_rejected() {
        let func = func_with_blocks(vec![]);
        assert!(matches!(verify_function(&func), Err(VerifyError::NoBlocks { .. })));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let func = func_with_blocks(vec![BasicBlock {
            label: BlockId(0),
            instructions: vec![],
            terminator: Terminator::Branch(BlockId(7)),
        }]);
        assert!(matches!(
            verify_function(&func),
            Err(VerifyError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_branch_to_entry_rejected() {
        let func = func_with_blocks(vec![
            BasicBlock {
                label: BlockId(0),
                instructions: vec![],
                terminator: Terminator::Branch(BlockId(1)),
            },
            BasicBlock {
                label: BlockId(1),
                instructions: vec![],
                terminator: Terminator::Branch(BlockId(0)),
            },
        ]);
        assert!(matches!(
            verify_function(&func),
            Err(VerifyError::BranchToEntry { .. })
        ));
    }

    #[test]
    fn test_well_formed_accepted() {
        let func = func_with_blocks(vec![
            BasicBlock {
                label: BlockId(0),
                instructions: vec![],
                terminator: Terminator::Branch(BlockId(1)),
            },
            BasicBlock {
                label: BlockId(1),
                instructions: vec![],
                terminator: Terminator::Return(None),
            },
        ]);
        assert!(verify_function(&func).is_ok());
    }
}
