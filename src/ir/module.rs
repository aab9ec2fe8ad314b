/// IR module and function definitions.
///
/// `IrModule` is the top-level unit containing functions. `IrFunction`
/// represents a single function: parameter list, basic blocks (block 0 is
/// the entry), and a cached value-id watermark used by passes that mint
/// fresh values.
use crate::common::types::IrType;
use super::instruction::BasicBlock;

/// A compilation unit in the IR.
#[derive(Debug, Default)]
pub struct IrModule {
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new() -> Self {
        Self { functions: Vec::new() }
    }

    /// Run a transformation on each defined (non-declaration) function,
    /// returning the total count of changes made. Used by passes.
    pub fn for_each_function<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&mut IrFunction) -> usize,
    {
        let mut total = 0;
        for func in &mut self.functions {
            if !func.is_declaration {
                total += f(func);
            }
        }
        total
    }
}

/// An IR function.
#[derive(Debug)]
pub struct IrFunction {
    pub name: String,
    pub return_type: IrType,
    pub params: Vec<IrParam>,
    pub blocks: Vec<BasicBlock>,
    /// True if the function has no body (extern declaration).
    pub is_declaration: bool,
    /// Cached upper bound on value ids: every Value ID in this function is
    /// < next_value_id. Maintained by passes that create values, to avoid
    /// full-IR scans. 0 means "not yet computed" (falls back to scanning).
    pub next_value_id: u32,
}

/// A function parameter.
#[derive(Debug, Clone)]
pub struct IrParam {
    pub name: String,
    pub ty: IrType,
}

impl IrFunction {
    pub fn new(name: String, return_type: IrType, params: Vec<IrParam>) -> Self {
        Self {
            name,
            return_type,
            params,
            blocks: Vec::new(),
            is_declaration: false,
            next_value_id: 0,
        }
    }

    /// The highest Value ID defined in this function, or 0 if none.
    /// Uses the cached `next_value_id` when available, otherwise scans.
    #[inline]
    pub fn max_value_id(&self) -> u32 {
        if self.next_value_id > 0 {
            // next_value_id is the first unused ID, so max used is one less
            return self.next_value_id - 1;
        }
        let mut max_id: u32 = 0;
        for block in &self.blocks {
            for inst in &block.instructions {
                if let Some(v) = inst.dest() {
                    if v.0 > max_id {
                        max_id = v.0;
                    }
                }
            }
        }
        max_id
    }
}
