//! mem2reg: promote stack slots to SSA registers with phi insertion.
//!
//! Converts scalar stack slots that are only ever accessed through simple
//! loads and stores into direct value flow, inserting phi nodes where
//! control-flow paths carrying different definitions converge:
//! 1. Safety filter: collect entry-block slots whose every use is a plain
//!    load/store (or a zero-offset view of the slot)
//! 2. Write sets: per slot, the blocks that store to it
//! 3. Phi placement: iterated dominance-frontier closure over the write
//!    sets, placeholder phis prepended to each marked block
//! 4. Renaming: forward CFG traversal rewriting loads/stores into value
//!    flow and wiring phi operands, one incoming entry per edge
//! 5. Cleanup: drop the dead loads, stores, views, and slot declarations
//!
//! The dominance frontiers come precomputed from `ir::analysis`; this pass
//! consumes them read-only and never recomputes control-flow facts itself.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::common::types::IrType;
use crate::ir::analysis::CfgAnalysis;
use crate::ir::ir::*;
use crate::ir::verify;

/// Promote eligible stack slots in every defined function of the module.
/// Returns the number of functions that changed.
pub fn promote_allocas(module: &mut IrModule) -> usize {
    module.for_each_function(|func| promote_function(func) as usize)
}

/// A stack slot approved for promotion.
struct SlotInfo {
    /// The value defined by the slot's declaration (the pointer).
    ptr: Value,
    /// Element type of the slot.
    ty: IrType,
    /// Source-level variable name, for diagnostics.
    name: Option<String>,
}

/// One work-stack frame of the renaming traversal: a block, the CFG edge it
/// is entered through, and the per-slot values reaching along that edge.
struct RenameFrame {
    block: usize,
    pred: Option<usize>,
    values: Vec<Operand>,
}

/// Promote eligible stack slots in one function, to completion. Returns
/// whether any slot was promoted; `false` means the function is untouched.
///
/// The function's graph must be structurally well formed (see
/// `ir::verify`); a malformed graph is a programmer error and aborts.
pub fn promote_function(func: &mut IrFunction) -> bool {
    if func.blocks.is_empty() {
        return false;
    }
    if let Err(e) = verify::verify_function(func) {
        panic!("mem2reg: {e}");
    }

    let (slots, slot_of, views) = find_promotable_slots(func);
    if slots.is_empty() {
        return false;
    }

    let cfg = CfgAnalysis::build(func);
    let write_sets = collect_write_sets(func, slots.len(), &slot_of, &views);

    let mut next_value = func.max_value_id() + 1;
    let phi_table = place_phis(func, &slots, &write_sets, &cfg, &mut next_value);

    let (kill_list, visited) = rename(func, &slots, &slot_of, &views, &phi_table, &cfg);
    cleanup(func, &slot_of, &views, &visited, kill_list);

    func.next_value_id = next_value;
    debug!(
        function = %func.name,
        promoted = slots.len(),
        "promoted stack slots to registers"
    );
    true
}

// ── Safety filter ─────────────────────────────────────────────────────────────

/// Collect the stack slots that are safe to promote. Pure query.
///
/// Only slots declared in the entry block are considered; a declaration in
/// any later block is never a candidate. A candidate survives if it is a
/// scalar (non-array) non-volatile declaration and every use of it across
/// the function is one of:
/// - a load or store whose pointer operand is the slot (a store whose
///   *value* operand is the slot leaks the address and disqualifies it);
/// - an element-pointer computation on the slot whose single offset is the
///   literal zero, provided that view is itself only loaded from or stored
///   through.
///
/// Returns the ordered slot list (the vector index is the slot id for the
/// rest of the pass), the reverse map from declaration value to slot id,
/// and the map from zero-offset view values to the slot they alias.
fn find_promotable_slots(
    func: &IrFunction,
) -> (Vec<SlotInfo>, FxHashMap<u32, usize>, FxHashMap<u32, usize>) {
    let mut candidates: Vec<SlotInfo> = Vec::new();
    let mut cand_of: FxHashMap<u32, usize> = FxHashMap::default();

    for inst in &func.blocks[0].instructions {
        if let Instruction::Alloca { dest, ty, size, volatile, name, .. } = inst {
            // Volatile locals must stay in memory so their values survive
            // setjmp/longjmp; array allocations reserve more bytes than one
            // element and are out of scope.
            if *volatile || ty.size() == 0 || *size > ty.size() {
                continue;
            }
            cand_of.insert(dest.0, candidates.len());
            candidates.push(SlotInfo { ptr: *dest, ty: *ty, name: name.clone() });
        }
    }
    if candidates.is_empty() {
        return (Vec::new(), FxHashMap::default(), FxHashMap::default());
    }

    let mut disqualified: FxHashSet<usize> = FxHashSet::default();
    let mut views: FxHashMap<u32, usize> = FxHashMap::default();

    // First sweep: classify every direct use of a candidate slot.
    for block in &func.blocks {
        for inst in &block.instructions {
            match inst {
                // A load's pointer position is the promotable form of use.
                Instruction::Load { .. } => {}
                Instruction::Store { val, .. } => {
                    if let Some(&c) = val.value_id().and_then(|id| cand_of.get(&id)) {
                        disqualified.insert(c);
                    }
                }
                Instruction::GetElementPtr { dest, base, offset, .. } => {
                    if let Some(&c) = offset.value_id().and_then(|id| cand_of.get(&id)) {
                        disqualified.insert(c);
                    }
                    if let Some(&c) = base.value_id().and_then(|id| cand_of.get(&id)) {
                        if offset.is_zero_const() {
                            views.insert(dest.0, c);
                        } else {
                            disqualified.insert(c);
                        }
                    }
                }
                _ => {
                    inst.for_each_used_value(|id| {
                        if let Some(&c) = cand_of.get(&id) {
                            disqualified.insert(c);
                        }
                    });
                }
            }
        }
        block.terminator.for_each_used_value(|id| {
            if let Some(&c) = cand_of.get(&id) {
                disqualified.insert(c);
            }
        });
    }

    // Second sweep: a zero-offset view is only tolerable if it is itself
    // used purely as a load/store pointer. Anything else (further address
    // arithmetic, a call argument, a stored value) taints the slot.
    for block in &func.blocks {
        for inst in &block.instructions {
            match inst {
                Instruction::Load { .. } => {}
                Instruction::Store { val, .. } => {
                    if let Some(&c) = val.value_id().and_then(|id| views.get(&id)) {
                        disqualified.insert(c);
                    }
                }
                _ => {
                    inst.for_each_used_value(|id| {
                        if let Some(&c) = views.get(&id) {
                            disqualified.insert(c);
                        }
                    });
                }
            }
        }
        block.terminator.for_each_used_value(|id| {
            if let Some(&c) = views.get(&id) {
                disqualified.insert(c);
            }
        });
    }

    // Compact the survivors: slot ids are dense, zero-based, and stable for
    // the remainder of the run, so per-slot data can live in flat arrays.
    let mut remap: Vec<Option<usize>> = vec![None; candidates.len()];
    let mut slots: Vec<SlotInfo> = Vec::new();
    let mut slot_of: FxHashMap<u32, usize> = FxHashMap::default();
    for (old_id, info) in candidates.into_iter().enumerate() {
        if disqualified.contains(&old_id) {
            continue;
        }
        remap[old_id] = Some(slots.len());
        slot_of.insert(info.ptr.0, slots.len());
        slots.push(info);
    }
    let views: FxHashMap<u32, usize> = views
        .into_iter()
        .filter_map(|(value, old_id)| remap[old_id].map(|new_id| (value, new_id)))
        .collect();

    (slots, slot_of, views)
}

/// The slot a pointer operand addresses, directly or through a zero-offset
/// view. None for anything that is not a tracked slot.
fn tracked_slot(
    ptr: &Operand,
    slot_of: &FxHashMap<u32, usize>,
    views: &FxHashMap<u32, usize>,
) -> Option<usize> {
    let id = ptr.value_id()?;
    slot_of.get(&id).or_else(|| views.get(&id)).copied()
}

// ── Write sets ────────────────────────────────────────────────────────────────

/// For each slot, the set of blocks containing at least one store to it.
fn collect_write_sets(
    func: &IrFunction,
    num_slots: usize,
    slot_of: &FxHashMap<u32, usize>,
    views: &FxHashMap<u32, usize>,
) -> Vec<FxHashSet<usize>> {
    let mut write_sets = vec![FxHashSet::default(); num_slots];
    for (idx, block) in func.blocks.iter().enumerate() {
        for inst in &block.instructions {
            if let Instruction::Store { ptr, .. } = inst {
                if let Some(slot) = tracked_slot(ptr, slot_of, views) {
                    write_sets[slot].insert(idx);
                }
            }
        }
    }
    write_sets
}

// ── Phi placement ─────────────────────────────────────────────────────────────

/// Determine where phi nodes are needed and insert placeholders.
///
/// Per slot: iterated dominance-frontier closure seeded from the write
/// set. A block that newly receives a phi becomes a definition site itself
/// and goes back on the worklist; each (block, slot) pair is marked at most
/// once, which bounds the loop. Placeholder phis (empty incoming lists) are
/// prepended to each marked block in discovery order.
///
/// Returns the phi table: block index -> per-slot optional phi value.
fn place_phis(
    func: &mut IrFunction,
    slots: &[SlotInfo],
    write_sets: &[FxHashSet<usize>],
    cfg: &CfgAnalysis,
    next_value: &mut u32,
) -> FxHashMap<usize, Vec<Option<Value>>> {
    let mut table: FxHashMap<usize, Vec<Option<Value>>> = FxHashMap::default();
    // Placeholders per block, in discovery order.
    let mut pending: FxHashMap<usize, Vec<Instruction>> = FxHashMap::default();

    for (slot, info) in slots.iter().enumerate() {
        // Sorted seeds and frontier walks keep the discovery order, and with
        // it the minted phi values, reproducible run to run.
        let mut worklist: Vec<usize> = write_sets[slot].iter().copied().collect();
        worklist.sort_unstable();

        while let Some(block) = worklist.pop() {
            let mut frontier: Vec<usize> = cfg.df[block].iter().copied().collect();
            frontier.sort_unstable();
            for target in frontier {
                let row = table
                    .entry(target)
                    .or_insert_with(|| vec![None; slots.len()]);
                if row[slot].is_some() {
                    continue;
                }
                let dest = Value(*next_value);
                *next_value += 1;
                row[slot] = Some(dest);
                pending.entry(target).or_default().push(Instruction::Phi {
                    dest,
                    ty: info.ty,
                    incoming: Vec::new(),
                });
                trace!(
                    slot,
                    name = info.name.as_deref().unwrap_or(""),
                    block = %func.blocks[target].label,
                    "placed merge node"
                );
                worklist.push(target);
            }
        }
    }

    for (block, mut phis) in pending {
        phis.append(&mut func.blocks[block].instructions);
        func.blocks[block].instructions = phis;
    }

    table
}

// ── Renaming ──────────────────────────────────────────────────────────────────

/// Rewrite loads and stores of tracked slots into direct value flow.
///
/// A depth-first walk of the CFG from the entry, carried on an explicit
/// work-stack (a degenerate linear chain of blocks would overflow native
/// recursion). Each frame is one incoming edge; the value vector is forked
/// per successor edge so sibling paths never observe each other's updates,
/// and diverging definitions reconcile only through phi nodes.
///
/// Per frame:
/// 1. wire this edge into every phi of the block and switch the vector
///    entries over to the phi results, on every edge, visited or not;
/// 2. stop if the block's instruction stream was already rewritten;
/// 3. otherwise rewrite it once: tracked declarations, views, loads, and
///    stores move to the kill list; a load records its reaching value in
///    the use-rewrite map; a store updates the vector;
/// 4. push one frame per successor edge, in reverse so the first edge is
///    processed first.
///
/// Returns the kill list and the visited set.
fn rename(
    func: &mut IrFunction,
    slots: &[SlotInfo],
    slot_of: &FxHashMap<u32, usize>,
    views: &FxHashMap<u32, usize>,
    phi_table: &FxHashMap<usize, Vec<Option<Value>>>,
    cfg: &CfgAnalysis,
) -> (Vec<Instruction>, Vec<bool>) {
    let mut kill_list: Vec<Instruction> = Vec::new();
    let mut visited = vec![false; func.blocks.len()];
    let mut rewrites: FxHashMap<u32, Operand> = FxHashMap::default();

    // A read with no reaching write resolves to the typed zero placeholder,
    // never to a dangling reference.
    let undef: Vec<Operand> = slots
        .iter()
        .map(|s| Operand::Const(IrConst::zero(s.ty)))
        .collect();
    let mut stack = vec![RenameFrame { block: 0, pred: None, values: undef }];

    while let Some(RenameFrame { block, pred, mut values }) = stack.pop() {
        if let Some(row) = phi_table.get(&block) {
            // The verifier guarantees the entry block has no incoming edges,
            // so a block carrying phis always has a predecessor here.
            let pred_idx = pred.expect("entry block cannot carry merge nodes");
            let pred_label = func.blocks[pred_idx].label;
            for (slot, phi) in row.iter().enumerate() {
                if let Some(phi) = phi {
                    append_incoming(
                        &mut func.blocks[block].instructions,
                        *phi,
                        values[slot],
                        pred_label,
                    );
                    values[slot] = Operand::Value(*phi);
                }
            }
        }

        if visited[block] {
            continue;
        }
        visited[block] = true;

        let insts = std::mem::take(&mut func.blocks[block].instructions);
        let mut kept = Vec::with_capacity(insts.len());
        for inst in insts {
            match &inst {
                Instruction::Alloca { dest, .. } if slot_of.contains_key(&dest.0) => {
                    kill_list.push(inst);
                }
                Instruction::GetElementPtr { dest, .. } if views.contains_key(&dest.0) => {
                    kill_list.push(inst);
                }
                Instruction::Load { dest, ptr, .. } => {
                    if let Some(slot) = tracked_slot(ptr, slot_of, views) {
                        rewrites.insert(dest.0, values[slot]);
                        kill_list.push(inst);
                    } else {
                        kept.push(inst);
                    }
                }
                Instruction::Store { val, ptr, .. } => {
                    if let Some(slot) = tracked_slot(ptr, slot_of, views) {
                        values[slot] = resolve(*val, &rewrites);
                        kill_list.push(inst);
                    } else {
                        kept.push(inst);
                    }
                }
                _ => kept.push(inst),
            }
        }
        func.blocks[block].instructions = kept;

        let successors = func.blocks[block].terminator.successors();
        for label in successors.iter().rev() {
            let target = cfg.label_to_idx[label];
            stack.push(RenameFrame {
                block: target,
                pred: Some(block),
                values: values.clone(),
            });
        }
    }

    // Every surviving use of a promoted load now refers to the load's
    // statically-determined reaching definition.
    apply_rewrites(func, &rewrites);

    (kill_list, visited)
}

/// Append an incoming (value, predecessor) entry to a phi at the head of a
/// block's instruction stream.
fn append_incoming(insts: &mut [Instruction], phi: Value, value: Operand, pred: BlockId) {
    for inst in insts.iter_mut() {
        match inst {
            Instruction::Phi { dest, incoming, .. } if *dest == phi => {
                incoming.push((value, pred));
                return;
            }
            // Phis sit at the block head; stop at the first non-phi.
            Instruction::Phi { .. } => continue,
            _ => break,
        }
    }
    unreachable!("merge node {phi:?} missing from block head");
}

/// Follow the use-rewrite map: a stored value that is itself the result of
/// a promoted load must flow as that load's reaching definition.
fn resolve(op: Operand, rewrites: &FxHashMap<u32, Operand>) -> Operand {
    let mut op = op;
    while let Some(id) = op.value_id() {
        match rewrites.get(&id) {
            Some(&next) => op = next,
            None => break,
        }
    }
    op
}

/// Substitute every operand in the function through the use-rewrite map.
fn apply_rewrites(func: &mut IrFunction, rewrites: &FxHashMap<u32, Operand>) {
    if rewrites.is_empty() {
        return;
    }
    for block in &mut func.blocks {
        for inst in &mut block.instructions {
            inst.for_each_operand_mut(|op| *op = resolve(*op, rewrites));
        }
        block
            .terminator
            .for_each_operand_mut(|op| *op = resolve(*op, rewrites));
    }
}

// ── Cleanup ───────────────────────────────────────────────────────────────────

/// Deallocate the instructions unlinked during renaming, and strip any
/// residual slot accesses from blocks the traversal never reached
/// (unreachable code must not keep references to a deleted slot).
fn cleanup(
    func: &mut IrFunction,
    slot_of: &FxHashMap<u32, usize>,
    views: &FxHashMap<u32, usize>,
    visited: &[bool],
    kill_list: Vec<Instruction>,
) {
    for (idx, block) in func.blocks.iter_mut().enumerate() {
        if visited[idx] {
            continue;
        }
        block.instructions.retain(|inst| match inst {
            Instruction::Alloca { dest, .. } => !slot_of.contains_key(&dest.0),
            Instruction::GetElementPtr { dest, .. } => !views.contains_key(&dest.0),
            Instruction::Load { ptr, .. } | Instruction::Store { ptr, .. } => {
                tracked_slot(ptr, slot_of, views).is_none()
            }
            _ => true,
        });
    }

    // The kill list owns every unlinked instruction; dropping it is the
    // deallocation step, kept separate from use rewiring so neither phase
    // depends on the other's timing.
    drop(kill_list);
}
