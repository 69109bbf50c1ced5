// SPDX-License-Identifier: BSD-3-Clause
//! Statement detection: classifies instructions into user-visible
//! statements, resolves their use/def accesses and chains them into the
//! per-function successor graph.
//!
//! Only returns, conditional branches, switches, invokes, stores and
//! non-intrinsic calls become statements. Everything else (arithmetic,
//! comparisons, loads, pointer arithmetic, unconditional branches, debug
//! intrinsics) is transitive: it contributes to use-sets through backward
//! traversal but is invisible in the output.

use std::collections::VecDeque;

use inkwell::basic_block::BasicBlock;
use inkwell::module::Module;
use inkwell::values::{BasicValueEnum, FunctionValue, InstructionOpcode, InstructionValue};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::access::{Access, AccessSet};
use crate::llvm::{self, ValueToken};
use crate::location::{self, LocationError};
use crate::repository::Repository;
use crate::statement::Statement;

/// Runs detection over every defined function and returns the populated
/// repository.
pub fn detect_module<'ctx>(module: &Module<'ctx>) -> Repository<'ctx> {
    let mut repo = Repository::new();

    for function in module.get_functions() {
        if !llvm::is_defined(&function) {
            continue;
        }
        detect_function(function, &mut repo);
    }

    debug!(
        statements = repo.statement_count(),
        values = repo.value_count(),
        "statement detection finished"
    );
    repo
}

fn detect_function<'ctx>(function: FunctionValue<'ctx>, repo: &mut Repository<'ctx>) {
    // First and last statement of each non-empty basic block, for chaining
    // across block boundaries.
    let mut bounds: FxHashMap<ValueToken, (InstructionValue<'ctx>, InstructionValue<'ctx>)> =
        FxHashMap::default();

    for block in llvm::blocks(function) {
        let mut first: Option<InstructionValue<'ctx>> = None;
        let mut prev: Option<InstructionValue<'ctx>> = None;

        for instr in llvm::instructions(block) {
            let stmt = match statement_for(function, instr) {
                Ok(Some(stmt)) => stmt,
                Ok(None) => continue,
                // No source location: an instruction the compiler added on
                // its own, not a user-visible statement.
                Err(LocationError::Unknown) => continue,
            };

            // Register immediately so identifiers follow the order of
            // appearance in the source.
            repo.register_statement(function, stmt);

            match prev {
                None => first = Some(instr),
                Some(prev) => repo.add_successor(prev, instr),
            }
            prev = Some(instr);
        }

        if let (Some(first), Some(last)) = (first, prev) {
            bounds.insert(ValueToken::of_block(block), (first, last));
        }
    }

    chain_across_blocks(function, &bounds, repo);
}

/// Chains the last statement of every non-empty predecessor to the first
/// statement of each non-empty block, walking through empty blocks
/// transitively. An empty block with no non-empty ancestor contributes no
/// edge.
fn chain_across_blocks<'ctx>(
    function: FunctionValue<'ctx>,
    bounds: &FxHashMap<ValueToken, (InstructionValue<'ctx>, InstructionValue<'ctx>)>,
    repo: &mut Repository<'ctx>,
) {
    // The C API has no predecessor iterator; invert the successor edges in
    // block layout order, which is deterministic for a given module.
    let mut predecessors: FxHashMap<ValueToken, Vec<BasicBlock<'ctx>>> = FxHashMap::default();
    for block in llvm::blocks(function) {
        for succ in llvm::successor_blocks(block) {
            predecessors
                .entry(ValueToken::of_block(succ))
                .or_default()
                .push(block);
        }
    }

    for block in llvm::blocks(function) {
        let Some((first, _)) = bounds.get(&ValueToken::of_block(block)) else {
            continue;
        };

        let mut queue: VecDeque<BasicBlock<'ctx>> = VecDeque::new();
        // Guards against cycles formed entirely of empty blocks; it does not
        // suppress duplicate edges from convergent empty paths.
        let mut expanded: FxHashSet<ValueToken> = FxHashSet::default();

        if let Some(preds) = predecessors.get(&ValueToken::of_block(block)) {
            queue.extend(preds.iter().copied());
        }

        while let Some(pred) = queue.pop_front() {
            let pred_key = ValueToken::of_block(pred);
            match bounds.get(&pred_key) {
                Some((_, last)) => repo.add_successor(*last, *first),
                None => {
                    // Empty block: look through it at its own predecessors.
                    if expanded.insert(pred_key) {
                        if let Some(preds) = predecessors.get(&pred_key) {
                            queue.extend(preds.iter().copied());
                        }
                    }
                }
            }
        }
    }
}

/// Classifies one instruction, producing its statement record if it is one
/// of the recognized kinds.
fn statement_for<'ctx>(
    function: FunctionValue<'ctx>,
    instr: InstructionValue<'ctx>,
) -> Result<Option<Statement<'ctx>>, LocationError> {
    let output = match instr.get_opcode() {
        InstructionOpcode::Return | InstructionOpcode::Switch | InstructionOpcode::Invoke => None,
        // Unconditional branches merely glue blocks together.
        InstructionOpcode::Br if instr.get_num_operands() == 3 => None,
        InstructionOpcode::Br => return Ok(None),
        InstructionOpcode::Store => {
            let destination = llvm::operand(&instr, 1).and_then(value_access);
            if destination.is_none() {
                warn!(?instr, "store destination did not resolve to an access");
            }
            destination
        }
        InstructionOpcode::Call => {
            if llvm::is_debug_intrinsic(&instr) {
                return Ok(None);
            }
            if llvm::is_void_typed(&instr) {
                None
            } else {
                llvm::as_basic_value(&instr).map(Access::scalar)
            }
        }
        _ => return Ok(None),
    };

    let loc = location::instr_location(function, &instr)?;

    Ok(Some(Statement {
        instr,
        inputs: find_inputs(&instr),
        output,
        loc,
    }))
}

/// Resolves the access an SSA value stands for, if any.
///
/// Local allocations, call results and mutable globals are scalar
/// variables. Pointer arithmetic yields a structural or array-like access
/// over its resolved base. A load of a pointer is an opaque dereference,
/// modelled as an element access with no known index. Constant globals and
/// everything else name no variable.
fn value_access<'ctx>(value: BasicValueEnum<'ctx>) -> Option<Access<'ctx>> {
    if llvm::is_alloca(&value) || llvm::is_call(&value) {
        return Some(Access::scalar(value));
    }

    if llvm::is_global_variable(&value) {
        // A global marked constant is immutable for the whole execution and
        // is not treated as a variable.
        if llvm::is_global_constant(&value) {
            return None;
        }
        return Some(Access::scalar(value));
    }

    if llvm::is_gep_instruction(&value) {
        let gep = llvm::as_instruction(&value)?;
        let is_struct = llvm::gep_indexes_struct(&gep);

        let base = composite_base(&gep)?;
        let mut accessors = composite_accessors(&gep, is_struct);

        return if is_struct {
            if accessors.is_empty() {
                warn!(?gep, "struct access without a field selector");
                return None;
            }
            Some(Access::structural(base, accessors.remove(0)))
        } else {
            Some(Access::array_like(base, accessors))
        };
    }

    if llvm::is_inbounds_const_gep(&value) {
        // Assignment into a static array at a compile-time-known index. The
        // constant index would not count as an index variable, hence the
        // empty list.
        let base = llvm::operand(&value, 0).and_then(value_access)?;
        return Some(Access::array_like(base, Vec::new()));
    }

    if llvm::is_load(&value) && llvm::is_pointer_typed(&value) {
        // Dereferencing a pointer; there is no index information to keep.
        let base = llvm::operand(&value, 0).and_then(value_access)?;
        return Some(Access::array_like(base, Vec::new()));
    }

    None
}

/// The base "pointer" of a composite access: the array or record itself.
fn composite_base<'ctx>(gep: &InstructionValue<'ctx>) -> Option<Access<'ctx>> {
    let base = llvm::operand(gep, 0)?;

    if llvm::is_gep_instruction(&base) {
        return value_access(base);
    }

    if let Some(instr) = llvm::as_instruction(&base) {
        if llvm::is_alloca(&base) {
            return Some(Access::scalar(base));
        }
        // Recover the allocation through intervening loads and arithmetic;
        // anything but exactly one candidate leaves the base undetermined.
        let inputs = find_inputs(&instr);
        if inputs.len() == 1 {
            return inputs.into_iter().next();
        }
        return None;
    }

    if llvm::is_global_variable(&base) {
        return Some(Access::scalar(base));
    }

    None
}

/// The values selecting into a composite: the field number of a record
/// access or the index variables of an array-like access. Constant array
/// indices are dropped; constant field numbers are kept, field selectors
/// are numeric by construction.
fn composite_accessors<'ctx>(
    gep: &InstructionValue<'ctx>,
    is_struct: bool,
) -> Vec<Access<'ctx>> {
    let mut result = Vec::new();
    let Some(last) = llvm::operand(gep, llvm::num_operands(gep) - 1) else {
        return result;
    };

    if let Some(access) = value_access(last) {
        result.push(access);
    } else if llvm::is_constant(&last) {
        if is_struct {
            result.push(Access::scalar(last));
        }
    } else if let Some(instr) = llvm::as_instruction(&last) {
        for input in find_inputs(&instr) {
            result.push(input);
        }
    }

    result
}

/// Collects the use-set of a statement by breadth-first backward traversal
/// over SSA operands. A value that resolves to an access absorbs its whole
/// operand subtree; transitive values (loads, arithmetic, conversions) are
/// descended into. For a store, only the stored value is traversed: the
/// destination is excluded from the use-set by design.
fn find_inputs<'ctx>(instr: &InstructionValue<'ctx>) -> AccessSet<'ctx> {
    // Revisiting a value through a second operand path cannot add anything,
    // and phi cycles would otherwise never terminate.
    fn enqueue<'ctx>(
        queue: &mut VecDeque<BasicValueEnum<'ctx>>,
        seen: &mut FxHashSet<ValueToken>,
        value: BasicValueEnum<'ctx>,
    ) {
        if is_traversal_candidate(&value) && seen.insert(ValueToken::of(&value)) {
            queue.push_back(value);
        }
    }

    let mut result = AccessSet::new();
    let mut queue: VecDeque<BasicValueEnum<'ctx>> = VecDeque::new();
    let mut seen: FxHashSet<ValueToken> = FxHashSet::default();

    if instr.get_opcode() == InstructionOpcode::Store {
        if let Some(stored) = llvm::operand(instr, 0) {
            enqueue(&mut queue, &mut seen, stored);
        }
    } else {
        for op in llvm::operands(instr) {
            enqueue(&mut queue, &mut seen, op);
        }
    }

    while let Some(value) = queue.pop_front() {
        if let Some(access) = value_access(value) {
            result.insert(access);
            continue;
        }
        for op in llvm::operands(&value) {
            enqueue(&mut queue, &mut seen, op);
        }
    }

    result
}

/// Values worth walking through: instruction results, global variables and
/// constant expressions. Plain constants, arguments and labels end the
/// traversal.
fn is_traversal_candidate(value: &BasicValueEnum<'_>) -> bool {
    llvm::is_instruction(value) || llvm::is_global_variable(value) || llvm::is_constant_expr(value)
}
