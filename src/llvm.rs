// SPDX-License-Identifier: BSD-3-Clause
//! Shim over the LLVM C API for the queries the analysis needs. `inkwell`
//! covers module traversal and IR mutation, but not value-subclass tests,
//! debug-location reads or GEP type queries; those go through `llvm_sys`
//! directly. Every `unsafe` block of the crate lives in this module, and the
//! rest of the code consumes only the safe wrappers exported here.
//!
//! Lifetimes follow inkwell's convention: a `BasicValueEnum<'ctx>` handed to
//! or returned from these functions is valid as long as the `Context` that
//! owns the module is.

use std::os::raw::c_uint;

use inkwell::basic_block::BasicBlock;
use inkwell::values::{
    ArrayValue, AsValueRef, BasicValueEnum, FloatValue, FunctionValue, InstructionValue, IntValue,
    PointerValue, StructValue, VectorValue,
};
use llvm_sys::core::{
    LLVMGetConstOpcode, LLVMGetDebugLocColumn, LLVMGetDebugLocDirectory, LLVMGetDebugLocFilename,
    LLVMGetDebugLocLine, LLVMGetGEPSourceElementType, LLVMGetIntTypeWidth, LLVMGetMDNodeNumOperands,
    LLVMGetMDNodeOperands, LLVMGetNumOperands, LLVMGetOperand, LLVMGetTypeKind, LLVMIsAAllocaInst,
    LLVMIsAArgument, LLVMIsACallInst, LLVMIsAConstant, LLVMIsAConstantExpr, LLVMIsADbgDeclareInst,
    LLVMIsADbgInfoIntrinsic, LLVMIsAGetElementPtrInst, LLVMIsAGlobalVariable, LLVMIsAInstruction,
    LLVMIsALoadInst, LLVMIsATerminatorInst, LLVMIsGlobalConstant, LLVMIsInBounds, LLVMTypeOf,
};
use llvm_sys::prelude::LLVMValueRef;
use llvm_sys::{LLVMOpcode, LLVMTypeKind};

/// Stable identity token for an SSA value (or basic block) within a module.
///
/// The raw handle is a pointer into LLVM's arena and is unique for the
/// lifetime of the module, which is exactly the lifetime of every table keyed
/// on it. It is never dereferenced, only compared and hashed.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ValueToken(usize);

impl std::fmt::Debug for ValueToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl ValueToken {
    pub fn of(value: &impl AsValueRef) -> Self {
        ValueToken(value.as_value_ref() as usize)
    }

    pub fn of_block(block: BasicBlock<'_>) -> Self {
        ValueToken(block.as_mut_ptr() as usize)
    }
}

fn raw(value: &impl AsValueRef) -> LLVMValueRef {
    value.as_value_ref()
}

/// Reconstructs a typed `BasicValueEnum` from a raw operand handle. Returns
/// `None` for operands that are not first-class values (labels, metadata).
///
/// Safety: the caller guarantees the handle belongs to a live module of the
/// context `'ctx` is borrowed from; all call sites in this module obtain the
/// handle from a value that already carries that lifetime.
unsafe fn basic_value<'ctx>(value: LLVMValueRef) -> Option<BasicValueEnum<'ctx>> {
    if value.is_null() {
        return None;
    }
    match LLVMGetTypeKind(LLVMTypeOf(value)) {
        LLVMTypeKind::LLVMIntegerTypeKind => Some(IntValue::new(value).into()),
        LLVMTypeKind::LLVMHalfTypeKind
        | LLVMTypeKind::LLVMFloatTypeKind
        | LLVMTypeKind::LLVMDoubleTypeKind
        | LLVMTypeKind::LLVMX86_FP80TypeKind
        | LLVMTypeKind::LLVMFP128TypeKind
        | LLVMTypeKind::LLVMPPC_FP128TypeKind => Some(FloatValue::new(value).into()),
        LLVMTypeKind::LLVMPointerTypeKind => Some(PointerValue::new(value).into()),
        LLVMTypeKind::LLVMStructTypeKind => Some(StructValue::new(value).into()),
        LLVMTypeKind::LLVMArrayTypeKind => Some(ArrayValue::new(value).into()),
        LLVMTypeKind::LLVMVectorTypeKind => Some(VectorValue::new(value).into()),
        _ => None,
    }
}

/// Operands of any `User` value (instruction, constant expression, global
/// variable), in operand order, skipping non-value operands such as branch
/// target labels and metadata arguments.
pub fn operands<'ctx>(value: &impl AsValueRef) -> Vec<BasicValueEnum<'ctx>> {
    let value = raw(value);
    let mut result = Vec::new();
    unsafe {
        for i in 0..LLVMGetNumOperands(value) {
            if let Some(op) = basic_value(LLVMGetOperand(value, i as c_uint)) {
                result.push(op);
            }
        }
    }
    result
}

/// The `i`-th operand of a value, if it is a first-class value.
pub fn operand<'ctx>(value: &impl AsValueRef, i: u32) -> Option<BasicValueEnum<'ctx>> {
    unsafe { basic_value(LLVMGetOperand(raw(value), i)) }
}

pub fn num_operands(value: &impl AsValueRef) -> u32 {
    unsafe { LLVMGetNumOperands(raw(value)) as u32 }
}

/// Views an instruction's result as a first-class value. `None` for
/// instructions that produce nothing (stores, branches, void calls).
pub fn as_basic_value<'ctx>(instr: &InstructionValue<'ctx>) -> Option<BasicValueEnum<'ctx>> {
    unsafe { basic_value(raw(instr)) }
}

/// Views a value as the instruction that computes it, if any.
pub fn as_instruction<'ctx>(value: &impl AsValueRef) -> Option<InstructionValue<'ctx>> {
    unsafe {
        let v = raw(value);
        if LLVMIsAInstruction(v).is_null() {
            None
        } else {
            Some(InstructionValue::new(v))
        }
    }
}

pub fn is_instruction(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsAInstruction(raw(value)).is_null() }
}

pub fn is_alloca(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsAAllocaInst(raw(value)).is_null() }
}

pub fn is_call(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsACallInst(raw(value)).is_null() }
}

pub fn is_load(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsALoadInst(raw(value)).is_null() }
}

pub fn is_gep_instruction(value: &impl AsValueRef) -> bool {
    unsafe {
        let v = raw(value);
        !LLVMIsAGetElementPtrInst(v).is_null() && !LLVMIsAInstruction(v).is_null()
    }
}

pub fn is_global_variable(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsAGlobalVariable(raw(value)).is_null() }
}

/// True for globals marked `constant`, i.e. immutable for the whole
/// execution. Only meaningful when `is_global_variable` holds.
pub fn is_global_constant(value: &impl AsValueRef) -> bool {
    unsafe { LLVMIsGlobalConstant(raw(value)) != 0 }
}

pub fn is_constant(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsAConstant(raw(value)).is_null() }
}

pub fn is_constant_expr(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsAConstantExpr(raw(value)).is_null() }
}

pub fn is_argument(value: &impl AsValueRef) -> bool {
    unsafe { !LLVMIsAArgument(raw(value)).is_null() }
}

pub fn is_debug_intrinsic(instr: &InstructionValue<'_>) -> bool {
    unsafe { !LLVMIsADbgInfoIntrinsic(raw(instr)).is_null() }
}

pub fn is_dbg_declare(instr: &InstructionValue<'_>) -> bool {
    unsafe { !LLVMIsADbgDeclareInst(raw(instr)).is_null() }
}

pub fn is_terminator(instr: &InstructionValue<'_>) -> bool {
    unsafe { !LLVMIsATerminatorInst(raw(instr)).is_null() }
}

/// True for a constant GEP expression whose indexing provably stays within
/// the object, which is what a constant-indexed access to a static array
/// compiles to.
pub fn is_inbounds_const_gep(value: &impl AsValueRef) -> bool {
    unsafe {
        let v = raw(value);
        !LLVMIsAConstantExpr(v).is_null()
            && matches!(LLVMGetConstOpcode(v), LLVMOpcode::LLVMGetElementPtr)
            && LLVMIsInBounds(v) != 0
    }
}

/// Whether a GEP instruction indexes into a struct (field access) rather
/// than array-like memory.
pub fn gep_indexes_struct(gep: &InstructionValue<'_>) -> bool {
    unsafe {
        matches!(
            LLVMGetTypeKind(LLVMGetGEPSourceElementType(raw(gep))),
            LLVMTypeKind::LLVMStructTypeKind
        )
    }
}

pub fn is_pointer_typed(value: &impl AsValueRef) -> bool {
    unsafe {
        matches!(
            LLVMGetTypeKind(LLVMTypeOf(raw(value))),
            LLVMTypeKind::LLVMPointerTypeKind
        )
    }
}

pub fn is_void_typed(value: &impl AsValueRef) -> bool {
    unsafe {
        matches!(
            LLVMGetTypeKind(LLVMTypeOf(raw(value))),
            LLVMTypeKind::LLVMVoidTypeKind
        )
    }
}

/// Primitive value shapes the runtime ABI can record directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// Classifies a value's IR type into the primitive the tracers understand.
/// Signedness does not exist at the type level, so there is none here either.
pub fn primitive_type(value: &impl AsValueRef) -> Option<PrimitiveType> {
    unsafe {
        let ty = LLVMTypeOf(raw(value));
        match LLVMGetTypeKind(ty) {
            LLVMTypeKind::LLVMIntegerTypeKind => match LLVMGetIntTypeWidth(ty) {
                1 => Some(PrimitiveType::Bool),
                8 => Some(PrimitiveType::I8),
                16 => Some(PrimitiveType::I16),
                32 => Some(PrimitiveType::I32),
                64 => Some(PrimitiveType::I64),
                _ => None,
            },
            LLVMTypeKind::LLVMFloatTypeKind => Some(PrimitiveType::F32),
            LLVMTypeKind::LLVMDoubleTypeKind => Some(PrimitiveType::F64),
            _ => None,
        }
    }
}

/// A raw `(directory, filename, line, column)` read of an instruction's
/// debug location. Present only when the location has a valid scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawDebugLoc {
    pub directory: String,
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

pub fn debug_loc(instr: &InstructionValue<'_>) -> Option<RawDebugLoc> {
    let value = raw(instr);
    unsafe {
        let mut name_len: c_uint = 0;
        let name_ptr = LLVMGetDebugLocFilename(value, &mut name_len);
        if name_ptr.is_null() || name_len == 0 {
            // No debug location, or one whose scope was stripped.
            return None;
        }
        let mut dir_len: c_uint = 0;
        let dir_ptr = LLVMGetDebugLocDirectory(value, &mut dir_len);
        let filename = string_from_parts(name_ptr, name_len);
        let directory = if dir_ptr.is_null() {
            String::new()
        } else {
            string_from_parts(dir_ptr, dir_len)
        };
        Some(RawDebugLoc {
            directory,
            filename,
            line: LLVMGetDebugLocLine(value),
            column: LLVMGetDebugLocColumn(value),
        })
    }
}

unsafe fn string_from_parts(ptr: *const std::os::raw::c_char, len: c_uint) -> String {
    let bytes = std::slice::from_raw_parts(ptr as *const u8, len as usize);
    String::from_utf8_lossy(bytes).into_owned()
}

/// The storage value a `llvm.dbg.declare` call describes. The first operand
/// of the intrinsic wraps the alloca in value-as-metadata; the MDNode operand
/// accessors unwrap exactly that shape.
pub fn dbg_declare_subject(instr: &InstructionValue<'_>) -> Option<ValueToken> {
    debug_assert!(is_dbg_declare(instr));
    unsafe {
        let wrapped = LLVMGetOperand(raw(instr), 0);
        if wrapped.is_null() || LLVMGetMDNodeNumOperands(wrapped) != 1 {
            return None;
        }
        let mut subject: LLVMValueRef = std::ptr::null_mut();
        LLVMGetMDNodeOperands(wrapped, &mut subject);
        if subject.is_null() {
            None
        } else {
            Some(ValueToken(subject as usize))
        }
    }
}

/// Basic blocks of a function in layout order.
pub fn blocks<'ctx>(function: FunctionValue<'ctx>) -> impl Iterator<Item = BasicBlock<'ctx>> {
    let mut next = function.get_first_basic_block();
    std::iter::from_fn(move || {
        let current = next?;
        next = current.get_next_basic_block();
        Some(current)
    })
}

/// Instructions of a basic block in order.
pub fn instructions<'ctx>(block: BasicBlock<'ctx>) -> impl Iterator<Item = InstructionValue<'ctx>> {
    let mut next = block.get_first_instruction();
    std::iter::from_fn(move || {
        let current = next?;
        next = current.get_next_instruction();
        Some(current)
    })
}

/// Successor blocks of a block's terminator, in terminator operand order.
/// Blocks without a terminator (malformed input) have no successors.
pub fn successor_blocks<'ctx>(block: BasicBlock<'ctx>) -> Vec<BasicBlock<'ctx>> {
    let Some(terminator) = block.get_terminator() else {
        return Vec::new();
    };
    let mut result = Vec::new();
    for i in 0..terminator.get_num_operands() {
        if let Some(either::Either::Right(succ)) = terminator.get_operand(i) {
            result.push(succ);
        }
    }
    result
}

/// Whether the function has a body in this module.
pub fn is_defined(function: &FunctionValue<'_>) -> bool {
    function.count_basic_blocks() > 0
}
