// SPDX-License-Identifier: BSD-3-Clause
//! Run-time tracing instrumentation. Every detected statement gets a call
//! to `aardwolf_write_statement` inserted immediately before it; statements
//! that define a value additionally get a typed data tracer capturing the
//! defined value. Tracer declarations are added to the module on demand and
//! resolved by the host build against the runtime library.

use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{
    BasicValueEnum, FunctionValue, InstructionOpcode, InstructionValue,
};
use tracing::info;

use crate::llvm::{self, PrimitiveType};
use crate::repository::Repository;

pub const WRITE_STATEMENT: &str = "aardwolf_write_statement";
pub const WRITE_DATA_UNSUPPORTED: &str = "aardwolf_write_data_unsupported";

/// Rewrites the module in place, adding trace calls for every statement in
/// the repository. The inserted calls only observe existing values; the
/// original data flow is untouched.
pub fn instrument_module<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    repo: &Repository<'ctx>,
) -> Result<(), BuilderError> {
    let builder = context.create_builder();
    let mut inserted = 0usize;

    for function in module.get_functions() {
        if !llvm::is_defined(&function) {
            continue;
        }

        for instr in repo.statements_of(function).to_vec() {
            let Some(id) = repo.statement_id(&instr) else {
                continue;
            };

            // Statement instructions are often terminators, so the
            // statement tracer always goes in front.
            let write_statement = statement_tracer(context, module);
            builder.position_before(&instr);
            builder.build_call(
                write_statement,
                &[context.i64_type().const_int(id.counter, false).into()],
                "",
            )?;
            inserted += 1;

            let defines = repo
                .statement(&instr)
                .is_some_and(|stmt| stmt.output.is_some());
            if defines {
                insert_data_tracer(context, module, &builder, instr)?;
            }
        }
    }

    info!(calls = inserted, "instrumentation inserted");
    Ok(())
}

/// Emits the typed tracer for a defining statement. The captured value is
/// the stored operand for stores and the returned value for calls; it is
/// recorded after the instruction (so calls trace their actual result),
/// except for terminators, where only the slot before the instruction is
/// available.
fn insert_data_tracer<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    builder: &Builder<'ctx>,
    instr: InstructionValue<'ctx>,
) -> Result<(), BuilderError> {
    let Some(value) = defined_value(instr) else {
        return Ok(());
    };

    if llvm::is_terminator(&instr) {
        builder.position_before(&instr);
    } else {
        position_after(builder, instr);
    }

    match llvm::primitive_type(&value) {
        Some(primitive) => {
            let tracer = data_tracer(context, module, primitive);
            builder.build_call(tracer, &[value.into()], "")?;
        }
        None => {
            let tracer = unsupported_tracer(context, module);
            builder.build_call(tracer, &[], "")?;
        }
    }
    Ok(())
}

/// The SSA value a defining statement produces: the stored value of a store
/// or the result of a non-void call.
fn defined_value(instr: InstructionValue<'_>) -> Option<BasicValueEnum<'_>> {
    match instr.get_opcode() {
        InstructionOpcode::Store => llvm::operand(&instr, 0),
        InstructionOpcode::Call if !llvm::is_void_typed(&instr) => llvm::as_basic_value(&instr),
        _ => None,
    }
}

fn position_after<'ctx>(builder: &Builder<'ctx>, instr: InstructionValue<'ctx>) {
    match instr.get_next_instruction() {
        Some(next) => builder.position_before(&next),
        None => {
            if let Some(block) = instr.get_parent() {
                builder.position_at_end(block);
            }
        }
    }
}

fn statement_tracer<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let fn_type = context
        .void_type()
        .fn_type(&[context.i64_type().into()], false);
    declare(module, WRITE_STATEMENT, fn_type)
}

fn unsupported_tracer<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let fn_type = context.void_type().fn_type(&[], false);
    declare(module, WRITE_DATA_UNSUPPORTED, fn_type)
}

fn data_tracer<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    primitive: PrimitiveType,
) -> FunctionValue<'ctx> {
    let (name, param) = match primitive {
        PrimitiveType::Bool => ("aardwolf_write_data_bool", context.bool_type().into()),
        PrimitiveType::I8 => ("aardwolf_write_data_i8", context.i8_type().into()),
        PrimitiveType::I16 => ("aardwolf_write_data_i16", context.i16_type().into()),
        PrimitiveType::I32 => ("aardwolf_write_data_i32", context.i32_type().into()),
        PrimitiveType::I64 => ("aardwolf_write_data_i64", context.i64_type().into()),
        PrimitiveType::F32 => ("aardwolf_write_data_f32", context.f32_type().into()),
        PrimitiveType::F64 => ("aardwolf_write_data_f64", context.f64_type().into()),
    };
    let fn_type = context.void_type().fn_type(&[param], false);
    declare(module, name, fn_type)
}

fn declare<'ctx>(
    module: &Module<'ctx>,
    name: &str,
    fn_type: inkwell::types::FunctionType<'ctx>,
) -> FunctionValue<'ctx> {
    module
        .get_function(name)
        .unwrap_or_else(|| module.add_function(name, fn_type, None))
}
