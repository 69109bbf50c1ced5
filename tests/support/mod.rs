// SPDX-License-Identifier: BSD-3-Clause
//! Shared fixtures: IR modules built in-process the way clang would emit
//! them at -O0 with debug info, so the tests do not depend on a host
//! compiler.

use inkwell::context::Context;
use inkwell::debug_info::{
    AsDIScope, DICompileUnit, DIFlags, DIFlagsConstants, DISubprogram, DWARFEmissionKind,
    DWARFSourceLanguage, DebugInfoBuilder,
};
use inkwell::module::{FlagBehavior, Module};
use inkwell::values::{FunctionValue, PointerValue};

pub const TEST_DIR: &str = "/aardwolf-tests";

/// A module plus the debug-info machinery needed to give instructions
/// source locations.
pub struct DiModule<'ctx> {
    pub module: Module<'ctx>,
    pub di: DebugInfoBuilder<'ctx>,
    pub cu: DICompileUnit<'ctx>,
}

impl<'ctx> DiModule<'ctx> {
    pub fn new(context: &'ctx Context, name: &str) -> Self {
        let module = context.create_module(name);
        module.add_basic_value_flag(
            "Debug Info Version",
            FlagBehavior::Warning,
            context.i32_type().const_int(3, false),
        );
        let (di, cu) = module.create_debug_info_builder(
            /* allow_unresolved */ true,
            /* language */ DWARFSourceLanguage::C,
            /* filename */ &format!("{name}.c"),
            /* directory */ TEST_DIR,
            /* producer */ "aardwolf-tests",
            /* is_optimized */ false,
            /* flags */ "",
            /* runtime_ver */ 0,
            /* split_name */ "",
            /* kind */ DWARFEmissionKind::Full,
            /* dwo_id */ 0,
            /* split_debug_inlining */ false,
            /* debug_info_for_profiling */ false,
            /* sysroot */ "",
            /* sdk */ "",
        );
        DiModule { module, di, cu }
    }

    pub fn attach_subprogram(
        &self,
        function: FunctionValue<'ctx>,
        name: &str,
        line: u32,
    ) -> DISubprogram<'ctx> {
        let int_ty = self
            .di
            .create_basic_type("int", 32, 0x05, DIFlags::ZERO)
            .unwrap()
            .as_type();
        let subroutine =
            self.di
                .create_subroutine_type(self.cu.get_file(), Some(int_ty), &[], DIFlags::ZERO);
        let subprogram = self.di.create_function(
            self.cu.as_debug_info_scope(),
            name,
            None,
            self.cu.get_file(),
            line,
            subroutine,
            true,
            true,
            line,
            DIFlags::ZERO,
            false,
        );
        function.set_subprogram(subprogram);
        subprogram
    }

    /// Sets the location stamped on instructions built from here on.
    pub fn set_loc(
        &self,
        context: &'ctx Context,
        builder: &inkwell::builder::Builder<'ctx>,
        subprogram: DISubprogram<'ctx>,
        line: u32,
        col: u32,
    ) {
        let loc = self.di.create_debug_location(
            context,
            line,
            col,
            subprogram.as_debug_info_scope(),
            None,
        );
        builder.set_current_debug_location(loc);
    }

    /// Emits the `llvm.dbg.declare` describing a parameter's allocation,
    /// the way clang records parameter spills.
    pub fn declare_param(
        &self,
        context: &'ctx Context,
        subprogram: DISubprogram<'ctx>,
        alloca: PointerValue<'ctx>,
        name: &str,
        arg_no: u32,
        line: u32,
        block: inkwell::basic_block::BasicBlock<'ctx>,
    ) {
        let int_ty = self
            .di
            .create_basic_type("int", 32, 0x05, DIFlags::ZERO)
            .unwrap()
            .as_type();
        let scope = subprogram.as_debug_info_scope();
        let variable = self.di.create_parameter_variable(
            scope,
            name,
            arg_no,
            self.cu.get_file(),
            line,
            int_ty,
            true,
            DIFlags::ZERO,
        );
        let loc = self
            .di
            .create_debug_location(context, line, 0, scope, None);
        self.di.insert_declare_at_end(
            alloca,
            Some(variable),
            Some(self.di.create_expression(vec![])),
            loc,
            block,
        );
    }

    pub fn finalize(&self) {
        self.di.finalize();
    }
}

/// `int square(int n) { return n * n; }`, as clang emits it at -O0: the
/// parameter spill store has no debug location of its own, only the
/// `llvm.dbg.declare` on its allocation.
pub fn square_module<'ctx>(context: &'ctx Context) -> Module<'ctx> {
    let fixture = DiModule::new(context, "square");
    let builder = context.create_builder();
    let i32_type = context.i32_type();

    let fn_type = i32_type.fn_type(&[i32_type.into()], false);
    let function = fixture.module.add_function("square", fn_type, None);
    let subprogram = fixture.attach_subprogram(function, "square", 1);

    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let n_addr = builder.build_alloca(i32_type, "n.addr").unwrap();
    builder
        .build_store(n_addr, function.get_nth_param(0).unwrap())
        .unwrap();
    fixture.declare_param(context, subprogram, n_addr, "n", 1, 1, entry);

    fixture.set_loc(context, &builder, subprogram, 1, 30);
    let n = builder
        .build_load(n_addr, "n")
        .unwrap()
        .into_int_value();
    let product = builder.build_int_mul(n, n, "mul").unwrap();
    builder.build_return(Some(&product)).unwrap();

    fixture.finalize();
    fixture.module
}

/// `int choose(int c) { int v; if (c) { v = 1; } else { v = 2; } return v; }`
pub fn branch_module<'ctx>(context: &'ctx Context) -> Module<'ctx> {
    let fixture = DiModule::new(context, "choose");
    let builder = context.create_builder();
    let i32_type = context.i32_type();

    let fn_type = i32_type.fn_type(&[i32_type.into()], false);
    let function = fixture.module.add_function("choose", fn_type, None);
    let subprogram = fixture.attach_subprogram(function, "choose", 1);

    let entry = context.append_basic_block(function, "entry");
    let then_block = context.append_basic_block(function, "if.then");
    let else_block = context.append_basic_block(function, "if.else");
    let merge = context.append_basic_block(function, "if.end");

    builder.position_at_end(entry);
    let c_addr = builder.build_alloca(i32_type, "c.addr").unwrap();
    builder
        .build_store(c_addr, function.get_nth_param(0).unwrap())
        .unwrap();
    fixture.declare_param(context, subprogram, c_addr, "c", 1, 1, entry);
    let v_addr = builder.build_alloca(i32_type, "v").unwrap();

    fixture.set_loc(context, &builder, subprogram, 3, 7);
    let c = builder
        .build_load(c_addr, "c")
        .unwrap()
        .into_int_value();
    let cond = builder
        .build_int_compare(
            inkwell::IntPredicate::NE,
            c,
            i32_type.const_int(0, false),
            "tobool",
        )
        .unwrap();
    builder
        .build_conditional_branch(cond, then_block, else_block)
        .unwrap();

    builder.position_at_end(then_block);
    fixture.set_loc(context, &builder, subprogram, 4, 7);
    builder.build_store(v_addr, i32_type.const_int(1, false)).unwrap();
    builder.build_unconditional_branch(merge).unwrap();

    builder.position_at_end(else_block);
    fixture.set_loc(context, &builder, subprogram, 6, 7);
    builder.build_store(v_addr, i32_type.const_int(2, false)).unwrap();
    builder.build_unconditional_branch(merge).unwrap();

    builder.position_at_end(merge);
    fixture.set_loc(context, &builder, subprogram, 8, 3);
    let v = builder
        .build_load(v_addr, "v")
        .unwrap()
        .into_int_value();
    builder.build_return(Some(&v)).unwrap();

    fixture.finalize();
    fixture.module
}

/// `struct foo { int bar, baz; }; void copy() { struct foo f; f.bar = f.baz; }`
pub fn struct_module<'ctx>(context: &'ctx Context) -> Module<'ctx> {
    let fixture = DiModule::new(context, "structure");
    let builder = context.create_builder();
    let i32_type = context.i32_type();
    let foo = context.struct_type(&[i32_type.into(), i32_type.into()], false);

    let fn_type = context.void_type().fn_type(&[], false);
    let function = fixture.module.add_function("copy", fn_type, None);
    let subprogram = fixture.attach_subprogram(function, "copy", 1);

    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let f = builder.build_alloca(foo, "f").unwrap();
    fixture.set_loc(context, &builder, subprogram, 2, 9);
    let baz_ptr = builder.build_struct_gep(f, 1, "baz").unwrap();
    let baz = builder.build_load(baz_ptr, "load.baz").unwrap();
    let bar_ptr = builder.build_struct_gep(f, 0, "bar").unwrap();
    builder.build_store(bar_ptr, baz).unwrap();
    builder.build_return(None).unwrap();

    fixture.finalize();
    fixture.module
}

/// `void fill(int i) { int a[3]; a[0] = 100; a[i] = 200; }` with the first
/// store using constant indices and the second a variable index.
pub fn array_module<'ctx>(context: &'ctx Context) -> Module<'ctx> {
    let fixture = DiModule::new(context, "arrays");
    let builder = context.create_builder();
    let i32_type = context.i32_type();
    let i64_type = context.i64_type();
    let array_type = i32_type.array_type(3);

    let fn_type = context.void_type().fn_type(&[i32_type.into()], false);
    let function = fixture.module.add_function("fill", fn_type, None);
    let subprogram = fixture.attach_subprogram(function, "fill", 1);

    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let i_addr = builder.build_alloca(i32_type, "i.addr").unwrap();
    builder
        .build_store(i_addr, function.get_nth_param(0).unwrap())
        .unwrap();
    fixture.declare_param(context, subprogram, i_addr, "i", 1, 1, entry);
    let a = builder.build_alloca(array_type, "a").unwrap();

    fixture.set_loc(context, &builder, subprogram, 3, 8);
    let zero = i64_type.const_int(0, false);
    let first = unsafe {
        builder
            .build_in_bounds_gep(a, &[zero, zero], "first")
            .unwrap()
    };
    builder
        .build_store(first, i32_type.const_int(100, false))
        .unwrap();

    fixture.set_loc(context, &builder, subprogram, 4, 8);
    let i = builder
        .build_load(i_addr, "i")
        .unwrap()
        .into_int_value();
    let index = builder
        .build_int_s_extend(i, i64_type, "idxprom")
        .unwrap();
    let at_i = unsafe {
        builder
            .build_in_bounds_gep(a, &[zero, index], "at_i")
            .unwrap()
    };
    builder
        .build_store(at_i, i32_type.const_int(200, false))
        .unwrap();
    builder.build_return(None).unwrap();

    fixture.finalize();
    fixture.module
}

/// A function whose middle block holds no statements, only an unconditional
/// branch: `store` and `ret` must chain straight through it.
pub fn empty_block_module<'ctx>(context: &'ctx Context) -> Module<'ctx> {
    let fixture = DiModule::new(context, "passthrough");
    let builder = context.create_builder();
    let i32_type = context.i32_type();

    let fn_type = context.void_type().fn_type(&[i32_type.into()], false);
    let function = fixture.module.add_function("passthrough", fn_type, None);
    let subprogram = fixture.attach_subprogram(function, "passthrough", 1);

    let entry = context.append_basic_block(function, "entry");
    let middle = context.append_basic_block(function, "middle");
    let exit = context.append_basic_block(function, "exit");

    builder.position_at_end(entry);
    let x_addr = builder.build_alloca(i32_type, "x.addr").unwrap();
    builder
        .build_store(x_addr, function.get_nth_param(0).unwrap())
        .unwrap();
    fixture.declare_param(context, subprogram, x_addr, "x", 1, 1, entry);
    builder.build_unconditional_branch(middle).unwrap();

    builder.position_at_end(middle);
    builder.build_unconditional_branch(exit).unwrap();

    builder.position_at_end(exit);
    fixture.set_loc(context, &builder, subprogram, 2, 1);
    builder.build_return(None).unwrap();

    fixture.finalize();
    fixture.module
}

/// `while (c) { n++; }` shaped control flow: the conditional branch fans
/// out to the loop body and the exit, and the body chains back to it.
pub fn loop_module<'ctx>(context: &'ctx Context) -> Module<'ctx> {
    let fixture = DiModule::new(context, "loops");
    let builder = context.create_builder();
    let i32_type = context.i32_type();

    let fn_type = context.void_type().fn_type(&[i32_type.into()], false);
    let function = fixture.module.add_function("spin", fn_type, None);
    let subprogram = fixture.attach_subprogram(function, "spin", 1);

    let entry = context.append_basic_block(function, "entry");
    let cond = context.append_basic_block(function, "while.cond");
    let body = context.append_basic_block(function, "while.body");
    let exit = context.append_basic_block(function, "while.end");

    builder.position_at_end(entry);
    let c_addr = builder.build_alloca(i32_type, "c.addr").unwrap();
    builder
        .build_store(c_addr, function.get_nth_param(0).unwrap())
        .unwrap();
    fixture.declare_param(context, subprogram, c_addr, "c", 1, 1, entry);
    let n_addr = builder.build_alloca(i32_type, "n").unwrap();
    fixture.set_loc(context, &builder, subprogram, 2, 7);
    builder
        .build_store(n_addr, i32_type.const_int(0, false))
        .unwrap();
    builder.build_unconditional_branch(cond).unwrap();

    builder.position_at_end(cond);
    fixture.set_loc(context, &builder, subprogram, 3, 10);
    let c = builder
        .build_load(c_addr, "c")
        .unwrap()
        .into_int_value();
    let stay = builder
        .build_int_compare(
            inkwell::IntPredicate::NE,
            c,
            i32_type.const_int(0, false),
            "tobool",
        )
        .unwrap();
    builder.build_conditional_branch(stay, body, exit).unwrap();

    builder.position_at_end(body);
    fixture.set_loc(context, &builder, subprogram, 3, 16);
    let n = builder
        .build_load(n_addr, "n")
        .unwrap()
        .into_int_value();
    let inc = builder
        .build_int_add(n, i32_type.const_int(1, false), "inc")
        .unwrap();
    builder.build_store(n_addr, inc).unwrap();
    builder.build_unconditional_branch(cond).unwrap();

    builder.position_at_end(exit);
    fixture.set_loc(context, &builder, subprogram, 4, 1);
    builder.build_return(None).unwrap();

    fixture.finalize();
    fixture.module
}

/// `void caller(int x) { int r = helper(x); }`: one call with a loaded
/// argument, its result stored into a local.
pub fn call_module<'ctx>(context: &'ctx Context) -> Module<'ctx> {
    let fixture = DiModule::new(context, "functions");
    let builder = context.create_builder();
    let i32_type = context.i32_type();

    let helper_type = i32_type.fn_type(&[i32_type.into()], false);
    let helper = fixture.module.add_function("helper", helper_type, None);

    let fn_type = context.void_type().fn_type(&[i32_type.into()], false);
    let function = fixture.module.add_function("caller", fn_type, None);
    let subprogram = fixture.attach_subprogram(function, "caller", 1);

    let entry = context.append_basic_block(function, "entry");
    builder.position_at_end(entry);

    let x_addr = builder.build_alloca(i32_type, "x.addr").unwrap();
    builder
        .build_store(x_addr, function.get_nth_param(0).unwrap())
        .unwrap();
    fixture.declare_param(context, subprogram, x_addr, "x", 1, 1, entry);
    let r_addr = builder.build_alloca(i32_type, "r").unwrap();

    fixture.set_loc(context, &builder, subprogram, 2, 11);
    let x = builder.build_load(x_addr, "x").unwrap();
    let call = builder
        .build_call(helper, &[x.into()], "call")
        .unwrap();
    let result = call.try_as_basic_value().left().unwrap();
    builder.build_store(r_addr, result).unwrap();
    builder.build_return(None).unwrap();

    fixture.finalize();
    fixture.module
}
