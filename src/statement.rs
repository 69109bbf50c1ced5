// SPDX-License-Identifier: BSD-3-Clause
//! The statement record: one per IR instruction elevated to user-visible
//! granularity, with its use-set, optional def and source location. Built
//! once during detection and immutable afterwards.

use inkwell::values::{InstructionOpcode, InstructionValue};

use crate::access::{Access, AccessSet};
use crate::llvm;
use crate::location::Location;

/// Metadata bits as they appear in the artifact.
pub mod meta {
    pub const ARG: u8 = 0x61;
    pub const RET: u8 = 0x62;
    pub const CALL: u8 = 0x64;
}

#[derive(Clone, Debug)]
pub struct Statement<'ctx> {
    /// The instruction this statement stands for.
    pub instr: InstructionValue<'ctx>,
    /// Variables the statement reads.
    pub inputs: AccessSet<'ctx>,
    /// The variable the statement writes, when it writes one.
    pub output: Option<Access<'ctx>>,
    /// Where the statement sits in the original source.
    pub loc: Location,
}

impl<'ctx> Statement<'ctx> {
    /// True for the store that spills a function argument into its local
    /// allocation.
    pub fn is_arg(&self) -> bool {
        self.instr.get_opcode() == InstructionOpcode::Store
            && llvm::operand(&self.instr, 0).is_some_and(|stored| llvm::is_argument(&stored))
    }

    pub fn is_ret(&self) -> bool {
        self.instr.get_opcode() == InstructionOpcode::Return
    }

    /// True for plain call instructions only; invokes are statements but
    /// never carry the call flag.
    pub fn is_call(&self) -> bool {
        self.instr.get_opcode() == InstructionOpcode::Call
    }

    /// Bitwise OR of the [`meta`] flags, as serialized.
    pub fn meta_bits(&self) -> u8 {
        let mut bits = 0;
        if self.is_arg() {
            bits |= meta::ARG;
        }
        if self.is_ret() {
            bits |= meta::RET;
        }
        if self.is_call() {
            bits |= meta::CALL;
        }
        bits
    }
}
