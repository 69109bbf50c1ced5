// SPDX-License-Identifier: BSD-3-Clause
//! Source-location recovery for instructions. Most instructions carry a
//! debug location; the stores that spill function arguments into their
//! allocations do not, and for those the location is taken from the
//! `llvm.dbg.declare` call describing the destination allocation.

use inkwell::values::{FunctionValue, InstructionValue};

use crate::llvm::{self, RawDebugLoc, ValueToken};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    pub fn new(line: u32, col: u32) -> Self {
        LineCol { line, col }
    }
}

/// A statement's place in the original source. Begin and end coincide when
/// only a single point is known, which is always the case for locations
/// recovered from LLVM debug metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub begin: LineCol,
    pub end: LineCol,
}

impl Location {
    pub fn point(file: String, at: LineCol) -> Self {
        Location {
            file,
            begin: at,
            end: at,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("could not find the source code location of a statement")]
    Unknown,
}

/// Resolves the source location of an instruction.
///
/// Instructions the compiler materializes without their own debug info are
/// not user-visible statements; for those this returns
/// [`LocationError::Unknown`] and the caller skips the instruction. The one
/// exception is the store initializing a parameter's local allocation, whose
/// location is recovered from the allocation's debug declaration.
pub fn instr_location(
    function: FunctionValue<'_>,
    instr: &InstructionValue<'_>,
) -> Result<Location, LocationError> {
    if let Some(loc) = llvm::debug_loc(instr) {
        return Ok(from_raw(loc));
    }

    if is_argument_store(instr) {
        if let Some(loc) = declared_location(function, instr) {
            return Ok(from_raw(loc));
        }
    }

    Err(LocationError::Unknown)
}

/// Whether the instruction stores a function argument into its allocation.
pub fn is_argument_store(instr: &InstructionValue<'_>) -> bool {
    matches!(instr.get_opcode(), inkwell::values::InstructionOpcode::Store)
        && llvm::operand(instr, 0).is_some_and(|stored| llvm::is_argument(&stored))
}

/// Walks the function for a `llvm.dbg.declare` whose subject is the store's
/// destination allocation and adopts the first one carrying a valid scope.
fn declared_location(
    function: FunctionValue<'_>,
    store: &InstructionValue<'_>,
) -> Option<RawDebugLoc> {
    let destination = llvm::operand(store, 1).map(|dest| ValueToken::of(&dest))?;

    for block in llvm::blocks(function) {
        for instr in llvm::instructions(block) {
            if !llvm::is_dbg_declare(&instr) {
                continue;
            }
            if llvm::dbg_declare_subject(&instr) != Some(destination) {
                continue;
            }
            if let Some(loc) = llvm::debug_loc(&instr) {
                return Some(loc);
            }
        }
    }

    None
}

fn from_raw(loc: RawDebugLoc) -> Location {
    let file = if loc.directory.is_empty() {
        loc.filename
    } else {
        format!("{}/{}", loc.directory, loc.filename)
    };
    Location::point(file, LineCol::new(loc.line, loc.column))
}
