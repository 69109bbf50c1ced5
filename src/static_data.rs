// SPDX-License-Identifier: BSD-3-Clause
//! Serialization of a module's repository into the static-data artifact.
//!
//! The format is a 7-byte magic, a flat sequence of function and statement
//! records, and a trailing filenames table. Integers are little-endian,
//! strings are NUL-terminated. Statement records may reference successor
//! ids that only appear later in the file; readers resolve them in a second
//! pass.

use std::io::{self, Write};

use inkwell::module::Module;
use tracing::{info, warn};

use crate::access::Access;
use crate::llvm::{self, ValueToken};
use crate::repository::Repository;
use crate::statement::Statement;

/// Format magic, written without a terminator.
pub const MAGIC: &[u8; 7] = b"AARD/S1";

/// Record and access tag bytes.
pub mod token {
    pub const STATEMENT: u8 = 0xFF;
    pub const FUNCTION: u8 = 0xFE;
    pub const FILENAMES: u8 = 0xFD;

    pub const VALUE_SCALAR: u8 = 0xE0;
    pub const VALUE_STRUCTURAL: u8 = 0xE1;
    pub const VALUE_ARRAY_LIKE: u8 = 0xE2;
}

/// Writes the artifact for one module.
///
/// Functions appear in module declaration order, statements in detection
/// order. The repository is taken mutably because access trees may contain
/// accessor scalars (field selectors, index variables) whose value ids are
/// first demanded here; the allocation is idempotent for everything seeded
/// during registration.
pub fn write_module<'ctx, W: Write>(
    module: &Module<'ctx>,
    repo: &mut Repository<'ctx>,
    writer: &mut W,
) -> io::Result<()> {
    writer.write_all(MAGIC)?;

    for function in module.get_functions() {
        if !llvm::is_defined(&function) {
            continue;
        }
        let instrs = repo.statements_of(function).to_vec();
        if instrs.is_empty() {
            continue;
        }

        writer.write_all(&[token::FUNCTION])?;
        write_cstr(writer, function.get_name().to_bytes())?;

        for instr in instrs {
            let Some(stmt) = repo.statement(&instr).cloned() else {
                continue;
            };
            write_statement(repo, &stmt, writer)?;
        }
    }

    write_filenames(repo, writer)?;

    info!(
        statements = repo.statement_count(),
        "static data serialized"
    );
    Ok(())
}

fn write_statement<'ctx, W: Write>(
    repo: &mut Repository<'ctx>,
    stmt: &Statement<'ctx>,
    writer: &mut W,
) -> io::Result<()> {
    let Some(id) = repo.statement_id(&stmt.instr) else {
        warn!(instr = ?stmt.instr, "statement missing an id, dropped from the artifact");
        return Ok(());
    };

    writer.write_all(&[token::STATEMENT])?;
    write_u64(writer, id.counter)?;

    let successors: Vec<u64> = repo
        .successors_of(&stmt.instr)
        .iter()
        .filter_map(|succ| repo.statement_id(succ))
        .map(|succ_id| succ_id.counter)
        .collect();
    writer.write_all(&[successors.len() as u8])?;
    for successor in successors {
        write_u64(writer, successor)?;
    }

    match &stmt.output {
        Some(output) => {
            writer.write_all(&[1])?;
            write_access(repo, output, writer)?;
        }
        None => writer.write_all(&[0])?,
    }

    writer.write_all(&[stmt.inputs.len() as u8])?;
    for input in &stmt.inputs {
        write_access(repo, input, writer)?;
    }

    write_u64(writer, id.file)?;
    write_u32(writer, stmt.loc.begin.line)?;
    write_u32(writer, stmt.loc.begin.col)?;
    write_u32(writer, stmt.loc.end.line)?;
    write_u32(writer, stmt.loc.end.col)?;

    writer.write_all(&[stmt.meta_bits()])?;
    Ok(())
}

fn write_access<'ctx, W: Write>(
    repo: &mut Repository<'ctx>,
    access: &Access<'ctx>,
    writer: &mut W,
) -> io::Result<()> {
    match access {
        Access::Scalar(value) => {
            writer.write_all(&[token::VALUE_SCALAR])?;
            write_u64(writer, repo.value_id(ValueToken::of(value)))
        }
        Access::Structural(base, field) => {
            writer.write_all(&[token::VALUE_STRUCTURAL])?;
            write_access(repo, base, writer)?;
            write_access(repo, field, writer)
        }
        Access::ArrayLike(base, indices) => {
            writer.write_all(&[token::VALUE_ARRAY_LIKE])?;
            write_access(repo, base, writer)?;
            write_u32(writer, indices.len() as u32)?;
            for index in indices {
                write_access(repo, index, writer)?;
            }
            Ok(())
        }
    }
}

fn write_filenames<W: Write>(repo: &Repository<'_>, writer: &mut W) -> io::Result<()> {
    let files: Vec<(&str, u64)> = repo.files().collect();
    writer.write_all(&[token::FILENAMES])?;
    write_u32(writer, files.len() as u32)?;
    for (path, id) in files {
        write_u64(writer, id)?;
        write_cstr(writer, path.as_bytes())?;
    }
    Ok(())
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_u64<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_cstr<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)?;
    writer.write_all(&[0])
}
