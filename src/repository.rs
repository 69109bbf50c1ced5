// SPDX-License-Identifier: BSD-3-Clause
//! Per-module tables produced by statement detection: statements keyed by
//! instruction, per-function detection order, the successor graph and the
//! id spaces of the artifact. Ids are dense, injective and assigned in
//! detection order, so user-facing numbering is stable across runs on
//! identical input.

use std::fs;
use std::os::unix::fs::MetadataExt;

use inkwell::values::{FunctionValue, InstructionValue};
use rustc_hash::FxHashMap;

use crate::llvm::ValueToken;
use crate::statement::Statement;

/// A statement's identity in the artifact: the file it comes from plus a
/// counter that starts at 1 and grows in detection order across the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatementId {
    pub file: u64,
    pub counter: u64,
}

#[derive(Default)]
pub struct Repository<'ctx> {
    statements: FxHashMap<ValueToken, Statement<'ctx>>,
    function_instrs: FxHashMap<ValueToken, Vec<InstructionValue<'ctx>>>,
    successors: FxHashMap<ValueToken, Vec<InstructionValue<'ctx>>>,
    statement_ids: FxHashMap<ValueToken, StatementId>,
    value_ids: FxHashMap<ValueToken, u64>,
    file_ids: FxHashMap<String, u64>,
    fallback_file_ids: u64,
}

impl<'ctx> Repository<'ctx> {
    pub fn new() -> Self {
        Repository::default()
    }

    /// Registers a detected statement: stores it under its instruction,
    /// appends the instruction to the function's detection order and seeds
    /// ids for the statement, its inputs and its output. Re-registration of
    /// the same instruction is a no-op.
    pub fn register_statement(&mut self, function: FunctionValue<'ctx>, stmt: Statement<'ctx>) {
        let key = ValueToken::of(&stmt.instr);
        if self.statements.contains_key(&key) {
            return;
        }

        let file = self.file_id(&stmt.loc.file);
        let counter = self.statement_ids.len() as u64 + 1;
        self.statement_ids.insert(key, StatementId { file, counter });

        for input in &stmt.inputs {
            self.value_id(input.token());
        }
        if let Some(output) = &stmt.output {
            self.value_id(output.token());
        }

        self.function_instrs
            .entry(ValueToken::of(&function))
            .or_default()
            .push(stmt.instr);
        self.statements.insert(key, stmt);
    }

    /// Appends a control-flow edge between two registered statements.
    /// Duplicates arising from the traversal are kept in insertion order.
    pub fn add_successor(&mut self, from: InstructionValue<'ctx>, to: InstructionValue<'ctx>) {
        self.successors
            .entry(ValueToken::of(&from))
            .or_default()
            .push(to);
    }

    /// The value id for a value-or-base token, assigning `len + 1` on first
    /// sight.
    pub fn value_id(&mut self, token: ValueToken) -> u64 {
        let next = self.value_ids.len() as u64 + 1;
        *self.value_ids.entry(token).or_insert(next)
    }

    /// The file id for a source path: the filesystem's unique identity for
    /// the file where available, a dense assigned counter where not.
    pub fn file_id(&mut self, path: &str) -> u64 {
        if let Some(id) = self.file_ids.get(path) {
            return *id;
        }
        let id = match fs::metadata(path) {
            Ok(metadata) => metadata.ino(),
            Err(_) => {
                self.fallback_file_ids += 1;
                self.fallback_file_ids
            }
        };
        self.file_ids.insert(path.to_owned(), id);
        id
    }

    pub fn statement(&self, instr: &InstructionValue<'ctx>) -> Option<&Statement<'ctx>> {
        self.statements.get(&ValueToken::of(instr))
    }

    /// Statement-bearing instructions of a function, in detection order.
    pub fn statements_of(&self, function: FunctionValue<'ctx>) -> &[InstructionValue<'ctx>] {
        self.function_instrs
            .get(&ValueToken::of(&function))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn successors_of(&self, instr: &InstructionValue<'ctx>) -> &[InstructionValue<'ctx>] {
        self.successors
            .get(&ValueToken::of(instr))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn statement_id(&self, instr: &InstructionValue<'ctx>) -> Option<StatementId> {
        self.statement_ids.get(&ValueToken::of(instr)).copied()
    }

    /// The `(path, id)` table for the artifact's filenames section.
    pub fn files(&self) -> impl Iterator<Item = (&str, u64)> {
        self.file_ids.iter().map(|(path, id)| (path.as_str(), *id))
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn value_count(&self) -> usize {
        self.value_ids.len()
    }
}
