// SPDX-License-Identifier: BSD-3-Clause
//! Statement-granularity dependence extraction and tracing instrumentation
//! for LLVM bitcode.
//!
//! The pipeline runs in three phases over one module: [`detect`] classifies
//! instructions into statements with use/def accesses and a successor
//! graph, [`static_data`] serializes the result into the binary artifact
//! the analyzer consumes, and [`dynamic_data`] rewrites the module with
//! calls into the tracing runtime.

pub mod access;
pub mod cli;
pub mod detect;
pub mod dynamic_data;
pub mod llvm;
pub mod location;
pub mod repository;
pub mod static_data;
pub mod statement;

pub use access::{Access, AccessSet};
pub use llvm::{PrimitiveType, ValueToken};
pub use location::{LineCol, Location, LocationError};
pub use repository::{Repository, StatementId};
pub use statement::Statement;
