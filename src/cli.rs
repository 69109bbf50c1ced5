// SPDX-License-Identifier: BSD-3-Clause
use std::path::PathBuf;

/// Extracts statement-level static data from an LLVM bitcode module and
/// rewrites it with tracing instrumentation
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// LLVM bitcode module
    #[arg()]
    pub module: PathBuf,

    /// Output directory (default `aardwolf`, or AARDWOLF_DATA_DEST if set)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not write instrumented bitcode
    #[arg(long)]
    pub disable_instrumentation: bool,
}
