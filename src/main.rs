// SPDX-License-Identifier: BSD-3-Clause
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use inkwell::context::Context;
use inkwell::module::Module;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aardwolf_llvm::{cli, detect, dynamic_data, static_data};

fn setup_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    setup_subscriber();
    let args = cli::Args::parse();

    // The environment is consulted exactly once, here; everything below
    // receives the destination explicitly.
    let out_dir = args
        .output
        .clone()
        .or_else(|| std::env::var_os("AARDWOLF_DATA_DEST").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("aardwolf"));

    let context = Context::create();
    let module = Module::parse_bitcode_from_path(&args.module, &context)
        .map_err(|err| anyhow!("{}", err))
        .with_context(|| {
            format!(
                "couldn't parse LLVM bitcode module at {}",
                args.module.display()
            )
        })?;

    let mut repo = detect::detect_module(&module);

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("couldn't create output directory {}", out_dir.display()))?;

    let artifact_path = out_dir.join(artifact_name(&args.module));
    let file = fs::File::create(&artifact_path)
        .with_context(|| format!("couldn't open {}", artifact_path.display()))?;
    let mut writer = BufWriter::new(file);
    static_data::write_module(&module, &mut repo, &mut writer)
        .and_then(|()| writer.flush())
        .with_context(|| format!("couldn't write {}", artifact_path.display()))?;
    info!(artifact = %artifact_path.display(), "static data written");

    if !args.disable_instrumentation {
        dynamic_data::instrument_module(&context, &module, &repo)
            .context("couldn't instrument the module")?;

        let bitcode_path = out_dir.join("!instrumented.bc");
        if !module.write_bitcode_to_path(&bitcode_path) {
            return Err(anyhow!(
                "couldn't write instrumented bitcode to {}",
                bitcode_path.display()
            ));
        }
        info!(bitcode = %bitcode_path.display(), "instrumented bitcode written");
    }

    Ok(())
}

/// The artifact is named after the input file, extension included:
/// `foo.bc` produces `foo.bc.aard`.
fn artifact_name(module: &std::path::Path) -> PathBuf {
    match module.file_name() {
        Some(name) => {
            let mut name = name.to_os_string();
            name.push(".aard");
            PathBuf::from(name)
        }
        None => PathBuf::from("module.aard"),
    }
}
