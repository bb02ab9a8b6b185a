// SPDX-License-Identifier: BSD-3-Clause
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use tracing::{info, warn};
use tracing_flame::FlameLayer;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

use misscheck::analysis::{self, unroll};
use misscheck::llvm::{Module, Program};
use misscheck::{Config, GlobalContext, Signatures};

mod cli;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn setup_global_subscriber(args: &cli::Args) -> Result<Option<impl Drop>> {
    let filter_layer = match args.verbose_level {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let fmt_layer = fmt::Layer::default().with_writer(io::stderr);
    let (flame_layer, guard) = if args.tracing {
        let (layer, guard) = FlameLayer::with_file("./tracing.folded")
            .context("Couldn't create ./tracing.folded")?;
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(flame_layer)
        .with(args.tracing.then(misscheck::layers::NanoCountLayer::default))
        .init();
    Ok(guard)
}

fn load_module(path: &Path) -> Result<Module> {
    if path.extension().is_some_and(|e| e == "bc") {
        #[cfg(feature = "bitcode")]
        return misscheck::llvm::bitcode::from_path(path).with_context(|| {
            format!("Couldn't parse LLVM bitcode module at {}", path.display())
        });
        #[cfg(not(feature = "bitcode"))]
        return Err(anyhow!(
            "{} is bitcode, but the `bitcode` feature is disabled",
            path.display()
        ));
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Couldn't read {}", path.display()))?;
    Module::from_json(&json).with_context(|| format!("Malformed IR module at {}", path.display()))
}

fn load_program(inputs: &[PathBuf]) -> Result<Program> {
    let mut program = Program::new();
    for path in inputs {
        let module = match load_module(path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                continue;
            }
        };
        if let Err(e) = program.link(module) {
            warn!("Skipping {}: {}", path.display(), e);
        }
    }
    if program.modules().is_empty() {
        return Err(anyhow!("No input module could be loaded"));
    }
    program.reindex();
    info!("Loaded {} modules", program.modules().len());
    Ok(program)
}

fn default_config_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Couldn't locate the executable")?;
    Ok(exe
        .parent()
        .map(|d| d.join("configs"))
        .unwrap_or_else(|| PathBuf::from("configs")))
}

fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    let args = cli::Args::parse();
    let _guard = setup_global_subscriber(&args)?;

    let config_dir = match &args.config_dir {
        Some(d) => d.clone(),
        None => default_config_dir()?,
    };
    let signatures = Signatures::load(&config_dir).with_context(|| {
        format!("Couldn't load configuration from {}", config_dir.display())
    })?;
    let config = Config {
        indirect_calls: args.indirect_calls,
        unroll_loops: args.unroll_loops,
        check_shapes: args.check_shapes,
        source_root: args.source_root.clone(),
        signatures,
        ..Config::default()
    };

    let mut program = load_program(&args.inputs)?;
    if config.unroll_loops {
        unroll::unroll_loops(&mut program);
    }

    let mut ctx = GlobalContext::new(&program, &config);
    analysis::call_graph(&mut ctx);
    if args.sc && !args.mc {
        analysis::security_checks(&mut ctx);
    }
    let missing = if args.mc {
        Some(analysis::missing_checks(&mut ctx))
    } else {
        None
    };

    if !args.quiet {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "statistics")?;
        writeln!(stdout, "----------")?;
        writeln!(stdout, "sanity checks: {}", ctx.stats.security_checks)?;
        writeln!(stdout, "conditional statements: {}", ctx.stats.cond_statements)?;
        writeln!(stdout, "indirect calls: {}", ctx.indirect_calls.len())?;
        writeln!(stdout, "unresolved indirect calls: {}", ctx.unresolved.len())?;
        if let Some(missing) = missing {
            writeln!(stdout)?;
            writeln!(stdout, "missing checks")?;
            writeln!(stdout, "--------------")?;
            missing.write_report(&ctx, &mut stdout)?;
        }
    }

    Ok(())
}
