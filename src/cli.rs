// SPDX-License-Identifier: BSD-3-Clause
use std::path::PathBuf;

use misscheck::config::{IndirectCalls, ShapePolicy};

/// Statistical detection of missing security checks in LLVM IR
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IR modules (JSON, or LLVM bitcode with a `.bc` extension)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Log verbosity: 0 = info, 1 = debug, 2 or more = trace
    #[arg(long, default_value_t = 0)]
    pub verbose_level: u8,

    /// Identify security checks
    #[arg(long)]
    pub sc: bool,

    /// Identify missing checks
    #[arg(long)]
    pub mc: bool,

    /// Remove loop back edges before analysis
    #[arg(long)]
    pub unroll_loops: bool,

    /// Indirect-call resolution
    #[arg(long, default_value_t = IndirectCalls::Mlta)]
    pub indirect_calls: IndirectCalls,

    /// Which comparisons count as checks of previously checked values
    #[arg(long, default_value_t = ShapePolicy::Any)]
    pub check_shapes: ShapePolicy,

    /// Directory holding `err-funcs` and `signatures.json`
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Source tree for report citations
    #[arg(long)]
    pub source_root: Option<PathBuf>,

    /// Tracing
    #[arg(long)]
    pub tracing: bool,

    /// Quiet
    #[arg(long)]
    pub quiet: bool,
}
