// SPDX-License-Identifier: BSD-3-Clause
use std::fmt;
use std::path::PathBuf;

use crate::signatures::Signatures;

/// How indirect calls are resolved.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum IndirectCalls {
    /// Function-type matching refined by multi-layer type analysis
    #[default]
    Mlta,
    /// Structural argument-type matching only
    Signature,
}

impl fmt::Display for IndirectCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndirectCalls::Mlta => write!(f, "mlta"),
            IndirectCalls::Signature => write!(f, "signature"),
        }
    }
}

/// When a comparison counts as checking a source or use that was seen
/// checked before.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum ShapePolicy {
    /// Any comparison
    #[default]
    Any,
    /// Only a comparison with a recorded operator bucket and operand class
    Exact,
}

impl fmt::Display for ShapePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapePolicy::Any => write!(f, "any"),
            ShapePolicy::Exact => write!(f, "exact"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Functions with more blocks are skipped.
    pub max_blocks: usize,
    /// Functions with more pointers are skipped by the pointer analysis.
    pub max_alias_candidates: usize,
    /// How far backward checking follows arguments into callers.
    pub max_caller_depth: u32,
    /// Last counting stage of missing-check detection.
    pub max_stage: u32,
    pub src_threshold: f64,
    pub use_threshold: f64,
    pub indirect_calls: IndirectCalls,
    pub unroll_loops: bool,
    pub check_shapes: ShapePolicy,
    pub source_root: Option<PathBuf>,
    /// Leading components removed from debug-info file names before they
    /// are looked up under `source_root`.
    pub strip_components: usize,
    /// Never counted as unchecked.
    pub ignored_callees: Vec<String>,
    pub signatures: Signatures,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_blocks: 500,
            max_alias_candidates: 1000,
            max_caller_depth: 5,
            max_stage: 2,
            src_threshold: 0.3,
            use_threshold: 0.1,
            indirect_calls: IndirectCalls::default(),
            unroll_loops: false,
            check_shapes: ShapePolicy::default(),
            source_root: None,
            strip_components: 2,
            ignored_callees: [
                "outb",
                "__const_udelay",
                "__udelay",
                "scnprintf",
                "__fswab16",
                "__fswab32",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            signatures: Signatures::default(),
        }
    }
}

impl Config {
    pub fn is_ignored_callee(&self, name: &str) -> bool {
        self.ignored_callees.iter().any(|c| c == name)
    }
}
