// SPDX-License-Identifier: BSD-3-Clause
//! Models of library functions: which functions handle errors, which copy
//! memory between their arguments and which fetch data from user space.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use regex::RegexSet;
use rustc_hash::FxHashMap;

/// What a function is known to do. Argument indices of `-1` denote the
/// return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Signature {
    /// Copies `size` bytes from argument `src` to argument `dst`.
    Copy { src: i8, dst: i8, size: i8 },
    /// Fetches untrusted data from argument `src` into `dst`.
    Fetch { dst: i8, src: i8 },
    /// Reports or handles an error condition (`BUG`, `pr_err`, ...).
    HandlesError,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Couldn't read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Couldn't deserialize function signatures: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Bad function-name pattern: {0}")]
    Regex(#[from] regex::Error),
}

const ERROR_HANDLERS: &[&str] = &[
    "BUG",
    "BUG_ON",
    "ASM_BUG",
    "panic",
    "ASSERT",
    "assert",
    "dump_stack",
    "__warn_printk",
    "usercopy_warn",
    "signal_fault",
    "pr_err",
    "pr_warn",
    "pr_warning",
    "pr_alert",
    "pr_emerg",
    "pr_crit",
];

const COPY_FUNCTIONS: &[&str] = &[
    "memcpy",
    "__memcpy",
    "llvm.memcpy.p0i8.p0i8.i32",
    "llvm.memcpy.p0i8.p0i8.i64",
    "strncpy",
    "memmove",
    "__memmove",
    "llvm.memmove.p0i8.p0i8.i32",
    "llvm.memmove.p0i8.p0i8.i64",
];

const FETCH_FUNCTIONS: &[(&str, i8, i8)] = &[
    ("copy_from_user", 0, 1),
    ("_copy_from_user", 0, 1),
    ("__copy_from_user", 0, 1),
    ("raw_copy_from_user", 0, 1),
    ("strncpy_from_user", 0, 1),
    ("_strncpy_from_user", 0, 1),
    ("__strncpy_from_user", 0, 1),
    ("__copy_from_user_inatomic", 0, 1),
    ("strndup_user", -1, 0),
    ("memdup_user", -1, 0),
    ("vmemdup_user", -1, 0),
    ("memdup_user_nul", -1, 0),
    ("get_user", 0, 1),
    ("__get_user", 0, 1),
    ("copyin", 1, 0),
    ("copyin_str", 1, 0),
    ("copyin_nofault", 1, 0),
    ("fubyte", -1, 0),
    ("fusword", -1, 0),
    ("fuswintr", -1, 0),
    ("fuword", -1, 0),
    ("rds_message_copy_from_user", 0, 1),
    ("ivtv_buf_copy_from_user", 0, 1),
    ("snd_trident_synth_copy_from_user", 0, 1),
    ("copy_from_user_toio", 0, 1),
    ("iov_iter_copy_from_user_atomic", 0, 1),
    ("__generic_copy_from_user", 0, 1),
    ("__constant_copy_from_user", 0, 1),
    ("copy_from_user_page", 0, 1),
    ("__copy_from_user_eva", 0, 1),
    ("__arch_copy_from_user", 0, 1),
    ("__copy_from_user_flushcache", 0, 1),
    ("arm_copy_from_user", 0, 1),
    ("__asm_copy_from_user", 0, 1),
    ("__copy_from_user_inatomic_nocache", 0, 1),
    ("copy_from_user_nmi", 0, 1),
    ("copy_from_user_proc", 0, 1),
];

/// Builtin signatures by exact name, plus signatures attached to
/// function-name patterns.
#[derive(Clone, Debug)]
pub struct Signatures {
    exact: FxHashMap<String, Vec<Signature>>,
    sigs: HashMap<String, Vec<Signature>>,
    regexes: Vec<String>,
    set: RegexSet,
}

impl Default for Signatures {
    fn default() -> Self {
        let mut exact: FxHashMap<String, Vec<Signature>> = FxHashMap::default();
        for f in ERROR_HANDLERS {
            exact
                .entry(f.to_string())
                .or_default()
                .push(Signature::HandlesError);
        }
        for f in COPY_FUNCTIONS {
            exact.entry(f.to_string()).or_default().push(Signature::Copy {
                src: 1,
                dst: 0,
                size: 2,
            });
        }
        for (f, dst, src) in FETCH_FUNCTIONS {
            exact
                .entry(f.to_string())
                .or_default()
                .push(Signature::Fetch {
                    dst: *dst,
                    src: *src,
                });
        }
        Signatures {
            exact,
            sigs: HashMap::new(),
            regexes: Vec::new(),
            set: RegexSet::empty(),
        }
    }
}

impl Signatures {
    /// The builtin tables plus `sigs`, keyed by function-name patterns.
    pub fn new(sigs: HashMap<String, Vec<Signature>>) -> Result<Self, regex::Error> {
        let regexes: Vec<String> = sigs.keys().map(|s| s.to_string()).collect();
        let set = RegexSet::new(&regexes)?;
        Ok(Signatures {
            sigs,
            regexes,
            set,
            ..Signatures::default()
        })
    }

    /// Load `err-funcs` and `signatures.json` from `dir`, when they exist.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let json = dir.join("signatures.json");
        let mut sigs = match std::fs::read_to_string(&json) {
            Ok(s) => Signatures::new(serde_json::from_str(&s)?)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Signatures::default(),
            Err(source) => return Err(Error::Read { path: json, source }),
        };
        let err_funcs = dir.join("err-funcs");
        match std::fs::read_to_string(&err_funcs) {
            Ok(s) => sigs.add_error_handlers(s.lines()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(source) => {
                return Err(Error::Read {
                    path: err_funcs,
                    source,
                })
            }
        }
        Ok(sigs)
    }

    /// Lines of one character or less are ignored.
    pub fn add_error_handlers<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            let name = name.trim_end_matches('\r');
            if name.len() <= 1 {
                continue;
            }
            let sigs = self.exact.entry(name.to_string()).or_default();
            if !sigs.contains(&Signature::HandlesError) {
                sigs.push(Signature::HandlesError);
            }
        }
    }

    pub fn signatures_for(&self, func: &str) -> Vec<Signature> {
        let mut sigs = Vec::new();
        if let Some(s) = self.exact.get(func) {
            sigs.extend(s.iter().copied());
        }
        for m in self.set.matches(func) {
            sigs.extend(self.sigs[&self.regexes[m]].iter().copied());
        }
        sigs
    }

    fn find<T>(&self, func: &str, f: impl Fn(&Signature) -> Option<T>) -> Option<T> {
        if let Some(t) = self.exact.get(func).and_then(|s| s.iter().find_map(&f)) {
            return Some(t);
        }
        self.set
            .matches(func)
            .into_iter()
            .find_map(|m| self.sigs[&self.regexes[m]].iter().find_map(&f))
    }

    pub fn is_error_handler(&self, func: &str) -> bool {
        self.find(func, |s| matches!(s, Signature::HandlesError).then_some(()))
            .is_some()
    }

    /// `(src, dst, size)` argument indices of a copy function.
    pub fn copy(&self, func: &str) -> Option<(i8, i8, i8)> {
        self.find(func, |s| match s {
            Signature::Copy { src, dst, size } => Some((*src, *dst, *size)),
            _ => None,
        })
    }

    /// `(dst, src)` argument indices of a data-fetch function.
    pub fn fetch(&self, func: &str) -> Option<(i8, i8)> {
        self.find(func, |s| match s {
            Signature::Fetch { dst, src } => Some((*dst, *src)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Signature, Signatures};

    #[test]
    fn builtin_tables() {
        let sigs = Signatures::default();
        assert!(sigs.is_error_handler("pr_err"));
        assert!(!sigs.is_error_handler("printk"));
        assert_eq!(Some((1, 0, 2)), sigs.copy("memcpy"));
        assert_eq!(Some((0, 1)), sigs.fetch("copy_from_user"));
        assert_eq!(Some((-1, 0)), sigs.fetch("memdup_user"));
        assert_eq!(Some((1, 0)), sigs.fetch("copyin"));
        assert_eq!(None, sigs.fetch("memcpy"));
        assert!(sigs.signatures_for("f").is_empty());
    }

    #[test]
    fn patterns_extend_builtins() {
        let sigs = Signatures::new(HashMap::from([
            (
                "^my_copy_.*$".to_string(),
                vec![Signature::Copy {
                    src: 2,
                    dst: 1,
                    size: 3,
                }],
            ),
            ("^fatal$".to_string(), vec![Signature::HandlesError]),
        ]))
        .unwrap();
        assert_eq!(Some((2, 1, 3)), sigs.copy("my_copy_page"));
        assert!(sigs.is_error_handler("fatal"));
        assert!(!sigs.is_error_handler("fatal_not"));
        assert!(sigs.is_error_handler("BUG"));
    }

    #[test]
    fn error_handler_lines() {
        let mut sigs = Signatures::default();
        sigs.add_error_handlers("x\nmy_die\n\nwarn_slowpath\r\n".lines());
        assert!(sigs.is_error_handler("my_die"));
        assert!(sigs.is_error_handler("warn_slowpath"));
        assert!(!sigs.is_error_handler("x"));
    }

    #[test]
    fn deserializes_kebab_case() {
        let sigs: HashMap<String, Vec<Signature>> = serde_json::from_str(
            r#"{"^f$": [{"fetch": {"dst": -1, "src": 0}}, "handles-error"]}"#,
        )
        .unwrap();
        assert_eq!(
            vec![Signature::Fetch { dst: -1, src: 0 }, Signature::HandlesError],
            sigs["^f$"]
        );
    }
}
