// SPDX-License-Identifier: BSD-3-Clause
//! Source-code lookups for debug locations.

use std::path::PathBuf;

use regex::Regex;

use crate::llvm::instruction::DebugLoc;

/// The source tree debug-info file names are resolved against.
#[derive(Clone, Debug)]
pub struct SourceTree {
    root: Option<PathBuf>,
    strip_components: usize,
    call: Regex,
}

impl SourceTree {
    pub fn new(root: Option<PathBuf>, strip_components: usize) -> Self {
        SourceTree {
            root,
            strip_components,
            call: Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
        }
    }

    /// `file` without its first `strip_components` components.
    pub fn strip<'f>(&self, file: &'f str) -> &'f str {
        let mut file = file;
        for _ in 0..self.strip_components {
            match file.find('/') {
                Some(idx) => file = &file[idx + 1..],
                None => break,
            }
        }
        file
    }

    /// The text of a source line, without leading whitespace.
    pub fn line(&self, loc: &DebugLoc) -> Option<String> {
        let root = self.root.as_ref()?;
        if loc.line == 0 {
            return None;
        }
        let text = std::fs::read_to_string(root.join(self.strip(&loc.file))).ok()?;
        text.lines()
            .nth(loc.line as usize - 1)
            .map(|l| l.trim_start().to_string())
    }

    /// Name of the function called at the start of the source line, for
    /// calls made through macros such as `pr_err`.
    pub fn called_function(&self, loc: &DebugLoc) -> Option<String> {
        let line = self.line(loc)?;
        self.call
            .captures(&line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// `file +line: source` with a source root, `file:line` without.
    pub fn cite(&self, loc: &DebugLoc) -> String {
        match self.line(loc) {
            Some(text) => format!("{} +{}: {}", self.strip(&loc.file), loc.line, text),
            None => format!("{}:{}", loc.file, loc.line),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::SourceTree;
    use crate::llvm::instruction::DebugLoc;

    fn tree() -> (SourceTree, PathBuf) {
        let dir = std::env::temp_dir().join(format!("misscheck-src-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("drivers")).unwrap();
        std::fs::write(
            dir.join("drivers/foo.c"),
            "int f(void)\n{\n\tpr_err(\"bad\\n\");\n\treturn 0;\n}\n",
        )
        .unwrap();
        (SourceTree::new(Some(dir.clone()), 2), dir)
    }

    #[test]
    fn strips_leading_components() {
        let t = SourceTree::new(None, 2);
        assert_eq!("drivers/foo.c", t.strip("/linux/drivers/foo.c"));
        assert_eq!("foo.c", t.strip("foo.c"));
    }

    #[test]
    fn cites_lines() {
        let (t, dir) = tree();
        let loc = DebugLoc {
            file: "./linux/drivers/foo.c".to_string(),
            line: 3,
        };
        assert_eq!("drivers/foo.c +3: pr_err(\"bad\\n\");", t.cite(&loc));
        assert_eq!(Some("pr_err".to_string()), t.called_function(&loc));
        std::fs::remove_dir_all(dir).unwrap();

        let bare = SourceTree::new(None, 2);
        assert_eq!("./linux/drivers/foo.c:3", bare.cite(&loc));
        assert_eq!(None, bare.called_function(&loc));
    }
}
