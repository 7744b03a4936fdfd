//! Architectural Enforcement
//!
//! Source scanners shared by the integration tests in `tests/`. They enforce
//! the async discipline of the production crates:
//! - No blocking I/O inside async functions
//! - No sleeping outside the reconnect backoff
//!
//! The scanners work on text, not on a syntax tree, so they are heuristics:
//! they look backwards from a line for the enclosing `fn` header and skip
//! test code (`#[cfg(test)] mod tests { .. }` blocks and `#[cfg(test)]`
//! module files).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["timeline/core/src", "timeline/cli/src"];

/// Workspace root (two levels above this crate)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// One production source file, with its test code removed
#[derive(Debug)]
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    /// Lines before the file's `#[cfg(test)] mod tests` block
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Build from file contents
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let mut lines = Vec::new();
        let mut iter = content.lines().peekable();
        while let Some(line) = iter.next() {
            if line.trim() == "#[cfg(test)]"
                && iter
                    .peek()
                    .is_some_and(|next| next.trim_start().starts_with("mod tests"))
            {
                break;
            }
            lines.push(line.to_string());
        }
        Self {
            path: path.into(),
            lines,
        }
    }

    /// Line as `&str` slices, for the scanners
    pub fn line_refs(&self) -> Vec<&str> {
        self.lines.iter().map(String::as_str).collect()
    }

    /// `path:line - text` for a 0-based line index
    pub fn describe(&self, idx: usize, what: &str) -> String {
        format!(
            "{}:{} - {what}: {}",
            self.path.display(),
            idx + 1,
            self.lines[idx].trim()
        )
    }
}

/// Every production `.rs` file under [`PRODUCTION_DIRS`]
///
/// Files declared as `#[cfg(test)] mod name;` by a sibling are skipped.
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let base = root.join(dir);
        let mut paths = Vec::new();
        let mut test_only = HashSet::new();

        for entry in WalkDir::new(&base).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            for module in test_only_modules(&content) {
                test_only.insert(dir.join(format!("{module}.rs")));
                test_only.insert(dir.join(module).join("mod.rs"));
            }
            paths.push((path.to_path_buf(), content));
        }

        for (path, content) in paths {
            if test_only.contains(&path) {
                continue;
            }
            let relative = path.strip_prefix(&root).unwrap_or(&path).to_path_buf();
            files.push(SourceFile::parse(relative, &content));
        }
    }

    files
}

/// Names of modules declared as `#[cfg(test)] mod name;`
pub fn test_only_modules(content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    lines
        .windows(2)
        .filter(|pair| pair[0] == "#[cfg(test)]")
        .filter_map(|pair| {
            let decl = pair[1]
                .trim_start_matches("pub(crate) ")
                .trim_start_matches("pub ");
            decl.strip_prefix("mod ")?
                .strip_suffix(';')
                .map(str::to_string)
        })
        .collect()
}

/// The part of a line before any `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// `Some(is_async)` when the line opens a function
pub fn fn_header(line: &str) -> Option<bool> {
    let mut rest = line.trim();
    for prefix in ["pub(crate) ", "pub(super) ", "pub ", "const ", "unsafe "] {
        rest = rest.strip_prefix(prefix).unwrap_or(rest);
    }
    if rest.starts_with("async fn ") {
        Some(true)
    } else if rest.starts_with("fn ") {
        Some(false)
    } else {
        None
    }
}

/// Whether the function enclosing `idx` is async
///
/// Scans backwards to the nearest `fn` header and stops at `impl` or `mod`
/// boundaries (returning `false`).
pub fn in_async_fn(lines: &[&str], idx: usize) -> bool {
    for line in lines[..=idx].iter().rev() {
        if let Some(is_async) = fn_header(line) {
            return is_async;
        }
        let trimmed = line.trim();
        if trimmed.starts_with("mod ") || (trimmed.starts_with("impl") && trimmed.contains('{')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_fn_detection() {
        let code = [
            "async fn bad() {",
            "    let s = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert!(in_async_fn(&code, 1));
    }

    #[test]
    fn test_sync_fn_detection() {
        let code = [
            "    pub(crate) fn load() -> String {",
            "        std::fs::read_to_string(\"client.toml\").unwrap_or_default()",
            "    }",
        ];
        assert!(!in_async_fn(&code, 1));
    }

    #[test]
    fn test_pub_async_method_detection() {
        let code = [
            "impl Session {",
            "    pub async fn run(&self) {",
            "        std::io::stdout();",
            "    }",
        ];
        assert!(in_async_fn(&code, 2));
    }

    #[test]
    fn test_test_module_is_stripped() {
        let file = SourceFile::parse(
            "x.rs",
            "fn prod() {}\n\n#[cfg(test)]\nmod tests {\n    fn t() {}\n}\n",
        );
        assert_eq!(file.lines, vec!["fn prod() {}".to_string(), String::new()]);
    }

    #[test]
    fn test_test_only_module_files() {
        let content = "mod reducer;\n#[cfg(test)]\npub(crate) mod fixtures;\n#[cfg(test)]\nmod proptests;\n";
        assert_eq!(test_only_modules(content), vec!["fixtures", "proptests"]);
    }

    #[test]
    fn test_code_part_drops_comments() {
        assert_eq!(code_part("let x = 1; // std::fs::read"), "let x = 1; ");
    }
}
