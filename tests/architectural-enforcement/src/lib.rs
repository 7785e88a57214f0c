//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! on the statusline crates:
//! - stdout belongs to the i3bar protocol, so no `print!`/`println!`
//! - no blocking `std::thread::sleep` in async code
//! - no `unwrap()`/`expect()` outside tests
//!
//! Only the part of each file before its `#[cfg(test)]` module is checked.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// One-based line number
    pub line: usize,
    /// The line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root, two levels above this crate
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// All `.rs` files under `dir/src`
pub fn source_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir.join("src"))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

/// The lines of `source` that precede its test module
pub fn production_lines(source: &str) -> impl Iterator<Item = (usize, &str)> {
    source
        .lines()
        .enumerate()
        .take_while(|(_, line)| {
            let line = line.trim();
            !(line.starts_with("#[cfg(test)]") || line.starts_with("#[cfg(all(test"))
        })
        .map(|(i, line)| (i + 1, line))
}

/// Production lines in `files` containing any of `patterns`
///
/// Comment lines are ignored.
pub fn find_violations(files: &[PathBuf], patterns: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for path in files {
        let Ok(source) = fs::read_to_string(path) else {
            continue;
        };
        for (line, text) in production_lines(&source) {
            let trimmed = text.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            if patterns.iter().any(|p| trimmed.contains(p)) {
                violations.push(Violation {
                    path: path.clone(),
                    line,
                    text: trimmed.to_string(),
                });
            }
        }
    }
    violations
}
