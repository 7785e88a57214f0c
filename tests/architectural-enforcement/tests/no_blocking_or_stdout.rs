//! Checks the statusline crates against the rules in the crate docs

use std::path::PathBuf;

use architectural_enforcement::{find_violations, production_lines, source_files, workspace_root};

fn crate_sources() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = source_files(&root.join("statusline/core"));
    files.extend(source_files(&root.join("statusline/daemon")));
    files
}

fn assert_clean(patterns: &[&str]) {
    let files = crate_sources();
    assert!(!files.is_empty(), "no sources found under {:?}", workspace_root());

    let violations = find_violations(&files, patterns);
    assert!(
        violations.is_empty(),
        "found {patterns:?} in production code:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

#[test]
fn test_no_stdout_printing() {
    assert_clean(&["println!", "print!("]);
}

#[test]
fn test_no_blocking_sleep() {
    assert_clean(&["std::thread::sleep", "thread::sleep("]);
}

#[test]
fn test_no_unwrap_or_expect() {
    assert_clean(&[".unwrap()", ".expect("]);
}

#[test]
fn test_test_modules_are_skipped() {
    let source = "fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
    let lines: Vec<(usize, &str)> = production_lines(source).collect();
    assert_eq!(lines, vec![(1, "fn a() {}")]);
}
