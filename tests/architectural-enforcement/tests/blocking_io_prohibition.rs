//! Blocking I/O Prohibition
//!
//! Production code must not block the runtime: inside `async fn` all I/O
//! goes through `tokio::fs`, `tokio::net` and `tokio::io`. Blocking calls
//! are acceptable in plain functions that run before or beside the runtime
//! (configuration loading, logger setup) and in test code.

use architectural_enforcement::{code_part, in_async_fn, production_sources};

/// Patterns that block the calling thread
const BLOCKING: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::io::stdout()", "Blocking stdout"),
    ("std::thread::sleep", "Thread sleep"),
    ("tungstenite::connect(", "Blocking WebSocket client"),
];

#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        let lines = file.line_refs();
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            for (pattern, what) in BLOCKING {
                if code.contains(pattern) && in_async_fn(&lines, idx) {
                    violations.push(file.describe(idx, what));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O inside async functions:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::fs, tokio::net, tokio::io::stdout() and tokio::time instead");
        panic!("Found {} blocking I/O violation(s)", violations.len());
    }
}

#[test]
fn test_scanner_sees_production_sources() {
    let files = production_sources();
    let paths: Vec<String> = files
        .iter()
        .map(|f| f.path.to_string_lossy().replace('\\', "/"))
        .collect();

    assert!(paths.iter().any(|p| p.ends_with("timeline/core/src/session.rs")));
    assert!(paths.iter().any(|p| p.ends_with("timeline/cli/src/main.rs")));
    // Test-only modules are not production code
    assert!(!paths.iter().any(|p| p.ends_with("transport/memory.rs")));
    assert!(!paths.iter().any(|p| p.ends_with("timeline/proptests.rs")));
}
