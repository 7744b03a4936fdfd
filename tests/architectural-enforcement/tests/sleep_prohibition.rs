//! Sleep Prohibition
//!
//! Production code waits on I/O, channels and timers it owns, never on a
//! bare sleep. The one exception is the delay between reconnect attempts,
//! which lives in the resilient transport and is always raced against the
//! shutdown signal.

use architectural_enforcement::{code_part, production_sources};

/// The only file allowed to sleep, and the words that must surround it
const BACKOFF_FILE: &str = "transport/resilient.rs";
const BACKOFF_CONTEXT: &[&str] = &["delay_for_attempt", "Reconnecting", "select!"];

#[test]
fn test_no_sleep_outside_reconnect_backoff() {
    let mut violations = Vec::new();

    for file in production_sources() {
        let path = file.path.to_string_lossy().replace('\\', "/");
        let lines = file.line_refs();

        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if !(code.contains("::sleep(") || code.contains(".sleep(")) {
                continue;
            }
            if path.ends_with(BACKOFF_FILE) && is_backoff_context(&lines, idx) {
                continue;
            }
            violations.push(file.describe(idx, "Sleep"));
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls in production code:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Acceptable: the reconnect delay in {BACKOFF_FILE}, raced against shutdown");
        panic!("Found {} sleep violation(s)", violations.len());
    }
}

/// Reconnect delay: computed from the policy, announced, and cancellable
fn is_backoff_context(lines: &[&str], idx: usize) -> bool {
    let window = &lines[idx.saturating_sub(15)..=idx];
    BACKOFF_CONTEXT
        .iter()
        .all(|needle| window.iter().any(|line| line.contains(needle)))
}

#[test]
fn test_backoff_context_detection() {
    let code = [
        "let delay = link.config.delay_for_attempt(attempt);",
        "link.emit(TransportEvent::Reconnecting { attempt, delay });",
        "tokio::select! {",
        "    _ = shutdown_rx.changed() => return Reconnect::Cancelled,",
        "    () = tokio::time::sleep(delay) => {}",
    ];
    assert!(is_backoff_context(&code, 4));

    let polling = ["loop {", "    tokio::time::sleep(Duration::from_millis(10)).await;"];
    assert!(!is_backoff_context(&polling, 1));
}
