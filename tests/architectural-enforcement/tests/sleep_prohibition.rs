//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code waits on I/O, never on a timer.
//! **Exception**: retry backoff while every named pipe instance is busy.

use architectural_enforcement::{check_sleep, check_workspace, SLEEP_ALLOWED};

#[test]
fn test_no_sleep_in_production_code() {
    let violations = check_workspace(check_sleep);

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        for allowed in SLEEP_ALLOWED {
            eprintln!("  - {allowed} (retry backoff)");
        }
        eprintln!("  - Test code");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep as synchronization between tasks");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
