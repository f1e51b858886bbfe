//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: The relay runs entirely on the tokio runtime. Production code
//! MUST NOT use `std` sockets, and MUST NOT call blocking filesystem or stdio
//! functions from async code.
//! **Required**: `tokio::net`, `tokio::fs`, `tokio::io::{stdin, stdout}`

use architectural_enforcement::{
    check_blocking_in_async, check_blocking_network, check_workspace, production_sources,
    Violation,
};

fn report(violations: &[Violation], title: &str) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!("\n✅ REQUIRED async I/O:");
    eprintln!("  - tokio::net::UnixListener / UnixStream");
    eprintln!("  - tokio::fs::* from async functions");
    eprintln!("  - tokio::io::stdin() / stdout()");
    eprintln!("\n✅ ACCEPTABLE blocking I/O:");
    eprintln!("  - Non-async functions (e.g. endpoint cleanup in Drop)");
    eprintln!("  - Test code");

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[test]
fn test_production_sources_found() {
    let sources = production_sources();
    assert!(
        sources.iter().any(|p| p.ends_with("relay/reader.rs")),
        "production sources not found: {sources:?}"
    );
}

#[test]
fn test_no_std_sockets_in_production_code() {
    let violations = check_workspace(check_blocking_network);
    report(&violations, "CRITICAL: std socket types found in production code!");
}

#[test]
fn test_no_blocking_calls_in_async_code() {
    let violations = check_workspace(check_blocking_in_async);
    report(&violations, "CRITICAL: Blocking calls found in async code!");
}
