//! Architectural Enforcement
//!
//! Line-based scanners behind the workspace's architectural tests:
//! - No `std` socket types in production code (all socket I/O goes through tokio)
//! - No blocking filesystem or stdio calls inside async code
//! - No sleeping, except the busy-pipe retry in the named pipe dialer
//!
//! Test modules are skipped: scanning of a file stops at its first
//! `#[cfg(test)]` or `#[cfg(all(test, ...))]` attribute.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["bridge/core/src", "bridge/daemon/src"];

/// Files allowed to wait with `tokio::time::sleep` (retry backoff)
pub const SLEEP_ALLOWED: &[&str] = &["transport/named_pipe.rs"];

/// `std::fs` functions that block the calling thread
const BLOCKING_FS_CALLS: &[&str] = &[
    "read(",
    "read_to_string(",
    "read_dir(",
    "write(",
    "remove_file(",
    "remove_dir",
    "create_dir",
    "metadata(",
    "symlink_metadata(",
    "set_permissions(",
    "rename(",
    "copy(",
    "File::",
];

/// A rule broken at one source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the line belongs to
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Short rule name
    pub rule: &'static str,
    /// The offending line, trimmed
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.text
        )
    }
}

/// One production line with its enclosing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number
    pub number: usize,
    /// Code with any trailing `//` comment removed
    pub code: &'a str,
    /// Whether the line sits in an async fn or async block
    pub in_async: bool,
}

/// Workspace root, from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// All `.rs` files under the production directories
#[must_use]
pub fn production_sources() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = Vec::new();
    for dir in PRODUCTION_DIRS {
        for entry in walkdir::WalkDir::new(root.join(dir))
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files
}

/// Split a file into production lines, stopping at the test module
#[must_use]
pub fn production_lines(content: &str) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut in_async = false;

    for (idx, raw) in content.lines().enumerate() {
        let trimmed = raw.trim_start();
        if trimmed.starts_with("#[cfg(test)]") || trimmed.starts_with("#[cfg(all(test") {
            break;
        }

        let code = raw.split("//").next().unwrap_or(raw);
        if let Some(is_async) = fn_signature(code) {
            in_async = is_async;
        }
        if code.contains("async move") || code.contains("async {") {
            in_async = true;
        }

        lines.push(SourceLine {
            number: idx + 1,
            code,
            in_async,
        });
    }
    lines
}

/// `Some(is_async)` if the line starts a function signature
fn fn_signature(code: &str) -> Option<bool> {
    let mut is_async = false;
    for word in code.split_whitespace() {
        match word {
            "pub" | "const" | "unsafe" | "extern" | "default" => {}
            w if w.starts_with("pub(") => {}
            "async" => is_async = true,
            "fn" => return Some(is_async),
            _ => return None,
        }
    }
    None
}

/// Socket types from `std` anywhere in production code
#[must_use]
pub fn check_blocking_network(path: &Path, content: &str) -> Vec<Violation> {
    scan(path, content, "Blocking network I/O", |line| {
        line.code.contains("std::net") || line.code.contains("std::os::unix::net")
    })
}

/// Blocking filesystem or stdio calls inside async code
#[must_use]
pub fn check_blocking_in_async(path: &Path, content: &str) -> Vec<Violation> {
    let mut violations = scan(path, content, "Blocking file I/O in async code", |line| {
        line.in_async
            && BLOCKING_FS_CALLS
                .iter()
                .any(|call| line.code.contains(&format!("std::fs::{call}")))
    });
    violations.extend(scan(path, content, "Blocking stdio in async code", |line| {
        line.in_async
            && (line.code.contains("std::io::stdin()") || line.code.contains("std::io::stdout()"))
    }));
    violations
}

/// Thread sleeps anywhere, async sleeps outside the allowed files
#[must_use]
pub fn check_sleep(path: &Path, content: &str) -> Vec<Violation> {
    let sleep_allowed = SLEEP_ALLOWED.iter().any(|allowed| path.ends_with(allowed));
    scan(path, content, "Sleep in production code", |line| {
        line.code.contains("thread::sleep")
            || (!sleep_allowed && line.code.contains("time::sleep"))
    })
}

/// Run every rule over every production source
#[must_use]
pub fn check_workspace<F>(rule: F) -> Vec<Violation>
where
    F: Fn(&Path, &str) -> Vec<Violation>,
{
    production_sources()
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok().map(|content| rule(path, &content)))
        .flatten()
        .collect()
}

fn scan<F>(path: &Path, content: &str, rule: &'static str, broken: F) -> Vec<Violation>
where
    F: Fn(&SourceLine<'_>) -> bool,
{
    production_lines(content)
        .into_iter()
        .filter(|line| broken(line))
        .map(|line| Violation {
            path: path.to_path_buf(),
            line: line.number,
            rule,
            text: line.code.trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
use tokio::net::UnixStream;

pub fn setup() {
    std::fs::remove_file("/tmp/x").ok();
}

pub(crate) async fn serve() {
    let _ = std::fs::read_to_string("/etc/hosts");
    let _ = std::fs::Permissions::from_mode(0o600);
}

fn spawn() {
    tokio::spawn(async move {
        std::io::stdout();
    });
}

#[cfg(test)]
mod tests {
    async fn helper() {
        std::fs::write("/tmp/y", b"").unwrap();
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
}
"#;

    #[test]
    fn test_fn_signature_detection() {
        assert_eq!(fn_signature("pub async fn run() {"), Some(true));
        assert_eq!(fn_signature("    pub(super) fn helper("), Some(false));
        assert_eq!(fn_signature("const fn cheap() -> bool {"), Some(false));
        assert_eq!(fn_signature("let f = fn_ptr;"), None);
        assert_eq!(fn_signature("// fn in a comment"), None);
    }

    #[test]
    fn test_test_module_is_skipped() {
        let lines = production_lines(SAMPLE);
        assert!(lines.iter().all(|l| !l.code.contains("thread::sleep")));
        assert!(check_sleep(Path::new("sample.rs"), SAMPLE).is_empty());
    }

    #[test]
    fn test_blocking_calls_only_flagged_in_async_code() {
        let violations = check_blocking_in_async(Path::new("sample.rs"), SAMPLE);
        let lines: Vec<usize> = violations.iter().map(|v| v.line).collect();
        // read_to_string in async fn, stdout() in async block
        assert_eq!(lines, vec![9, 15]);
    }

    #[test]
    fn test_std_sockets_flagged() {
        let content = "use std::os::unix::net::UnixListener;\nfn f() {}\n";
        let violations = check_blocking_network(Path::new("x.rs"), content);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 1);
        assert!(violations[0].to_string().starts_with("x.rs:1 - Blocking network I/O"));
    }

    #[test]
    fn test_sleep_allowed_only_for_retry_backoff() {
        let content = "async fn dial() {\n    tokio::time::sleep(DELAY).await;\n}\n";
        assert!(check_sleep(Path::new("src/transport/named_pipe.rs"), content).is_empty());
        assert_eq!(check_sleep(Path::new("src/relay/reader.rs"), content).len(), 1);
    }
}
