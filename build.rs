//! Build script for the pipe relay
//!
//! Exposes build details to the crate as `PIPE_RELAY_*` compile-time
//! environment variables: git revision, branch and dirty state, build
//! timestamp, target and host triples, profile and rustc version.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = run("git", &["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(unknown);
    let git_branch = run("git", &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(unknown);
    let git_dirty = match run("git", &["status", "--porcelain"]) {
        Some(status) if !status.is_empty() => "true",
        Some(_) => "false",
        None => "unknown",
    };
    let rustc_version = run("rustc", &["--version"]).unwrap_or_else(unknown);

    let vars = [
        ("GIT_HASH", git_hash),
        ("GIT_BRANCH", git_branch),
        ("GIT_DIRTY", git_dirty.to_string()),
        (
            "BUILD_TIMESTAMP",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("TARGET", cargo_var("TARGET")),
        ("PROFILE", cargo_var("PROFILE")),
        ("RUSTC_VERSION", rustc_version),
        ("HOST", cargo_var("HOST")),
    ];

    for (name, value) in &vars {
        println!("cargo:rustc-env=PIPE_RELAY_{}={}", name, value);
    }
}

/// Run a command and return its trimmed stdout if it succeeded
fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn cargo_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| unknown())
}

fn unknown() -> String {
    "unknown".to_string()
}
