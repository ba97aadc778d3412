//! Build identity of this binary
//!
//! `build.rs` bakes git and toolchain details into `PIPE_RELAY_*` variables.
//! Nodes log them at startup and send them to peers in the `User-Agent` of
//! forwarded reads, so a mixed-version cluster shows up in peer logs.

use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    git_dirty: &'static str,
    pub built_at: &'static str,
    pub target: &'static str,
    pub host: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

static BUILD: BuildInfo = BuildInfo {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
    git_hash: env!("PIPE_RELAY_GIT_HASH"),
    git_branch: env!("PIPE_RELAY_GIT_BRANCH"),
    git_dirty: env!("PIPE_RELAY_GIT_DIRTY"),
    built_at: env!("PIPE_RELAY_BUILD_TIMESTAMP"),
    target: env!("PIPE_RELAY_TARGET"),
    host: env!("PIPE_RELAY_HOST"),
    profile: env!("PIPE_RELAY_PROFILE"),
    rustc: env!("PIPE_RELAY_RUSTC_VERSION"),
};

pub fn build_info() -> &'static BuildInfo {
    &BUILD
}

/// Write the `version` command's output to stdout
pub fn print_version() {
    print!("{}", BUILD);
}

impl BuildInfo {
    /// `0.1.0-abc1234`, with `-dirty` when built from uncommitted changes
    pub fn full_version(&self) -> String {
        let suffix = if self.git_dirty == "true" { "-dirty" } else { "" };
        format!("{}-{}{}", self.version, self.git_hash, suffix)
    }

    /// `pipe-relay/<full version>`
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.name, self.full_version())
    }

    pub fn is_release(&self) -> bool {
        self.profile == "release"
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        for (label, value) in [
            ("Commit", format!("{} ({})", self.git_hash, self.git_branch)),
            ("Built", self.built_at.to_string()),
            ("Profile", self.profile.to_string()),
            ("Target", self.target.to_string()),
            ("Host", self.host.to_string()),
            ("Compiler", self.rustc.to_string()),
        ] {
            writeln!(f, "  {:<9} {}", format!("{}:", label), value)?;
        }
        Ok(())
    }
}
