// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=ASSET_TRACKER_VERSION");

    // Packaged builds pin the version explicitly
    let version = std::env::var("ASSET_TRACKER_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(describe_version);

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Crate version, suffixed with the commit when built from a checkout
///
/// "0.1.0" at a tagged commit becomes "0.1.0-abcdef1", and a build some
/// commits past the tag becomes "0.1.0-dirty-abcdef1".
fn describe_version() -> String {
    let package = env!("CARGO_PKG_VERSION").to_string();

    let Some(described) = git(&["describe", "--tags", "--always", "--match", "v*"]) else {
        return package;
    };
    let described = described.strip_prefix('v').unwrap_or(&described).to_string();

    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if parts.len() == 3 {
        let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
        return format!("{}-dirty-{}", parts[2], hash);
    }

    match git(&["rev-parse", "--short", "HEAD"]) {
        // No tag yet: describe printed the bare hash
        Some(hash) if hash == described => format!("{}-{}", package, hash),
        Some(hash) => format!("{}-{}", described, hash),
        None => package,
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}
