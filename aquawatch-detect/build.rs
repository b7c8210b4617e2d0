//! Build identification for `GET /health`
//!
//! `GIT_HASH` comes from `AQUAWATCH_GIT_HASH` when set (container builds
//! without a `.git` directory), otherwise from `git rev-parse`. The build
//! timestamp is UTC, RFC 3339 to the second.

use std::env;
use std::process::Command;

const UNKNOWN: &str = "unknown";

fn git_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=AQUAWATCH_GIT_HASH");
    println!("cargo:rerun-if-changed=../.git/HEAD");

    let hash = env::var("AQUAWATCH_GIT_HASH")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(git_hash)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=GIT_HASH={}", hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", built_at);
}
