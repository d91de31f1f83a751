//! Build script for shield-heartbeat
//!
//! Embeds the source revision and build time so every published run can be
//! traced back to the binary that produced it.

use std::process::Command;

/// Trimmed stdout of a successful command
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let revision = match command_output("git", &["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => {
            let dirty = command_output("git", &["status", "--porcelain"])
                .is_some_and(|status| !status.is_empty());
            if dirty {
                format!("{}-dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    };

    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=SHIELD_REVISION={}", revision);
    println!("cargo:rustc-env=SHIELD_BUILT_AT={}", built_at);
    println!("cargo:rustc-env=SHIELD_BUILD_PROFILE={}", profile);
}
