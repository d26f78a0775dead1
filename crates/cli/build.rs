use std::process::Command;

/// Short commit hash for `volmon --version`. Release tarballs built outside
/// a checkout can pass it in through VOLMON_BUILD_HASH.
fn git_hash() -> String {
    if let Ok(hash) = std::env::var("VOLMON_BUILD_HASH") {
        return hash;
    }
    Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-env-changed=VOLMON_BUILD_HASH");

    println!("cargo:rustc-env=GIT_COMMIT_HASH={}", git_hash());
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=TARGET={}", target);
}
