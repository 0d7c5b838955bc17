use std::process::Command;

/// Short hash of the commit this resource was built from, if built inside a checkout.
fn resource_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let built_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let revision = resource_revision().unwrap_or_else(|| "unknown".to_string());
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();

    println!(
        "cargo:rustc-env=RESOURCE_LONG_VERSION={} ({} built {})",
        version,
        revision,
        built_at
    );

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
}
