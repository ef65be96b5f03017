use semver::Version;
use std::process::Command;

#[test]
fn prints_binary_name_and_semver() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("ciris"))
        .arg("--version")
        .output()
        .expect("run --version");

    assert!(output.status.success(), "--version should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.trim();

    let mut tokens = line.split_whitespace();
    let binary_name = tokens.next().unwrap_or_default();
    assert_eq!(binary_name, "ciris", "binary name should prefix version output");

    let version = tokens.next().unwrap_or_default();
    let parsed = Version::parse(version).expect("second token must be semver");
    assert_eq!(parsed.to_string(), env!("CARGO_PKG_VERSION"));
}
