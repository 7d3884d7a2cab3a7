use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_gitfam"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "gitfam init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".gitfam.toml");
    assert!(config_path.exists(), ".gitfam.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    for section in ["[scoring]", "[hotspot]", "[batch]", "[reviewers]"] {
        assert!(content.contains(section), "missing {section}");
    }

    // Commented-out template parses to the defaults
    let config: gitfam_core::FamConfig = toml::from_str(&content).unwrap();
    config.validate().unwrap();
    assert_eq!(config.hotspot.window_days, 90);
    assert_eq!(config.reviewers.count, 3);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".gitfam.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_gitfam"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".gitfam.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn malformed_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".gitfam.toml"),
        "[scoring]\nweights = \"0.9,0.9,0.9\"\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_gitfam"))
        .args(["coverage", "--color", "never"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sum to 1.0") || stderr.contains(".gitfam.toml"), "{stderr}");
}
