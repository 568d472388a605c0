//! CLI integration tests for wheelwright.
//!
//! These tests run the binary end to end against fixture wheels, with shell
//! one-liners standing in for the real build and install commands.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the wheelwright binary command, isolated from the user's config.
fn wheelwright(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("wheelwright").unwrap();
    cmd.env("HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("WHEELWRIGHT_SEEDS")
        .env_remove("WHEELWRIGHT_CONFIG")
        .env_remove("WHEELWRIGHT_PYTHON");
    cmd
}

struct Layout {
    tmp: TempDir,
}

impl Layout {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("seeds")).unwrap();
        Layout { tmp }
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn seeds(&self) -> PathBuf {
        self.root().join("seeds")
    }

    fn store(&self) -> PathBuf {
        self.root().join("wheelhouse")
    }

    fn logs(&self) -> PathBuf {
        self.root().join("logs")
    }

    /// Write a config whose build step runs `build` through `sh -c` with the
    /// store directory as `$1`.
    fn config(&self, build: &str) -> PathBuf {
        let path = self.root().join("wheelwright.toml");
        let contents = format!(
            r#"hooks = []

[python]
interpreter = "false"

[validate]
command = ["true"]

[build]
command = ["sh", "-c", '{}', "build", "{{store}}", "{{specifier}}"]
"#,
            build
        );
        fs::write(&path, contents).unwrap();
        path
    }

    fn run(&self, config: &Path, extra: &[&str]) -> assert_cmd::assert::Assert {
        wheelwright(self.root())
            .arg(self.store())
            .arg(self.logs())
            .arg("--seeds")
            .arg(self.seeds())
            .arg("--config")
            .arg(config)
            .args(extra)
            .assert()
    }

    fn store_contents(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.store())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Write a minimal wheel declaring `requires`.
fn write_wheel(dir: &Path, name: &str, version: &str, requires: &[&str]) -> PathBuf {
    let mut metadata = format!("Metadata-Version: 2.1\nName: {}\nVersion: {}\n", name, version);
    for req in requires {
        metadata.push_str(&format!("Requires-Dist: {}\n", req));
    }

    let path = dir.join(format!("{}-{}-py3-none-any.whl", name, version));
    let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file(format!("{}-{}.dist-info/METADATA", name, version), options)
        .unwrap();
    zip.write_all(metadata.as_bytes()).unwrap();
    zip.finish().unwrap();
    path
}

#[test]
fn test_help() {
    let tmp = TempDir::new().unwrap();
    wheelwright(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--sys-platform"));
}

#[test]
fn test_empty_seed_dir_creates_directories() {
    let layout = Layout::new();
    let config = layout.config("exit 1");

    layout.run(&config, &[]).success();

    assert!(layout.store().is_dir());
    assert!(layout.logs().join("warnings.log").exists());
    assert!(layout.logs().join("errors.log").exists());
    let report = fs::read_to_string(layout.logs().join("report.json")).unwrap();
    assert!(report.contains("\"seeds\": []"));
}

#[test]
fn test_marker_excluded_dependency_is_not_built() {
    let layout = Layout::new();
    write_wheel(
        &layout.seeds(),
        "app",
        "1.0",
        &["requests>=2; sys_platform=='linux'"],
    );
    // Any build attempt would fail the run.
    let config = layout.config("exit 1");

    layout.run(&config, &["--sys-platform", "win32"]).success();

    assert_eq!(layout.store_contents(), vec!["app-1.0-py3-none-any.whl"]);
    assert!(!layout.logs().join("build-requests.log").exists());
}

#[test]
fn test_build_failure_exits_nonzero_and_is_logged() {
    let layout = Layout::new();
    write_wheel(&layout.seeds(), "app", "1.0", &["missingdep>=1"]);
    let config = layout.config("echo cannot build \"$2\"; exit 1");

    layout
        .run(&config, &["--sys-platform", "linux"])
        .failure()
        .code(1);

    let errors = fs::read_to_string(layout.logs().join("errors.log")).unwrap();
    assert!(errors.contains("failure(s)"));
    let warnings = fs::read_to_string(layout.logs().join("warnings.log")).unwrap();
    assert!(warnings.contains("missingdep"));
    let build_log = fs::read_to_string(layout.logs().join("build-missingdep.log")).unwrap();
    assert!(build_log.contains("cannot build missingdep>=1"));
}

#[test]
fn test_closure_is_built_and_rerun_is_idempotent() {
    let layout = Layout::new();
    write_wheel(&layout.seeds(), "app", "1.0", &["leaf_pkg"]);
    let build = layout.config("touch \"$1/leaf_pkg-2.0-py3-none-any.whl\"");

    layout.run(&build, &["--sys-platform", "linux"]).success();
    assert_eq!(
        layout.store_contents(),
        vec!["app-1.0-py3-none-any.whl", "leaf_pkg-2.0-py3-none-any.whl"]
    );

    // Everything is already present, so a failing build command is never run.
    let fail = layout.config("exit 1");
    layout.run(&fail, &["--sys-platform", "linux"]).success();
    assert_eq!(layout.store_contents().len(), 2);
}

#[test]
fn test_invalid_seed_is_not_accepted() {
    let layout = Layout::new();
    write_wheel(&layout.seeds(), "app", "1.0", &[]);
    let config = layout.config("exit 1");
    let contents = fs::read_to_string(&config)
        .unwrap()
        .replace(r#"command = ["true"]"#, r#"command = ["false"]"#);
    fs::write(&config, contents).unwrap();

    // Validation failures are reported but do not fail the run.
    layout.run(&config, &[]).success();

    assert!(layout.store_contents().is_empty());
    let errors = fs::read_to_string(layout.logs().join("errors.log")).unwrap();
    assert!(errors.contains("validation of app-1.0-py3-none-any.whl failed"));
}

#[test]
fn test_unparsable_config_is_an_error() {
    let layout = Layout::new();
    let config = layout.root().join("broken.toml");
    fs::write(&config, "[build\ncommand = 1").unwrap();

    layout
        .run(&config, &[])
        .failure()
        .stderr(predicate::str::contains("failed to parse config file"));
}

#[cfg(unix)]
#[test]
fn test_markers_follow_the_configured_interpreter() {
    use std::os::unix::fs::PermissionsExt;

    let layout = Layout::new();
    let python = layout.root().join("python3.10");
    fs::write(
        &python,
        "#!/bin/sh\necho '{\"python_version\": \"3.10\", \"python_full_version\": \"3.10.14\"}'\n",
    )
    .unwrap();
    fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();

    write_wheel(
        &layout.seeds(),
        "app",
        "1.0",
        &["tomli>=1.1; python_version < \"3.11\""],
    );
    let config = layout.config("touch \"$1/tomli-2.0.1-py3-none-any.whl\"");
    let contents = fs::read_to_string(&config).unwrap().replace(
        r#"interpreter = "false""#,
        &format!("interpreter = '{}'", python.display()),
    );
    fs::write(&config, contents).unwrap();

    layout.run(&config, &["--sys-platform", "linux"]).success();

    assert_eq!(
        layout.store_contents(),
        vec!["app-1.0-py3-none-any.whl", "tomli-2.0.1-py3-none-any.whl"]
    );
}
