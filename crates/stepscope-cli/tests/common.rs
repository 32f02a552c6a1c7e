use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

pub fn sample_session() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../stepscope-providers/tests/samples/session-parallel.jsonl")
}

/// Runs the binary with config lookup pinned inside a scratch directory,
/// so a user's own config never leaks into assertions.
pub struct TestFixture {
    dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    #[allow(deprecated)]
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stepscope").expect("Failed to find stepscope binary");
        cmd.env("STEPSCOPE_CONFIG", self.dir.path().join("config.toml"));
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn write_config(&self, body: &str) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        std::fs::write(&path, body).expect("Failed to write config");
        path
    }

    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.command().args(args).output().expect("Failed to run");
        assert!(
            output.status.success(),
            "stepscope {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
    }
}
