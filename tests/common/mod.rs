// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

static SEGMENT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A reading line in the quoted 13-column format
pub fn reading(timestamp: &str, index: i32, station: &str) -> String {
    format!(
        "\"34.05\",\"-118.24\",\"{}\",\"PM2.5\",\"12.3\",\"UG/M3\",\"12.1\",\"{}\",\"2\",\"{}\",\"South Coast AQMD\",\"060370016\",\"840060370016\"\n",
        timestamp, index, station
    )
}

/// Workspace with an input directory and an isolated config home
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("data")).expect("Failed to create data dir");
        fs::create_dir_all(dir.path().join("xdg")).expect("Failed to create config dir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Write an input file relative to the data directory
    pub fn write_input(&self, name: &str, content: &str) -> PathBuf {
        let path = self.data_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create input subdir");
        }
        fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_aqstore"));
        cmd.args(args)
            .current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.path().join("xdg"))
            .env_remove("AQSTORE_LOG")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run aqstore to completion, returning (stdout, stderr, exit code)
    pub fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = self
            .command(args)
            .output()
            .expect("Failed to execute aqstore");
        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }

    pub fn spawn(&self, args: &[&str]) -> Child {
        self.command(args).spawn().expect("Failed to start aqstore")
    }

    pub fn read_json(&self, name: &str) -> serde_json::Value {
        let text = fs::read_to_string(self.path().join(name)).expect("Failed to read result file");
        serde_json::from_str(&text).expect("Result file is not valid JSON")
    }
}

/// A shared region name unique to this test process
pub fn unique_segment(tag: &str) -> String {
    format!(
        "/aqstore-it-{}-{}-{}",
        tag,
        std::process::id(),
        SEGMENT_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Unlinks a shared region when dropped, so failed tests do not leak it
pub struct SegmentGuard(pub String);

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        let _ = aqstore::SharedRecordStore::unlink(&self.0);
    }
}
