// Shared helpers for integration tests.
//
// Provides a temporary repository with separate root and home directories,
// a simulated system whose `PATH` changes as packages are installed, and a
// log that records every message.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dotfile_engine::engine::{self, Context, Report};
use dotfile_engine::error::ManifestError;
use dotfile_engine::exec::{ExecResult, Executor};
use dotfile_engine::logging::Log;
use dotfile_engine::manifest::loader::{self, MANIFEST_FILE};
use dotfile_engine::manifest::{EnginePaths, Manifest};
use dotfile_engine::platform::{Os, Platform};

/// Executor standing in for the host system.
///
/// `which` answers from a mutable set of binaries.  Commands matching an
/// `installs` rule add the rule's binary to that set; commands matching a
/// `fails` prefix exit non-zero.  Everything else succeeds silently.
#[derive(Debug, Default)]
pub struct FakeSystem {
    on_path: Mutex<HashSet<String>>,
    installs: Vec<(String, String)>,
    fails: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// `program` is already on `PATH`.
    pub fn with_binary(self, program: &str) -> Self {
        self.on_path.lock().unwrap().insert(program.to_string());
        self
    }

    /// Running a command starting with `prefix` puts `binary` on `PATH`.
    pub fn installs(mut self, prefix: &str, binary: &str) -> Self {
        self.installs.push((prefix.to_string(), binary.to_string()));
        self
    }

    /// Commands starting with `prefix` fail.
    pub fn fails(mut self, prefix: &str) -> Self {
        self.fails.push(prefix.to_string());
        self
    }

    /// Command lines executed so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of executed commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn respond(&self, program: &str, args: &[&str]) -> ExecResult {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());
        if self.fails.iter().any(|p| line.starts_with(p.as_str())) {
            return ExecResult {
                stderr: format!("{program}: simulated failure"),
                code: Some(1),
                ..ExecResult::default()
            };
        }
        for (prefix, binary) in &self.installs {
            if line.starts_with(prefix.as_str()) {
                self.on_path.lock().unwrap().insert(binary.clone());
            }
        }
        ExecResult {
            success: true,
            code: Some(0),
            ..ExecResult::default()
        }
    }
}

impl Executor for FakeSystem {
    fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        Ok(self.respond(program, args))
    }

    fn run_in_unchecked(&self, _: &Path, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        Ok(self.respond(program, args))
    }

    fn which(&self, program: &str) -> bool {
        self.on_path.lock().unwrap().contains(program)
    }
}

/// Log that keeps every message as `level: text`.
#[derive(Debug, Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<String>>,
}

impl RecordingLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    fn push(&self, level: &str, msg: &str) {
        self.lines.lock().unwrap().push(format!("{level}: {msg}"));
    }
}

impl Log for RecordingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry-run", msg);
    }
}

/// An isolated repository and home directory.
///
/// Both live under one [`tempfile::TempDir`] that is deleted on drop.
pub struct TestRepo {
    dir: tempfile::TempDir,
    pub platform: Platform,
    pub log: Arc<RecordingLog>,
}

impl TestRepo {
    /// Empty repository evaluated as macOS.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("repo")).expect("create repo dir");
        std::fs::create_dir_all(dir.path().join("home")).expect("create home dir");
        Self {
            dir,
            platform: Platform::new(Os::MacOs, &[]),
            log: Arc::new(RecordingLog::default()),
        }
    }

    /// Evaluate against `platform` instead.
    pub fn on(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Write the manifest.
    pub fn with_manifest(self, content: &str) -> Self {
        std::fs::write(self.root().join(MANIFEST_FILE), content).expect("write manifest");
        self
    }

    /// Write `content` to `rel` inside the repository.
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        write_file(&self.root().join(rel), content);
        self
    }

    /// Write `content` to `rel` inside the home directory.
    pub fn with_home_file(self, rel: &str, content: &str) -> Self {
        write_file(&self.home().join(rel), content);
        self
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn paths(&self) -> EnginePaths {
        EnginePaths::new(self.root(), self.home(), None)
    }

    /// Load and validate the manifest.
    pub fn manifest(&self) -> Result<Manifest, ManifestError> {
        loader::load(&self.root().join(MANIFEST_FILE), &self.paths())
    }

    /// Run context backed by `system`.
    pub fn context(&self, system: &Arc<FakeSystem>) -> Context {
        Context::new(
            self.paths(),
            self.platform.clone(),
            Arc::clone(&self.log) as Arc<dyn Log>,
        )
        .with_executor(Arc::clone(system) as Arc<dyn Executor>)
    }

    /// Run `requested` (all targets when empty) against `system`.
    pub fn run(&self, requested: &[&str], system: &Arc<FakeSystem>) -> Result<Report, ManifestError> {
        self.run_with(requested, self.context(system))
    }

    /// Run `requested` with a prepared context.
    pub fn run_with(&self, requested: &[&str], ctx: Context) -> Result<Report, ManifestError> {
        let manifest = self.manifest()?;
        let requested: Vec<String> = requested.iter().map(ToString::to_string).collect();
        engine::run(&manifest, &requested, &ctx, None)
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write file");
}
