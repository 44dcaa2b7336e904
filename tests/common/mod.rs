#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use hashward::core::config::Config;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_hashward") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "hashward.exe"
    } else {
        "hashward"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve hashward binary path for integration test"),
    }
}

/// Isolated data layout for one test: every path lives under `root`.
pub struct Sandbox {
    pub root: tempfile::TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create sandbox");
        fs::create_dir_all(root.path().join("target")).expect("create target dir");
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn target(&self) -> PathBuf {
        self.path().join("target")
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.path().join("quarantine")
    }

    pub fn signature_file(&self) -> PathBuf {
        self.path().join("signatures.txt")
    }

    pub fn session_log(&self) -> PathBuf {
        self.path().join("scan.log")
    }

    pub fn activity_log(&self) -> PathBuf {
        self.path().join("activity.jsonl")
    }

    pub fn config_file(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.scanner.parallelism = 2;
        config.paths.config_file = self.config_file();
        config.paths.signature_file = self.signature_file();
        config.paths.quarantine_dir = self.quarantine_dir();
        config.paths.session_log = self.session_log();
        config.paths.activity_log = self.activity_log();
        config
    }

    /// Write the sandbox config to disk so the binary picks it up via `--config`.
    pub fn write_config(&self) {
        let raw = toml::to_string_pretty(&self.config()).expect("serialize config");
        fs::write(self.config_file(), raw).expect("write config");
    }

    pub fn write_signatures(&self, digests: &[&str]) {
        fs::write(self.signature_file(), digests.join("\n")).expect("write signatures");
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("hashward-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env_remove("HWD_OUTPUT_FORMAT")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute hashward command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
