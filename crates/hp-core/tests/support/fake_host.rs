//! On-disk fake host for no-mock integration tests.
//!
//! Lays out a procfs-shaped tree and a utmp file in a temp directory so the
//! live evidence source can be pointed at it.

#![allow(dead_code)]

use hp_core::collect::login::{encode_utmp_record, USER_PROCESS};
use hp_core::collect::LiveSource;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct FakeHost {
    dir: TempDir,
}

impl FakeHost {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let host = Self { dir };
        fs::create_dir_all(host.proc_root().join("net")).expect("create net dir");
        fs::write(host.proc_root().join("modules"), "").expect("write modules");
        host
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn proc_root(&self) -> PathBuf {
        self.dir.path().join("proc")
    }

    pub fn utmp_path(&self) -> PathBuf {
        self.dir.path().join("utmp")
    }

    pub fn source(&self) -> LiveSource {
        LiveSource::new(self.proc_root(), self.utmp_path())
    }

    pub fn with_process(self, pid: u32, comm: &str) -> Self {
        let dir = self.proc_root().join(pid.to_string());
        fs::create_dir_all(&dir).expect("create pid dir");
        fs::write(
            dir.join("stat"),
            format!("{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194560"),
        )
        .expect("write stat");
        self
    }

    pub fn with_module(self, name: &str) -> Self {
        let path = self.proc_root().join("modules");
        let mut content = fs::read_to_string(&path).unwrap_or_default();
        content.push_str(&format!("{name} 16384 0 - Live 0xffffffffc0a00000\n"));
        fs::write(path, content).expect("write modules");
        self
    }

    /// Create a file (and its parents) under the fake root.
    pub fn with_file(self, relative: &str) -> Self {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, "").expect("write file");
        self
    }

    /// Replace the utmp file with USER_PROCESS records `(user, tv_sec)`.
    pub fn write_logins(&self, logins: &[(&str, i32)]) {
        let mut bytes = Vec::new();
        for (i, (user, tv_sec)) in logins.iter().enumerate() {
            bytes.extend(encode_utmp_record(
                USER_PROCESS,
                user,
                &format!("pts/{i}"),
                "10.0.0.7",
                4000 + i as i32,
                *tv_sec,
            ));
        }
        fs::write(self.utmp_path(), bytes).expect("write utmp");
    }
}
