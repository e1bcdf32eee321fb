#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A local binary cache plus a store directory to resolve roots against.
struct Fixture {
    _tmp: TempDir,
    cache: PathBuf,
    store: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let store = tmp.path().join("store");
        fs::create_dir_all(cache.join("nar")).unwrap();
        fs::create_dir_all(&store).unwrap();
        fs::write(
            cache.join("nix-cache-info"),
            format!("StoreDir: {}\nWantMassQuery: 1\n", store.display()),
        )
        .unwrap();
        Self {
            _tmp: tmp,
            cache,
            store,
        }
    }

    fn entry(&self, id: &str, with_blob: bool) {
        let url = format!("nar/{id}.nar.xz");
        fs::write(
            self.cache.join(format!("{id}.narinfo")),
            format!("StorePath: {}/{id}-pkg\nURL: {url}\nCompression: xz\n", self.store.display()),
        )
        .unwrap();
        if with_blob {
            fs::write(self.cache.join(&url), "nar").unwrap();
        }
    }

    fn store_path(&self, basename: &str) -> PathBuf {
        let path = self.store.join(basename);
        fs::create_dir_all(&path).unwrap();
        path
    }

    fn bucket(&self) -> String {
        format!("file://{}", self.cache.display())
    }

    fn has(&self, key: &str) -> bool {
        self.cache.join(key).exists()
    }

    /// A closure program whose closure of any path is the path alone.
    #[cfg(unix)]
    fn closure_program(&self) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.cache.parent().unwrap().join("fake-nix-store");
        fs::write(&path, "#!/bin/sh\nprintf '%s\\n' \"$3\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("narsweep").unwrap();
        cmd.env_remove("NARSWEEP_CONFIG").env("RUST_LOG", "info");
        cmd
    }
}

fn closure_env(program: &Path) -> (&'static str, String) {
    ("NARSWEEP_GC__CLOSURE_PROGRAM", program.display().to_string())
}

#[test]
fn all_live_dry_run_deletes_nothing() {
    let fx = Fixture::new();
    fx.entry("aaa", true);
    fx.entry("bbb", false);
    fs::write(fx.cache.join("nar/orphan.nar"), "nar").unwrap();

    fx.command()
        .arg(fx.bucket())
        .arg("--all-live")
        .arg("--dry-run")
        .assert()
        .success()
        .stderr(contains("narinfos: all(2), live(1), dead(0), dangling(1)"))
        .stderr(contains("nars: all(2), live(1), dead(1)"))
        .stderr(contains("deleting items 1-2/2..."));

    assert!(fx.has("bbb.narinfo"));
    assert!(fx.has("nar/orphan.nar"));
}

#[test]
fn all_live_removes_dangling_and_orphans() {
    let fx = Fixture::new();
    fx.entry("aaa", true);
    fx.entry("bbb", false);
    fs::write(fx.cache.join("nar/orphan.nar"), "nar").unwrap();

    fx.command()
        .arg(fx.bucket())
        .args(["--all-live", "--jobs", "3"])
        .assert()
        .success();

    assert!(fx.has("aaa.narinfo"));
    assert!(fx.has("nar/aaa.nar.xz"));
    assert!(!fx.has("bbb.narinfo"));
    assert!(!fx.has("nar/orphan.nar"));
    assert!(fx.has("nix-cache-info"));
}

#[test]
#[cfg(unix)]
fn roots_keep_their_closure() {
    let fx = Fixture::new();
    fx.entry("aaa", true);
    fx.entry("bbb", true);
    let root = fx.store_path("aaa-hello");
    let (key, program) = closure_env(&fx.closure_program());

    fx.command()
        .env(key, program)
        .arg(fx.bucket())
        .arg("--roots")
        .arg(&root)
        .assert()
        .success()
        .stderr(contains("narinfos: all(2), live(1), dead(1), dangling(0)"));

    assert!(fx.has("aaa.narinfo"));
    assert!(fx.has("nar/aaa.nar.xz"));
    assert!(!fx.has("bbb.narinfo"));
    assert!(!fx.has("nar/bbb.nar.xz"));
}

#[test]
#[cfg(unix)]
fn check_missing_exits_one_without_deleting() {
    let fx = Fixture::new();
    fx.entry("bbb", true);
    let root = fx.store_path("ccc-absent");
    let (key, program) = closure_env(&fx.closure_program());

    fx.command()
        .env(key, program)
        .arg(fx.bucket())
        .arg("--roots")
        .arg(&root)
        .arg("--check-missing")
        .assert()
        .code(1)
        .stderr(contains("find missing store hash: ccc"));

    assert!(fx.has("bbb.narinfo"));
    assert!(fx.has("nar/bbb.nar.xz"));
}

#[test]
fn missing_root_is_fatal() {
    let fx = Fixture::new();
    fx.entry("aaa", true);

    fx.command()
        .arg(fx.bucket())
        .arg("--roots")
        .arg(fx.store.join("does-not-exist"))
        .assert()
        .code(2)
        .stderr(contains("root path does not exist"));

    assert!(fx.has("aaa.narinfo"));
}

#[test]
fn missing_cache_info_is_fatal() {
    let fx = Fixture::new();
    fx.entry("aaa", true);
    fs::remove_file(fx.cache.join("nix-cache-info")).unwrap();

    fx.command()
        .arg(fx.bucket())
        .arg("--all-live")
        .assert()
        .code(2)
        .stderr(contains("nix-cache-info"));
}

#[test]
fn config_file_supplies_storage() {
    let fx = Fixture::new();
    fx.entry("aaa", false);
    let config = fx.cache.parent().unwrap().join("narsweep.toml");
    fs::write(
        &config,
        format!(
            "[storage]\ntype = \"filesystem\"\npath = \"{}\"\n\n[gc]\nall_live = true\ndry_run = true\n",
            fx.cache.display()
        ),
    )
    .unwrap();

    fx.command()
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("dangling(1)"));

    assert!(fx.has("aaa.narinfo"));
}
