//! Integration tests against real git repositories.
//!
//! These tests build repositories with the git CLI inside a tempdir and
//! serve them through the libgit2-backed store.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use gitmod::core::types::Oid;
use gitmod::fs::{FileType, GitFs, ENOENT, ENOTDIR};
use gitmod::git::{Git, GitError};
use gitmod::mount::{MountError, ReferenceKind, RefreshOutcome, RepositoryContext, StartOptions};
use gitmod::store::ObjectStore;

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit on main.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);

        let repo = Self { dir };
        repo.write("README.md", "# Test Repo\n");
        repo.write("src/main.c", "int main(void) { return 0; }\n");
        repo.write("tools/build.sh", "#!/bin/sh\nmake\n");
        run_git(repo.path(), &["update-index", "--add", "--chmod=+x", "tools/build.sh"]);
        repo.commit_all("Initial commit");
        repo
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    fn commit_all(&self, message: &str) {
        run_git(self.path(), &["add", "-A"]);
        run_git(self.path(), &["commit", "-q", "-m", message]);
    }

    /// Resolve a revision with git itself.
    fn rev_parse(&self, rev: &str) -> String {
        let output = Command::new("git")
            .args(["rev-parse", rev])
            .current_dir(self.path())
            .output()
            .expect("git rev-parse failed");
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    fn start(&self, reference: &str, options: StartOptions) -> RepositoryContext {
        RepositoryContext::start(self.path(), reference, options).expect("failed to start")
    }
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn manual() -> StartOptions {
    StartOptions {
        fixed_reference: true,
        ..Default::default()
    }
}

#[test]
fn open_rejects_a_plain_directory() {
    let dir = TempDir::new().unwrap();
    let err = Git::open(dir.path()).unwrap_err();
    assert!(matches!(err, GitError::NotARepo { .. }));
}

#[test]
fn store_resolves_branch_to_commit() {
    let repo = TestRepo::new();
    let git = Git::open(repo.path()).unwrap();
    let object = git.revparse("main").unwrap();
    assert_eq!(object.kind_name(), "commit");
}

#[test]
fn branch_serves_its_tree() {
    let repo = TestRepo::new();
    let context = repo.start("main", manual());

    assert_eq!(context.reference_kind(), ReferenceKind::Commit);
    let generation = context.current_generation();
    assert_eq!(generation.tree_id().as_str(), repo.rev_parse("main^{tree}"));

    let readme = context.get("/README.md").unwrap();
    assert_eq!(readme.bytes(), Some(&b"# Test Repo\n"[..]));
    assert_eq!(readme.id().as_str(), repo.rev_parse("main:README.md"));
    readme.release();

    let src = context.get("src").unwrap();
    assert!(src.is_tree());
    assert_eq!(src.entry_count(), 1);
    src.release();
}

#[test]
fn commit_time_is_the_snapshot_time() {
    let repo = TestRepo::new();
    let context = repo.start("main", manual());
    let expected: i64 = {
        let output = Command::new("git")
            .args(["log", "-1", "--format=%ct", "main"])
            .current_dir(repo.path())
            .output()
            .unwrap();
        String::from_utf8(output.stdout).unwrap().trim().parse().unwrap()
    };
    assert_eq!(context.current_generation().time().unix_seconds(), expected);
}

#[test]
fn annotated_tag_resolves_through_to_its_commit() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["tag", "-a", "v1", "-m", "release"]);

    let context = repo.start("v1", manual());
    assert_eq!(context.reference_kind(), ReferenceKind::Tag);
    assert_eq!(
        context.current_generation().tree_id().as_str(),
        repo.rev_parse("v1^{tree}")
    );
}

#[test]
fn tree_id_is_served_without_a_monitor() {
    let repo = TestRepo::new();
    let tree = repo.rev_parse("main^{tree}");

    let context = repo.start(&tree, StartOptions::default());
    assert_eq!(context.reference_kind(), ReferenceKind::Tree);
    assert!(!context.is_monitored());

    let main_c = context.get("src/main.c").unwrap();
    assert!(main_c.is_blob());
    main_c.release();
}

#[test]
fn full_commit_id_is_not_monitored() {
    let repo = TestRepo::new();
    let commit = repo.rev_parse("main");
    let context = repo.start(&commit, StartOptions::default());
    assert_eq!(context.reference_kind(), ReferenceKind::Commit);
    assert!(!context.is_monitored());
}

#[test]
fn unknown_reference_fails_to_start() {
    let repo = TestRepo::new();
    let err = RepositoryContext::start(repo.path(), "no-such-branch", manual()).unwrap_err();
    assert!(matches!(err, MountError::ReferenceResolution { .. }));
}

#[test]
fn blob_reference_fails_to_start() {
    let repo = TestRepo::new();
    let err = RepositoryContext::start(repo.path(), "main:README.md", manual()).unwrap_err();
    assert!(matches!(err, MountError::ReferenceResolution { .. }));
}

#[test]
fn moving_the_branch_swaps_on_refresh() {
    let repo = TestRepo::new();
    let context = repo.start(
        "main",
        StartOptions {
            keep_in_memory: true,
            fixed_reference: true,
            ..Default::default()
        },
    );
    let old_tree = Oid::new(repo.rev_parse("main^{tree}")).unwrap();

    let held = context.get("README.md").unwrap();

    repo.write("README.md", "# Changed\n");
    repo.commit_all("Change readme");

    match context.refresh().unwrap() {
        RefreshOutcome::Swapped(event) => {
            assert_eq!(event.old_tree, old_tree);
            assert_eq!(event.new_tree.as_str(), repo.rev_parse("main^{tree}"));
            assert!(!event.old_disposed);
        }
        RefreshOutcome::Unchanged => panic!("expected a swap"),
    }

    assert_eq!(held.bytes(), Some(&b"# Test Repo\n"[..]));
    let fresh = context.get("README.md").unwrap();
    assert_eq!(fresh.bytes(), Some(&b"# Changed\n"[..]));

    assert!(held.release());
    assert!(!fresh.release());
    assert!(matches!(context.refresh().unwrap(), RefreshOutcome::Unchanged));
}

#[test]
fn uncached_generation_is_released_at_swap() {
    let repo = TestRepo::new();
    let context = repo.start("main", manual());
    let held = context.get("README.md").unwrap();
    assert!(!held.holds_usage());

    repo.write("README.md", "# Changed\n");
    repo.commit_all("Change readme");

    match context.refresh().unwrap() {
        RefreshOutcome::Swapped(event) => assert!(event.old_disposed),
        RefreshOutcome::Unchanged => panic!("expected a swap"),
    }
    assert_eq!(held.bytes(), Some(&b"# Test Repo\n"[..]));
    assert!(!held.release());
}

#[test]
fn commit_with_identical_tree_does_not_swap() {
    let repo = TestRepo::new();
    let context = repo.start("main", manual());
    run_git(repo.path(), &["commit", "-q", "--allow-empty", "-m", "Empty"]);
    assert!(matches!(context.refresh().unwrap(), RefreshOutcome::Unchanged));
    assert_eq!(context.swap_count(), 0);
}

#[test]
fn monitor_picks_up_a_moved_branch() {
    let repo = TestRepo::new();
    let context = repo.start(
        "main",
        StartOptions {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        },
    );
    assert!(context.is_monitored());
    let events = context.subscribe();

    repo.write("NEWS", "first release\n");
    repo.commit_all("Add news");

    let event = events
        .recv_timeout(Duration::from_secs(10))
        .expect("no swap observed");
    assert_eq!(event.new_tree.as_str(), repo.rev_parse("main^{tree}"));

    let news = context.get("NEWS").unwrap();
    assert_eq!(news.bytes(), Some(&b"first release\n"[..]));
    news.release();
    context.stop();
}

#[test]
fn keep_in_memory_caches_every_path() {
    let repo = TestRepo::new();
    let context = repo.start(
        "main",
        StartOptions {
            keep_in_memory: true,
            fixed_reference: true,
            ..Default::default()
        },
    );
    let generation = context.current_generation();
    assert!(generation.is_cached());
    // "/", README.md, src, src/main.c, tools, tools/build.sh
    assert_eq!(generation.cache_len(), 6);

    let first = context.get("tools/build.sh").unwrap();
    let second = context.get("tools/build.sh").unwrap();
    assert!(std::sync::Arc::ptr_eq(first.object(), second.object()));
    first.release();
    second.release();

    assert!(matches!(
        context.get("missing"),
        Err(MountError::PathNotFound { .. })
    ));
}

#[test]
fn bare_repository_is_served() {
    let repo = TestRepo::new();
    let bare = TempDir::new().unwrap();
    run_git(
        bare.path(),
        &["clone", "-q", "--bare", repo.path().to_str().unwrap(), "."],
    );

    let context = RepositoryContext::start(bare.path(), "main", manual()).unwrap();
    let readme = context.get("README.md").unwrap();
    assert_eq!(readme.bytes(), Some(&b"# Test Repo\n"[..]));
    readme.release();
}

#[test]
fn filesystem_calls_report_git_modes() {
    let repo = TestRepo::new();
    let fs = GitFs::new(repo.start("main", manual()), true);

    let root = fs.getattr("/").unwrap();
    assert_eq!(root.kind, FileType::Directory);
    assert_eq!(root.perm, 0o555);
    assert_eq!(root.nlink, 3 + 2);

    let script = fs.getattr("/tools/build.sh").unwrap();
    assert_eq!(script.kind, FileType::RegularFile);
    assert_eq!(script.perm, 0o555);

    let readme = fs.getattr("/README.md").unwrap();
    assert_eq!(readme.perm, 0o444);
    assert_eq!(readme.size, 12);

    let names: Vec<String> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, [".", "..", "README.md", "src", "tools"]);

    assert_eq!(fs.getattr("/nope").unwrap_err().errno(), ENOENT);
    assert_eq!(fs.readdir("/README.md").unwrap_err().errno(), ENOTDIR);

    let handle = fs.open("/src/main.c").unwrap();
    assert_eq!(fs.read(handle, 4, 4).unwrap(), b"main");
    fs.release(handle).unwrap();
    fs.destroy();
}

#[test]
fn exec_bits_are_stripped_unless_allowed() {
    let repo = TestRepo::new();
    let fs = GitFs::new(repo.start("main", manual()), false);
    assert_eq!(fs.getattr("/tools/build.sh").unwrap().perm, 0o444);
    fs.destroy();
}

#[test]
fn latin1_file_names_are_listed_and_readable() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let repo = TestRepo::new();
    let raw = OsStr::from_bytes(b"docs/caf\xe9.txt");
    std::fs::create_dir_all(repo.path().join("docs")).unwrap();
    std::fs::write(repo.path().join(raw), "latin-1\n").unwrap();
    repo.commit_all("Add a latin-1 name");

    for keep_in_memory in [false, true] {
        let options = StartOptions {
            keep_in_memory,
            ..manual()
        };
        let fs = GitFs::new(repo.start("main", options), false);

        let names: Vec<String> = fs
            .readdir("/docs")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, [".", "..", "caf\u{fffd}.txt"]);

        let root: Vec<String> = fs.readdir("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(root, [".", "..", "README.md", "docs", "src", "tools"]);

        let attr = fs.getattr("/docs/caf\u{fffd}.txt").unwrap();
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.size, 8);

        let handle = fs.open("/docs/caf\u{fffd}.txt").unwrap();
        assert_eq!(fs.read(handle, 0, 64).unwrap(), b"latin-1\n");
        fs.release(handle).unwrap();
        fs.destroy();
    }
}
