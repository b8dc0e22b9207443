use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use inline_review::config::Config;
use inline_review::deserialize::deserialize;
use inline_review::git::GitRevisions;
use inline_review::suggest::{self, Revisions, suggest_workspace};
use inline_review::workspace::{FsWorkspace, MemoryWorkspace};

/// Base contents and per-file diffs supplied up front.
#[derive(Default)]
struct FakeRevisions {
    base: BTreeMap<PathBuf, String>,
    diffs: BTreeMap<PathBuf, String>,
}

impl FakeRevisions {
    fn with(mut self, path: &str, base: &str, hunks: &str) -> Self {
        self.base.insert(PathBuf::from(path), base.to_string());
        self.diffs.insert(
            PathBuf::from(path),
            format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n{hunks}"),
        );
        self
    }
}

impl Revisions for FakeRevisions {
    fn changed_files(&self) -> suggest::Result<Vec<PathBuf>> {
        Ok(self.diffs.keys().cloned().collect())
    }

    fn diff(&self, path: &Path) -> suggest::Result<String> {
        Ok(self.diffs.get(path).cloned().unwrap_or_default())
    }

    fn base_content(&self, path: &Path) -> suggest::Result<Option<String>> {
        Ok(self.base.get(path).cloned())
    }
}

#[test]
fn replaced_lines_become_a_ranged_suggestion() {
    let mut ws = MemoryWorkspace::from_files([("calc.py", "a\nX\nY\ne\n")]);
    let revisions = FakeRevisions::default().with(
        "calc.py",
        "a\nb\nc\nd\ne\n",
        "@@ -2,3 +2,2 @@\n-b\n-c\n-d\n+X\n+Y\n",
    );

    let report = suggest_workspace(&mut ws, &revisions, &Config::default()).unwrap();
    assert_eq!(report.suggestions(), 1);
    assert_eq!(report.notes(), 0);
    assert_eq!(report.warnings(), 0);
    assert_eq!(
        ws.get("calc.py").unwrap(),
        "a\nb\nc\nd\n# ┃━━━ new, range -2\n# ┃ ```suggestion\n# ┃ X\n# ┃ Y\n# ┃ ```\ne\n"
    );

    let pr = deserialize(&ws, &Config::default()).unwrap().pull_request;
    assert_eq!(pr.threads.len(), 1);
    let thread = &pr.threads[0];
    assert_eq!(thread.path, "calc.py");
    assert_eq!(thread.line, 4);
    assert_eq!(thread.start_line, Some(2));
    assert!(thread.comments[0].is_new);
    assert_eq!(thread.comments[0].body, "```suggestion\nX\nY\n```");
}

#[test]
fn added_comment_becomes_a_note() {
    let mut ws = MemoryWorkspace::from_files([("a.py", "x = 1\n# check this\n")]);
    let revisions = FakeRevisions::default().with("a.py", "x = 1\n", "@@ -1,0 +2 @@\n+# check this\n");

    let report = suggest_workspace(&mut ws, &revisions, &Config::default()).unwrap();
    assert_eq!(report.notes(), 1);
    assert_eq!(report.suggestions(), 0);
    assert_eq!(ws.get("a.py").unwrap(), "x = 1\n# ┃━━━ new\n# ┃ check this\n");
}

#[test]
fn added_code_is_only_a_warning() {
    let mut ws = MemoryWorkspace::from_files([("a.py", "x = 1\ny = 2\n")]);
    let revisions = FakeRevisions::default().with("a.py", "x = 1\n", "@@ -1,0 +2 @@\n+y = 2\n");

    let report = suggest_workspace(&mut ws, &revisions, &Config::default()).unwrap();
    assert_eq!(report.notes(), 0);
    assert_eq!(report.suggestions(), 0);
    assert_eq!(report.warnings(), 1);
    assert_eq!(ws.get("a.py").unwrap(), "x = 1\ny = 2\n");
}

#[test]
fn typed_structured_comments_are_left_alone() {
    let working = "fn a() {}\n// ┃━━━ new\n// ┃ fine as is\n";
    let mut ws = MemoryWorkspace::from_files([("a.rs", working)]);
    let revisions = FakeRevisions::default().with(
        "a.rs",
        "fn a() {}\n",
        "@@ -1,0 +2,2 @@\n+// ┃━━━ new\n+// ┃ fine as is\n",
    );

    let report = suggest_workspace(&mut ws, &revisions, &Config::default()).unwrap();
    assert_eq!(report.notes() + report.suggestions() + report.warnings(), 0);
    assert_eq!(ws.get("a.rs").unwrap(), working);
}

#[test]
fn unsupported_and_state_files_are_skipped() {
    let mut ws = MemoryWorkspace::from_files([("data.json", "{\"a\": 2}\n")]);
    let revisions = FakeRevisions::default()
        .with("data.json", "{\"a\": 1}\n", "@@ -1 +1 @@\n-{\"a\": 1}\n+{\"a\": 2}\n")
        .with(".inline-review.md", "", "@@ -0,0 +1 @@\n+┃ hi\n");

    let report = suggest_workspace(&mut ws, &revisions, &Config::default()).unwrap();
    assert!(report.files.is_empty());
    assert_eq!(ws.get("data.json").unwrap(), "{\"a\": 2}\n");
}

fn git(root: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn freehand_edits_against_a_real_commit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    git(root, &["init", "-q"]);
    fs::write(
        root.join("lib.rs"),
        "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\npub fn sub(a: i32, b: i32) -> i32 {\n    a - b\n}\n",
    )
    .unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "init"]);

    fs::write(
        root.join("lib.rs"),
        "pub fn add(a: i32, b: i32) -> i32 {\n    a.wrapping_add(b)\n}\n\npub fn sub(a: i32, b: i32) -> i32 {\n    // overflow here too?\n    a - b\n}\n",
    )
    .unwrap();

    let mut ws = FsWorkspace::new(root);
    let revisions = GitRevisions::new(root, "HEAD").unwrap();
    let report = suggest_workspace(&mut ws, &revisions, &Config::default()).unwrap();
    assert_eq!(report.suggestions(), 1);
    assert_eq!(report.notes(), 1);

    assert_eq!(
        fs::read_to_string(root.join("lib.rs")).unwrap(),
        "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n    // ┃━━━ new\n    // ┃ ```suggestion\n    // ┃     a.wrapping_add(b)\n    // ┃ ```\n}\n\npub fn sub(a: i32, b: i32) -> i32 {\n// ┃━━━ new\n// ┃ overflow here too?\n    a - b\n}\n"
    );
}
