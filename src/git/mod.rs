use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

use crate::suggest::Revisions;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("not in a git repository")]
    NotARepo,
    #[error("git command failed: {0}")]
    CommandFailed(String),
    #[error("invalid git ref: {0}")]
    InvalidRef(String),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GitError>;

fn git(root: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(root);
    cmd
}

fn check(output: Output, what: &str) -> Result<Vec<u8>> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::CommandFailed(format!(
            "{what} failed: {}",
            stderr.trim()
        )));
    }
    Ok(output.stdout)
}

/// Split NUL-terminated `-z` output into paths.
fn split_paths(stdout: Vec<u8>) -> Result<Vec<PathBuf>> {
    let text = String::from_utf8(stdout)?;
    Ok(text
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Find the root of the git repository containing the current directory.
pub fn find_repo_root() -> Result<PathBuf> {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("--show-toplevel")
        .output()?;

    if !output.status.success() {
        return Err(GitError::NotARepo);
    }

    let path = String::from_utf8(output.stdout)?.trim().to_string();

    Ok(PathBuf::from(path))
}

/// Whether `root` lies inside a git work tree.
pub fn is_repo(root: &Path) -> bool {
    git(root)
        .arg("rev-parse")
        .arg("--is-inside-work-tree")
        .output()
        .map(|o| o.status.success() && o.stdout.starts_with(b"true"))
        .unwrap_or(false)
}

/// Validate a git ref to prevent shell injection (only for user-supplied refs).
pub fn validate_git_ref(ref_str: &str) -> Result<()> {
    if ref_str.is_empty() {
        return Err(GitError::InvalidRef("Empty git ref".to_string()));
    }
    if ref_str.starts_with('-') {
        return Err(GitError::InvalidRef(format!(
            "git ref may not start with '-': {ref_str}"
        )));
    }

    // Check for shell metacharacters
    for ch in ref_str.chars() {
        if !ch.is_alphanumeric()
            && !matches!(
                ch,
                '-' | '_' | '/' | '.' | '~' | '^' | '@' | ':' | '{' | '}'
            )
        {
            return Err(GitError::InvalidRef(format!(
                "Invalid character in git ref: '{}'",
                ch
            )));
        }
    }

    Ok(())
}

/// Tracked files plus untracked files that are not ignored, relative to
/// `root`.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let output = git(root)
        .arg("ls-files")
        .arg("-z")
        .arg("--cached")
        .arg("--others")
        .arg("--exclude-standard")
        .output()?;
    let mut files = split_paths(check(output, "git ls-files")?)?;
    files.sort();
    files.dedup();
    Ok(files)
}

/// Resolve `rev` to a full commit SHA.
pub fn resolve_commit(root: &Path, rev: &str) -> Result<String> {
    validate_git_ref(rev)?;
    let output = git(root)
        .arg("rev-parse")
        .arg("--verify")
        .arg("--quiet")
        .arg(format!("{rev}^{{commit}}"))
        .output()?;
    if !output.status.success() {
        return Err(GitError::InvalidRef(format!("{rev} is not a commit")));
    }
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Files whose working-tree content differs from `commit`.
pub fn changed_files(root: &Path, commit: &str) -> Result<Vec<PathBuf>> {
    let output = git(root)
        .arg("diff")
        .arg("--name-only")
        .arg("-z")
        .arg("--no-renames")
        .arg(commit)
        .arg("--")
        .output()?;
    split_paths(check(output, "git diff --name-only")?)
}

/// Zero-context diff of one file from `commit` to the working tree.
pub fn file_diff(root: &Path, commit: &str, path: &Path) -> Result<String> {
    let output = git(root)
        .arg("diff")
        .arg("-U0")
        .arg("--no-color")
        .arg("--no-ext-diff")
        .arg("--no-renames")
        .arg(commit)
        .arg("--")
        .arg(path)
        .output()?;
    String::from_utf8(check(output, "git diff -U0")?).map_err(GitError::from)
}

/// Content of `path` at `commit`, `None` when it does not exist there or is
/// not text.
pub fn show_file(root: &Path, commit: &str, path: &Path) -> Result<Option<String>> {
    let spec = format!("{commit}:{}", path.to_string_lossy().replace('\\', "/"));
    let exists = git(root).arg("cat-file").arg("-e").arg(&spec).output()?;
    if !exists.status.success() {
        return Ok(None);
    }
    let output = git(root).arg("show").arg(&spec).output()?;
    Ok(crate::workspace::decode_text(check(output, "git show")?))
}

/// A fixed commit of the repository at `root`, compared against the working
/// tree.
#[derive(Debug, Clone)]
pub struct GitRevisions {
    root: PathBuf,
    commit: String,
}

impl GitRevisions {
    pub fn new(root: impl Into<PathBuf>, rev: &str) -> Result<Self> {
        let root = root.into();
        if !is_repo(&root) {
            return Err(GitError::NotARepo);
        }
        let commit = resolve_commit(&root, rev)?;
        log::debug!("comparing working tree against {rev} ({commit})");
        Ok(Self { root, commit })
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }
}

impl Revisions for GitRevisions {
    fn changed_files(&self) -> crate::suggest::Result<Vec<PathBuf>> {
        Ok(changed_files(&self.root, &self.commit)?)
    }

    fn diff(&self, path: &Path) -> crate::suggest::Result<String> {
        Ok(file_diff(&self.root, &self.commit, path)?)
    }

    fn base_content(&self, path: &Path) -> crate::suggest::Result<Option<String>> {
        Ok(show_file(&self.root, &self.commit, path)?)
    }
}
