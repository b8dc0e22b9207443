pub mod cli;
pub mod comments;
pub mod config;
pub mod deserialize;
pub mod git;
pub mod header;
pub mod language;
pub mod parser;
pub mod reflow;
pub mod serialize;
pub mod suggest;
pub mod workspace;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the diff a thread is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffSide {
    Left,
    #[default]
    Right,
}

/// Whether a thread targets lines or the file as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Subject {
    #[default]
    Line,
    File,
}

/// A pull request and the review state attached to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub base_commit: String,
    #[serde(default)]
    pub head_commit: String,
    #[serde(default)]
    pub threads: Vec<ReviewThread>,
    #[serde(default)]
    pub comments: Vec<IssueComment>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// A sequence of review comments anchored to one code location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewThread {
    pub path: String,
    /// 1-based end line. 0 when the thread has no live line.
    pub line: u32,
    pub start_line: Option<u32>,
    #[serde(default)]
    pub side: DiffSide,
    #[serde(default)]
    pub subject: Subject,
    #[serde(default)]
    pub is_outdated: bool,
    #[serde(default)]
    pub is_resolved: bool,
    pub comments: Vec<ReviewComment>,
}

/// A single inline review comment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_new: bool,
}

/// A top-level pull request conversation comment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssueComment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_new: bool,
}

impl ReviewThread {
    /// Creation time of the first synced comment, used to order threads that
    /// share a line. New-only threads have none and sort last.
    pub fn first_created_at(&self) -> Option<DateTime<Utc>> {
        self.comments
            .iter()
            .filter(|c| !c.is_new)
            .filter_map(|c| c.created_at)
            .min()
    }

    /// Whether any comment in the thread has been synced upstream.
    pub fn is_synced(&self) -> bool {
        self.comments.iter().any(|c| !c.is_new)
    }

    /// Comments in display order: synced ones by creation time, then new ones.
    pub fn ordered_comments(&self) -> Vec<&ReviewComment> {
        let mut comments: Vec<&ReviewComment> = self.comments.iter().collect();
        comments.sort_by_key(|c| (c.is_new, if c.is_new { None } else { c.created_at }));
        comments
    }
}

/// One zero-context region of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub content_hash: String,
}

/// A per-file problem recorded during a pass that did not stop the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: std::path::PathBuf,
    pub message: String,
}

/// A file containing diff hunks.
#[derive(Debug, Clone)]
pub struct DiffFile {
    pub path: std::path::PathBuf,
    pub hunks: Vec<Hunk>,
}
