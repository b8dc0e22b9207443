//! Projects a [`PullRequest`] onto the workspace: review threads become
//! structured comment blocks inside the files they annotate, PR metadata and
//! conversation comments go to the state file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::comments::{CommentBlock, Entry, FileCommentModel, Layout, Line, classify_line};
use crate::config::Config;
use crate::header::{Header, MARKER, ReplyTo};
use crate::workspace::{Workspace, WorkspaceError};
use crate::{DiffSide, FileFailure, IssueComment, PullRequest, ReviewThread, Subject};

#[derive(Debug, Error)]
pub enum Error {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// What a pass changed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl Report {
    fn fail(&mut self, path: &Path, error: impl std::fmt::Display) {
        log::warn!("{}: {error}", path.display());
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }
}

/// Write `pr` into the workspace.
///
/// Files whose content would not change are left untouched, so running this
/// twice on the same input writes nothing the second time.
pub fn serialize<W: Workspace>(pr: &PullRequest, ws: &mut W, config: &Config) -> Result<Report> {
    let languages = config.languages();
    let layout = config.layout();
    let mut report = Report::default();

    let mut by_path: BTreeMap<PathBuf, (String, Vec<&ReviewThread>)> = BTreeMap::new();
    let mut state_threads = Vec::new();
    for thread in pr.threads.iter().filter(|t| !t.comments.is_empty()) {
        let path = PathBuf::from(&thread.path);
        match languages.comment_token(&path) {
            Some(token) if path != config.state_file => by_path
                .entry(path)
                .or_insert_with(|| (token.to_string(), Vec::new()))
                .1
                .push(thread),
            _ => state_threads.push(thread),
        }
    }

    // Threads on files that exist but are not text cannot be embedded.
    let unreadable: Vec<PathBuf> = by_path
        .keys()
        .filter(|path| ws.exists(path) && matches!(ws.read(path), Ok(None)))
        .cloned()
        .collect();
    for path in unreadable {
        if let Some((_, threads)) = by_path.remove(&path) {
            log::debug!("{} is not text; its threads go to the state file", path.display());
            state_threads.extend(threads);
        }
    }

    for path in ws.files()? {
        if path == config.state_file || by_path.contains_key(&path) {
            continue;
        }
        let Some(token) = languages.comment_token(&path) else {
            continue;
        };
        match ws.read(&path) {
            Ok(Some(content)) if content.contains(MARKER) => {
                by_path.insert(path, (token.to_string(), Vec::new()));
            }
            Ok(_) => {}
            Err(e) => report.fail(&path, e),
        }
    }

    for (path, (token, threads)) in &by_path {
        if let Err(e) = serialize_file(ws, path, token, threads, layout, &mut report) {
            report.fail(path, e);
        }
    }

    let state = render_state_file(pr, &state_threads, layout);
    if let Err(e) = write_state_file(ws, &config.state_file, &state, &mut report) {
        report.fail(&config.state_file, e);
    }

    log::info!(
        "serialized {} threads: {} files written, {} removed",
        pr.threads.len(),
        report.written.len(),
        report.removed.len()
    );
    Ok(report)
}

/// Remove every embedded comment and the state file.
pub fn strip<W: Workspace>(ws: &mut W, config: &Config) -> Result<Report> {
    serialize(&PullRequest::default(), ws, config)
}

fn serialize_file<W: Workspace>(
    ws: &mut W,
    path: &Path,
    token: &str,
    threads: &[&ReviewThread],
    layout: Layout,
    report: &mut Report,
) -> std::result::Result<(), WorkspaceError> {
    let exists = ws.exists(path);
    let original = ws.read(path)?;
    if exists && original.is_none() {
        log::debug!("skipping non-text file {}", path.display());
        return Ok(());
    }
    let original = original.unwrap_or_default();
    // A file holding nothing but an outdated section was synthesized for
    // threads whose file is gone.
    let synthesized = original
        .lines()
        .any(|line| matches!(classify_line(line, token), Line::Banner));

    let mut model = FileCommentModel::strip(&original, token);
    place_threads(&mut model, threads, exists);

    if model.is_empty() && !model.has_comments() {
        if !exists {
            return Ok(());
        }
        if synthesized {
            log::debug!("removing {}: only embedded comments remained", path.display());
            ws.remove(path)?;
            report.removed.push(path.to_path_buf());
            return Ok(());
        }
    }

    let rendered = model.render(layout);
    if exists && rendered == original {
        return Ok(());
    }
    log::debug!("writing {} ({} threads)", path.display(), threads.len());
    ws.write(path, &rendered)?;
    report.written.push(path.to_path_buf());
    Ok(())
}

/// Order threads for display: synced threads by their first comment, then
/// new threads in input order.
fn display_order<'a>(threads: &[&'a ReviewThread]) -> Vec<&'a ReviewThread> {
    let mut ordered = threads.to_vec();
    ordered.sort_by_key(|t| (!t.is_synced(), t.first_created_at()));
    ordered
}

/// Anchor each thread below its line. Threads of a missing file, LEFT-side
/// threads and lines past the end go to the outdated section.
fn place_threads(model: &mut FileCommentModel, threads: &[&ReviewThread], exists: bool) {
    let len = model.len();
    for thread in display_order(threads) {
        let anchor = match thread.subject {
            _ if !exists => None,
            Subject::File => Some(0),
            Subject::Line if thread.side == DiffSide::Right && (1..=len).contains(&thread.line) => {
                Some(thread.line)
            }
            Subject::Line => None,
        };
        match anchor {
            Some(line) => model.attach(line, thread_block(thread, false)),
            None => model.push_outdated(thread_block(thread, true)),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Header carrying a comment's identity, or `new` for an unsynced one.
fn identity_header(
    is_new: bool,
    author: &str,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    id: &str,
) -> Header {
    if is_new {
        return Header::new_comment();
    }
    Header {
        author: non_empty(author),
        timestamp: created_at.map(|ts| ts.naive_utc()),
        id: non_empty(id),
        ..Header::default()
    }
}

/// Encode a thread. Thread-level attributes go on the first comment's
/// header; later comments are replies.
fn thread_block(thread: &ReviewThread, outdated: bool) -> CommentBlock {
    let mut entries = Vec::new();
    for (n, comment) in thread.ordered_comments().into_iter().enumerate() {
        let mut header = identity_header(
            comment.is_new,
            &comment.author,
            comment.created_at,
            &comment.id,
        );

        if n == 0 {
            if let Some(start) = thread.start_line {
                header.range = Some(i64::from(start) - i64::from(thread.line));
            }
            if outdated && thread.line > 0 {
                header.orig_line = Some(thread.line);
            }
            header.is_file = thread.subject == Subject::File;
            header.is_left = thread.side == DiffSide::Left;
            header.is_outdated = thread.is_outdated;
            header.is_resolved = thread.is_resolved;
        } else {
            let parent = comment
                .parent_id
                .as_deref()
                .filter(|p| !p.is_empty() && thread.comments.iter().any(|c| c.id == *p));
            header.reply_to = Some(match parent {
                Some(parent) => ReplyTo::Comment(parent.to_string()),
                None => ReplyTo::Open,
            });
        }

        entries.push(Entry {
            header,
            body: comment.body.clone(),
        });
    }
    CommentBlock { entries }
}

/// Body of the PR metadata block: the title as a heading, then the
/// description.
pub fn describe(title: &str, body: &str) -> String {
    if body.trim().is_empty() {
        format!("# {title}")
    } else {
        format!("# {title}\n\n{body}")
    }
}

fn issue_order(comments: &[IssueComment]) -> Vec<&IssueComment> {
    let mut ordered: Vec<&IssueComment> = comments.iter().collect();
    ordered.sort_by_key(|c| (c.is_new, if c.is_new { None } else { c.created_at }));
    ordered
}

fn render_state_file(pr: &PullRequest, threads: &[&ReviewThread], layout: Layout) -> String {
    let mut blocks = Vec::new();

    if !pr.id.is_empty() || pr.number != 0 {
        let header = Header {
            author: non_empty(&pr.author),
            timestamp: pr.fetched_at.map(|ts| ts.naive_utc()),
            id: non_empty(&pr.id),
            pr_number: Some(pr.number),
            base: non_empty(&pr.base_commit),
            head: non_empty(&pr.head_commit),
            ..Header::default()
        };
        blocks.push(CommentBlock {
            entries: vec![Entry {
                header,
                body: describe(&pr.title, &pr.body),
            }],
        });
    }

    for comment in issue_order(&pr.comments) {
        blocks.push(CommentBlock {
            entries: vec![Entry {
                header: identity_header(
                    comment.is_new,
                    &comment.author,
                    comment.created_at,
                    &comment.id,
                ),
                body: comment.body.clone(),
            }],
        });
    }

    for thread in display_order(threads) {
        let mut block = thread_block(thread, true);
        if let Some(first) = block.entries.first_mut() {
            first.header.path = Some(thread.path.clone());
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        return String::new();
    }
    let mut lines = Vec::new();
    for block in &blocks {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(block.render("", "", layout));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn write_state_file<W: Workspace>(
    ws: &mut W,
    path: &Path,
    content: &str,
    report: &mut Report,
) -> std::result::Result<(), WorkspaceError> {
    if content.is_empty() {
        if ws.exists(path) {
            ws.remove(path)?;
            report.removed.push(path.to_path_buf());
        }
        return Ok(());
    }
    if ws.read(path)?.as_deref() == Some(content) {
        return Ok(());
    }
    ws.write(path, content)?;
    report.written.push(path.to_path_buf());
    Ok(())
}
