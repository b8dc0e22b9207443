//! Recovers a [`PullRequest`] from the workspace by reading back the
//! structured comment lines written by [`crate::serialize`] or typed by hand.

use std::path::Path;

use thiserror::Error;

use crate::comments::{Line, SourceText, classify_line};
use crate::config::Config;
use crate::header::{Header, MARKER, ReplyTo};
use crate::reflow;
use crate::workspace::{Workspace, WorkspaceError};
use crate::{
    DiffSide, FileFailure, IssueComment, PullRequest, ReviewComment, ReviewThread, Subject,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}:{line}: reply to unknown comment {}", .parent.as_deref().unwrap_or("(no open thread)"))]
    ParentNotFound {
        path: String,
        line: usize,
        parent: Option<String>,
    },
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The recovered model and the files that could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub pull_request: PullRequest,
    pub failures: Vec<FileFailure>,
}

/// One comment as found in a file, before it is attached to a thread.
#[derive(Debug, Clone, PartialEq)]
struct RawComment {
    /// `None` for body lines typed without a header.
    header: Option<Header>,
    /// 1-based line of the comment's first line in the file.
    file_line: usize,
    /// Bare line the comment follows; 0 before any source line.
    anchor: u32,
    in_outdated: bool,
    body: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Comment(RawComment),
    /// A source line or the banner: no later reply may join earlier threads.
    Close,
}

enum State {
    InSource,
    InComment(RawComment),
}

/// Walk `content` line by line and group structured lines into comments.
fn scan(content: &str, token: &str) -> Vec<Event> {
    let source = SourceText::parse(content);
    let mut events = Vec::new();
    let mut state = State::InSource;
    let mut bare = 0u32;
    let mut in_outdated = false;

    for (idx, line) in source.lines.iter().enumerate() {
        let previous = std::mem::replace(&mut state, State::InSource);
        state = match (previous, classify_line(line, token)) {
            (previous, Line::Source) => {
                finish(previous, &mut events);
                events.push(Event::Close);
                bare += 1;
                State::InSource
            }
            (previous, Line::Banner) => {
                finish(previous, &mut events);
                events.push(Event::Close);
                in_outdated = true;
                State::InSource
            }
            (previous, Line::Header(header)) => {
                finish(previous, &mut events);
                State::InComment(RawComment {
                    header: Some(header),
                    file_line: idx + 1,
                    anchor: bare,
                    in_outdated,
                    body: Vec::new(),
                })
            }
            (State::InComment(mut raw), Line::Body(text)) => {
                raw.body.push(text);
                State::InComment(raw)
            }
            (State::InSource, Line::Body(text)) => State::InComment(RawComment {
                header: None,
                file_line: idx + 1,
                anchor: bare,
                in_outdated,
                body: vec![text],
            }),
        };
    }
    finish(state, &mut events);
    events
}

fn finish(state: State, events: &mut Vec<Event>) {
    if let State::InComment(raw) = state {
        events.push(Event::Comment(raw));
    }
}

fn comment_from(raw: &RawComment, parent_id: Option<String>) -> ReviewComment {
    let header = raw.header.clone().unwrap_or_else(Header::new_comment);
    let created_at = header.timestamp.map(|ts| ts.and_utc());
    ReviewComment {
        is_new: header.is_new || header.id.is_none(),
        id: header.id.unwrap_or_default(),
        author: header.author.unwrap_or_default(),
        body: reflow::unwrap(&raw.body.join("\n")),
        created_at,
        updated_at: created_at,
        parent_id,
    }
}

fn thread_from(path: &str, line: u32, raw: &RawComment) -> ReviewThread {
    let header = raw.header.clone().unwrap_or_else(Header::new_comment);
    ReviewThread {
        path: path.to_string(),
        line,
        start_line: header
            .range
            .and_then(|range| u32::try_from(i64::from(line) + range).ok()),
        side: if header.is_left {
            DiffSide::Left
        } else {
            DiffSide::Right
        },
        subject: if header.is_file {
            Subject::File
        } else {
            Subject::Line
        },
        is_outdated: header.is_outdated,
        is_resolved: header.is_resolved,
        comments: vec![comment_from(raw, None)],
    }
}

/// Append a reply to the open thread, checking an explicit parent.
fn append_reply(
    threads: &mut [ReviewThread],
    open: Option<usize>,
    reply_to: ReplyTo,
    raw: &RawComment,
    path: &str,
) -> Result<()> {
    let missing = |parent: Option<String>| Error::ParentNotFound {
        path: path.to_string(),
        line: raw.file_line,
        parent,
    };
    let Some(thread) = open.and_then(|idx| threads.get_mut(idx)) else {
        return Err(missing(match reply_to {
            ReplyTo::Open => None,
            ReplyTo::Comment(id) => Some(id),
        }));
    };
    let parent_id = match reply_to {
        ReplyTo::Open => None,
        ReplyTo::Comment(id) => {
            if !thread.comments.iter().any(|c| c.id == id) {
                return Err(missing(Some(id)));
            }
            Some(id)
        }
    };
    thread.comments.push(comment_from(raw, parent_id));
    Ok(())
}

fn reply_target(raw: &RawComment) -> Option<ReplyTo> {
    raw.header.as_ref().and_then(|h| h.reply_to.clone())
}

/// Threads embedded in one source file.
fn collect_file(path: &str, events: Vec<Event>, threads: &mut Vec<ReviewThread>) -> Result<()> {
    let first = threads.len();
    let mut open: Option<usize> = None;
    for event in events {
        let raw = match event {
            Event::Close => {
                open = None;
                continue;
            }
            Event::Comment(raw) => raw,
        };
        if let Some(reply_to) = reply_target(&raw) {
            append_reply(threads, open, reply_to, &raw, path)?;
            continue;
        }
        let line = if raw.in_outdated {
            raw.header.as_ref().and_then(|h| h.orig_line).unwrap_or(0)
        } else {
            raw.anchor
        };
        threads.push(thread_from(path, line, &raw));
        open = Some(threads.len() - 1);
    }
    log::debug!("{path}: {} threads", threads.len() - first);
    Ok(())
}

/// Split the metadata body back into title and description.
fn split_description(body: &str) -> (String, String) {
    let (first, rest) = body.split_once('\n').unwrap_or((body, ""));
    match first.strip_prefix('#') {
        Some(title) if title.is_empty() || title.starts_with(' ') => (
            title.trim().to_string(),
            rest.trim_start_matches('\n').to_string(),
        ),
        _ => (String::new(), body.to_string()),
    }
}

/// PR metadata, conversation comments and threads of files without a
/// comment syntax.
fn collect_state(path: &str, events: Vec<Event>, pr: &mut PullRequest) -> Result<()> {
    let mut open: Option<usize> = None;
    for event in events {
        let raw = match event {
            Event::Close => {
                open = None;
                continue;
            }
            Event::Comment(raw) => raw,
        };
        if let Some(reply_to) = reply_target(&raw) {
            append_reply(&mut pr.threads, open, reply_to, &raw, path)?;
            continue;
        }

        let header = raw.header.clone().unwrap_or_else(Header::new_comment);
        open = None;
        if let Some(number) = header.pr_number {
            let (title, body) = split_description(&reflow::unwrap(&raw.body.join("\n")));
            pr.number = number;
            pr.id = header.id.unwrap_or_default();
            pr.author = header.author.unwrap_or_default();
            pr.fetched_at = header.timestamp.map(|ts| ts.and_utc());
            pr.base_commit = header.base.unwrap_or_default();
            pr.head_commit = header.head.unwrap_or_default();
            pr.title = title;
            pr.body = body;
        } else if let Some(thread_path) = &header.path {
            let line = header.orig_line.unwrap_or(0);
            pr.threads.push(thread_from(thread_path, line, &raw));
            open = Some(pr.threads.len() - 1);
        } else {
            let comment = comment_from(&raw, None);
            pr.comments.push(IssueComment {
                id: comment.id,
                author: comment.author,
                body: comment.body,
                created_at: comment.created_at,
                updated_at: comment.updated_at,
                is_new: comment.is_new,
            });
        }
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Read the review state back out of the workspace.
///
/// A reply that cannot be attached is an error; unreadable files are
/// recorded and skipped.
pub fn deserialize<W: Workspace>(ws: &W, config: &Config) -> Result<Collected> {
    let languages = config.languages();
    let mut collected = Collected::default();

    match ws.read(&config.state_file) {
        Ok(Some(text)) => {
            let path = display(&config.state_file);
            collect_state(&path, scan(&text, ""), &mut collected.pull_request)?;
        }
        Ok(None) => {}
        Err(e) => {
            log::warn!("{}: {e}", config.state_file.display());
            collected.failures.push(FileFailure {
                path: config.state_file.clone(),
                message: e.to_string(),
            });
        }
    }

    for path in ws.files()? {
        if path == config.state_file {
            continue;
        }
        let Some(token) = languages.comment_token(&path) else {
            continue;
        };
        let content = match ws.read(&path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                log::debug!("skipping non-text file {}", path.display());
                continue;
            }
            Err(e) => {
                log::warn!("{}: {e}", path.display());
                collected.failures.push(FileFailure {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };
        if !content.contains(MARKER) {
            continue;
        }
        collect_file(
            &display(&path),
            scan(&content, token),
            &mut collected.pull_request.threads,
        )?;
    }

    log::info!(
        "collected {} threads and {} conversation comments",
        collected.pull_request.threads.len(),
        collected.pull_request.comments.len()
    );
    Ok(collected)
}
