//! Turns freehand edits into review comments.
//!
//! The working tree is diffed against the last synced revision with zero
//! context lines. Each hunk is classified and the file is rebuilt from the
//! base content: replaced code becomes a `suggestion` block below the
//! restored original, added plain comments become a note, and everything
//! else is applied as written.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::comments::{CommentBlock, Entry, Layout, SourceText, indent_of, is_structured};
use crate::config::Config;
use crate::git::GitError;
use crate::header::Header;
use crate::parser::parse_diff;
use crate::workspace::{Workspace, WorkspaceError};
use crate::{FileFailure, Hunk};

#[derive(Debug, Error)]
pub enum Error {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("git error: {0}")]
    Git(#[from] GitError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Access to the last synced revision of the working tree.
pub trait Revisions {
    /// Files that differ between the revision and the working tree.
    fn changed_files(&self) -> Result<Vec<PathBuf>>;

    /// Zero-context unified diff of `path` from the revision to the working
    /// tree.
    fn diff(&self, path: &Path) -> Result<String>;

    /// Content of `path` at the revision, `None` if it did not exist there.
    fn base_content(&self, path: &Path) -> Result<Option<String>>;
}

/// How a hunk is turned into output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkKind {
    /// Embedded comment lines added or edited; kept as written.
    Verbatim,
    /// Code removed while embedded comment lines were written in between.
    Conflict,
    /// Code replaced or deleted.
    Suggestion,
    /// Plain line comments added.
    Note,
    /// Added code with nothing to suggest against.
    Unclassified,
}

/// Added lines split around embedded comment lines at either end.
struct AddedParts<'a> {
    leading: &'a [String],
    middle: &'a [String],
    trailing: &'a [String],
}

fn split_added<'a>(added: &'a [String], token: &str) -> AddedParts<'a> {
    let lead = added.iter().take_while(|l| is_structured(l, token)).count();
    let rest = &added[lead..];
    let trail = rest
        .iter()
        .rev()
        .take_while(|l| is_structured(l, token))
        .count();
    let (middle, trailing) = rest.split_at(rest.len() - trail);
    AddedParts {
        leading: &added[..lead],
        middle,
        trailing,
    }
}

fn is_plain_comment(line: &str, token: &str) -> bool {
    !is_structured(line, token) && line.trim_start().starts_with(token)
}

/// Classify one hunk of a file whose line-comment token is `token`.
pub fn classify(hunk: &Hunk, token: &str) -> HunkKind {
    let parts = split_added(&hunk.added, token);

    if hunk.removed.is_empty() {
        if parts.middle.is_empty() {
            return HunkKind::Verbatim;
        }
        let only_comments = parts
            .middle
            .iter()
            .all(|l| l.trim().is_empty() || is_plain_comment(l, token));
        let any_comment = parts.middle.iter().any(|l| is_plain_comment(l, token));
        return if only_comments && any_comment {
            HunkKind::Note
        } else {
            HunkKind::Unclassified
        };
    }

    if parts.middle.is_empty() && hunk.removed.iter().all(|l| is_structured(l, token)) {
        return HunkKind::Verbatim;
    }
    if parts.middle.iter().any(|l| is_structured(l, token)) {
        return HunkKind::Conflict;
    }
    HunkKind::Suggestion
}

/// Body of a suggestion replacing the removed lines with `lines`.
fn suggestion_body(lines: &[String]) -> String {
    let longest = lines
        .iter()
        .map(|l| l.trim_start().chars().take_while(|&c| c == '`').count())
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);

    let mut body = format!("{fence}suggestion\n");
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body.push_str(&fence);
    body
}

/// Body of a note typed as plain comments: the comment token and one space
/// removed from every line.
fn note_body(lines: &[String], token: &str) -> String {
    let text: Vec<&str> = lines
        .iter()
        .map(|line| {
            let rest = line.trim_start();
            let rest = rest.strip_prefix(token).unwrap_or("");
            rest.strip_prefix(' ').unwrap_or(rest)
        })
        .collect();
    text.join("\n").trim_matches('\n').to_string()
}

fn new_block(header: Header, body: String) -> CommentBlock {
    CommentBlock {
        entries: vec![Entry { header, body }],
    }
}

fn describe(hunk: &Hunk) -> String {
    format!(
        "@@ -{},{} +{},{} @@ [{}]",
        hunk.old_start,
        hunk.old_count,
        hunk.new_start,
        hunk.new_count,
        &hunk.content_hash[..hunk.content_hash.len().min(12)]
    )
}

/// Result of rebuilding one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Built {
    pub content: String,
    pub notes: usize,
    pub suggestions: usize,
    pub warnings: Vec<String>,
}

/// Rebuild a file from its base content and the hunks leading to
/// `working`.
pub fn build(base: &str, working: &str, hunks: &[Hunk], token: &str, layout: Layout) -> Built {
    let target = SourceText::parse(working);
    let mut lines = SourceText::parse(base).lines;
    let mut built = Built::default();

    let mut ordered: Vec<&Hunk> = hunks.iter().collect();
    ordered.sort_by_key(|h| h.old_start);

    for hunk in ordered.into_iter().rev() {
        let start = if hunk.old_count == 0 {
            hunk.old_start as usize
        } else {
            (hunk.old_start as usize).saturating_sub(1)
        };
        let start = start.min(lines.len());
        let end = (start + hunk.old_count as usize).min(lines.len());
        let parts = split_added(&hunk.added, token);
        // Embedded comments already below the anchor stay above a new block.
        let following = lines[end..]
            .iter()
            .take_while(|l| is_structured(l, token))
            .count();
        let mut splice_end = end;

        let replacement: Vec<String> = match classify(hunk, token) {
            HunkKind::Verbatim => hunk.added.clone(),
            HunkKind::Conflict => {
                built.warnings.push(format!(
                    "{}: code removed around embedded comments, left as written",
                    describe(hunk)
                ));
                hunk.added.clone()
            }
            HunkKind::Unclassified => {
                built.warnings.push(format!(
                    "{}: added lines are neither comments nor a replacement, left as written",
                    describe(hunk)
                ));
                hunk.added.clone()
            }
            HunkKind::Suggestion => {
                built.suggestions += 1;
                let indent = hunk.removed.last().map_or("", |l| indent_of(l)).to_string();
                let mut header = Header::new_comment();
                if hunk.removed.len() > 1 {
                    header.range = Some(1 - hunk.removed.len() as i64);
                }
                let block = new_block(header, suggestion_body(parts.middle));

                let mut out = parts.leading.to_vec();
                out.extend(hunk.removed.iter().cloned());
                out.extend(parts.trailing.iter().cloned());
                out.extend(lines[end..end + following].iter().cloned());
                splice_end = end + following;
                out.extend(block.render(&indent, token, layout));
                out
            }
            HunkKind::Note => {
                built.notes += 1;
                let indent = match start.checked_sub(1).and_then(|i| lines.get(i)) {
                    Some(anchor) => indent_of(anchor).to_string(),
                    None => String::new(),
                };
                let block = new_block(Header::new_comment(), note_body(parts.middle, token));

                let mut out = parts.leading.to_vec();
                out.extend(parts.trailing.iter().cloned());
                out.extend(lines[end..end + following].iter().cloned());
                splice_end = end + following;
                out.extend(block.render(&indent, token, layout));
                out
            }
        };
        lines.splice(start..splice_end, replacement);
    }

    built.warnings.reverse();
    built.content = target.join(&lines);
    built
}

/// Outcome for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub notes: usize,
    pub suggestions: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
}

impl Report {
    pub fn notes(&self) -> usize {
        self.files.iter().map(|f| f.notes).sum()
    }

    pub fn suggestions(&self) -> usize {
        self.files.iter().map(|f| f.suggestions).sum()
    }

    pub fn warnings(&self) -> usize {
        self.files.iter().map(|f| f.warnings.len()).sum()
    }
}

/// Convert the freehand edits of every changed file.
pub fn suggest_workspace<W: Workspace, R: Revisions>(
    ws: &mut W,
    revisions: &R,
    config: &Config,
) -> Result<Report> {
    let languages = config.languages();
    let layout = config.layout();
    let mut report = Report::default();

    let mut paths = revisions.changed_files()?;
    paths.sort();
    for path in paths {
        if path == config.state_file {
            continue;
        }
        let Some(token) = languages.comment_token(&path) else {
            log::debug!("skipping {}: no line comment syntax", path.display());
            continue;
        };
        match suggest_file(ws, revisions, &path, token, layout) {
            Ok(Some(file)) => report.files.push(file),
            Ok(None) => {}
            Err(e) => {
                log::warn!("{}: {e}", path.display());
                report.failures.push(FileFailure {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "{} notes, {} suggestions, {} warnings",
        report.notes(),
        report.suggestions(),
        report.warnings()
    );
    Ok(report)
}

fn suggest_file<W: Workspace, R: Revisions>(
    ws: &mut W,
    revisions: &R,
    path: &Path,
    token: &str,
    layout: Layout,
) -> Result<Option<FileReport>> {
    let Some(working) = ws.read(path)? else {
        log::debug!("skipping {}: missing or not text", path.display());
        return Ok(None);
    };
    let Some(base) = revisions.base_content(path)? else {
        log::debug!("skipping {}: not present in base", path.display());
        return Ok(None);
    };

    let hunks: Vec<Hunk> = parse_diff(&revisions.diff(path)?)
        .into_iter()
        .filter(|file| file.path == path)
        .flat_map(|file| file.hunks)
        .collect();
    if hunks.is_empty() {
        return Ok(None);
    }

    let built = build(&base, &working, &hunks, token, layout);
    for warning in &built.warnings {
        log::warn!("{}: {warning}", path.display());
    }
    if built.notes + built.suggestions > 0 && built.content != working {
        ws.write(path, &built.content)?;
    }
    if built.notes + built.suggestions == 0 && built.warnings.is_empty() {
        return Ok(None);
    }

    Ok(Some(FileReport {
        path: path.to_path_buf(),
        notes: built.notes,
        suggestions: built.suggestions,
        warnings: built.warnings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(old_start: u32, removed: &[&str], new_start: u32, added: &[&str]) -> Hunk {
        Hunk {
            old_start,
            old_count: removed.len() as u32,
            new_start,
            new_count: added.len() as u32,
            removed: removed.iter().map(|s| s.to_string()).collect(),
            added: added.iter().map(|s| s.to_string()).collect(),
            content_hash: "0123456789abcdef".to_string(),
        }
    }

    #[test]
    fn classify_follows_rule_order() {
        let t = "//";
        assert_eq!(
            classify(&hunk(3, &[], 4, &["// ┃━━━ new", "// ┃ hi"]), t),
            HunkKind::Verbatim
        );
        assert_eq!(
            classify(&hunk(3, &["// ┃ old"], 3, &["// ┃ new"]), t),
            HunkKind::Verbatim
        );
        assert_eq!(
            classify(&hunk(3, &["a();"], 3, &["b();", "// ┃━━━ new", "c();"]), t),
            HunkKind::Conflict
        );
        assert_eq!(classify(&hunk(3, &["a();"], 3, &["b();"]), t), HunkKind::Suggestion);
        assert_eq!(classify(&hunk(3, &["a();"], 2, &[]), t), HunkKind::Suggestion);
        assert_eq!(
            classify(&hunk(3, &[], 4, &["// why?", "", "// really"]), t),
            HunkKind::Note
        );
        assert_eq!(classify(&hunk(3, &[], 4, &["b();"]), t), HunkKind::Unclassified);
        assert_eq!(classify(&hunk(3, &[], 4, &[""]), t), HunkKind::Unclassified);
    }

    #[test]
    fn existing_comments_at_hunk_edges_are_not_conflicts() {
        let h = hunk(3, &["a();"], 3, &["// ┃━━━ new", "// ┃ x", "b();"]);
        assert_eq!(classify(&h, "//"), HunkKind::Suggestion);
    }

    #[test]
    fn replacement_becomes_ranged_suggestion() {
        let base = "fn f() {\n    let a = 1;\n    let b = 2;\n    let c = a + b;\n    c\n}\n";
        let working = "fn f() {\n    let c = 3;\n    c + 0\n    c\n}\n";
        let hunks = [hunk(
            2,
            &["    let a = 1;", "    let b = 2;", "    let c = a + b;"],
            2,
            &["    let c = 3;", "    c + 0"],
        )];
        let built = build(base, working, &hunks, "//", Layout::default());
        assert_eq!(built.suggestions, 1);
        assert_eq!(built.notes, 0);
        assert!(built.warnings.is_empty());
        assert_eq!(
            built.content,
            "fn f() {\n    let a = 1;\n    let b = 2;\n    let c = a + b;\n    // ┃━━━ new, range -2\n    // ┃ ```suggestion\n    // ┃     let c = 3;\n    // ┃     c + 0\n    // ┃ ```\n    c\n}\n"
        );
    }

    #[test]
    fn deletion_gives_empty_suggestion() {
        let base = "a = 1\nb = 2\n";
        let working = "a = 1\n";
        let built = build(base, working, &[hunk(2, &["b = 2"], 1, &[])], "#", Layout::default());
        assert_eq!(
            built.content,
            "a = 1\nb = 2\n# ┃━━━ new\n# ┃ ```suggestion\n# ┃ ```\n"
        );
    }

    #[test]
    fn added_comments_become_note() {
        let base = "def f():\n    return 1\n";
        let working = "def f():\n    # is this right?\n    # see #12\n    return 1\n";
        let hunks = [hunk(1, &[], 2, &["    # is this right?", "    # see #12"])];
        let built = build(base, working, &hunks, "#", Layout::default());
        assert_eq!(built.notes, 1);
        assert_eq!(built.suggestions, 0);
        assert_eq!(
            built.content,
            "def f():\n# ┃━━━ new\n# ┃ is this right? see #12\n    return 1\n"
        );
    }

    #[test]
    fn note_at_top_of_file() {
        let built = build(
            "x = 1\n",
            "# header note\nx = 1\n",
            &[hunk(0, &[], 1, &["# header note"])],
            "#",
            Layout::default(),
        );
        assert_eq!(built.content, "# ┃━━━ new\n# ┃ header note\nx = 1\n");
    }

    #[test]
    fn note_goes_after_existing_comments() {
        let base = "a();\nb();\n";
        let working = "a();\n// ┃━━━ @x, id c1\n// ┃ old\n// mine\nb();\n";
        let hunks = [hunk(1, &[], 2, &["// ┃━━━ @x, id c1", "// ┃ old", "// mine"])];
        let built = build(base, working, &hunks, "//", Layout::default());
        assert_eq!(
            built.content,
            "a();\n// ┃━━━ @x, id c1\n// ┃ old\n// ┃━━━ new\n// ┃ mine\nb();\n"
        );
    }

    #[test]
    fn new_blocks_go_below_comments_already_in_base() {
        let base = "a();\n// ┃━━━ @x, id c1\n// ┃ old\nb();\n";
        let working = "a();\n// mine\n// ┃━━━ @x, id c1\n// ┃ old\nB();\n";
        let hunks = [
            hunk(1, &[], 2, &["// mine"]),
            hunk(4, &["b();"], 5, &["B();"]),
        ];
        let built = build(base, working, &hunks, "//", Layout::default());
        assert_eq!(built.notes, 1);
        assert_eq!(built.suggestions, 1);
        assert_eq!(
            built.content,
            "a();\n// ┃━━━ @x, id c1\n// ┃ old\n// ┃━━━ new\n// ┃ mine\nb();\n// ┃━━━ new\n// ┃ ```suggestion\n// ┃ B();\n// ┃ ```\n"
        );
    }

    #[test]
    fn pure_code_addition_warns_and_is_kept() {
        let base = "a();\n";
        let working = "a();\nb();\n";
        let built = build(base, working, &[hunk(1, &[], 2, &["b();"])], "//", Layout::default());
        assert_eq!(built.content, working);
        assert_eq!(built.warnings.len(), 1);
        assert_eq!(built.notes + built.suggestions, 0);
    }

    #[test]
    fn multiple_hunks_splice_bottom_up() {
        let base = "one\ntwo\nthree\nfour\n";
        let working = "// first\none\nTWO\nthree\nfour\n";
        let hunks = [
            hunk(0, &[], 1, &["// first"]),
            hunk(2, &["two"], 3, &["TWO"]),
        ];
        let built = build(base, working, &hunks, "//", Layout::default());
        assert_eq!(
            built.content,
            "// ┃━━━ new\n// ┃ first\none\ntwo\n// ┃━━━ new\n// ┃ ```suggestion\n// ┃ TWO\n// ┃ ```\nthree\nfour\n"
        );
    }

    #[test]
    fn suggestion_fence_outgrows_content_backticks() {
        let body = suggestion_body(&["```".to_string(), "x".to_string()]);
        assert_eq!(body, "````suggestion\n```\nx\n````");
    }
}
