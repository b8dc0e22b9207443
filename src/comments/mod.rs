//! Per-file view of embedded comments: line classification, bare source
//! recovery and rendering of comment blocks back into the file.

use std::collections::BTreeMap;

use crate::header::{Header, MARKER};
use crate::reflow;

/// Payload of the line that opens the outdated section.
pub const BANNER: &str = "═══ outdated comments ═══";

/// Narrowest body width used when a line is deeply indented.
pub const MIN_BODY_WIDTH: usize = 20;

/// Classification of one file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Source,
    Header(Header),
    /// Body text with the single separating space removed. Empty for a
    /// paragraph break.
    Body(String),
    Banner,
}

/// Payload of a structured line, if `line` is one.
///
/// A structured line is optional indentation, the comment token, optional
/// spaces and the marker. With an empty token the marker opens the line.
pub fn payload<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.trim_start_matches([' ', '\t']);
    let rest = rest.strip_prefix(token)?;
    let rest = rest.trim_start_matches(' ');
    rest.strip_prefix(MARKER)
}

/// Classify `line` of a file whose line-comment token is `token`.
pub fn classify_line(line: &str, token: &str) -> Line {
    let Some(payload) = payload(line, token) else {
        return Line::Source;
    };
    if payload == BANNER {
        return Line::Banner;
    }
    if let Some(header) = Header::decode(payload) {
        return Line::Header(header);
    }
    Line::Body(payload.strip_prefix(' ').unwrap_or(payload).to_string())
}

/// Whether `line` carries embedded comment data.
pub fn is_structured(line: &str, token: &str) -> bool {
    payload(line, token).is_some()
}

/// Leading whitespace of `line`.
pub fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

/// Display width of an indentation string.
pub fn indent_width(indent: &str, tab_width: usize) -> usize {
    indent
        .chars()
        .map(|c| if c == '\t' { tab_width } else { 1 })
        .sum()
}

/// File text split into lines, remembering how to join it back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceText {
    pub lines: Vec<String>,
    pub crlf: bool,
    pub trailing_newline: bool,
}

impl SourceText {
    pub fn parse(content: &str) -> Self {
        let crlf = content.contains("\r\n");
        let trailing_newline = content.ends_with('\n');
        let body = content.strip_suffix('\n').unwrap_or(content);
        let body = if crlf {
            body.strip_suffix('\r').unwrap_or(body)
        } else {
            body
        };

        let lines = if content.is_empty() {
            Vec::new()
        } else {
            body.split('\n')
                .map(|line| {
                    if crlf {
                        line.strip_suffix('\r').unwrap_or(line).to_string()
                    } else {
                        line.to_string()
                    }
                })
                .collect()
        };

        Self {
            lines,
            crlf,
            trailing_newline,
        }
    }

    /// Join `lines` with this text's line ending.
    pub fn join(&self, lines: &[String]) -> String {
        if lines.is_empty() {
            return String::new();
        }
        let ending = if self.crlf { "\r\n" } else { "\n" };
        let mut out = lines.join(ending);
        if self.trailing_newline {
            out.push_str(ending);
        }
        out
    }
}

/// One comment inside a block: its header and markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub header: Header,
    pub body: String,
}

/// The comments of one thread, rendered as consecutive structured lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentBlock {
    pub entries: Vec<Entry>,
}

/// Layout parameters for rendering blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub line_width: usize,
    pub tab_width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            line_width: 80,
            tab_width: 4,
        }
    }
}

impl CommentBlock {
    /// Render the block with every line prefixed by `indent` and `token`.
    pub fn render(&self, indent: &str, token: &str, layout: Layout) -> Vec<String> {
        let prefix = structured_prefix(indent, token);
        let width = layout
            .line_width
            .saturating_sub(indent_width(indent, layout.tab_width))
            .saturating_sub(token.chars().count())
            .saturating_sub(3)
            .max(MIN_BODY_WIDTH);

        let mut lines = Vec::new();
        for entry in &self.entries {
            lines.push(format!("{prefix}{}", entry.header.encode()));
            let body = reflow::wrap(&entry.body, width);
            if body.is_empty() {
                continue;
            }
            for line in body.split('\n') {
                if line.is_empty() {
                    lines.push(prefix.clone());
                } else {
                    lines.push(format!("{prefix} {line}"));
                }
            }
        }
        lines
    }
}

/// Everything before the payload of a structured line.
pub fn structured_prefix(indent: &str, token: &str) -> String {
    if token.is_empty() {
        format!("{indent}{MARKER}")
    } else {
        format!("{indent}{token} {MARKER}")
    }
}

/// Bare source of one file plus the comment blocks to weave into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommentModel {
    pub token: String,
    pub source: SourceText,
    /// Blocks keyed by the bare line they follow. Line 0 precedes the first
    /// source line.
    pub comments: BTreeMap<u32, Vec<CommentBlock>>,
    pub outdated: Vec<CommentBlock>,
    /// Number of structured lines removed while building the bare source.
    pub stripped: usize,
}

impl FileCommentModel {
    /// Strip every structured line from `content`.
    pub fn strip(content: &str, token: &str) -> Self {
        let mut source = SourceText::parse(content);
        let before = source.lines.len();
        source.lines.retain(|line| !is_structured(line, token));
        let stripped = before - source.lines.len();
        Self {
            token: token.to_string(),
            source,
            comments: BTreeMap::new(),
            outdated: Vec::new(),
            stripped,
        }
    }

    /// Number of bare source lines.
    pub fn len(&self) -> u32 {
        u32::try_from(self.source.lines.len()).unwrap_or(u32::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.source.lines.is_empty()
    }

    pub fn has_comments(&self) -> bool {
        !self.comments.is_empty() || !self.outdated.is_empty()
    }

    /// Append `block` below bare line `line`, after blocks already there.
    pub fn attach(&mut self, line: u32, block: CommentBlock) {
        self.comments.entry(line).or_default().push(block);
    }

    pub fn push_outdated(&mut self, block: CommentBlock) {
        self.outdated.push(block);
    }

    /// Lines of the file with every block woven in.
    pub fn render_lines(&self, layout: Layout) -> Vec<String> {
        let mut out = Vec::new();
        let emit = |out: &mut Vec<String>, line: u32, indent: &str| {
            for block in self.comments.get(&line).into_iter().flatten() {
                out.extend(block.render(indent, &self.token, layout));
            }
        };

        emit(&mut out, 0, "");
        for (idx, line) in self.source.lines.iter().enumerate() {
            out.push(line.clone());
            let number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            emit(&mut out, number, indent_of(line));
        }

        if !self.outdated.is_empty() {
            out.push(format!("{}{BANNER}", structured_prefix("", &self.token)));
            for block in &self.outdated {
                out.extend(block.render("", &self.token, layout));
            }
        }
        out
    }

    /// The file content with every block woven in.
    pub fn render(&self, layout: Layout) -> String {
        let mut source = self.source.clone();
        if self.is_empty() && self.has_comments() {
            source.trailing_newline = true;
        }
        source.join(&self.render_lines(layout))
    }
}
