//! Structure-aware wrapping of markdown comment bodies.
//!
//! Bodies are parsed with `pulldown-cmark` into a small block/inline tree
//! that keeps the literal source of every node, and rendered back at a
//! target width. Only soft breaks and the whitespace between words change;
//! every other character of the input survives verbatim. Rendering at an
//! infinite width is the inverse operation ([`unwrap`]).

use std::iter::Peekable;
use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};

const MIN_WIDTH: usize = 1;

/// Block-level markdown node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    /// ATX heading (`marker` is the run of `#`) or setext heading
    /// (`marker` empty, `underline` set).
    Heading {
        marker: String,
        underline: Option<String>,
        content: Vec<Inline>,
    },
    List {
        items: Vec<Item>,
        loose: bool,
    },
    Quote(Vec<Block>),
    /// Fenced or indented code, kept line for line.
    Code(Vec<String>),
    ThematicBreak(String),
    Html(Vec<String>),
    Table(Vec<String>),
}

/// One list item: its marker (`-`, `*`, `+`, `1.`, `2)`) and its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub marker: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Emphasis,
    Strong,
    Strikethrough,
    Link,
    Image,
}

/// Inline markdown node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    /// Code span including its backticks. Never broken.
    Code(String),
    /// Decorated span. `open` and `close` are the literal decorations, e.g.
    /// `**`/`**` or `[`/`](https://example.com)`.
    Span {
        kind: SpanKind,
        open: String,
        close: String,
        children: Vec<Inline>,
    },
    SoftBreak,
    /// Hard line break with its literal marker (two spaces or a backslash).
    HardBreak(String),
}

/// Parse a markdown body.
pub fn parse(text: &str) -> Vec<Block> {
    let normalized = text.replace("\r\n", "\n");
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut builder = TreeBuilder {
        src: &normalized,
        events: Parser::new_ext(&normalized, options)
            .into_offset_iter()
            .peekable(),
    };
    builder.container(0).0
}

/// Reflow `text` so that paragraphs fit in `width` columns where possible.
pub fn wrap(text: &str, width: usize) -> String {
    render(&parse(text), width)
}

/// Join every soft-wrapped paragraph back onto one line.
pub fn unwrap(text: &str) -> String {
    wrap(text, usize::MAX)
}

/// Render a parsed document at `width` columns.
pub fn render(blocks: &[Block], width: usize) -> String {
    render_blocks(blocks, width.max(MIN_WIDTH), false).join("\n")
}

// ---------------------------------------------------------------------------
// Tree building

fn is_inline(event: &Event<'_>) -> bool {
    match event {
        Event::Start(tag) => matches!(
            tag,
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
        ),
        Event::Text(_)
        | Event::Code(_)
        | Event::InlineHtml(_)
        | Event::SoftBreak
        | Event::HardBreak
        | Event::FootnoteReference(_)
        | Event::TaskListMarker(_) => true,
        _ => false,
    }
}

/// Source lines of a raw block, without the final line ending.
fn raw_lines(text: &str) -> Vec<String> {
    text.trim_end_matches('\n')
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// Collapse a literal that spans lines onto one line.
fn single_line(text: &str) -> String {
    if !text.contains('\n') {
        return text.to_string();
    }
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove `quotes` levels of `>` prefix from a continuation line.
fn strip_quotes(line: &str, quotes: usize) -> &str {
    let mut rest = line;
    for _ in 0..quotes {
        match rest.trim_start().strip_prefix('>') {
            Some(r) => rest = r.strip_prefix(' ').unwrap_or(r),
            None => break,
        }
    }
    rest
}

fn list_marker(item: &str) -> String {
    let t = item.trim_start();
    if let Some(bullet) = t.chars().next().filter(|c| matches!(c, '-' | '*' | '+')) {
        return bullet.to_string();
    }
    let digits = t.bytes().take_while(u8::is_ascii_digit).count();
    match t[digits..].chars().next() {
        Some(delimiter @ ('.' | ')')) if digits > 0 => format!("{}{delimiter}", &t[..digits]),
        _ => "-".to_string(),
    }
}

fn heading(src: &str, level: usize, content: Vec<Inline>) -> Block {
    let src = src.trim_end_matches('\n');
    if !src.contains('\n') {
        return Block::Heading {
            marker: "#".repeat(level),
            underline: None,
            content,
        };
    }
    let last = src
        .rsplit('\n')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches(['>', ' ']);
    let underline = if !last.is_empty()
        && (last.chars().all(|c| c == '=') || last.chars().all(|c| c == '-'))
    {
        last.to_string()
    } else if level == 1 {
        "===".to_string()
    } else {
        "---".to_string()
    };
    Block::Heading {
        marker: String::new(),
        underline: Some(underline),
        content,
    }
}

fn code_block(src: &str, kind: &CodeBlockKind<'_>, text: &str, quotes: usize) -> Block {
    let body: Vec<&str> = if text.is_empty() {
        Vec::new()
    } else {
        text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
    };

    match kind {
        CodeBlockKind::Indented => Block::Code(
            body.iter()
                .map(|l| if l.is_empty() { String::new() } else { format!("    {l}") })
                .collect(),
        ),
        CodeBlockKind::Fenced(_) => {
            let source: Vec<&str> = src.trim_end_matches('\n').split('\n').collect();
            let opener = source
                .first()
                .map_or("```", |l| strip_quotes(l, quotes).trim());
            let fence = opener.chars().next().unwrap_or('`');
            let run = opener.chars().take_while(|&c| c == fence).count();

            let mut lines = vec![opener.to_string()];
            lines.extend(body.iter().map(|l| l.to_string()));
            if source.len() > 1
                && let Some(last) = source.last()
            {
                let last = strip_quotes(last, quotes).trim();
                if last.len() >= run && last.chars().all(|c| c == fence) {
                    lines.push(last.to_string());
                }
            }
            Block::Code(lines)
        }
    }
}

fn table_lines(src: &str, quotes: usize) -> Vec<String> {
    src.split('\n')
        .map(|l| strip_quotes(l, quotes).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Rebuild a code span that spans lines from its normalized content.
fn code_literal(src: &str, code: &str) -> String {
    if !src.contains('\n') {
        return src.to_string();
    }
    let ticks = src.chars().take_while(|&c| c == '`').count();
    let inner = src.get(ticks..src.len().saturating_sub(ticks)).unwrap_or_default();
    let pad = if inner.starts_with([' ', '\n']) && inner.ends_with([' ', '\n']) {
        " "
    } else {
        ""
    };
    let fence = "`".repeat(ticks);
    format!("{fence}{pad}{code}{pad}{fence}")
}

/// Inline nodes with the source extent they were read from.
struct Run {
    inlines: Vec<Inline>,
    start: Option<usize>,
    end: Option<usize>,
}

/// Walks the parser's events, copying literal source slices by offset.
struct TreeBuilder<'a, I: Iterator<Item = (Event<'a>, Range<usize>)>> {
    src: &'a str,
    events: Peekable<I>,
}

impl<'a, I: Iterator<Item = (Event<'a>, Range<usize>)>> TreeBuilder<'a, I> {
    /// Blocks up to the end of the enclosing container, and whether any of
    /// them was an explicit paragraph (which makes a list loose).
    fn container(&mut self, quotes: usize) -> (Vec<Block>, bool) {
        let mut blocks = Vec::new();
        let mut explicit = false;
        loop {
            // Tight list items carry their text without paragraph tags.
            if self.events.peek().is_some_and(|(e, _)| is_inline(e)) {
                blocks.push(Block::Paragraph(self.inline_run().inlines));
                continue;
            }
            let Some((event, range)) = self.events.next() else {
                break;
            };
            match event {
                Event::End(_) => break,
                Event::Start(tag) => {
                    explicit |= matches!(tag, Tag::Paragraph);
                    blocks.push(self.block(tag, range, quotes));
                }
                Event::Rule => {
                    blocks.push(Block::ThematicBreak(self.src[range].trim().to_string()));
                }
                _ if self.src[range.clone()].trim().is_empty() => {}
                _ => blocks.push(Block::Html(raw_lines(&self.src[range]))),
            }
        }
        (blocks, explicit)
    }

    fn block(&mut self, tag: Tag<'a>, range: Range<usize>, quotes: usize) -> Block {
        match tag {
            Tag::Paragraph => {
                let run = self.inline_run();
                self.skip_to_end();
                Block::Paragraph(run.inlines)
            }
            Tag::Heading { level, .. } => {
                let mut run = self.inline_run();
                self.skip_to_end();
                let source = &self.src[range];
                // Closing `#` run of an ATX heading.
                if let Some(end) = run.end
                    && !source.trim_end().contains('\n')
                {
                    let rest = self.src[end..].split('\n').next().unwrap_or_default().trim();
                    if !rest.is_empty() {
                        run.inlines.push(Inline::Text(format!(" {rest}")));
                    }
                }
                heading(source, level as usize, run.inlines)
            }
            Tag::BlockQuote(_) => Block::Quote(self.container(quotes + 1).0),
            Tag::List(_) => self.list(quotes),
            Tag::CodeBlock(kind) => {
                let text = self.collect_text();
                code_block(&self.src[range], &kind, &text, quotes)
            }
            Tag::HtmlBlock => Block::Html(raw_lines(&self.collect_text())),
            Tag::Table(_) => {
                self.skip_to_end();
                Block::Table(table_lines(&self.src[range], quotes))
            }
            _ => {
                self.skip_to_end();
                Block::Html(raw_lines(&self.src[range]))
            }
        }
    }

    fn list(&mut self, quotes: usize) -> Block {
        let mut items = Vec::new();
        let mut loose = false;
        while let Some((event, range)) = self.events.next() {
            match event {
                Event::Start(Tag::Item) => {
                    let (blocks, explicit) = self.container(quotes);
                    loose |= explicit;
                    items.push(Item {
                        marker: list_marker(&self.src[range]),
                        blocks,
                    });
                }
                Event::End(_) => break,
                _ => {}
            }
        }
        Block::List { items, loose }
    }

    /// Consume events up to and including the end of the open element.
    fn skip_to_end(&mut self) {
        let mut depth = 0usize;
        for (event, _) in self.events.by_ref() {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) if depth == 0 => return,
                Event::End(_) => depth -= 1,
                _ => {}
            }
        }
    }

    /// Text content of a code or HTML block, consuming its end.
    fn collect_text(&mut self) -> String {
        let mut text = String::new();
        for (event, _) in self.events.by_ref() {
            match event {
                Event::End(_) => break,
                Event::Text(t) | Event::Html(t) | Event::InlineHtml(t) => text.push_str(&t),
                _ => {}
            }
        }
        text
    }

    /// Consecutive inline events. Each node's literal runs from the end of
    /// its previous sibling on the same line, so escapes and entities
    /// between event ranges are kept.
    fn inline_run(&mut self) -> Run {
        let mut run = Run {
            inlines: Vec::new(),
            start: None,
            end: None,
        };
        let mut prev_end: Option<usize> = None;

        while let Some((event, range)) = self.events.next_if(|(e, _)| is_inline(e)) {
            let from = self.literal_start(prev_end, range.start);
            run.start.get_or_insert(from);
            run.end = Some(range.end);
            prev_end = Some(range.end);

            let inline = match event {
                Event::SoftBreak => {
                    prev_end = None;
                    Inline::SoftBreak
                }
                Event::HardBreak => {
                    prev_end = None;
                    let before = self.src[..range.end].trim_end_matches(['\n', '\r']);
                    let marker = if before.ends_with('\\') { "\\" } else { "  " };
                    Inline::HardBreak(marker.to_string())
                }
                Event::Start(tag) => self.span(tag, from, range),
                Event::Code(code) => Inline::Code(format!(
                    "{}{}",
                    &self.src[from..range.start],
                    code_literal(&self.src[range.clone()], &code)
                )),
                Event::TaskListMarker(_) => Inline::Code(single_line(&self.src[from..range.end])),
                _ => Inline::Text(single_line(&self.src[from..range.end])),
            };
            run.inlines.push(inline);
        }
        run
    }

    /// Start of a node's literal: the end of its previous sibling on the same
    /// line, or its own start widened over a leading backslash escape.
    fn literal_start(&self, prev_end: Option<usize>, start: usize) -> usize {
        match prev_end {
            Some(end) if end <= start && !self.src[end..start].contains('\n') => end,
            _ if start > 0
                && self.src[..start].ends_with('\\')
                && self.src[start..].starts_with(|c: char| c.is_ascii_punctuation()) =>
            {
                start - 1
            }
            _ => start,
        }
    }

    fn span(&mut self, tag: Tag<'a>, from: usize, range: Range<usize>) -> Inline {
        let kind = match tag {
            Tag::Emphasis => SpanKind::Emphasis,
            Tag::Strong => SpanKind::Strong,
            Tag::Strikethrough => SpanKind::Strikethrough,
            Tag::Image { .. } => SpanKind::Image,
            _ => SpanKind::Link,
        };
        let children = self.inline_run();
        self.skip_to_end();

        let (open, close) = match (children.start, children.end) {
            (Some(start), Some(end)) => (&self.src[from..start], &self.src[end..range.end]),
            _ => (&self.src[from..range.end], ""),
        };
        Inline::Span {
            kind,
            open: single_line(open),
            close: single_line(close),
            children: children.inlines,
        }
    }
}

/// Whether a wrapped line may begin with `word` without the line being
/// re-read as the start of another block.
fn can_start_line(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return true;
    };

    if matches!(first, '-' | '=' | '_' | '*' | '+' | '#') && word.chars().all(|c| c == first) {
        return false;
    }
    let digits = word.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=9).contains(&digits) && word.len() == digits + 1 && word.ends_with(['.', ')']) {
        return false;
    }
    if first == '>' || first == '|' || word.starts_with("```") || word.starts_with("~~~") {
        return false;
    }
    if first == '<'
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
    {
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Rendering

fn render_blocks(blocks: &[Block], width: usize, tight: bool) -> Vec<String> {
    let mut out = Vec::new();
    for (n, block) in blocks.iter().enumerate() {
        if n > 0 && !tight {
            out.push(String::new());
        }
        out.extend(render_block(block, width));
    }
    out
}

fn render_block(block: &Block, width: usize) -> Vec<String> {
    match block {
        Block::Paragraph(content) => fill(content, width),
        Block::Heading {
            marker,
            underline,
            content,
        } => {
            let text = fill(content, usize::MAX).join(" ");
            let mut line = marker.clone();
            if !text.is_empty() {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&text);
            }
            let mut lines = vec![line];
            lines.extend(underline.iter().cloned());
            lines
        }
        Block::List { items, loose } => {
            let mut out = Vec::new();
            for (n, item) in items.iter().enumerate() {
                if n > 0 && *loose {
                    out.push(String::new());
                }
                let indent = item.marker.chars().count() + 1;
                let inner = render_blocks(
                    &item.blocks,
                    width.saturating_sub(indent).max(MIN_WIDTH),
                    !loose,
                );
                if inner.is_empty() {
                    out.push(item.marker.clone());
                    continue;
                }
                for (k, line) in inner.into_iter().enumerate() {
                    if k == 0 {
                        out.push(if line.is_empty() {
                            item.marker.clone()
                        } else {
                            format!("{} {line}", item.marker)
                        });
                    } else if line.is_empty() {
                        out.push(line);
                    } else {
                        out.push(format!("{}{line}", " ".repeat(indent)));
                    }
                }
            }
            out
        }
        Block::Quote(blocks) => render_blocks(blocks, width.saturating_sub(2).max(MIN_WIDTH), false)
            .into_iter()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect(),
        Block::Code(lines) | Block::Html(lines) | Block::Table(lines) => lines.clone(),
        Block::ThematicBreak(rule) => vec![rule.clone()],
    }
}

enum Piece {
    Word(String),
    Space,
    Hard(String),
}

fn flatten(inlines: &[Inline], out: &mut Vec<Piece>) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => {
                let mut word = String::new();
                for c in text.chars() {
                    if c == ' ' || c == '\t' {
                        if !word.is_empty() {
                            out.push(Piece::Word(std::mem::take(&mut word)));
                        }
                        out.push(Piece::Space);
                    } else {
                        word.push(c);
                    }
                }
                if !word.is_empty() {
                    out.push(Piece::Word(word));
                }
            }
            Inline::Code(code) => out.push(Piece::Word(code.clone())),
            Inline::Span {
                open,
                close,
                children,
                ..
            } => {
                out.push(Piece::Word(open.clone()));
                flatten(children, out);
                out.push(Piece::Word(close.clone()));
            }
            Inline::SoftBreak => out.push(Piece::Space),
            Inline::HardBreak(marker) => out.push(Piece::Hard(marker.clone())),
        }
    }
}

enum Token {
    Word(String),
    Hard(String),
}

/// Merge glued pieces into unbreakable words.
fn tokens(inlines: &[Inline]) -> Vec<Token> {
    let mut pieces = Vec::new();
    flatten(inlines, &mut pieces);

    let mut tokens = Vec::new();
    let mut word = String::new();
    for piece in pieces {
        match piece {
            Piece::Word(w) => word.push_str(&w),
            Piece::Space => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
            }
            Piece::Hard(marker) => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
                tokens.push(Token::Hard(marker));
            }
        }
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    tokens
}

/// Greedy fill. Words wider than `width` get a line of their own.
fn fill(inlines: &[Inline], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut column = 0usize;

    for token in tokens(inlines) {
        match token {
            Token::Word(word) => {
                let len = word.chars().count();
                if line.is_empty() {
                    line = word;
                    column = len;
                } else if column.saturating_add(1).saturating_add(len) > width
                    && can_start_line(&word)
                    && !line.ends_with('\\')
                {
                    lines.push(std::mem::replace(&mut line, word));
                    column = len;
                } else {
                    line.push(' ');
                    line.push_str(&word);
                    column += 1 + len;
                }
            }
            Token::Hard(marker) => {
                line.push_str(&marker);
                lines.push(std::mem::take(&mut line));
                column = 0;
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}


#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = "# Heading   text

Some paragraph with *emphasis that spans words* and a [link to the docs](https://example.com/docs)
plus `inline code span` and **strong words here** at the ~~very~~ end.

- first item that is fairly long and will wrap
- second item
  1. nested ordered item with words
  2. another

> quoted text that should wrap as well inside the quote

```rust
fn main() { let x = 1; let y = 2; let z = 3; }
```

---

<div>raw html line that stays exactly as it is</div>

| a | b |
|---|---|";

    #[test]
    fn wrap_greedy_paragraph() {
        assert_eq!(wrap("one two three four five", 9), "one two\nthree\nfour five");
    }

    #[test]
    fn unwrap_joins_soft_breaks() {
        assert_eq!(unwrap("a\nb\n\nc"), "a b\n\nc");
        assert_eq!(unwrap("a\r\nb"), "a b");
    }

    #[test]
    fn unwrap_normalizes_spacing() {
        assert_eq!(unwrap("  a   b  \n\n\n\nc"), "a b\n\nc");
    }

    #[test]
    fn fenced_code_untouched() {
        let text = "```\nlong line here that exceeds the width\n```";
        assert_eq!(wrap(text, 5), text);
    }

    #[test]
    fn suggestion_fence_keeps_indentation() {
        let text = "```suggestion\n    let x = 1;\n\tlet y = 2;\n```";
        assert_eq!(unwrap(text), text);
    }

    #[test]
    fn list_items_keep_markers() {
        assert_eq!(
            wrap("- alpha beta gamma\n- delta", 10),
            "- alpha\n  beta\n  gamma\n- delta"
        );
        assert_eq!(unwrap("1. one\n   two\n2. three"), "1. one two\n2. three");
    }

    #[test]
    fn loose_list_keeps_blank_lines() {
        assert_eq!(unwrap("- a\n\n- b"), "- a\n\n- b");
    }

    #[test]
    fn emphasis_width_includes_markers() {
        assert_eq!(wrap("aa *bb cc*", 6), "aa *bb\ncc*");
        assert_eq!(unwrap("aa *bb\ncc*"), "aa *bb cc*");
    }

    #[test]
    fn block_start_words_stay_inline() {
        assert_eq!(wrap("a - b", 1), "a -\nb");
        assert_eq!(wrap("costs 5 - 3 or 1. maybe", 1), "costs\n5 -\n3\nor 1.\nmaybe");
        assert_eq!(wrap("see # and > here", 3), "see #\nand >\nhere");
    }

    #[test]
    fn hard_break_resets_column() {
        assert_eq!(wrap("aaa bbb\\\nc d", 3), "aaa\nbbb\\\nc d");
        assert_eq!(unwrap("one  \ntwo\nthree"), "one  \ntwo three");
    }

    #[test]
    fn line_never_ends_in_a_literal_backslash() {
        assert_eq!(wrap("aaaa b\\ cccc", 6), "aaaa\nb\\ cccc");
        assert_eq!(unwrap("aaaa\nb\\ cccc"), "aaaa b\\ cccc");

        let text = "foo\\\\ bar C:\\Program\\ end";
        let flat = unwrap(text);
        for width in 1..=12 {
            let wrapped = wrap(text, width);
            assert!(
                wrapped.lines().all(|l| !l.ends_with('\\')),
                "width {width}: {wrapped:?}"
            );
            assert_eq!(unwrap(&wrapped), flat, "width {width}");
        }
    }

    #[test]
    fn escapes_and_entities_are_kept() {
        assert_eq!(
            unwrap("\\*not emphasis\\*\nand &amp; more"),
            "\\*not emphasis\\* and &amp; more"
        );
        assert_eq!(unwrap("# Title ##"), "# Title ##");
    }

    #[test]
    fn link_destination_is_unbreakable() {
        assert_eq!(
            wrap("see [the docs](https://example.com/x) now", 10),
            "see [the\ndocs](https://example.com/x)\nnow"
        );
    }

    #[test]
    fn code_span_is_unbreakable() {
        assert_eq!(wrap("x `a b c` y", 3), "x\n`a b c`\ny");
        assert_eq!(unwrap("x `a\nb` y"), "x `a b` y");
    }

    #[test]
    fn heading_on_one_line() {
        assert_eq!(wrap("#  Title   words", 3), "# Title words");
        assert_eq!(unwrap("Title\nmore\n==="), "Title more\n===");
    }

    #[test]
    fn quote_wraps_under_prefix() {
        assert_eq!(wrap("> one two three", 9), "> one two\n> three");
    }

    #[test]
    fn html_and_tables_untouched() {
        let text = "<details>\n<summary>x y z</summary>\n</details>\n\n| a | b |\n|---|---|";
        assert_eq!(wrap(text, 3), text);
    }

    #[test]
    fn parse_inline_spans() {
        let blocks = parse("a **b *c*** [d](e) ![f](g) ~~h~~ snake_case_name");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        let kinds: Vec<SpanKind> = inlines
            .iter()
            .filter_map(|i| match i {
                Inline::Span { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                SpanKind::Strong,
                SpanKind::Link,
                SpanKind::Image,
                SpanKind::Strikethrough
            ]
        );
    }

    #[test]
    fn parse_nested_emphasis() {
        let blocks = parse("**a *b* c**");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        let Inline::Span { kind, children, .. } = &inlines[0] else {
            panic!("expected span");
        };
        assert_eq!(*kind, SpanKind::Strong);
        assert!(children.iter().any(|c| matches!(
            c,
            Inline::Span {
                kind: SpanKind::Emphasis,
                ..
            }
        )));
    }

    #[test]
    fn parse_list_structure() {
        let blocks = parse("- a\n- b\n  - c");
        let Block::List { items, loose } = &blocks[0] else {
            panic!("expected list");
        };
        assert!(!loose);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1].blocks[1], Block::List { .. }));
    }

    #[test]
    fn reflow_is_idempotent() {
        let flat = unwrap(DOCUMENT);
        for width in 1..=100 {
            let wrapped = wrap(DOCUMENT, width);
            assert_eq!(unwrap(&wrapped), flat, "width {width}");
            assert_eq!(wrap(&wrapped, width), wrapped, "width {width}");
        }
    }

    #[test]
    fn unwrap_of_flat_text_is_stable() {
        let flat = unwrap(DOCUMENT);
        assert_eq!(unwrap(&flat), flat);
    }
}
