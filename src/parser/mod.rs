use crate::{DiffFile, Hunk};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Parse zero-context `git diff -U0` output into structured `DiffFile` entries.
///
/// The input is cut into one section per `diff --git` line. Each hunk keeps
/// its removed and added lines verbatim and is assigned a SHA-256 hash of its
/// text. Binary sections and sections without hunks (mode changes, pure
/// renames, empty new files) produce no entry.
pub fn parse_diff(input: &str) -> Vec<DiffFile> {
    let lines: Vec<&str> = input.lines().collect();
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.starts_with("diff --git "))
        .map(|(idx, _)| idx)
        .collect();

    starts
        .iter()
        .enumerate()
        .filter_map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(lines.len());
            parse_section(&lines[start..end])
        })
        .collect()
}

/// One file's section, starting at its `diff --git` line.
fn parse_section(section: &[&str]) -> Option<DiffFile> {
    let mut old_path = None;
    let mut new_path = None;
    let mut renamed = None;

    let mut i = 1;
    while i < section.len() && !section[i].starts_with("@@ ") {
        let line = section[i];
        if line.starts_with("Binary files ") || line == "GIT binary patch" {
            return None;
        }
        if let Some(p) = line.strip_prefix("--- ") {
            old_path = header_path(p, "a/");
        } else if let Some(p) = line.strip_prefix("+++ ") {
            new_path = header_path(p, "b/");
        } else if let Some(p) = line.strip_prefix("rename to ") {
            renamed = Some(PathBuf::from(unquote(p)));
        }
        i += 1;
    }

    let path = new_path
        .or(renamed)
        .or(old_path)
        .or_else(|| git_line_path(section.first()?))?;

    let mut hunks = Vec::new();
    while i < section.len() {
        if section[i].starts_with("@@ ")
            && let Some(hunk) = parse_hunk(section, &mut i)
        {
            hunks.push(hunk);
        } else {
            i += 1;
        }
    }

    (!hunks.is_empty()).then_some(DiffFile { path, hunks })
}

/// Path of a `---`/`+++` line, without its side prefix. `None` for
/// `/dev/null`.
fn header_path(raw: &str, side: &str) -> Option<PathBuf> {
    let raw = unquote(raw.split('\t').next().unwrap_or(raw));
    if raw == "/dev/null" {
        return None;
    }
    Some(PathBuf::from(raw.strip_prefix(side).unwrap_or(raw)))
}

/// New-side path of a `diff --git a/<path> b/<path>` line.
fn git_line_path(line: &str) -> Option<PathBuf> {
    let rest = line.strip_prefix("diff --git ")?;
    let (_, path) = rest.rsplit_once(" b/")?;
    Some(PathBuf::from(unquote(path)))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// Parse a single hunk starting at the @@ line. Leaves `i` after the last
/// line that belongs to it.
fn parse_hunk(lines: &[&str], i: &mut usize) -> Option<Hunk> {
    // @@ -old_start[,old_count] +new_start[,new_count] @@ [context]
    let header = lines[*i].strip_prefix("@@ ")?;
    let (ranges, _) = header.split_once(" @@")?;
    let (old_part, new_part) = ranges.split_once(' ')?;
    let (old_start, old_count) = parse_range(old_part.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(new_part.strip_prefix('+')?)?;

    let mut removed = Vec::new();
    let mut added = Vec::new();
    let mut content_lines = Vec::new();
    *i += 1;

    while *i < lines.len() {
        let current = lines[*i];

        // "\ No newline at end of file" belongs to the line before it
        if current.starts_with('\\') {
            content_lines.push(current);
            *i += 1;
            continue;
        }
        if removed.len() >= old_count as usize && added.len() >= new_count as usize {
            break;
        }

        if let Some(text) = current.strip_prefix('-') {
            removed.push(text.to_string());
        } else if let Some(text) = current.strip_prefix('+') {
            added.push(text.to_string());
        } else {
            break;
        }
        content_lines.push(current);
        *i += 1;
    }

    Some(Hunk {
        old_start,
        old_count,
        new_start,
        new_count,
        removed,
        added,
        content_hash: compute_hash(&content_lines.join("\n")),
    })
}

/// Parse "start,count" or "start" (count defaults to 1).
fn parse_range(s: &str) -> Option<(u32, u32)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Compute SHA-256 hash of content.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
