//! Codec for the single-line comment header.
//!
//! A header is a marker, a run of rule characters, then separator-joined
//! tokens. Each token is dispatched by its keyword or its shape; tokens that
//! are not understood are dropped so older readers accept newer writers.

use chrono::NaiveDateTime;

/// Character that introduces every structured line.
pub const MARKER: char = '┃';
/// Character repeated at the start of a header payload.
pub const RULE: char = '━';
/// Separator between header tokens.
pub const SEPARATOR: &str = ", ";
/// Number of rule characters written by the encoder.
pub const RULE_WIDTH: usize = 3;
/// Timestamp layout, always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Target of a reply header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTo {
    /// Bare `reply`: attach to whichever thread is open.
    Open,
    /// `reply <id>`: attach to the thread holding this comment.
    Comment(String),
}

/// Decoded form of one header line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub author: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub id: Option<String>,
    pub reply_to: Option<ReplyTo>,
    pub is_new: bool,
    pub pr_number: Option<u64>,
    pub path: Option<String>,
    pub range: Option<i64>,
    pub orig_line: Option<u32>,
    pub is_file: bool,
    pub is_left: bool,
    pub is_outdated: bool,
    pub is_resolved: bool,
    pub base: Option<String>,
    pub head: Option<String>,
}

impl Header {
    /// Header for a comment that has not been pushed yet.
    pub fn new_comment() -> Self {
        Self {
            is_new: true,
            ..Self::default()
        }
    }

    /// Encode the header as a payload, without comment token or marker.
    pub fn encode(&self) -> String {
        let mut tokens: Vec<String> = Vec::new();

        if let Some(author) = &self.author {
            tokens.push(format!("@{author}"));
        }
        if let Some(ts) = &self.timestamp {
            tokens.push(ts.format(TIMESTAMP_FORMAT).to_string());
        }
        if let Some(id) = &self.id {
            tokens.push(format!("id {}", fold_id(id)));
        }
        match &self.reply_to {
            Some(ReplyTo::Open) => tokens.push("reply".to_string()),
            Some(ReplyTo::Comment(parent)) => tokens.push(format!("reply {}", fold_id(parent))),
            None => {}
        }
        if self.is_new {
            tokens.push("new".to_string());
        }
        if let Some(number) = self.pr_number {
            tokens.push(format!("pr {number}"));
        }
        if let Some(path) = &self.path {
            tokens.push(format!("path {path}"));
        }
        if let Some(range) = self.range {
            tokens.push(format!("range {range}"));
        }
        if let Some(orig_line) = self.orig_line {
            tokens.push(format!("origline {orig_line}"));
        }
        for (flag, name) in [
            (self.is_file, "file"),
            (self.is_left, "left"),
            (self.is_outdated, "outdated"),
            (self.is_resolved, "resolved"),
        ] {
            if flag {
                tokens.push(name.to_string());
            }
        }
        if let Some(base) = &self.base {
            tokens.push(format!("base {base}"));
        }
        if let Some(head) = &self.head {
            tokens.push(format!("head {head}"));
        }

        let rule: String = std::iter::repeat_n(RULE, RULE_WIDTH).collect();
        if tokens.is_empty() {
            rule
        } else {
            format!("{rule} {}", tokens.join(SEPARATOR))
        }
    }

    /// Decode a payload produced by [`Header::encode`].
    ///
    /// Returns `None` when the payload does not start with the rule
    /// character. Individual tokens never cause a failure.
    pub fn decode(payload: &str) -> Option<Self> {
        if !payload.starts_with(RULE) {
            return None;
        }
        let rest = payload.trim_start_matches(RULE).trim();

        let mut header = Header::default();
        for token in rest.split(SEPARATOR) {
            header.apply_token(token.trim());
        }
        Some(header)
    }

    fn apply_token(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        if let Some(author) = token.strip_prefix('@') {
            if !author.is_empty() {
                self.author = Some(author.to_string());
            }
            return;
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(token, TIMESTAMP_FORMAT) {
            self.timestamp = Some(ts);
            return;
        }

        let (key, value) = match token.split_once(' ') {
            Some((key, value)) => (key, Some(value.trim())),
            None => (token, None),
        };

        match (key, value) {
            ("id", Some(v)) => self.id = Some(unfold_id(v)),
            ("reply", None) => self.reply_to = Some(ReplyTo::Open),
            ("reply", Some(v)) => self.reply_to = Some(ReplyTo::Comment(unfold_id(v))),
            ("new", None) => self.is_new = true,
            ("pr", Some(v)) => {
                if let Ok(n) = v.parse() {
                    self.pr_number = Some(n);
                }
            }
            ("path", Some(v)) => self.path = Some(v.to_string()),
            ("range", Some(v)) => {
                if let Ok(n) = v.parse() {
                    self.range = Some(n);
                }
            }
            ("origline", Some(v)) => {
                if let Ok(n) = v.parse() {
                    self.orig_line = Some(n);
                }
            }
            ("file", None) => self.is_file = true,
            ("left", None) => self.is_left = true,
            ("outdated", None) => self.is_outdated = true,
            ("resolved", None) => self.is_resolved = true,
            ("base", Some(v)) => self.base = Some(v.to_string()),
            ("head", Some(v)) => self.head = Some(v.to_string()),
            _ => log::debug!("ignoring unknown header token {token:?}"),
        }
    }
}

/// Separator between a folded id and its case mask.
const FOLD_MARK: char = '~';

/// Fold an opaque id into its lowercase compact form.
///
/// Ids without uppercase letters and without the fold mark pass through
/// unchanged. Otherwise the id is lowercased and followed by `~` and a hex
/// mask: digit `k` holds the uppercase flags of characters `4k..4k+4`,
/// lowest bit first, trailing zero digits dropped.
pub fn fold_id(id: &str) -> String {
    let has_upper = id.chars().any(|c| c.is_ascii_uppercase());
    if !has_upper && !id.contains(FOLD_MARK) {
        return id.to_string();
    }

    let mut digits: Vec<u8> = Vec::new();
    for (i, c) in id.chars().enumerate() {
        if digits.len() <= i / 4 {
            digits.push(0);
        }
        if c.is_ascii_uppercase() {
            digits[i / 4] |= 1 << (i % 4);
        }
    }
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let mask: String = if digits.is_empty() {
        "0".to_string()
    } else {
        digits
            .iter()
            .map(|d| char::from_digit(u32::from(*d), 16).unwrap_or('0'))
            .collect()
    };
    format!("{}{FOLD_MARK}{mask}", id.to_ascii_lowercase())
}

/// Restore the exact casing of an id folded by [`fold_id`].
///
/// Values without a well-formed mask are returned verbatim.
pub fn unfold_id(folded: &str) -> String {
    let Some((base, mask)) = folded.rsplit_once(FOLD_MARK) else {
        return folded.to_string();
    };
    if mask.is_empty() || !mask.chars().all(|c| c.is_ascii_hexdigit()) {
        return folded.to_string();
    }

    let mut flags: Vec<bool> = Vec::new();
    for digit in mask.chars().filter_map(|c| c.to_digit(16)) {
        for bit in 0..4 {
            flags.push(digit & (1 << bit) != 0);
        }
    }

    base.chars()
        .enumerate()
        .map(|(i, c)| {
            if flags.get(i).copied().unwrap_or(false) {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn encode_synced_comment() {
        let header = Header {
            author: Some("alice".to_string()),
            timestamp: Some(ts(2024, 1, 15, 14, 30)),
            id: Some("c1".to_string()),
            ..Header::default()
        };
        assert_eq!(header.encode(), "━━━ @alice, 2024-01-15 14:30, id c1");
    }

    #[test]
    fn encode_new_comment_is_bare() {
        assert_eq!(Header::new_comment().encode(), "━━━ new");
        assert_eq!(Header::default().encode(), "━━━");
    }

    #[test]
    fn decode_full_header() {
        let header = Header {
            author: Some("bob".to_string()),
            timestamp: Some(ts(2023, 12, 31, 23, 59)),
            id: Some("PRRC_kwDOAbc".to_string()),
            reply_to: Some(ReplyTo::Comment("PRRC_kwDOXyz".to_string())),
            range: Some(-2),
            orig_line: Some(17),
            is_file: true,
            is_left: true,
            is_outdated: true,
            is_resolved: true,
            ..Header::default()
        };
        let encoded = header.encode();
        assert_eq!(Header::decode(&encoded), Some(header));
    }

    #[test]
    fn decode_state_fields() {
        let header = Header {
            author: Some("carol".to_string()),
            id: Some("PR_kwDOA".to_string()),
            pr_number: Some(42),
            path: Some("docs/data.json".to_string()),
            base: Some("abc123".to_string()),
            head: Some("def456".to_string()),
            ..Header::default()
        };
        assert_eq!(Header::decode(&header.encode()), Some(header));
    }

    #[test]
    fn decode_ignores_unknown_tokens() {
        let header = Header::decode("━━━━━━ @alice, colour blue, sparkly, id c1, range oops").unwrap();
        assert_eq!(header.author.as_deref(), Some("alice"));
        assert_eq!(header.id.as_deref(), Some("c1"));
        assert_eq!(header.range, None);
    }

    #[test]
    fn decode_bare_reply() {
        let header = Header::decode("━━━ new, reply").unwrap();
        assert!(header.is_new);
        assert_eq!(header.reply_to, Some(ReplyTo::Open));
    }

    #[test]
    fn decode_requires_rule() {
        assert_eq!(Header::decode("@alice, id c1"), None);
        assert_eq!(Header::decode(""), None);
    }

    #[test]
    fn fold_lowercase_id_is_unchanged() {
        assert_eq!(fold_id("abc_123-x"), "abc_123-x");
        assert_eq!(unfold_id("abc_123-x"), "abc_123-x");
    }

    #[test]
    fn fold_restores_casing() {
        for id in ["PRRC_kwDOAbCdEf4AAAABc", "X", "aB", "MDEyOklzc3VlQ29tbWVudDE="] {
            let folded = fold_id(id);
            assert_eq!(folded, folded.to_ascii_lowercase());
            assert_eq!(unfold_id(&folded), id);
        }
    }

    #[test]
    fn fold_mask_layout() {
        assert_eq!(fold_id("PRRC_kw"), "prrc_kw~f");
        assert_eq!(fold_id("abcdE"), "abcde~01");
    }

    #[test]
    fn fold_id_containing_mark() {
        let folded = fold_id("a~b");
        assert_eq!(folded, "a~b~0");
        assert_eq!(unfold_id(&folded), "a~b");
    }

    #[test]
    fn unfold_malformed_mask_is_verbatim() {
        assert_eq!(unfold_id("abc~xyz"), "abc~xyz");
        assert_eq!(unfold_id("abc~"), "abc~");
    }
}
