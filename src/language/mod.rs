use std::collections::BTreeMap;
use std::path::Path;

/// Line-comment tokens for the extensions we know how to annotate.
const BUILTIN: &[(&str, &[&str])] = &[
    (
        "//",
        &[
            "rs", "go", "c", "h", "cc", "cpp", "cxx", "hpp", "hh", "cs", "java", "kt", "kts",
            "scala", "swift", "js", "jsx", "mjs", "cjs", "ts", "tsx", "dart", "zig", "proto",
            "php", "groovy", "gradle", "v", "sv", "fs", "jsonc",
        ],
    ),
    (
        "#",
        &[
            "py", "rb", "sh", "bash", "zsh", "fish", "pl", "pm", "r", "yaml", "yml", "toml",
            "nix", "tf", "hcl", "cmake", "ex", "exs", "jl", "ps1", "conf", "cfg", "ini", "mk",
        ],
    ),
    ("--", &["sql", "lua", "hs", "elm", "ada", "adb", "ads"]),
    (";", &["clj", "cljs", "cljc", "edn", "el", "lisp", "scm", "rkt", "asm", "s"]),
    ("%", &["tex", "sty", "erl", "hrl", "m"]),
    ("\"", &["vim"]),
];

/// File names without a useful extension.
const BY_NAME: &[(&str, &str)] = &[
    ("Makefile", "#"),
    ("makefile", "#"),
    ("GNUmakefile", "#"),
    ("Dockerfile", "#"),
    ("Containerfile", "#"),
    ("CMakeLists.txt", "#"),
    ("BUILD", "#"),
    ("BUILD.bazel", "#"),
    ("WORKSPACE", "#"),
    ("Gemfile", "#"),
    ("Rakefile", "#"),
    (".gitignore", "#"),
    (".gitattributes", "#"),
];

/// Maps file paths to the line-comment token of their language.
#[derive(Debug, Clone, Default)]
pub struct Languages {
    overrides: BTreeMap<String, String>,
}

impl Languages {
    /// Create a table with additional `extension -> token` entries that take
    /// precedence over the built-in ones.
    pub fn with_overrides(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Line-comment token for `path`, or `None` when the language has no
    /// line comments we can write into.
    pub fn comment_token(&self, path: &Path) -> Option<&str> {
        let file_name = path.file_name()?.to_str()?;
        if let Some((_, token)) = BY_NAME.iter().find(|(name, _)| *name == file_name) {
            return Some(*token);
        }

        let ext = path.extension()?.to_str()?;
        if let Some(token) = self.overrides.get(ext) {
            return Some(token.as_str());
        }
        let ext = ext.to_ascii_lowercase();
        BUILTIN
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(token, _)| *token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        let langs = Languages::default();
        assert_eq!(langs.comment_token(Path::new("src/main.rs")), Some("//"));
        assert_eq!(langs.comment_token(Path::new("a/b/script.PY")), Some("#"));
        assert_eq!(langs.comment_token(Path::new("db/schema.sql")), Some("--"));
        assert_eq!(langs.comment_token(Path::new("Makefile")), Some("#"));
    }

    #[test]
    fn unknown_extension_has_no_token() {
        let langs = Languages::default();
        assert_eq!(langs.comment_token(Path::new("data.json")), None);
        assert_eq!(langs.comment_token(Path::new("README")), None);
        assert_eq!(langs.comment_token(Path::new("notes.md")), None);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut overrides = BTreeMap::new();
        overrides.insert("md".to_string(), "[//]:".to_string());
        overrides.insert("rs".to_string(), "///".to_string());
        let langs = Languages::with_overrides(overrides);
        assert_eq!(langs.comment_token(Path::new("notes.md")), Some("[//]:"));
        assert_eq!(langs.comment_token(Path::new("lib.rs")), Some("///"));
    }
}
