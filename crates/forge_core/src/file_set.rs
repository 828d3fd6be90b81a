//! Generated files and the path-keyed, insertion-ordered set that accumulates them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One generated source file.
///
/// `path` is always sanitized and `language` always derived from it; both are
/// fixed by [`GeneratedFile::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    pub language: String,
}

impl GeneratedFile {
    /// Creates a file record, sanitizing `raw_path` and deriving the language.
    ///
    /// # Examples
    ///
    /// ```
    /// use forge_core::GeneratedFile;
    ///
    /// let file = GeneratedFile::new("/../app/my page.tsx", "export {}");
    /// assert_eq!(file.path, "app/my-page.tsx");
    /// assert_eq!(file.language, "typescript");
    /// ```
    pub fn new(raw_path: &str, content: impl Into<String>) -> Self {
        let path = sanitize_path(raw_path);
        let language = language_for_path(&path).to_string();
        Self {
            path,
            content: content.into(),
            language,
        }
    }

    /// BLAKE3 digest of the content, hex encoded.
    pub fn digest(&self) -> String {
        hex::encode(blake3::hash(self.content.as_bytes()).as_bytes())
    }

    /// Number of lines in the content.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// Lower-cased extension, if any.
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.path)
    }
}

/// Normalizes an untrusted path into a safe relative form.
///
/// Backslashes become separators, `..` and `.` segments are dropped, leading and
/// repeated slashes disappear and whitespace runs become a single dash. The
/// result never contains `..`.
pub fn sanitize_path(raw: &str) -> String {
    raw.trim()
        .replace('\\', "/")
        .split('/')
        .map(sanitize_segment)
        .filter(|seg| !seg.is_empty() && seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize_segment(segment: &str) -> String {
    let mut out = segment
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    out
}

fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() && !name.starts_with(".env") {
        // Dotfiles such as ".gitignore" have no extension
        return None;
    }
    Some(ext)
}

/// Maps a file extension to a language tag.
pub fn language_for_path(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name == ".env" || name.starts_with(".env.") {
        return "plaintext";
    }
    let ext = match extension_of(path) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return "text",
    };
    match ext.as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "md" | "mdx" => "markdown",
        "html" => "html",
        "sql" => "sql",
        "py" => "python",
        "env" => "plaintext",
        "yaml" | "yml" => "yaml",
        _ => "text",
    }
}

/// What an insert did to the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Replaced,
}

/// Path-keyed file set.
///
/// Keys are unique. Iteration order is the order in which each path first
/// appeared; replacing a file keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<GeneratedFile>", into = "Vec<GeneratedFile>")]
pub struct FileSet {
    files: Vec<GeneratedFile>,
    index: HashMap<String, usize>,
}

impl FileSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the file at `file.path`.
    pub fn insert(&mut self, file: GeneratedFile) -> InsertOutcome {
        match self.index.get(&file.path) {
            Some(&pos) => {
                self.files[pos] = file;
                InsertOutcome::Replaced
            }
            None => {
                self.index.insert(file.path.clone(), self.files.len());
                self.files.push(file);
                InsertOutcome::Inserted
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&GeneratedFile> {
        self.index.get(path).map(|&pos| &self.files[pos])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.iter()
    }

    /// Paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Total line count over all files.
    pub fn total_lines(&self) -> usize {
        self.files.iter().map(GeneratedFile::line_count).sum()
    }
}

impl From<Vec<GeneratedFile>> for FileSet {
    fn from(files: Vec<GeneratedFile>) -> Self {
        let mut set = FileSet::new();
        for file in files {
            set.insert(file);
        }
        set
    }
}

impl From<FileSet> for Vec<GeneratedFile> {
    fn from(set: FileSet) -> Self {
        set.files
    }
}

impl FromIterator<GeneratedFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = GeneratedFile>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a GeneratedFile;
    type IntoIter = std::slice::Iter<'a, GeneratedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
