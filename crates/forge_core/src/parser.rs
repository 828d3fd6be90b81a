//! Parsing of raw generator output into files and a progress update.
//!
//! The generator is asked to emit file blocks:
//!
//! ```text
//! === FILE: app/page.tsx ===
//! export default function Page() {}
//! === END FILE ===
//! ```
//!
//! followed by an optional progress block:
//!
//! ```text
//! === PROGRESS UPDATE ===
//! {"iteration": 1, "filesCreated": ["app/page.tsx"], "summary": "..."}
//! === END PROGRESS ===
//! ```
//!
//! Model output does not always follow that shape, so [`parse_generated_code`]
//! runs a fixed cascade of strategies and keeps the first that yields a file.
//! Nothing here fails; malformed input produces an empty result.

use crate::file_set::{sanitize_path, GeneratedFile};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Start-of-file marker prefix.
pub const FILE_MARKER: &str = "=== FILE:";
/// End-of-file marker.
pub const END_FILE_MARKER: &str = "=== END FILE ===";
/// Start of the progress block.
pub const PROGRESS_MARKER: &str = "=== PROGRESS UPDATE ===";
/// End of the progress block.
pub const END_PROGRESS_MARKER: &str = "=== END PROGRESS ===";

/// Salvaged content must be longer than this when the end marker is missing.
const MIN_UNTERMINATED_LEN: usize = 10;

static PAIRED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)=== FILE: ([^\n]+?) ===(.*?)=== END FILE ===").expect("Invalid regex pattern")
});
static START_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"=== FILE: ([^\n]+?) ===").expect("Invalid regex pattern")
});
static FENCED_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)```(\w+)?[ \t]*file=["']([^"']+)["'](.*?)```"#).expect("Invalid regex pattern")
});
static JSON_FILES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\{\s*"files"\s*:\s*\["#).expect("Invalid regex pattern"));
static OPENING_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```\w*\n?").expect("Invalid regex pattern"));
static CLOSING_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n?```$").expect("Invalid regex pattern"));
static PROGRESS_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)=== PROGRESS UPDATE ===(.*?)=== END PROGRESS ===")
        .expect("Invalid regex pattern")
});
static SALVAGE_ITERATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""iteration"\s*:\s*(\d+)"#).expect("Invalid regex pattern"));
static SALVAGE_FILES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"filesCreated"\s*:\s*\[(.*?)\]"#).expect("Invalid regex pattern")
});
static SALVAGE_SUMMARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""summary"\s*:\s*"([^"]*)""#).expect("Invalid regex pattern"));

type Strategy = fn(&str) -> Vec<GeneratedFile>;

const CASCADE: [(&str, Strategy); 4] = [
    ("paired-markers", parse_paired_markers),
    ("start-markers", parse_start_markers),
    ("fenced-blocks", parse_fenced_blocks),
    ("json-files", parse_json_files),
];

/// Parses one iteration's raw output into files.
///
/// Strategies run in priority order and the first non-empty result wins:
/// paired start/end markers, start markers alone, fenced blocks with a
/// `file="..."` attribute, and finally an inline `{"files": [...]}` object.
///
/// # Examples
///
/// ```
/// use forge_core::parse_generated_code;
///
/// let raw = "=== FILE: app/page.tsx ===\n```tsx\nexport default function Page() {}\n```\n=== END FILE ===";
/// let files = parse_generated_code(raw);
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].path, "app/page.tsx");
/// assert_eq!(files[0].content, "export default function Page() {}");
/// ```
pub fn parse_generated_code(raw: &str) -> Vec<GeneratedFile> {
    let text = normalize_line_endings(raw);
    for (name, strategy) in CASCADE {
        let files = strategy(&text);
        if !files.is_empty() {
            debug!(strategy = name, files = files.len(), "parsed generator output");
            return files;
        }
    }
    debug!(bytes = raw.len(), "no files found in generator output");
    Vec::new()
}

fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Strips residual fence markers and surrounding whitespace.
pub fn clean_content(content: &str) -> String {
    let trimmed = content.trim();
    let without_open = OPENING_FENCE_RE.replace(trimmed, "");
    let without_close = CLOSING_FENCE_RE.replace(&without_open, "");
    without_close.trim().to_string()
}

fn file_record(path: &str, content: &str) -> Option<GeneratedFile> {
    let content = clean_content(content);
    let path = sanitize_path(path);
    if path.is_empty() || content.is_empty() {
        return None;
    }
    Some(GeneratedFile::new(&path, content))
}

fn parse_paired_markers(text: &str) -> Vec<GeneratedFile> {
    let blocks: Vec<_> = PAIRED_BLOCK_RE.captures_iter(text).collect();
    // A block missing its end marker swallows the next start marker, so
    // every start marker must be matched by its own block.
    let starts = START_MARKER_RE.find_iter(text).count();
    if blocks.len() != starts {
        debug!(blocks = blocks.len(), starts, "unterminated file block, deferring to start markers");
        return Vec::new();
    }
    blocks
        .iter()
        .filter_map(|caps| file_record(&caps[1], &caps[2]))
        .collect()
}

fn parse_start_markers(text: &str) -> Vec<GeneratedFile> {
    let markers: Vec<_> = START_MARKER_RE.captures_iter(text).collect();
    let mut files = Vec::new();

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body_start = whole.end();
        let next_marker = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let segment = &text[body_start..next_marker];
        let terminated = segment.find(END_FILE_MARKER);
        let body_end = terminated
            .or_else(|| segment.find("=== PROGRESS"))
            .unwrap_or(segment.len());

        let body = clean_content(&segment[..body_end]);
        if terminated.is_none() && body.len() <= MIN_UNTERMINATED_LEN {
            continue;
        }
        if let Some(file) = file_record(path.as_str(), &body) {
            files.push(file);
        }
    }
    files
}

fn parse_fenced_blocks(text: &str) -> Vec<GeneratedFile> {
    FENCED_FILE_RE
        .captures_iter(text)
        .filter_map(|caps| file_record(&caps[2], &caps[3]))
        .collect()
}

#[derive(Deserialize)]
struct JsonFiles {
    files: Vec<JsonFile>,
}

#[derive(Deserialize)]
struct JsonFile {
    path: String,
    #[serde(default)]
    content: String,
}

fn parse_json_files(text: &str) -> Vec<GeneratedFile> {
    let Some(start) = JSON_FILES_RE.find(text).map(|m| m.start()) else {
        return Vec::new();
    };
    // Read one JSON value and ignore whatever trails it
    let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<JsonFiles>();
    match values.next() {
        Some(Ok(payload)) => payload
            .files
            .into_iter()
            .filter_map(|f| file_record(&f.path, &f.content))
            .collect(),
        Some(Err(e)) => {
            debug!(error = %e, "inline files object is not valid JSON");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// A todo status change requested by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoUpdate {
    pub id: String,
    pub status: String,
}

/// Structured progress block emitted after the file blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressUpdate {
    pub iteration: u32,
    pub files_created: Vec<String>,
    pub summary: String,
    pub next_steps: Vec<String>,
    pub todo_updates: Vec<TodoUpdate>,
    pub prd_addendum: Option<String>,
}

/// Extracts the progress block, if any.
///
/// Malformed JSON is salvaged field by field; without at least an iteration
/// number the block is treated as absent.
pub fn parse_progress_update(raw: &str) -> Option<ProgressUpdate> {
    let caps = PROGRESS_BLOCK_RE.captures(raw)?;
    let body = caps.get(1)?.as_str().trim();
    let body = clean_content(body);

    match serde_json::from_str::<ProgressUpdate>(&body) {
        Ok(update) => Some(update),
        Err(e) => {
            debug!(error = %e, "salvaging malformed progress block");
            salvage_progress(&body)
        }
    }
}

fn salvage_progress(body: &str) -> Option<ProgressUpdate> {
    let iteration = SALVAGE_ITERATION_RE
        .captures(body)
        .and_then(|c| c[1].parse::<u32>().ok())?;

    let files_created = SALVAGE_FILES_RE
        .captures(body)
        .map(|c| {
            c[1].split(',')
                .map(|s| s.trim().trim_matches('"').trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let summary = SALVAGE_SUMMARY_RE
        .captures(body)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "Iteration completed".to_string());

    Some(ProgressUpdate {
        iteration,
        files_created,
        summary,
        ..ProgressUpdate::default()
    })
}

/// Files and progress block from one iteration's output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedIteration {
    pub files: Vec<GeneratedFile>,
    pub progress: Option<ProgressUpdate>,
}

/// Runs both the file cascade and the progress parser over the full output.
pub fn parse_iteration_output(raw: &str) -> ParsedIteration {
    ParsedIteration {
        files: parse_generated_code(raw),
        progress: parse_progress_update(raw),
    }
}

/// Retained tail of unmatched text, enough to hold a marker split across chunks.
const SCANNER_TAIL: usize = 512;

/// Best-effort incremental scanner that reports which file the stream is writing.
///
/// It only looks for start markers and may miss a marker split in unusual ways.
/// Use [`parse_generated_code`] on the complete text for the real result.
#[derive(Debug, Default)]
pub struct CurrentFileScanner {
    pending: String,
    current: Option<String>,
}

impl CurrentFileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk; returns every file started in it, in stream order.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let mut changed = Vec::new();
        let mut consumed = 0;
        for caps in START_MARKER_RE.captures_iter(&self.pending) {
            if let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) {
                let path = sanitize_path(path.as_str());
                if self.current.as_deref() != Some(path.as_str()) {
                    changed.push(path.clone());
                    self.current = Some(path);
                }
                consumed = whole.end();
            }
        }

        if consumed > 0 {
            self.pending.drain(..consumed);
        }
        if self.pending.len() > SCANNER_TAIL {
            let mut cut = self.pending.len() - SCANNER_TAIL;
            while !self.pending.is_char_boundary(cut) {
                cut += 1;
            }
            self.pending.drain(..cut);
        }
        changed
    }

    /// Path of the file most recently started, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}
