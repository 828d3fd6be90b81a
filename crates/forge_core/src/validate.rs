//! Heuristic structural validation of a generated file set.
//!
//! This is not a compiler. It catches the shapes of breakage that truncated or
//! careless model output tends to produce: unbalanced delimiters, dangling local
//! imports, leftover placeholders and a missing entry page.

use crate::config::ValidationConfig;
use crate::file_set::{FileSet, GeneratedFile};
use crate::types::TestResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+.*?\s+from\s+['"]([^'"]+)['"]"#).expect("Invalid regex pattern")
});
static TODO_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(//|/\*|\{/\*|#)\s*(TODO|FIXME)\b").expect("Invalid regex pattern"));
static TEMPLATE_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*[A-Za-z_][\w.]*\s*\}\}|\b(YOUR_[A-Z0-9_]+|REPLACE_ME|PLACEHOLDER)\b")
        .expect("Invalid regex pattern")
});
static ANY_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*any\b|<any>|\bas any\b").expect("Invalid regex pattern"));

const SCRIPT_EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];
const RESOLVE_SUFFIXES: [&str; 6] = [".ts", ".tsx", ".js", ".jsx", "/index.ts", "/index.tsx"];

/// Validates the whole file set.
///
/// Syntax problems and a missing page are errors; unresolved imports,
/// placeholders and a missing layout are warnings. `passed` is true iff there
/// are no errors.
pub fn test_generated_files(files: &FileSet, options: &ValidationConfig, tested_at: i64) -> TestResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let known: HashSet<&str> = files.paths().collect();

    for file in files {
        let is_script = file
            .extension()
            .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));

        if options.check_syntax && is_script {
            for problem in syntax_problems(file) {
                errors.push(format!("{}: {}", file.path, problem));
            }
        }

        if options.check_imports && is_script {
            for missing in unresolved_imports(file, &known) {
                warnings.push(format!("{}: potentially missing import {}", file.path, missing));
            }
        }

        if options.check_placeholders && has_placeholder(&file.content) {
            warnings.push(format!("{}: Contains placeholder code", file.path));
        }
    }

    check_required_files(files, &mut errors, &mut warnings);

    TestResult::new(errors, warnings, tested_at)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_page(path: &str) -> bool {
    matches!(file_name(path), "page.tsx" | "page.jsx" | "page.ts" | "page.js")
}

fn is_layout(path: &str) -> bool {
    matches!(
        file_name(path),
        "layout.tsx" | "layout.jsx" | "layout.ts" | "layout.js"
    )
}

fn check_required_files(files: &FileSet, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    if !files.paths().any(is_layout) {
        warnings.push("Missing app/layout.tsx - may cause rendering issues".to_string());
    }
    if !files.paths().any(is_page) {
        errors.push("Missing app/page.tsx - app will not have a homepage".to_string());
    }

    for file in files {
        if (is_page(&file.path) || is_layout(&file.path)) && !file.content.contains("export default") {
            errors.push(format!("{}: Missing default export", file.path));
        }
    }
}

/// Delimiter counts gathered outside strings and comments.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DelimiterCounts {
    pub open_braces: usize,
    pub close_braces: usize,
    pub open_parens: usize,
    pub close_parens: usize,
    pub open_brackets: usize,
    pub close_brackets: usize,
    pub unclosed_single: usize,
    pub unclosed_double: usize,
    pub unclosed_template: bool,
}

/// Counts delimiters in script source, skipping quoted text and comments.
///
/// Single and double quoted strings end at the line break. With `lenient_quotes`
/// (JSX text, where an apostrophe is just a character) an unterminated quote is
/// read as a literal character; otherwise it is counted as unclosed. Template
/// literals may span lines and `${...}` expressions inside them are scanned as code.
pub fn scan_delimiters(code: &str, lenient_quotes: bool) -> DelimiterCounts {
    let chars: Vec<char> = code.chars().collect();
    let mut counts = DelimiterCounts::default();
    let mut template_exprs: Vec<usize> = Vec::new();
    let mut depth = 0usize;
    let mut in_template = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if in_template {
            match (c, next) {
                ('\\', _) => i += 2,
                ('`', _) => {
                    in_template = false;
                    i += 1;
                }
                ('$', Some('{')) => {
                    template_exprs.push(depth);
                    in_template = false;
                    i += 2;
                }
                _ => i += 1,
            }
            continue;
        }

        match (c, next) {
            ('/', Some('/')) => {
                i = find_from(&chars, i, '\n').unwrap_or(chars.len());
            }
            ('/', Some('*')) => {
                i = find_block_comment_end(&chars, i + 2);
            }
            ('\'', _) | ('"', _) => match find_string_end(&chars, i + 1, c) {
                Some(end) => i = end + 1,
                None if lenient_quotes => i += 1,
                None => {
                    if c == '\'' {
                        counts.unclosed_single += 1;
                    } else {
                        counts.unclosed_double += 1;
                    }
                    i = find_from(&chars, i, '\n').unwrap_or(chars.len());
                }
            },
            ('`', _) => {
                in_template = true;
                i += 1;
            }
            ('{', _) => {
                counts.open_braces += 1;
                depth += 1;
                i += 1;
            }
            ('}', _) => {
                if template_exprs.last() == Some(&depth) {
                    template_exprs.pop();
                    in_template = true;
                } else {
                    counts.close_braces += 1;
                    depth = depth.saturating_sub(1);
                }
                i += 1;
            }
            ('(', _) => {
                counts.open_parens += 1;
                i += 1;
            }
            (')', _) => {
                counts.close_parens += 1;
                i += 1;
            }
            ('[', _) => {
                counts.open_brackets += 1;
                i += 1;
            }
            (']', _) => {
                counts.close_brackets += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    counts.unclosed_template = in_template || !template_exprs.is_empty();
    counts
}

fn find_from(chars: &[char], start: usize, target: char) -> Option<usize> {
    chars[start..].iter().position(|&c| c == target).map(|p| start + p)
}

fn find_block_comment_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

fn find_string_end(chars: &[char], start: usize, quote: char) -> Option<usize> {
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' => return None,
            c if c == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn syntax_problems(file: &GeneratedFile) -> Vec<String> {
    let jsx = matches!(file.extension(), Some("tsx") | Some("jsx"));
    let counts = scan_delimiters(&file.content, jsx);
    let mut problems = Vec::new();

    if counts.open_braces != counts.close_braces {
        problems.push(format!(
            "Unbalanced curly braces: {} open, {} close",
            counts.open_braces, counts.close_braces
        ));
    }
    if counts.open_parens != counts.close_parens {
        problems.push(format!(
            "Unbalanced parentheses: {} open, {} close",
            counts.open_parens, counts.close_parens
        ));
    }
    if counts.open_brackets != counts.close_brackets {
        problems.push(format!(
            "Unbalanced square brackets: {} open, {} close",
            counts.open_brackets, counts.close_brackets
        ));
    }
    if counts.unclosed_single > 0 {
        problems.push("Unclosed single quote string".to_string());
    }
    if counts.unclosed_double > 0 {
        problems.push("Unclosed double quote string".to_string());
    }
    if counts.unclosed_template {
        problems.push("Unclosed template literal".to_string());
    }
    if jsx && file.content.contains("export default function") && !file.content.contains("return") {
        problems.push("Component function may be missing return statement".to_string());
    }
    problems
}

/// Local imports of `file` that do not resolve to a path in `known`.
fn unresolved_imports(file: &GeneratedFile, known: &HashSet<&str>) -> Vec<String> {
    let dir = file.path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");

    IMPORT_RE
        .captures_iter(&file.content)
        .map(|caps| caps[1].to_string())
        .filter(|specifier| {
            let Some(target) = resolve_local(dir, specifier) else {
                return false;
            };
            !candidates(&target).iter().any(|c| known.contains(c.as_str()))
        })
        .collect()
}

/// Resolves a local import specifier to a root-relative path; packages give `None`.
fn resolve_local(importer_dir: &str, specifier: &str) -> Option<String> {
    let (base, rest) = if let Some(rest) = specifier.strip_prefix("@/") {
        ("", rest)
    } else if specifier.starts_with("./") || specifier.starts_with("../") {
        (importer_dir, specifier)
    } else {
        return None;
    };

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for seg in rest.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

fn candidates(target: &str) -> Vec<String> {
    let has_extension = file_name(target).contains('.');
    let mut out = Vec::with_capacity(RESOLVE_SUFFIXES.len() + 1);
    if has_extension {
        out.push(target.to_string());
    }
    out.extend(RESOLVE_SUFFIXES.iter().map(|s| format!("{}{}", target, s)));
    out
}

fn has_placeholder(content: &str) -> bool {
    TODO_MARKER_RE.is_match(content)
        || TEMPLATE_TOKEN_RE.is_match(content)
        || (content.contains("...") && content.contains("implementation"))
}

/// Aggregate statistics for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub file_count: usize,
    pub total_lines: usize,
    pub total_chars: usize,
    /// File count per extension ("other" when there is none).
    pub by_extension: BTreeMap<String, usize>,
    /// Quality notes; informational only.
    pub issues: Vec<String>,
}

impl FileStats {
    /// Computes statistics over a file set.
    pub fn from_files(files: &FileSet) -> Self {
        let mut stats = FileStats {
            file_count: files.len(),
            ..Default::default()
        };

        for file in files {
            stats.total_lines += file.line_count();
            stats.total_chars += file.content.chars().count();
            let ext = file.extension().unwrap_or("other").to_string();
            *stats.by_extension.entry(ext).or_insert(0) += 1;

            if TODO_MARKER_RE.is_match(&file.content) {
                stats.issues.push(format!("{}: Contains TODO", file.path));
            }
            if file.content.contains("...") && file.content.contains("implementation") {
                stats.issues.push(format!("{}: Contains placeholder ...", file.path));
            }
            if ANY_TYPE_RE.find_iter(&file.content).count() > 3 {
                stats.issues.push(format!("{}: Excessive 'any' types", file.path));
            }
        }
        stats
    }
}
