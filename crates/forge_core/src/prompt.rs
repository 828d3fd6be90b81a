//! Prompt construction for one iteration.

use crate::file_set::FileSet;
use crate::parser::{END_FILE_MARKER, END_PROGRESS_MARKER, PROGRESS_MARKER};
use crate::types::{BuildContext, IterationResult};
use std::fmt::Write;

/// How much prior state goes into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBounds {
    /// Existing file paths listed in the system prompt.
    pub max_previous_files: usize,
    /// Summarize history entries instead of including test error detail.
    pub truncate_content: bool,
    /// Keep only the most recent history entries, when set.
    pub max_history: Option<usize>,
}

impl ContextBounds {
    /// Default bounds for an iteration; later iterations carry less detail.
    pub fn for_iteration(iteration: u32) -> Self {
        Self {
            max_previous_files: if iteration > 5 { 10 } else { 20 },
            truncate_content: iteration > 7,
            max_history: None,
        }
    }

    /// Tighter bounds after a context-size failure.
    pub fn shrink(&self) -> Self {
        Self {
            max_previous_files: (self.max_previous_files / 2).max(3),
            truncate_content: true,
            max_history: Some(self.max_history.unwrap_or(6).div_ceil(2).max(1)),
        }
    }
}

/// System and user prompt for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationPrompt {
    pub system: String,
    pub user: String,
}

impl IterationPrompt {
    /// Combined length, used for usage accounting.
    pub fn text_len(&self) -> usize {
        self.system.len() + self.user.len()
    }
}

/// What the iteration should concentrate on, by position in the build.
pub fn iteration_focus(iteration: u32, total: u32) -> &'static str {
    let ratio = f64::from(iteration) / f64::from(total.max(1));
    if ratio <= 0.10 {
        "Project foundation:\n\
         - app/layout.tsx with metadata, fonts, and providers\n\
         - app/page.tsx with initial structure\n\
         - app/globals.css with Tailwind and CSS variables for theming\n\
         - lib/utils.ts with a cn() helper"
    } else if ratio <= 0.25 {
        "Core UI components and layout:\n\
         - Navigation (header/navbar) and footer\n\
         - Reusable card, input, and form components\n\
         - Loading skeletons and error states"
    } else if ratio <= 0.40 {
        "Page structure and routing:\n\
         - All main page routes\n\
         - Dynamic route handling if needed\n\
         - Page sections and responsive layout structure"
    } else if ratio <= 0.60 {
        "Feature implementation:\n\
         - Form handling with validation\n\
         - State management and event handlers\n\
         - Modals, dropdowns, and overlays"
    } else if ratio <= 0.75 {
        "API and data layer:\n\
         - API routes in app/api/\n\
         - Server actions for mutations\n\
         - Data fetching, error handling and loading states"
    } else if ratio <= 0.90 {
        "Authentication and integrations:\n\
         - Auth flow if the requirements call for it\n\
         - Third-party integrations and protected routes\n\
         - User session handling"
    } else {
        "Final polish and testing:\n\
         - Review all components for bugs\n\
         - Responsive design and accessibility\n\
         - Performance and final cleanup"
    }
}

fn history_entry(out: &mut String, entry: &IterationResult, summarize: bool) {
    let files = if entry.files_created.is_empty() && entry.files_updated.is_empty() {
        "none".to_string()
    } else {
        entry
            .files_created
            .iter()
            .chain(entry.files_updated.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "\n### Iteration {}", entry.iteration);
    let _ = writeln!(out, "- Files: {}", files);
    let _ = writeln!(out, "- Summary: {}", entry.summary);
    match &entry.test_result {
        Some(result) if result.passed => {
            let _ = writeln!(out, "- Test: PASSED");
        }
        Some(_) if summarize => {
            let _ = writeln!(out, "- Test: FAILED");
        }
        Some(result) => {
            let _ = writeln!(out, "- Test: FAILED - {}", result.errors.join(", "));
        }
        None => {}
    }
}

/// Renders the build context block embedded in the system prompt.
///
/// History entries appear in iteration order; with `max_history` only the most
/// recent ones are kept.
pub fn format_context_for_prompt(ctx: &BuildContext, bounds: &ContextBounds) -> String {
    let progress = &ctx.progress;
    let mut out = String::from("=== CURRENT BUILD CONTEXT ===\n\n## Project PRD\n");
    out.push_str(ctx.requirements.trim_end());
    out.push_str("\n\n## Build Progress\n");
    let _ = writeln!(
        out,
        "- Current Iteration: {} of {}",
        progress.current_iteration, progress.total_iterations
    );
    let _ = writeln!(out, "- Phase: {}", progress.phase);
    let _ = writeln!(out, "- Files Generated: {}", progress.files_generated);
    let _ = writeln!(out, "- Lines of Code: {}", progress.lines_of_code);

    out.push_str("\n## Todo List\n");
    out.push_str(&ctx.todo_checklist());
    out.push_str("\n\n## Completed Work (Previous Iterations)\n");

    let history = &ctx.iteration_history;
    let skip = bounds
        .max_history
        .map(|keep| history.len().saturating_sub(keep))
        .unwrap_or(0);
    for entry in &history[skip..] {
        history_entry(&mut out, entry, bounds.truncate_content);
    }

    out.push_str("\n=== END CONTEXT ===\n");
    out
}

fn output_format(iteration: u32) -> String {
    format!(
        "OUTPUT FORMAT - CRITICAL:\n\
         You MUST output each file using this EXACT format:\n\n\
         === FILE: path/to/file.tsx ===\n\
         // file content here - COMPLETE CODE, NO PLACEHOLDERS\n\
         {end_file}\n\n\
         AFTER generating ALL files, output a progress update:\n\n\
         {progress}\n\
         {{\n  \"iteration\": {iteration},\n  \"filesCreated\": [\"list\", \"of\", \"files\"],\n  \
         \"summary\": \"Brief description of what was accomplished\",\n  \
         \"nextSteps\": [\"what\", \"to\", \"do\", \"next\"],\n  \
         \"todoUpdates\": [{{ \"id\": \"task-id\", \"status\": \"completed\" }}],\n  \
         \"prdAddendum\": \"Optional notes on decisions later iterations must respect\"\n}}\n\
         {end_progress}",
        end_file = END_FILE_MARKER,
        progress = PROGRESS_MARKER,
        end_progress = END_PROGRESS_MARKER,
        iteration = iteration,
    )
}

const RULES: &str = "CRITICAL RULES:\n\
1. Use the === FILE: path === and === END FILE === markers EXACTLY as shown\n\
2. Write COMPLETE, WORKING code - no placeholders, no TODO comments\n\
3. Use TypeScript with proper types - avoid 'any'\n\
4. Use Tailwind CSS for all styling\n\
5. Follow Next.js App Router conventions (app directory, server components by default)\n\
6. Add 'use client' only when using hooks or browser APIs\n\
7. Handle errors properly and keep forms accessible\n\
8. Build upon previous iterations - do not recreate existing files from scratch";

/// Builds the prompts for `iteration`.
///
/// `retry_error` carries the previous attempt's failure into the system prompt.
pub fn build_iteration_prompt(
    ctx: &BuildContext,
    files: &FileSet,
    iteration: u32,
    bounds: &ContextBounds,
    retry_error: Option<&str>,
) -> IterationPrompt {
    let total = ctx.progress.total_iterations;
    let focus = iteration_focus(iteration, total);

    let mut system = String::from(
        "You are an expert Next.js developer building a production web application.\n\
         You write clean, type-safe TypeScript code using modern best practices.\n\n",
    );
    system.push_str(&format_context_for_prompt(ctx, bounds));

    if let Some(error) = retry_error {
        let _ = write!(
            system,
            "\nPREVIOUS ATTEMPT FAILED WITH ERROR:\n{}\n\nPlease fix the issue and try again. \
             Focus on generating valid, complete code.\n",
            error
        );
    }

    system.push('\n');
    system.push_str(&output_format(iteration));
    system.push_str("\n\n");
    system.push_str(RULES);
    system.push('\n');

    if !files.is_empty() {
        system.push_str("\nEXISTING FILES (reference or update these - DO NOT recreate from scratch):\n");
        for path in files.paths().take(bounds.max_previous_files) {
            let _ = writeln!(system, "- {}", path);
        }
        if files.len() > bounds.max_previous_files {
            let _ = writeln!(
                system,
                "... and {} more files",
                files.len() - bounds.max_previous_files
            );
        }
    }

    let _ = write!(
        system,
        "\nThis is iteration {} of {}.\nFOCUS THIS ITERATION ON: {}",
        iteration, total, focus
    );

    let user = format!(
        "Build iteration {}. Focus: {}\n\n\
         Generate the code now. Remember:\n\
         - Use === FILE: path === and === END FILE === markers\n\
         - Write complete, working code\n\
         - Include the PROGRESS UPDATE at the end",
        iteration, focus
    );

    IterationPrompt { system, user }
}
