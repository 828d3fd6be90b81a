//! Todo list generation from a requirements document.

use crate::estimate::Feature;
use crate::types::TodoItem;

const BASELINE_TASKS: [(&str, &str); 5] = [
    ("setup", "Project setup - layout, globals, config files"),
    ("ui-components", "Build reusable UI components (buttons, cards, inputs)"),
    ("page-structure", "Create page layouts and navigation"),
    ("features", "Implement core features and interactivity"),
    ("data-layer", "Add API routes and data handling"),
];

const CONDITIONAL_TASKS: [(Feature, &str, &str); 6] = [
    (Feature::Authentication, "auth", "Implement authentication system"),
    (Feature::Database, "database", "Set up database integration"),
    (Feature::Payments, "payments", "Integrate payment processing"),
    (Feature::FileUpload, "uploads", "Add file upload functionality"),
    (Feature::Realtime, "realtime", "Add realtime updates and notifications"),
    (Feature::Dashboard, "dashboard", "Build dashboard and analytics views"),
];

const TRAILING_TASKS: [(&str, &str); 2] = [
    ("testing", "Test and verify all components"),
    ("polish", "Final polish and optimization"),
];

/// Builds the ordered todo list for a build of `total_iterations` iterations.
///
/// Baseline tasks come first, then one task per detected feature, then testing
/// and polish. Targets are spread evenly and never exceed `total_iterations`.
///
/// # Examples
///
/// ```
/// use forge_core::generate_todos;
///
/// let todos = generate_todos("A blog with login", 4);
/// let ids: Vec<_> = todos.iter().map(|t| t.id.as_str()).collect();
/// assert_eq!(ids.first(), Some(&"setup"));
/// assert!(ids.contains(&"auth"));
/// assert_eq!(ids.last(), Some(&"polish"));
/// assert!(todos.iter().all(|t| t.target_iteration <= 4));
/// ```
pub fn generate_todos(doc: &str, total_iterations: u32) -> Vec<TodoItem> {
    let mut templates: Vec<(&str, &str)> = BASELINE_TASKS.to_vec();
    templates.extend(
        CONDITIONAL_TASKS
            .iter()
            .filter(|(feature, _, _)| feature.detect(doc))
            .map(|&(_, id, task)| (id, task)),
    );
    templates.extend(TRAILING_TASKS);

    let total = total_iterations.max(1);
    let step = (total / templates.len() as u32).max(1);

    templates
        .into_iter()
        .enumerate()
        .map(|(index, (id, task))| {
            let target = (index as u32).saturating_mul(step).saturating_add(1).min(total);
            TodoItem::new(id, task, target)
        })
        .collect()
}
