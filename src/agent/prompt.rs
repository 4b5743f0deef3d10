//! System prompt assembled from the resource snapshot and cached browser state.

use std::fmt::Write as _;

use serde_json::Value;

use super::conversation::CachedArtifacts;
use crate::board::diff::column_headings;
use crate::resources::ResourceSnapshot;
use crate::tools::{truncate_chars, BrowserTool};

/// Character caps applied to bulky prompt sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    pub accessibility_chars: usize,
    pub page_snapshot_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            accessibility_chars: 2000,
            page_snapshot_chars: 5000,
        }
    }
}

/// Build the system prompt. Pure: identical inputs give an identical prompt.
pub fn build_system_prompt(
    resources: &ResourceSnapshot,
    artifacts: &CachedArtifacts,
    tools: &[BrowserTool],
    limits: PromptLimits,
) -> String {
    let tool_descriptions = tools
        .iter()
        .map(|t| format!("- **{}**: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        r#"You are a QA assistant for an agile board web application. You have access to:
1. The agile board database (already loaded below)
2. A real browser driven through Playwright

## Browser tools

{tool_descriptions}

To inspect a page, call browser_navigate first, then browser_snapshot to read its accessibility tree.
Elements in snapshots carry 'ref' identifiers (e.g. [ref=e46]); pass the ref together with a
human-readable element description when clicking, typing or hovering.
Tool results may be cut short; a snapshot of the current page is always one call away.
"#
    );

    prompt.push_str("\n=== DATABASE DATA ===\n");
    prompt.push_str("Agile board assignments:\n");
    prompt.push_str(&pretty(&Value::Array(resources.records.clone())));
    prompt.push_str(
        "\n\nEach assignment has:\n\
         - engineer: Name of the engineer\n\
         - work_item: Title of the work item (story or defect)\n\
         - status: Current status (Developing, Under Review, Testing, Done, Ready for QA)\n",
    );

    if let Some(tree) = &resources.accessibility {
        let columns = column_headings(tree);
        let (tree_text, truncated) = truncate_chars(&pretty(tree), limits.accessibility_chars);

        prompt.push_str("\n=== UI SNAPSHOT (What users see) ===\n");
        let _ = writeln!(prompt, "The UI displays {} status columns:", columns.len());
        let _ = writeln!(prompt, "{}", pretty(&Value::from(columns)));
        prompt.push_str("\nFull UI accessibility tree:\n");
        prompt.push_str(&tree_text);
        if truncated {
            prompt.push_str("...");
        }
        prompt.push('\n');
    }

    if let Some(html) = &resources.html {
        prompt.push_str("\n=== UI HTML DOM ===\n");
        let _ = writeln!(
            prompt,
            "UI HTML snapshot is available ({} characters)",
            html.chars().count()
        );
        prompt.push_str("The HTML contains the rendered DOM structure of the agile board.\n");
    }

    if !artifacts.is_empty() {
        prompt.push_str("\n=== CURRENT PAGE SNAPSHOT ===\n");
        let _ = writeln!(
            prompt,
            "URL: {}",
            artifacts.last_target.as_deref().unwrap_or("unknown")
        );
        match &artifacts.last_snapshot {
            Some(snapshot) => {
                let (snapshot, _) = truncate_chars(snapshot, limits.page_snapshot_chars);
                prompt.push('\n');
                prompt.push_str(&snapshot);
                prompt.push('\n');
            }
            None => prompt.push_str("No snapshot has been taken of this page yet.\n"),
        }
    }

    prompt.push_str(
        "\n=== YOUR TASK ===\n\
         Answer questions about the agile board, analyze the data, and identify discrepancies\n\
         between the database and what the UI shows. Point out every difference you find.\n\
         When asked for test code, write Playwright tests in PYTHON using the refs you observed.",
    );

    prompt
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resources() -> ResourceSnapshot {
        ResourceSnapshot {
            records: vec![json!({
                "id": 9,
                "engineer": "Diana Prince",
                "work_item": "Add password reset feature",
                "status": "Ready for QA"
            })],
            accessibility: None,
            html: None,
        }
    }

    #[test]
    fn identical_inputs_give_identical_prompts() {
        let artifacts = CachedArtifacts {
            last_snapshot: Some("- heading \"Agile Board\" [ref=e1]".to_string()),
            last_target: Some("http://127.0.0.1:5500/index.html".to_string()),
        };
        let a = build_system_prompt(&resources(), &artifacts, &BrowserTool::ALL, PromptLimits::default());
        let b = build_system_prompt(&resources(), &artifacts, &BrowserTool::ALL, PromptLimits::default());
        assert_eq!(a, b);
    }

    #[test]
    fn lists_tools_and_records_and_omits_absent_sections() {
        let prompt = build_system_prompt(
            &resources(),
            &CachedArtifacts::default(),
            &BrowserTool::ALL,
            PromptLimits::default(),
        );
        assert!(prompt.contains("- **browser_navigate**:"));
        assert!(prompt.contains("- **browser_evaluate**:"));
        assert!(prompt.contains("=== DATABASE DATA ==="));
        assert!(prompt.contains("Diana Prince"));
        assert!(prompt.contains("=== YOUR TASK ==="));
        assert!(!prompt.contains("=== UI SNAPSHOT"));
        assert!(!prompt.contains("=== UI HTML DOM ==="));
        assert!(!prompt.contains("=== CURRENT PAGE SNAPSHOT ==="));
    }

    #[test]
    fn sections_appear_in_order() {
        let mut resources = resources();
        resources.accessibility = Some(json!({
            "role": "WebArea",
            "children": [
                {"role": "heading", "name": "Developing", "level": 3},
                {"role": "heading", "name": "Done", "level": 3}
            ]
        }));
        resources.html = Some("<html><body>board</body></html>".to_string());
        let artifacts = CachedArtifacts {
            last_snapshot: Some("- list".to_string()),
            last_target: None,
        };

        let prompt = build_system_prompt(&resources, &artifacts, &BrowserTool::ALL, PromptLimits::default());
        let order: Vec<usize> = [
            "=== DATABASE DATA ===",
            "=== UI SNAPSHOT",
            "=== UI HTML DOM ===",
            "=== CURRENT PAGE SNAPSHOT ===",
            "=== YOUR TASK ===",
        ]
        .iter()
        .map(|marker| prompt.find(marker).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(prompt.contains("The UI displays 2 status columns:"));
        assert!(prompt.contains("UI HTML snapshot is available (31 characters)"));
        assert!(prompt.contains("URL: unknown"));
    }

    #[test]
    fn columns_are_listed_as_the_board_shows_them() {
        let mut resources = resources();
        resources.accessibility = Some(json!({
            "role": "WebArea",
            "children": [
                {"role": "heading", "name": "Under Review", "level": 3},
                {"role": "heading", "name": "Developing", "level": 3},
                {"role": "heading", "name": "Done", "level": 3},
                {"role": "heading", "name": "Testing", "level": 3}
            ]
        }));

        let prompt = build_system_prompt(
            &resources,
            &CachedArtifacts::default(),
            &BrowserTool::ALL,
            PromptLimits::default(),
        );
        let listed = pretty(&json!(["Under Review", "Developing", "Done", "Testing"]));
        assert!(prompt.contains(&format!("The UI displays 4 status columns:\n{}\n", listed)));
    }

    #[test]
    fn bulky_sections_are_capped() {
        let mut resources = resources();
        resources.accessibility = Some(json!({"role": "WebArea", "name": "x".repeat(5000)}));
        let artifacts = CachedArtifacts {
            last_snapshot: Some("y".repeat(8000)),
            last_target: Some("http://localhost/".to_string()),
        };
        let limits = PromptLimits {
            accessibility_chars: 100,
            page_snapshot_chars: 300,
        };

        let prompt = build_system_prompt(&resources, &artifacts, &[], limits);
        assert!(!prompt.contains(&"x".repeat(101)));
        assert!(prompt.contains("..."));
        assert!(prompt.contains(&"y".repeat(300)));
        assert!(!prompt.contains(&"y".repeat(301)));
    }
}
