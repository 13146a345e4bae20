use crate::error::ResolutionError;
use crate::resolver::Task;
use std::fmt::Write as _;

/// Room for captured output across the whole comment. GitHub rejects bodies
/// over 65536 characters; the rest covers headings, markup and the quote.
const OUTPUT_BUDGET_CHARS: usize = 48_000;
/// Floor per task so every block keeps its last lines.
const MIN_OUTPUT_CHARS: usize = 1_000;

/// One executed task and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task: Task,
    pub output: String,
    pub error: Option<String>,
}

/// Everything one event produced, owned by that event alone.
#[derive(Debug, Default)]
pub struct ResultSet {
    pub succeeded: Vec<TaskOutcome>,
    pub failed: Vec<TaskOutcome>,
    pub internal: Vec<ResolutionError>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty() && self.internal.is_empty()
    }

    /// Render the comment body. Empty sections are omitted.
    pub fn render(&self) -> String {
        let blocks = self.succeeded.len() + self.failed.len();
        let per_block = (OUTPUT_BUDGET_CHARS / blocks.max(1)).max(MIN_OUTPUT_CHARS);
        let mut out = String::new();
        if !self.succeeded.is_empty() {
            out.push_str("The following updates succeeded:\n<ul>\n");
            for outcome in &self.succeeded {
                out.push_str(&render_details(outcome, per_block));
            }
            out.push_str("</ul>\n");
        }
        if !self.failed.is_empty() {
            out.push_str("The following updates failed:\n<ul>\n");
            for outcome in &self.failed {
                out.push_str(&render_details(outcome, per_block));
            }
            out.push_str("</ul>\n");
        }
        if !self.internal.is_empty() {
            out.push_str("The following internal errors occurred:\n<ul>\n");
            for err in &self.internal {
                let _ = writeln!(out, "  <li>{}</li>", escape(&err.to_string()));
            }
            out.push_str("</ul>\n");
        }
        out
    }
}

fn render_details(outcome: &TaskOutcome, max_output: usize) -> String {
    let command = escape(&outcome.task.to_string());
    format!(
        "  <li>\n    <details>\n    <summary><code>{command}</code></summary>\n\n    \
         <pre><code>\n$ {command}\n{}\n{}\n</code></pre>\n\n    </details>\n  </li>\n",
        escape(&tail(outcome.output.trim_end(), max_output)),
        escape(outcome.error.as_deref().unwrap_or_default()),
    )
}

/// Keep the last `max` characters, where failures usually show up.
fn tail(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total <= max {
        return text.to_string();
    }
    let omitted = total - max;
    let kept: String = text.chars().skip(omitted).collect();
    format!("[... {omitted} characters omitted]\n{kept}")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
