use console::style;

use crate::index::{SearchHit, SyncReport};

/// Styled console output for command results
///
/// Progress and diagnostics go through `tracing`; this is only for what a
/// command reports back to the user.
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        println!("  {:<16} {}", style(key).dim(), value);
    }

    pub fn sync_report(&self, report: &SyncReport) {
        for (key, value) in sync_report_fields(report) {
            self.field(key, value);
        }
    }

    pub fn search_hits(&self, hits: &[SearchHit]) {
        if hits.is_empty() {
            self.warning("No matching files");
            return;
        }
        for (rank, hit) in hits.iter().enumerate() {
            println!("{:>3}. {}", rank + 1, style(&hit.file_path).cyan());
            println!("     {}", style(hit.preview.replace('\n', " ")).dim());
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows printed for a synchronization report
pub fn sync_report_fields(report: &SyncReport) -> Vec<(&'static str, String)> {
    let commits = match &report.from {
        Some(from) if from != &report.to => format!("{} -> {}", short(from), short(&report.to)),
        Some(_) => format!("{} (up to date)", short(&report.to)),
        None => format!("{} (full build)", short(&report.to)),
    };
    vec![
        ("Commit", commits),
        ("Changes", report.entries.to_string()),
        ("Files indexed", report.files_indexed.to_string()),
        (
            "Chunks",
            format!("+{} / -{}", report.chunks_added, report.chunks_removed),
        ),
        ("Failures", report.failures.to_string()),
        ("Persisted", if report.persisted { "yes" } else { "no" }.to_string()),
    ]
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
