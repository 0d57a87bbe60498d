//! File tree rendering for prompts

use std::fmt::Write;
use std::path::Path;

use crate::types::Result;

/// Render `root` as an indented tree down to `max_depth` levels
///
/// The root line is `/` so the repository name never leaks into prompts.
/// Directories come before files, each group sorted by name; `.git` is
/// omitted.
pub fn render_file_tree(root: &Path, max_depth: usize) -> Result<String> {
    let mut out = String::from("/\n");
    render_dir(root, "", 1, max_depth, &mut out)?;
    Ok(out.trim_end().to_string())
}

fn render_dir(dir: &Path, prefix: &str, depth: usize, max_depth: usize, out: &mut String) -> Result<()> {
    if depth > max_depth {
        return Ok(());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != ".git")
        .map(|e| {
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (is_dir, e.file_name().to_string_lossy().to_string(), e.path())
        })
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let count = entries.len();
    for (i, (is_dir, name, path)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        let suffix = if is_dir { "/" } else { "" };
        let _ = writeln!(out, "{prefix}{branch}{name}{suffix}");
        if is_dir {
            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            render_dir(&path, &child_prefix, depth + 1, max_depth, out)?;
        }
    }
    Ok(())
}
