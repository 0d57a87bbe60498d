//! Prompt templates
//!
//! Each stage has a built-in template that a file named by
//! `generation.<stage>.prompt_template` replaces. Templates use `{name}`
//! placeholders; `{{` and `}}` produce literal braces, and placeholders
//! without a value are left untouched.

use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

use crate::types::{Result, WikiError};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

pub const AGENT_SYSTEM_PROMPT: &str = "\
You are a senior engineer writing documentation for a source code repository.
Every statement you make must be grounded in the repository's actual files.

Tools:
- semantic_search_files: find files related to a natural language query
- code_index_search: locate where a symbol (class, function, constant) is defined or used
- list_files: list the files in a directory
- view_file_content: read a file, page by page

Explore before you write. Prefer reading the files that matter over guessing.
When you have what you need, answer without calling more tools.";

pub const STRUCTURE_TEMPLATE: &str = "\
Plan the documentation wiki for the repository {repository}.

## File tree
```
{file_tree}
```

## Most frequently changed files (last 6 months)
{most_updated_files}

## Content hints
Organize pages after the Diátaxis categories. The maintainers asked for these topics:
```json
{hint}
```

Explore the repository with the tools, then propose the wiki: a title and an
ordered list of pages. Each page has a path ending in `.md` (e.g.
`/getting-started.md`), a title, a short description of what it covers, the
repository files it should draw on, and the paths of related pages.

Write titles and descriptions in {language}.";

pub const PAGE_TEMPLATE: &str = "\
Write the wiki page \"{title}\" for the repository {repository} (branch {branch}).

Page path: {path}
What the page covers: {description}

## Relevant files
{relevant_files}

## Related pages
{relevant_pages}

Read the relevant files (and anything else you need) with the tools, then
write the complete page in Markdown. Link related pages with their paths.
Cite files by repository-relative path. Output only the page content.

Write the page in {language}.";

pub const INDEX_TEMPLATE: &str = "\
Write the README.md landing page of the documentation wiki for {repo}.

## Generated pages
```
{filetree}
```

## Wiki structure
```json
{structure}
```

Introduce the project in a few paragraphs, then link every page with a one
line summary, grouped the way a new reader should approach them. Output only
the page content in Markdown.

Write the page in {language}.";

/// A prompt template with `{placeholder}` substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The override file if configured, else the built-in template
    pub fn load(path: Option<&Path>, builtin: &str) -> Result<Self> {
        match path {
            Some(path) => std::fs::read_to_string(path).map(Self::new).map_err(|e| {
                WikiError::Config(format!("Cannot read prompt template {}: {}", path.display(), e))
            }),
            None => Ok(Self::new(builtin)),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn render(&self, values: &[(&str, &str)]) -> String {
        PLACEHOLDER
            .replace_all(&self.text, |caps: &Captures| match &caps[0] {
                "{{" => "{".to_string(),
                "}}" => "}".to_string(),
                whole => values
                    .iter()
                    .find(|(key, _)| *key == &caps[1])
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| whole.to_string()),
            })
            .into_owned()
    }
}
