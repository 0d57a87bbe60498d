use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::pipeline::Stage;
use crate::scheduler::ConcurrencyScheduler;
use crate::types::{Result, WikiError, WikiPage, WikiStructure, log_filter_warn, normalize_path};
use crate::wiki::Context;
use crate::wiki::prompts::PAGE_TEMPLATE;

/// Write every planned page, a bounded number at a time
///
/// One page failing is logged and does not fail the stage; the structure is
/// passed through unchanged for the index stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pages;

/// Location of a page file under `wiki_path`; `None` if the page path
/// would leave the wiki directory
pub(crate) fn page_file(wiki_path: &Path, page_path: &str) -> Option<PathBuf> {
    let relative = Path::new(normalize_path(page_path));
    if relative.as_os_str().is_empty() {
        return None;
    }
    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    (!escapes).then(|| wiki_path.join(relative))
}

async fn write_page(ctx: &Context, structure: &WikiStructure, page: &WikiPage, branch: &str) -> Result<PathBuf> {
    let target = page_file(ctx.wiki_path(), &page.path)
        .ok_or_else(|| WikiError::Config(format!("Page path escapes the wiki directory: {}", page.path)))?;

    let stage = &ctx.settings.generation.page;
    let repository = ctx.repo.id().to_string();
    let relevant_files = page
        .relevant_files
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = ctx.template(stage, PAGE_TEMPLATE)?.render(&[
        ("repository", repository.as_str()),
        ("title", page.title.as_str()),
        ("description", page.description.as_str()),
        ("branch", branch),
        ("path", page.path.as_str()),
        ("relevant_files", relevant_files.as_str()),
        ("relevant_pages", structure.related_links(page).as_str()),
        ("language", ctx.config.language.as_str()),
    ]);

    let outcome = ctx.agent(stage)?.run(&prompt).await?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, outcome.text).await?;
    debug!("Wrote {} in {} steps", target.display(), outcome.steps_taken);
    Ok(target)
}

#[async_trait]
impl Stage<Context> for Pages {
    type Input = WikiStructure;
    type Output = WikiStructure;

    fn name(&self) -> &str {
        "pages"
    }

    #[instrument(skip_all, name = "pages", fields(pages = structure.pages.len()))]
    async fn invoke(&self, ctx: &Context, structure: &WikiStructure) -> Result<WikiStructure> {
        let pages: Vec<&WikiPage> = match ctx.settings.pages.max_pages {
            Some(max) => structure.pages.iter().take(max).collect(),
            None => structure.pages.iter().collect(),
        };
        let branch = log_filter_warn(ctx.repo.branch().await, "Failed to read current branch")
            .unwrap_or_else(|| "HEAD".to_string());

        let scheduler = ConcurrencyScheduler::new(ctx.settings.pages.max_concurrency);
        let results = scheduler
            .run_all(pages.iter().map(|page| write_page(ctx, structure, page, &branch)))
            .await;

        let mut failed = 0usize;
        for (page, result) in pages.iter().zip(&results) {
            if let Err(e) = result {
                warn!("Failed to generate page {}: {}", page.path, e);
                failed += 1;
            }
        }
        if failed > 0 {
            warn!("{} of {} pages failed", failed, pages.len());
        }
        info!("Generated {} pages", pages.len() - failed);
        Ok(structure.clone())
    }

    async fn rollback(&self, ctx: &Context, _input: &WikiStructure) -> Result<()> {
        ctx.wiki_repo.cleanup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;
    use crate::wiki::context::testing::context;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn page(path: &str, related: &[&str]) -> WikiPage {
        WikiPage {
            path: path.into(),
            title: format!("Title of {path}"),
            description: "desc".into(),
            relevant_files: vec!["src/lib.rs".into()],
            relevant_page_paths: related.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_page_file() {
        let root = Path::new("/w");
        assert_eq!(page_file(root, "/intro.md"), Some(PathBuf::from("/w/intro.md")));
        assert_eq!(page_file(root, "./guides/a.md"), Some(PathBuf::from("/w/guides/a.md")));
        assert_eq!(page_file(root, "../outside.md"), None);
        assert_eq!(page_file(root, "/"), None);
    }

    #[tokio::test]
    async fn test_writes_pages_and_tolerates_failures() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::answering("# Page body"));
        let ctx = context(&dir, model.clone(), "wiki:\n  directory: docs\nlanguage: French\n");
        let structure = WikiStructure {
            title: "Widgets".into(),
            pages: vec![
                page("/intro.md", &["/guides/setup.md"]),
                page("/guides/setup.md", &[]),
                page("../escape.md", &[]),
            ],
        };

        let out = Pages.invoke(&ctx, &structure).await.unwrap();
        assert_eq!(out, structure);

        let docs = dir.path().join("checkout/docs");
        assert_eq!(std::fs::read_to_string(docs.join("intro.md")).unwrap(), "# Page body");
        assert!(docs.join("guides/setup.md").exists());
        assert!(!dir.path().join("checkout/escape.md").exists());
        assert_eq!(model.invocations(), 2);

        let calls = model.calls.lock().unwrap();
        let intro_prompt = calls
            .iter()
            .map(|c| &c[1].content)
            .find(|p| p.contains("Title of /intro.md"))
            .unwrap();
        assert!(intro_prompt.contains("- [Title of /guides/setup.md](/guides/setup.md)"));
        assert!(intro_prompt.contains("French"));
        assert!(intro_prompt.contains("(branch HEAD)"));
    }

    #[tokio::test]
    async fn test_max_pages_limits_generation() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::answering("body"));
        let mut ctx = context(&dir, model.clone(), "");
        ctx.settings.pages.max_pages = Some(1);
        let structure = WikiStructure {
            title: "W".into(),
            pages: vec![page("/a.md", &[]), page("/b.md", &[])],
        };

        Pages.invoke(&ctx, &structure).await.unwrap();
        assert_eq!(model.invocations(), 1);
        assert!(ctx.wiki_path().join("a.md").exists());
        assert!(!ctx.wiki_path().join("b.md").exists());
    }

    #[tokio::test]
    async fn test_rollback_removes_wiki_directory() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Arc::new(ScriptedModel::answering("x")), "");
        std::fs::create_dir_all(ctx.wiki_path()).unwrap();
        std::fs::write(ctx.wiki_path().join("a.md"), "stale").unwrap();

        Pages.rollback(&ctx, &WikiStructure::default()).await.unwrap();
        assert!(!ctx.wiki_path().exists());
    }
}
