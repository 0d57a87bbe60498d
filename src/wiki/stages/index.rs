use async_trait::async_trait;
use tracing::info;

use crate::constants::pages::INDEX_FILE_NAME;
use crate::constants::repo::FILE_TREE_MAX_DEPTH;
use crate::pipeline::Stage;
use crate::repo::render_file_tree;
use crate::types::{Result, WikiStructure};
use crate::wiki::Context;
use crate::wiki::prompts::INDEX_TEMPLATE;

/// Write the wiki's landing page from the generated pages and the plan
#[derive(Debug, Default, Clone, Copy)]
pub struct Index;

#[async_trait]
impl Stage<Context> for Index {
    type Input = WikiStructure;
    type Output = ();

    fn name(&self) -> &str {
        "index"
    }

    async fn invoke(&self, ctx: &Context, structure: &WikiStructure) -> Result<()> {
        let stage = &ctx.settings.generation.index;
        tokio::fs::create_dir_all(ctx.wiki_path()).await?;

        let filetree = render_file_tree(ctx.wiki_path(), FILE_TREE_MAX_DEPTH)?;
        let structure_json = serde_json::to_string_pretty(structure)?;
        let repository = ctx.repo.id().to_string();
        let prompt = ctx.template(stage, INDEX_TEMPLATE)?.render(&[
            ("repo", repository.as_str()),
            ("filetree", filetree.as_str()),
            ("structure", structure_json.as_str()),
            ("language", ctx.config.language.as_str()),
        ]);

        let outcome = ctx.agent(stage)?.run(&prompt).await?;
        let target = ctx.wiki_path().join(INDEX_FILE_NAME);
        tokio::fs::write(&target, outcome.text).await?;
        info!("Wrote {}", target.display());
        Ok(())
    }

    async fn rollback(&self, ctx: &Context, _input: &WikiStructure) -> Result<()> {
        ctx.wiki_repo.cleanup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;
    use crate::types::WikiPage;
    use crate::wiki::context::testing::context;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_readme_from_tree_and_structure() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::answering("# Widgets wiki"));
        let ctx = context(&dir, model.clone(), "");
        std::fs::create_dir_all(ctx.wiki_path()).unwrap();
        std::fs::write(ctx.wiki_path().join("intro.md"), "intro").unwrap();

        let structure = WikiStructure {
            title: "Widgets".into(),
            pages: vec![WikiPage {
                path: "/intro.md".into(),
                title: "Intro".into(),
                description: "d".into(),
                relevant_files: vec![],
                relevant_page_paths: vec![],
            }],
        };
        Index.invoke(&ctx, &structure).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(ctx.wiki_path().join("README.md")).unwrap(),
            "# Widgets wiki"
        );
        let calls = model.calls.lock().unwrap();
        let prompt = &calls[0][1].content;
        assert!(prompt.contains("intro.md"));
        assert!(prompt.contains("\"title\": \"Widgets\""));
        assert!(prompt.contains("acme/widgets"));
    }
}
