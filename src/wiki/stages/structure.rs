use async_trait::async_trait;
use tracing::{info, instrument};

use crate::constants::repo::{RECENT_CHANGES_SINCE, RECENT_CHANGES_TOP_N};
use crate::pipeline::Stage;
use crate::types::{Result, WikiError, WikiStructure, log_filter_warn};
use crate::wiki::Context;
use crate::wiki::prompts::STRUCTURE_TEMPLATE;

/// Plan the wiki: ask the agent for a title and an ordered page list
#[derive(Debug, Default, Clone, Copy)]
pub struct Structure;

/// `path (N changes)` per line, most changed first
pub(crate) fn render_recent_changes(files: &[(String, usize)]) -> String {
    if files.is_empty() {
        return "(no recent changes)".to_string();
    }
    files
        .iter()
        .map(|(path, count)| format!("- {path} ({count} changes)"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Stage<Context> for Structure {
    type Input = ();
    type Output = WikiStructure;

    fn name(&self) -> &str {
        "structure"
    }

    #[instrument(skip_all, name = "structure")]
    async fn invoke(&self, ctx: &Context, _input: &()) -> Result<WikiStructure> {
        let stage = &ctx.settings.generation.structure;

        let file_tree = ctx.repo.file_tree()?;
        let recent = log_filter_warn(
            ctx.repo
                .most_recently_changed_files(Some(RECENT_CHANGES_SINCE), RECENT_CHANGES_TOP_N, true)
                .await,
            "Failed to collect recently changed files",
        )
        .unwrap_or_default();

        let repository = ctx.repo.id().to_string();
        let prompt = ctx.template(stage, STRUCTURE_TEMPLATE)?.render(&[
            ("repository", &repository),
            ("file_tree", &file_tree),
            ("most_updated_files", &render_recent_changes(&recent)),
            ("hint", &ctx.config.hints_json()),
            ("language", &ctx.config.language),
        ]);

        let outcome = ctx
            .agent(stage)?
            .with_schema(WikiStructure::schema())
            .run(&prompt)
            .await?;
        let value = outcome
            .structured
            .ok_or_else(|| WikiError::LlmApi("No structured wiki plan returned".to_string()))?;
        let structure: WikiStructure = serde_json::from_value(value)?;

        if structure.pages.is_empty() {
            return Err(WikiError::LlmApi("Wiki plan has no pages".to_string()));
        }
        info!(
            "Planned '{}' with {} pages in {} steps",
            structure.title,
            structure.pages.len(),
            outcome.steps_taken
        );
        Ok(structure)
    }
}
