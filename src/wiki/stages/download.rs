use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use crate::pipeline::Stage;
use crate::types::{Result, WikiError, format_duration};
use crate::wiki::Context;

/// Bring the source checkout (and a separate wiki checkout) up to date, then
/// decide whether the wiki is fresh enough to skip
///
/// Input is the branch to check out; `None` keeps the current branch.
#[derive(Debug, Default, Clone, Copy)]
pub struct Download;

/// A wiki committed less than `skip` ago is up to date
///
/// Commit times in the future (clock skew) count as up to date.
pub fn is_up_to_date(now: DateTime<Utc>, last_commit: Option<DateTime<Utc>>, skip: Duration) -> bool {
    let Some(last) = last_commit else {
        return false;
    };
    match (now - last).to_std() {
        Ok(age) => age < skip,
        Err(_) => true,
    }
}

#[async_trait]
impl Stage<Context> for Download {
    type Input = Option<String>;
    type Output = ();

    fn name(&self) -> &str {
        "download"
    }

    async fn invoke(&self, ctx: &Context, branch: &Option<String>) -> Result<()> {
        ctx.repo
            .download(branch.as_deref(), &ctx.config.ignore_patterns)
            .await?;
        ctx.wiki_repo.download().await?;

        if ctx.force {
            return Ok(());
        }
        let last = ctx.wiki_repo.last_commit_time().await;
        let window = format_duration(ctx.config.skip);
        if is_up_to_date(Utc::now(), last, ctx.config.skip) {
            let last = last.map(|t| t.to_rfc3339()).unwrap_or_default();
            info!("Wiki is up to date, last commit {} is within {}", last, window);
            return Err(WikiError::Skipped(format!(
                "Wiki is up to date. Skipping generation. Last commit: {last}"
            )));
        }
        debug!("No wiki commit within {}, regenerating", window);
        Ok(())
    }
}
