use async_trait::async_trait;
use tracing::info;

use crate::pipeline::Stage;
use crate::types::Result;
use crate::wiki::Context;

/// Commit and push the generated wiki
#[derive(Debug, Default, Clone, Copy)]
pub struct Upload;

#[async_trait]
impl Stage<Context> for Upload {
    type Input = ();
    type Output = ();

    fn name(&self) -> &str {
        "upload"
    }

    async fn invoke(&self, ctx: &Context, _input: &()) -> Result<()> {
        if ctx.wiki_repo.upload().await? {
            info!("Wiki published to {}", ctx.wiki_repo.checkout().id());
        } else {
            info!("Wiki unchanged, nothing published");
        }
        Ok(())
    }

    async fn rollback(&self, ctx: &Context, _input: &()) -> Result<()> {
        ctx.wiki_repo.cleanup().await
    }
}
