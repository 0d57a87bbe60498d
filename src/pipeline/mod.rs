//! Typed stage pipeline
//!
//! A [`Pipeline`] is an ordered chain of [`Stage`]s where each stage consumes
//! the previous stage's output. The chain is assembled with
//! [`Pipeline::register`], so a stage whose input does not match the
//! previous output is a compile error rather than a runtime surprise.
//!
//! ## Failure semantics
//!
//! Stages run strictly in order. The first stage that fails has its
//! [`Stage::rollback`] invoked once with the input it was given; a rollback
//! error is logged and not escalated. Later stages never run, and stages that
//! already completed are left as they are. The returned error is
//! [`WikiError::Stage`] naming the failed stage.
//!
//! ```ignore
//! let pipeline = Pipeline::with_context(ctx)
//!     .register(Download)
//!     .register(Structure)
//!     .register(Pages);
//! let structure = pipeline.execute(None).await?;
//! ```

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::types::{Result, WikiError};

/// One unit of work in a [`Pipeline`]
///
/// Stages are stateless across invocations; everything they need comes from
/// the shared context and their input.
#[async_trait]
pub trait Stage<C: Sync>: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    fn name(&self) -> &str;

    async fn invoke(&self, ctx: &C, input: &Self::Input) -> Result<Self::Output>;

    /// Clean up after a failed [`invoke`](Self::invoke)
    async fn rollback(&self, _ctx: &C, _input: &Self::Input) -> Result<()> {
        Ok(())
    }
}

type Chain<C, I, O> = dyn for<'a> Fn(&'a C, I) -> BoxFuture<'a, Result<O>> + Send + Sync;

fn chain<C, I, O, F>(f: F) -> Arc<Chain<C, I, O>>
where
    F: for<'a> Fn(&'a C, I) -> BoxFuture<'a, Result<O>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Entry point holding the context before the first stage is registered
pub struct PipelineBuilder<C> {
    context: Arc<C>,
}

impl<C> PipelineBuilder<C>
where
    C: Send + Sync + 'static,
{
    pub fn register<S>(self, stage: S) -> Pipeline<C, S::Input, S::Output>
    where
        S: Stage<C> + 'static,
        S::Input: 'static,
        S::Output: 'static,
    {
        Pipeline::<C, S::Input, S::Input>::identity(self.context).register(stage)
    }
}

/// Stages chained from input `I` to output `O` over context `C`
pub struct Pipeline<C, I, O> {
    context: Arc<C>,
    stages: Vec<String>,
    run: Arc<Chain<C, I, O>>,
}

impl<C> Pipeline<C, (), ()>
where
    C: Send + Sync + 'static,
{
    pub fn with_context(context: Arc<C>) -> PipelineBuilder<C> {
        PipelineBuilder { context }
    }
}

impl<C, I> Pipeline<C, I, I>
where
    C: Send + Sync + 'static,
    I: Send + 'static,
{
    fn identity(context: Arc<C>) -> Self {
        Pipeline {
            context,
            stages: Vec::new(),
            run: chain(|_ctx, input| async move { Ok(input) }.boxed()),
        }
    }
}

impl<C, I, O> Pipeline<C, I, O>
where
    C: Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    /// Append a stage consuming this pipeline's output
    pub fn register<S>(self, stage: S) -> Pipeline<C, I, S::Output>
    where
        S: Stage<C, Input = O> + 'static,
        S::Output: 'static,
        O: Sync,
    {
        let mut stages = self.stages;
        stages.push(stage.name().to_string());

        let prev = self.run;
        let stage = Arc::new(stage);
        let run = chain(move |ctx, input| {
            let prev = Arc::clone(&prev);
            let stage = Arc::clone(&stage);
            async move {
                let mid = prev(ctx, input).await?;
                run_stage(stage.as_ref(), ctx, mid).await
            }
            .boxed()
        });

        Pipeline {
            context: self.context,
            stages,
            run,
        }
    }

    /// Stage names in execution order
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Run every stage in order, stopping at the first failure
    pub async fn execute(&self, input: I) -> Result<O> {
        (self.run)(&self.context, input).await
    }
}

async fn run_stage<C, S>(stage: &S, ctx: &C, input: S::Input) -> Result<S::Output>
where
    C: Sync,
    S: Stage<C>,
{
    let name = stage.name();
    info!("Stage {} started", name);
    let start = Instant::now();

    match stage.invoke(ctx, &input).await {
        Ok(output) => {
            info!("Stage {} completed in {:.1}s", name, start.elapsed().as_secs_f64());
            Ok(output)
        }
        Err(e) => {
            if e.is_skipped() {
                info!("Stage {} skipped: {}", name, e);
            } else {
                warn!("Stage {} failed: {}", name, e);
            }
            if let Err(rollback_err) = stage.rollback(ctx, &input).await {
                warn!("Rollback of stage {} failed: {}", name, rollback_err);
            }
            Err(WikiError::stage(name, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every invoke and rollback in order
    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    struct Parse;

    #[async_trait]
    impl Stage<Journal> for Parse {
        type Input = String;
        type Output = usize;

        fn name(&self) -> &str {
            "parse"
        }

        async fn invoke(&self, ctx: &Journal, input: &String) -> Result<usize> {
            ctx.push(format!("parse:{input}"));
            input
                .parse()
                .map_err(|_| WikiError::Config(format!("not a number: {input}")))
        }

        async fn rollback(&self, ctx: &Journal, input: &String) -> Result<()> {
            ctx.push(format!("rollback-parse:{input}"));
            Ok(())
        }
    }

    /// Fails on odd numbers; rollback itself fails
    struct Halve;

    #[async_trait]
    impl Stage<Journal> for Halve {
        type Input = usize;
        type Output = usize;

        fn name(&self) -> &str {
            "halve"
        }

        async fn invoke(&self, ctx: &Journal, input: &usize) -> Result<usize> {
            ctx.push(format!("halve:{input}"));
            if input % 2 == 1 {
                return Err(WikiError::Config("odd".into()));
            }
            Ok(input / 2)
        }

        async fn rollback(&self, ctx: &Journal, input: &usize) -> Result<()> {
            ctx.push(format!("rollback-halve:{input}"));
            Err(WikiError::Config("rollback broke".into()))
        }
    }

    struct Render;

    #[async_trait]
    impl Stage<Journal> for Render {
        type Input = usize;
        type Output = String;

        fn name(&self) -> &str {
            "render"
        }

        async fn invoke(&self, ctx: &Journal, input: &usize) -> Result<String> {
            ctx.push(format!("render:{input}"));
            Ok(format!("={input}"))
        }

        async fn rollback(&self, ctx: &Journal, _input: &usize) -> Result<()> {
            ctx.push("rollback-render");
            Ok(())
        }
    }

    struct SkipAlways;

    #[async_trait]
    impl Stage<Journal> for SkipAlways {
        type Input = String;
        type Output = String;

        fn name(&self) -> &str {
            "skip"
        }

        async fn invoke(&self, _ctx: &Journal, _input: &String) -> Result<String> {
            Err(WikiError::Skipped("up to date".into()))
        }
    }

    fn pipeline(journal: Arc<Journal>) -> Pipeline<Journal, String, String> {
        Pipeline::with_context(journal)
            .register(Parse)
            .register(Halve)
            .register(Render)
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let journal = Arc::new(Journal::default());
        let pipeline = pipeline(Arc::clone(&journal));

        assert_eq!(pipeline.execute("42".into()).await.unwrap(), "=21");
        assert_eq!(journal.events(), vec!["parse:42", "halve:42", "render:21"]);
        assert_eq!(pipeline.stages(), &["parse", "halve", "render"]);
    }

    #[tokio::test]
    async fn test_middle_failure_rolls_back_only_failing_stage() {
        let journal = Arc::new(Journal::default());
        let pipeline = pipeline(Arc::clone(&journal));

        let err = pipeline.execute("7".into()).await.unwrap_err();
        assert_eq!(err.failed_stage(), Some("halve"));
        assert!(err.to_string().contains("odd"));
        // rollback error is swallowed, render never runs, parse is not compensated
        assert_eq!(journal.events(), vec!["parse:7", "halve:7", "rollback-halve:7"]);
    }

    #[tokio::test]
    async fn test_first_stage_failure_rolls_back_with_its_input() {
        let journal = Arc::new(Journal::default());
        let err = pipeline(Arc::clone(&journal))
            .execute("x".into())
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some("parse"));
        assert_eq!(journal.events(), vec!["parse:x", "rollback-parse:x"]);
    }

    #[tokio::test]
    async fn test_skip_stays_distinguishable() {
        let journal = Arc::new(Journal::default());
        let pipeline = Pipeline::with_context(Arc::clone(&journal))
            .register(SkipAlways)
            .register(Parse);

        let err = pipeline.execute("1".into()).await.unwrap_err();
        assert!(err.is_skipped());
        assert!(journal.events().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_is_reusable() {
        let journal = Arc::new(Journal::default());
        let pipeline = pipeline(Arc::clone(&journal));
        assert!(pipeline.execute("3".into()).await.is_err());
        assert_eq!(pipeline.execute("8".into()).await.unwrap(), "=4");
    }
}
