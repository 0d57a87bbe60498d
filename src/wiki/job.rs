//! One wiki generation run and its process outcome

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use super::Context;
use super::stages::{Download, Index, Pages, Structure, Upload};
use crate::constants::exit;
use crate::pipeline::Pipeline;
use crate::types::WikiError;

/// How a job ended, mapped onto the process exit code
#[derive(Debug)]
pub enum JobOutcome {
    Success,
    /// Nothing to do; carries the reason
    Skipped(String),
    Failed(WikiError),
}

impl JobOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Success => exit::SUCCESS,
            Self::Skipped(_) => exit::SKIPPED,
            Self::Failed(_) => exit::FAILURE,
        }
    }

    fn from_result(result: crate::types::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) if e.is_skipped() => Self::Skipped(skip_reason(e)),
            Err(e) => Self::Failed(e),
        }
    }
}

fn skip_reason(err: WikiError) -> String {
    match err {
        WikiError::Skipped(reason) => reason,
        WikiError::Stage { source, .. } => skip_reason(*source),
        other => other.to_string(),
    }
}

pub struct WikiJob {
    context: Arc<Context>,
}

impl WikiJob {
    pub fn new(context: Context) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Download → Structure → Pages → Index → Upload
    pub fn pipeline(&self) -> Pipeline<Context, Option<String>, ()> {
        Pipeline::with_context(Arc::clone(&self.context))
            .register(Download)
            .register(Structure)
            .register(Pages)
            .register(Index)
            .register(Upload)
    }

    #[instrument(skip(self), fields(repo = %self.context.repo.id()))]
    pub async fn run(&self, branch: Option<String>) -> JobOutcome {
        let started = Instant::now();
        let outcome = JobOutcome::from_result(self.pipeline().execute(branch).await);
        match &outcome {
            JobOutcome::Success => info!("Wiki generated in {:.1?}", started.elapsed()),
            JobOutcome::Skipped(reason) => info!("{}", reason),
            JobOutcome::Failed(e) => error!("Wiki generation failed: {}", e),
        }
        outcome
    }
}
