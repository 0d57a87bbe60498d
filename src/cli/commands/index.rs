//! Index Command
//!
//! Bring a repository's retrieval index up to date with its checkout.
//!
//! Usage:
//!   repowiki index acme/widgets [--branch main]

use tokio::runtime::Runtime;

use super::open_repository;
use crate::cli::ui::Output;
use crate::config::Settings;
use crate::index::SyncReport;
use crate::types::Result;

pub fn run(repo: &str, branch: Option<&str>, pat: Option<String>, settings: &Settings) -> Result<SyncReport> {
    let output = Output::new();
    let (repository, registry) = open_repository(repo, pat, settings)?;

    let rt = Runtime::new()?;
    let report = rt.block_on(async {
        repository.download(branch, &[]).await?;
        let handle = registry.acquire(&*repository).await?;
        let report = match handle.last_report() {
            Some(report) => report,
            None => handle.synchronize(&*repository).await?,
        };
        Ok::<_, crate::types::WikiError>((report, handle.len().await))
    });
    let (report, chunks) = report?;

    output.header(&format!("Index for {}", repository.id()));
    output.field("Location", registry.index_dir_for(&repository.id().key()).display());
    output.field("Total chunks", chunks);
    output.sync_report(&report);
    output.success(if report.is_noop() { "Index already up to date" } else { "Index updated" });
    Ok(report)
}
