//! repowiki - Documentation Wikis for GitHub Repositories
//!
//! Downloads a repository, lets a tool-using agent plan and write a wiki
//! grounded in the repository's files, and publishes the result.
//!
//! ## Core Pieces
//!
//! - **Pipeline**: typed stages chained at compile time, with per-stage rollback
//! - **Scheduler**: bounded concurrent execution of independent tasks
//! - **Agent**: ReAct loop with a step budget, forced final answer and
//!   structured extraction
//! - **Index**: per-repository vector index synchronized by commit diff and
//!   queried with maximal marginal relevance
//!
//! ## Quick Start
//!
//! ```ignore
//! use repowiki::{Context, RepoId, Settings, WikiJob};
//!
//! let context = Context::builder(RepoId::new("acme", "widgets"), Settings::default())
//!     .force(true)
//!     .build()?;
//! let outcome = WikiJob::new(context).run(None).await;
//! std::process::exit(outcome.exit_code().into());
//! ```
//!
//! ## Modules
//!
//! - [`wiki`]: job context, the five stages and exit status
//! - [`pipeline`], [`scheduler`], [`agent`], [`index`]: the engine
//! - [`repo`]: git checkouts, the wiki target and GitHub code search
//! - [`ai`]: chat and embedding model bindings
//! - [`config`]: layered settings and the per-repository wiki config

pub mod agent;
pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod index;
pub mod pipeline;
pub mod repo;
pub mod scheduler;
pub mod types;
pub mod wiki;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Settings, SettingsLoader, WikiConfig};

// Error Types
pub use types::{ErrorCategory, RepoId, Result, WikiError};

// =============================================================================
// Engine Re-exports
// =============================================================================

pub use agent::{AgentOutcome, BoundedAgentLoop, Tool, ToolRegistry};
pub use index::{IndexHandle, IndexRegistry, SearchHit, SyncReport};
pub use pipeline::{Pipeline, Stage};
pub use scheduler::ConcurrencyScheduler;

// =============================================================================
// Job Re-exports
// =============================================================================

pub use wiki::{Context, JobOutcome, WikiJob};

pub use ai::{ChatModel, Embedder, with_timeout};
