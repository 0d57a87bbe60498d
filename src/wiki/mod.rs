//! Wiki generation job
//!
//! A [`WikiJob`] runs the five [`stages`] over one shared [`Context`]:
//!
//! ```text
//! Download → Structure → Pages → Index → Upload
//! ```
//!
//! The structure and page stages drive a [`BoundedAgentLoop`](crate::agent::BoundedAgentLoop)
//! over the repository tools; pages are written concurrently through the
//! [`ConcurrencyScheduler`](crate::scheduler::ConcurrencyScheduler).

pub mod context;
pub mod job;
pub mod prompts;
pub mod stages;

pub use context::{Context, ContextBuilder};
pub use job::{JobOutcome, WikiJob};
pub use prompts::PromptTemplate;
