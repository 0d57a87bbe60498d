//! The five stages of a wiki job
//!
//! ```text
//! Download ──► Structure ──► Pages ──► Index ──► Upload
//! Option<String>  ()      WikiStructure  WikiStructure  ()
//! ```
//!
//! Rollback on failure:
//!
//! | stage     | rollback                         |
//! |-----------|----------------------------------|
//! | download  | none, the checkout is reused     |
//! | structure | none, nothing was written        |
//! | pages     | remove generated wiki output     |
//! | index     | remove generated wiki output     |
//! | upload    | remove generated wiki output     |

mod download;
mod index;
mod pages;
mod structure;
mod upload;

pub use download::{Download, is_up_to_date};
pub use index::Index;
pub use pages::Pages;
pub use structure::Structure;
pub use upload::Upload;
