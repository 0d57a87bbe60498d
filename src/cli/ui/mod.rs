mod output;

pub use output::{Output, sync_report_fields};
