//! Output generation
//!
//! Per-language document writers and the JSON run summary. Writers
//! consume the aggregated language groups and know nothing about crawl
//! ordering or persistence.

mod document;
mod text;
mod traits;

pub use document::PaginatedDocumentWriter;
pub use text::ConsolidatedTextWriter;
pub use traits::{write_summary, OutputError, OutputResult, OutputWriter, RunReport, UrlFailure};
