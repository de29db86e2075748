pub mod manifest;
pub mod quickapp;
pub mod report;

pub use manifest::{parse_manifest_name, sanitize_display_name};
pub use quickapp::{validate_identifier, ClearOutcome, Extractor, ExtractorConfig};
pub use report::{count_tree, ExtractionResult, PackageEntry, RunSummary};
