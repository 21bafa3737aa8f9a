//! API request and response models.
//!
//! [`AnalysisResult`](crate::analysis::AnalysisResult) is returned as-is by the analysis handler
//! and lives next to the analyzer.

pub mod analysis;
pub mod uploads;
