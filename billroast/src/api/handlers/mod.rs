//! HTTP request handlers.
//!
//! - [`uploads`]: bill upload and retrieval
//! - [`analysis`]: bill analysis
//! - [`health`]: liveness probe
//!
//! Handlers return [`crate::errors::Result`], whose error side renders as a JSON
//! `{"error": "..."}` body with the matching status code.

pub mod analysis;
pub mod health;
pub mod uploads;
