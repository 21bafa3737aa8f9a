//! Bill analysis.
//!
//! An [`Analyzer`] turns the bytes of an uploaded bill into an [`AnalysisResult`]. The only
//! implementation today is [`CannedAnalyzer`], which waits a configurable delay and returns a fixed
//! roast. A real implementation (OCR, spend scoring, ...) plugs in behind the same trait and must
//! keep the all-or-nothing contract: either every field of the result is populated, or it fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::AnalysisConfig;

/// The roast returned for an analyzed bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "ranking": "恩格尔守门员",
    "tags": ["#奶茶股东", "#深夜剁手", "#恩格尔系数爆表"],
    "roast": "照你这个花法，建议你把“退休”两个字从字典里删掉。你的钱包比你的良心还空。",
    "countdown": "2190年",
    "tomorrowBudget": "20.5"
}))]
pub struct AnalysisResult {
    /// Short spending-personality label
    pub ranking: String,
    /// Ordered hashtag-style labels, never empty
    pub tags: Vec<String>,
    /// The roast itself
    pub roast: String,
    /// Year label for when the spender can retire
    pub countdown: String,
    /// Suggested budget for tomorrow, as a decimal string
    pub tomorrow_budget: String,
}

impl AnalysisResult {
    /// The fixed roast served while no real analyzer exists
    pub fn canned() -> Self {
        Self {
            ranking: "恩格尔守门员".to_string(),
            tags: vec!["#奶茶股东".to_string(), "#深夜剁手".to_string(), "#恩格尔系数爆表".to_string()],
            roast: "照你这个花法，建议你把“退休”两个字从字典里删掉。你的钱包比你的良心还空。".to_string(),
            countdown: "2190年".to_string(),
            tomorrow_budget: "20.5".to_string(),
        }
    }

    /// Check that every field is populated.
    pub fn ensure_complete(&self) -> Result<(), AnalysisError> {
        let blank = |s: &str| s.trim().is_empty();

        let missing = if blank(&self.ranking) {
            Some("ranking")
        } else if self.tags.is_empty() || self.tags.iter().any(|t| blank(t)) {
            Some("tags")
        } else if blank(&self.roast) {
            Some("roast")
        } else if blank(&self.countdown) {
            Some("countdown")
        } else if blank(&self.tomorrow_budget) {
            Some("tomorrowBudget")
        } else {
            None
        };

        match missing {
            Some(field) => Err(AnalysisError::Incomplete(field)),
            None => Ok(()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The uploaded content cannot be analyzed at all
    #[error("Uploaded file could not be analyzed: {0}")]
    Unreadable(String),

    /// The analyzer produced a result with a missing field
    #[error("Analysis result is missing '{0}'")]
    Incomplete(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Turns uploaded bill content into a roast
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, content: &[u8]) -> Result<AnalysisResult, AnalysisError>;
}

/// Stand-in analyzer: sleeps, then returns a fixed result
pub struct CannedAnalyzer {
    delay: Duration,
    result: AnalysisResult,
}

impl CannedAnalyzer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            result: AnalysisResult::canned(),
        }
    }

    pub fn with_result(delay: Duration, result: AnalysisResult) -> Self {
        Self { delay, result }
    }
}

#[async_trait]
impl Analyzer for CannedAnalyzer {
    #[tracing::instrument(skip_all, fields(content_len = content.len()))]
    async fn analyze(&self, content: &[u8]) -> Result<AnalysisResult, AnalysisError> {
        if content.is_empty() {
            return Err(AnalysisError::Unreadable("file is empty".to_string()));
        }

        if !self.delay.is_zero() {
            tracing::debug!(delay = ?self.delay, "Simulating analysis latency");
            tokio::time::sleep(self.delay).await;
        }

        Ok(self.result.clone())
    }
}

/// Create the analyzer selected by configuration
pub fn create_analyzer(config: &AnalysisConfig) -> Arc<dyn Analyzer> {
    tracing::info!("Using canned analyzer (delay: {:?})", config.delay);
    Arc::new(CannedAnalyzer::new(config.delay))
}
