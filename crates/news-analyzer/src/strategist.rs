use std::sync::Arc;

use analysis_core::{AnalysisError, ModelClient, NewsItem, StrategistPlan};

use crate::prompts;

/// First stage: one model call that classifies the news and proposes which
/// market data series the executor needs. Advisory only — no trade decision
/// is made here.
pub struct Strategist {
    model: Arc<dyn ModelClient>,
}

impl Strategist {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    /// Returns the parsed plan plus the raw model payload for the audit
    /// trail. A failed call or unparsable output is an error: the pipeline
    /// must abort rather than hand the executor a null plan.
    pub async fn run(
        &self,
        news: &NewsItem,
    ) -> Result<(StrategistPlan, serde_json::Value), AnalysisError> {
        let raw = self
            .model
            .complete_json(
                prompts::STRATEGIST_SYSTEM,
                &prompts::build_strategist_prompt(news),
            )
            .await?;

        let plan: StrategistPlan = serde_json::from_value(raw.clone()).map_err(|e| {
            AnalysisError::MalformedOutput(format!("strategist plan for {}: {}", news.news_id, e))
        })?;

        tracing::debug!(
            "Strategist plan for {}: category={}, market_moving={}, {} series requested",
            news.news_id,
            plan.category.as_str(),
            plan.market_moving,
            plan.requested_series.len()
        );
        Ok((plan, raw))
    }
}
