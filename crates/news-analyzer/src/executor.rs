use std::sync::Arc;

use analysis_core::{
    AnalysisError, CollectedSeries, ExecutorAssessment, ModelClient, NewsItem, StrategistPlan,
};

use crate::prompts;

/// Second stage: one model call that turns the plan plus collected data into
/// a structured trade assessment. The output shape is a hard contract —
/// missing required fields fail the item instead of persisting nulls.
pub struct Executor {
    model: Arc<dyn ModelClient>,
}

impl Executor {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    pub async fn run(
        &self,
        news: &NewsItem,
        plan: &StrategistPlan,
        collected: &[CollectedSeries],
    ) -> Result<(ExecutorAssessment, serde_json::Value), AnalysisError> {
        let raw = self
            .model
            .complete_json(
                prompts::EXECUTOR_SYSTEM,
                &prompts::build_executor_prompt(news, plan, collected),
            )
            .await?;

        let assessment: ExecutorAssessment = serde_json::from_value(raw.clone()).map_err(|e| {
            AnalysisError::MalformedOutput(format!(
                "executor assessment for {}: {}",
                news.news_id, e
            ))
        })?;

        tracing::debug!(
            "Executor assessment for {}: decision={:?}, {} positions, importance={}",
            news.news_id,
            assessment.decision,
            assessment.positions.len(),
            assessment.importance_score
        );
        Ok((assessment, raw))
    }
}
