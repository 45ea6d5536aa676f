use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw news item handed in by the ingestion layer. Immutable here.
///
/// `body` is the substantive text the models analyze; `title` is passed only
/// as supplementary context to avoid headline bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub news_id: String,
    pub title: String,
    pub body: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub tickers: Vec<String>,
}

/// Market category a news item belongs to, as classified by the strategist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCategory {
    Crypto,
    Equities,
    Forex,
    Commodities,
    Macro,
    Geopolitics,
    Corporate,
    #[serde(other)]
    Other,
}

impl MarketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCategory::Crypto => "crypto",
            MarketCategory::Equities => "equities",
            MarketCategory::Forex => "forex",
            MarketCategory::Commodities => "commodities",
            MarketCategory::Macro => "macro",
            MarketCategory::Geopolitics => "geopolitics",
            MarketCategory::Corporate => "corporate",
            MarketCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "crypto" => MarketCategory::Crypto,
            "equities" => MarketCategory::Equities,
            "forex" => MarketCategory::Forex,
            "commodities" => MarketCategory::Commodities,
            "macro" => MarketCategory::Macro,
            "geopolitics" => MarketCategory::Geopolitics,
            "corporate" => MarketCategory::Corporate,
            _ => MarketCategory::Other,
        }
    }
}

/// Final discrete trading signal derived from the executor's assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingSignal {
    StrongBuy,
    Buy,
    Sell,
    StrongSell,
    NoTrade,
}

impl TradingSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingSignal::StrongBuy => "STRONG_BUY",
            TradingSignal::Buy => "BUY",
            TradingSignal::Sell => "SELL",
            TradingSignal::StrongSell => "STRONG_SELL",
            TradingSignal::NoTrade => "NO_TRADE",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "STRONG_BUY" => TradingSignal::StrongBuy,
            "BUY" => TradingSignal::Buy,
            "SELL" => TradingSignal::Sell,
            "STRONG_SELL" => TradingSignal::StrongSell,
            _ => TradingSignal::NoTrade,
        }
    }
}

/// Trade time horizon derived from the primary position's trade style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeHorizon {
    Short,
    Swing,
    Macro,
}

impl TimeHorizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeHorizon::Short => "short",
            TimeHorizon::Swing => "swing",
            TimeHorizon::Macro => "macro",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "short" => TimeHorizon::Short,
            "macro" => TimeHorizon::Macro,
            _ => TimeHorizon::Swing,
        }
    }
}

/// Risk environment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    Neutral,
    Elevated,
    High,
}

impl RiskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskMode::Neutral => "neutral",
            RiskMode::Elevated => "elevated",
            RiskMode::High => "high",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "elevated" => RiskMode::Elevated,
            "high" => RiskMode::High,
            _ => RiskMode::Neutral,
        }
    }
}

/// Market data series the strategist may request for the executor stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "series", rename_all = "snake_case")]
pub enum DataRequest {
    VolatilityIndex,
    SentimentIndex,
    InstrumentPrice { symbol: String },
}

impl DataRequest {
    /// Stable label used in executor prompts and logs.
    pub fn label(&self) -> String {
        match self {
            DataRequest::VolatilityIndex => "volatility_index".to_string(),
            DataRequest::SentimentIndex => "sentiment_index".to_string(),
            DataRequest::InstrumentPrice { symbol } => format!("price:{symbol}"),
        }
    }
}

/// One fetched series; `value: None` means the provider was unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedSeries {
    pub request: DataRequest,
    pub value: Option<f64>,
}

/// Structured plan produced by the strategist stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategistPlan {
    pub category: MarketCategory,
    pub market_moving: bool,
    pub rationale: String,
    #[serde(default)]
    pub requested_series: Vec<DataRequest>,
}

/// Overall trade decision in the executor's assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDecision {
    Trade,
    NoTrade,
}

/// Trade direction for a candidate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
}

/// One candidate position proposed by the executor. The first entry in
/// `ExecutorAssessment::positions` is the primary position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePosition {
    pub pair: String,
    pub direction: Direction,
    pub trade_style: String,
}

/// Structured trade assessment produced by the executor stage.
///
/// Shape is a hard contract: missing required fields fail deserialization and
/// the item fails, rather than being persisted with nulls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorAssessment {
    pub decision: TradeDecision,
    #[serde(default)]
    pub positions: Vec<CandidatePosition>,
    pub importance_score: i64,
    pub risk_mode: String,
    pub top_risk_factor: String,
    pub assessment: String,
}

/// The persisted result of one completed analysis, keyed by `news_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub news_id: String,
    pub category: MarketCategory,
    pub signal: TradingSignal,
    pub importance_score: i32,
    pub would_trade: bool,
    pub time_horizon: TimeHorizon,
    pub risk_mode: RiskMode,
    pub is_breaking: bool,
    pub trading_pairs: Vec<String>,
    pub raw_model_output: serde_json::Value,
    pub analyzed_at: DateTime<Utc>,
}

/// Terminal outcome of one item's analysis attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisOutcome {
    Analyzed,
    SkippedLocked,
    SkippedRateLimited,
    FailedStrategist,
    FailedExecutor,
    FailedPersist,
}

impl AnalysisOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            AnalysisOutcome::SkippedLocked | AnalysisOutcome::SkippedRateLimited
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AnalysisOutcome::FailedStrategist
                | AnalysisOutcome::FailedExecutor
                | AnalysisOutcome::FailedPersist
        )
    }
}

/// Per-item report returned to trigger callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub news_id: String,
    pub outcome: AnalysisOutcome,
    pub signal: Option<TradingSignal>,
    pub error: Option<String>,
}

/// Aggregate result of a batch run. One item failing never aborts the batch;
/// every item lands in exactly one of the three buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<ItemReport>,
    pub skipped: Vec<ItemReport>,
    pub failed: Vec<ItemReport>,
}

impl BatchReport {
    pub fn push(&mut self, report: ItemReport) {
        if report.outcome.is_skip() {
            self.skipped.push(report);
        } else if report.outcome.is_failure() {
            self.failed.push(report);
        } else {
            self.succeeded.push(report);
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} analyzed, {} skipped, {} failed",
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_request_tagged_serde() {
        let json = r#"[{"series":"volatility_index"},{"series":"instrument_price","symbol":"EURUSD"}]"#;
        let requests: Vec<DataRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(requests[0], DataRequest::VolatilityIndex);
        assert_eq!(
            requests[1],
            DataRequest::InstrumentPrice {
                symbol: "EURUSD".to_string()
            }
        );
        assert_eq!(requests[1].label(), "price:EURUSD");
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let plan: StrategistPlan = serde_json::from_str(
            r#"{"category":"weather","market_moving":false,"rationale":"n/a","requested_series":[]}"#,
        )
        .unwrap();
        assert_eq!(plan.category, MarketCategory::Other);
    }

    #[test]
    fn test_executor_assessment_rejects_missing_fields() {
        // No importance_score: shape contract violated, must not parse
        let result = serde_json::from_str::<ExecutorAssessment>(
            r#"{"decision":"trade","positions":[],"risk_mode":"neutral","top_risk_factor":"x","assessment":"y"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_signal_round_trip_labels() {
        for signal in [
            TradingSignal::StrongBuy,
            TradingSignal::Buy,
            TradingSignal::Sell,
            TradingSignal::StrongSell,
            TradingSignal::NoTrade,
        ] {
            assert_eq!(TradingSignal::parse(signal.as_str()), signal);
        }
    }

    #[test]
    fn test_batch_report_bucketing() {
        let mut report = BatchReport::default();
        report.push(ItemReport {
            news_id: "a".into(),
            outcome: AnalysisOutcome::Analyzed,
            signal: Some(TradingSignal::Buy),
            error: None,
        });
        report.push(ItemReport {
            news_id: "b".into(),
            outcome: AnalysisOutcome::SkippedLocked,
            signal: None,
            error: None,
        });
        report.push(ItemReport {
            news_id: "c".into(),
            outcome: AnalysisOutcome::FailedStrategist,
            signal: None,
            error: Some("model down".into()),
        });
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.total(), 3);
    }
}
