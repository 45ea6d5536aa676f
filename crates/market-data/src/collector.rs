use futures_util::{stream, StreamExt};
use std::sync::Arc;

use analysis_core::{CollectedSeries, DataRequest, MarketDataSource};

/// Default cap on concurrent provider fetches per collection.
pub const DEFAULT_MAX_PARALLEL: usize = 3;

/// Fetches the strategist's requested series. Each series is fetched
/// independently; a failed fetch degrades to `value: None` ("unavailable")
/// instead of aborting the collection. Never blocks on more than
/// `max_parallel` series at a time.
pub struct DataCollector {
    source: Arc<dyn MarketDataSource>,
    max_parallel: usize,
}

impl DataCollector {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub async fn collect(&self, requests: &[DataRequest]) -> Vec<CollectedSeries> {
        stream::iter(requests.iter().cloned())
            .map(|request| {
                let source = Arc::clone(&self.source);
                async move {
                    let result = match &request {
                        DataRequest::VolatilityIndex => source.volatility_index().await,
                        DataRequest::SentimentIndex => source.sentiment_index().await,
                        DataRequest::InstrumentPrice { symbol } => {
                            source.instrument_price(symbol).await
                        }
                    };
                    let value = match result {
                        Ok(value) => Some(value),
                        Err(e) => {
                            tracing::warn!(
                                "Series {} unavailable: {}",
                                request.label(),
                                e
                            );
                            None
                        }
                    };
                    CollectedSeries { request, value }
                }
            })
            // `buffered` keeps the strategist's priority order in the output
            .buffered(self.max_parallel)
            .collect()
            .await
    }
}
