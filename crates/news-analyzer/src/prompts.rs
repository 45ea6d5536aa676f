use analysis_core::{CollectedSeries, NewsItem, StrategistPlan};

/// System prompt for the strategist stage: classify the news and plan which
/// market data the executor will need. Deliberately forbids any trade call at
/// this stage.
pub const STRATEGIST_SYSTEM: &str = "\
You are the strategist stage of a two-stage trading news pipeline. You read a \
single news item and plan the analysis; you never decide a trade yourself.

Judge the news by its BODY TEXT. The headline is supplementary context only \
and must not drive your judgment.

Respond with one JSON object, no prose, with exactly these fields:
{
  \"category\": one of \"crypto\", \"equities\", \"forex\", \"commodities\", \"macro\", \"geopolitics\", \"corporate\", \"other\",
  \"market_moving\": boolean, whether this news should plausibly move markets at all,
  \"rationale\": short string explaining the informational nature of the news,
  \"requested_series\": array of market data series the next stage needs, each either
    {\"series\": \"volatility_index\"},
    {\"series\": \"sentiment_index\"}, or
    {\"series\": \"instrument_price\", \"symbol\": \"<instrument>\"}
}
Request only series that are actually relevant. An empty array is valid.";

/// System prompt for the executor stage: produce the structured trade
/// assessment from the body, the strategist's plan, and the collected data.
pub const EXECUTOR_SYSTEM: &str = "\
You are the executor stage of a two-stage trading news pipeline. The \
strategist already classified the news and requested market data; some \
requested series may be marked unavailable.

Base your assessment on the news BODY, the strategist plan, and the data \
provided. Do not invent data for unavailable series.

Respond with one JSON object, no prose, with exactly these fields:
{
  \"decision\": \"trade\" or \"no_trade\",
  \"positions\": array ordered by priority (first = primary), each
    {\"pair\": \"<instrument>\", \"direction\": \"buy\" or \"sell\", \"trade_style\": e.g. \"scalping\", \"day_trading\", \"swing\", \"position\"},
  \"importance_score\": integer 0-10,
  \"risk_mode\": \"neutral\", \"elevated\" or \"high\",
  \"top_risk_factor\": short string,
  \"assessment\": short overall textual assessment
}
If you decide \"no_trade\", return an empty positions array.";

/// Build the strategist's user prompt. Body leads; the headline is explicitly
/// labeled supplementary to counter headline bias.
pub fn build_strategist_prompt(news: &NewsItem) -> String {
    let mut prompt = format!(
        "NEWS BODY (the text to analyze):\n{}\n\n\
         Supplementary headline (context only): {}\n\
         Source: {}\nPublished: {}\n",
        news.body,
        news.title,
        news.source,
        news.published_at.to_rfc3339(),
    );
    if !news.tickers.is_empty() {
        prompt.push_str(&format!(
            "Instruments tagged by the ingester: {}\n",
            news.tickers.join(", ")
        ));
    }
    prompt
}

/// Build the executor's user prompt from the news, the plan, and whatever
/// data collection managed to fetch.
pub fn build_executor_prompt(
    news: &NewsItem,
    plan: &StrategistPlan,
    collected: &[CollectedSeries],
) -> String {
    let mut data_lines = String::new();
    if collected.is_empty() {
        data_lines.push_str("(no market data was requested)\n");
    }
    for series in collected {
        match series.value {
            Some(value) => data_lines.push_str(&format!("{}: {}\n", series.request.label(), value)),
            None => data_lines.push_str(&format!("{}: unavailable\n", series.request.label())),
        }
    }

    format!(
        "NEWS BODY (the text to analyze):\n{}\n\n\
         Supplementary headline (context only): {}\n\n\
         STRATEGIST PLAN:\n\
         category: {}\nmarket_moving: {}\nrationale: {}\n\n\
         COLLECTED MARKET DATA:\n{}",
        news.body,
        news.title,
        plan.category.as_str(),
        plan.market_moving,
        plan.rationale,
        data_lines,
    )
}
