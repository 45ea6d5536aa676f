use crate::{
    Direction, ExecutorAssessment, RiskMode, TimeHorizon, TradeDecision, TradingSignal,
};

/// Importance score at or above which news is both "breaking" and
/// high-conviction. The two uses share one threshold on purpose.
pub const BREAKING_THRESHOLD: i32 = 8;

/// Deterministic mapping of an executor assessment onto the discrete fields
/// of the persisted artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSignal {
    pub signal: TradingSignal,
    pub would_trade: bool,
    pub importance_score: i32,
    pub time_horizon: TimeHorizon,
    pub risk_mode: RiskMode,
    pub is_breaking: bool,
    pub trading_pairs: Vec<String>,
}

/// Derive the discrete trading signal from a structured executor assessment.
///
/// Pure and total: any assessment that parsed produces a result. An
/// importance score outside 0-10 is clamped; a "trade" decision with zero
/// candidate positions is contradictory and yields `NoTrade` (never trade on
/// an unnamed instrument).
pub fn derive_signal(assessment: &ExecutorAssessment) -> DerivedSignal {
    let importance_score = assessment.importance_score.clamp(0, 10) as i32;
    let is_breaking = importance_score >= BREAKING_THRESHOLD;
    let risk_mode = map_risk_mode(&assessment.risk_mode);
    let trading_pairs: Vec<String> = assessment
        .positions
        .iter()
        .map(|p| p.pair.clone())
        .collect();

    let primary = match (assessment.decision, assessment.positions.first()) {
        (TradeDecision::Trade, Some(primary)) => primary,
        _ => {
            return DerivedSignal {
                signal: TradingSignal::NoTrade,
                would_trade: false,
                importance_score,
                time_horizon: TimeHorizon::Swing,
                risk_mode,
                is_breaking,
                trading_pairs,
            };
        }
    };

    let signal = match (primary.direction, is_breaking) {
        (Direction::Buy, true) => TradingSignal::StrongBuy,
        (Direction::Buy, false) => TradingSignal::Buy,
        (Direction::Sell, true) => TradingSignal::StrongSell,
        (Direction::Sell, false) => TradingSignal::Sell,
    };

    DerivedSignal {
        signal,
        would_trade: true,
        importance_score,
        time_horizon: map_trade_style(&primary.trade_style),
        risk_mode,
        is_breaking,
        trading_pairs,
    }
}

fn map_trade_style(style: &str) -> TimeHorizon {
    match style.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
        "scalping" | "scalp" | "day_trading" | "intraday" => TimeHorizon::Short,
        "position" | "position_trading" => TimeHorizon::Macro,
        _ => TimeHorizon::Swing,
    }
}

fn map_risk_mode(raw: &str) -> RiskMode {
    match raw.trim().to_lowercase().as_str() {
        "elevated" => RiskMode::Elevated,
        "high" | "extreme" => RiskMode::High,
        _ => RiskMode::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidatePosition;

    fn assessment(
        decision: TradeDecision,
        positions: Vec<CandidatePosition>,
        importance_score: i64,
        risk_mode: &str,
    ) -> ExecutorAssessment {
        ExecutorAssessment {
            decision,
            positions,
            importance_score,
            risk_mode: risk_mode.to_string(),
            top_risk_factor: "central bank surprise".to_string(),
            assessment: "test assessment".to_string(),
        }
    }

    fn position(pair: &str, direction: Direction, style: &str) -> CandidatePosition {
        CandidatePosition {
            pair: pair.to_string(),
            direction,
            trade_style: style.to_string(),
        }
    }

    #[test]
    fn test_high_importance_buy_is_strong_buy_and_breaking() {
        let derived = derive_signal(&assessment(
            TradeDecision::Trade,
            vec![position("BTCUSD", Direction::Buy, "swing")],
            9,
            "neutral",
        ));
        assert_eq!(derived.signal, TradingSignal::StrongBuy);
        assert!(derived.would_trade);
        assert!(derived.is_breaking);
    }

    #[test]
    fn test_moderate_importance_buy_is_plain_buy() {
        let derived = derive_signal(&assessment(
            TradeDecision::Trade,
            vec![position("BTCUSD", Direction::Buy, "swing")],
            6,
            "neutral",
        ));
        assert_eq!(derived.signal, TradingSignal::Buy);
        assert!(!derived.is_breaking);
    }

    #[test]
    fn test_sell_direction_maps_to_sell_side() {
        let derived = derive_signal(&assessment(
            TradeDecision::Trade,
            vec![position("EURUSD", Direction::Sell, "swing")],
            8,
            "neutral",
        ));
        assert_eq!(derived.signal, TradingSignal::StrongSell);

        let derived = derive_signal(&assessment(
            TradeDecision::Trade,
            vec![position("EURUSD", Direction::Sell, "swing")],
            3,
            "neutral",
        ));
        assert_eq!(derived.signal, TradingSignal::Sell);
    }

    #[test]
    fn test_no_trade_decision_wins_regardless_of_score() {
        let derived = derive_signal(&assessment(
            TradeDecision::NoTrade,
            vec![position("XAUUSD", Direction::Buy, "scalping")],
            10,
            "high",
        ));
        assert_eq!(derived.signal, TradingSignal::NoTrade);
        assert!(!derived.would_trade);
        // Importance-derived fields are still reported
        assert!(derived.is_breaking);
    }

    #[test]
    fn test_trade_with_zero_positions_is_contradictory() {
        let derived = derive_signal(&assessment(TradeDecision::Trade, vec![], 9, "neutral"));
        assert_eq!(derived.signal, TradingSignal::NoTrade);
        assert!(!derived.would_trade);
        assert!(derived.trading_pairs.is_empty());
    }

    #[test]
    fn test_importance_is_clamped_to_range() {
        let derived = derive_signal(&assessment(
            TradeDecision::Trade,
            vec![position("BTCUSD", Direction::Buy, "swing")],
            37,
            "neutral",
        ));
        assert_eq!(derived.importance_score, 10);
        assert_eq!(derived.signal, TradingSignal::StrongBuy);

        let derived = derive_signal(&assessment(
            TradeDecision::Trade,
            vec![position("BTCUSD", Direction::Buy, "swing")],
            -4,
            "neutral",
        ));
        assert_eq!(derived.importance_score, 0);
        assert_eq!(derived.signal, TradingSignal::Buy);
    }

    #[test]
    fn test_time_horizon_from_trade_style() {
        for (style, expected) in [
            ("scalping", TimeHorizon::Short),
            ("day-trading", TimeHorizon::Short),
            ("intraday", TimeHorizon::Short),
            ("position", TimeHorizon::Macro),
            ("Position Trading", TimeHorizon::Macro),
            ("swing", TimeHorizon::Swing),
            ("momentum", TimeHorizon::Swing),
            ("", TimeHorizon::Swing),
        ] {
            let derived = derive_signal(&assessment(
                TradeDecision::Trade,
                vec![position("BTCUSD", Direction::Buy, style)],
                5,
                "neutral",
            ));
            assert_eq!(derived.time_horizon, expected, "style: {style:?}");
        }
    }

    #[test]
    fn test_risk_mode_defaults_to_neutral_for_unrecognized() {
        for (raw, expected) in [
            ("neutral", RiskMode::Neutral),
            ("elevated", RiskMode::Elevated),
            ("high", RiskMode::High),
            ("extreme", RiskMode::High),
            ("spicy", RiskMode::Neutral),
        ] {
            let derived = derive_signal(&assessment(
                TradeDecision::Trade,
                vec![position("BTCUSD", Direction::Buy, "swing")],
                5,
                raw,
            ));
            assert_eq!(derived.risk_mode, expected, "raw: {raw:?}");
        }
    }

    #[test]
    fn test_trading_pairs_preserve_priority_order() {
        let derived = derive_signal(&assessment(
            TradeDecision::Trade,
            vec![
                position("BTCUSD", Direction::Buy, "swing"),
                position("ETHUSD", Direction::Buy, "swing"),
                position("SOLUSD", Direction::Sell, "scalping"),
            ],
            7,
            "elevated",
        ));
        assert_eq!(derived.trading_pairs, vec!["BTCUSD", "ETHUSD", "SOLUSD"]);
        // Horizon comes from the primary (first) position only
        assert_eq!(derived.time_horizon, TimeHorizon::Swing);
    }

    #[test]
    fn test_determinism_for_fixed_input() {
        let input = assessment(
            TradeDecision::Trade,
            vec![position("EURUSD", Direction::Sell, "position")],
            8,
            "elevated",
        );
        let first = derive_signal(&input);
        for _ in 0..10 {
            assert_eq!(derive_signal(&input), first);
        }
    }
}
