//! Ranked instrument projection shared by the list builder and its loaders.

use serde::Serialize;

/// The columns of an enriched row that ranking looks at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedInstrument {
    pub symbol: String,
    pub exchange: String,
    pub market_cap: Option<f64>,
    pub score: f64,
    pub score_2: f64,
}

impl RankedInstrument {
    /// Charting-platform ticker, `EXCHANGE:SYMBOL`.
    pub fn ticker(&self) -> String {
        format!("{}:{}", self.exchange, self.symbol)
    }

    /// Market cap strictly above `min`. Missing caps never qualify.
    pub fn is_big_cap(&self, min: f64) -> bool {
        self.market_cap.is_some_and(|cap| cap > min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(market_cap: Option<f64>) -> RankedInstrument {
        RankedInstrument {
            symbol: "AAPL".into(),
            exchange: "NASDAQ".into(),
            market_cap,
            score: 2.0,
            score_2: 1.5,
        }
    }

    #[test]
    fn ticker_is_exchange_qualified() {
        assert_eq!(instrument(None).ticker(), "NASDAQ:AAPL");
    }

    #[test]
    fn big_cap_bound_is_strict() {
        assert!(instrument(Some(10_000_000_001.0)).is_big_cap(10_000_000_000.0));
        assert!(!instrument(Some(10_000_000_000.0)).is_big_cap(10_000_000_000.0));
        assert!(!instrument(None).is_big_cap(0.0));
    }
}
