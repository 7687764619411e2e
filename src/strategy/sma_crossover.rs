use crate::cache::CacheRegion;
use crate::events::{BarEvent, SignalEvent, SignalType};
use crate::strategy::{
    cached_indicator, sma, ParamSet, ParameterStore, PriceHistory, Strategy, StrategyError,
};
use std::sync::Arc;

const FAST_WINDOW: &str = "fast_window";
const SLOW_WINDOW: &str = "slow_window";

//sma crossover strategy
//buys when fast sma crosses above slow sma
//sells when fast sma crosses below slow sma
#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    symbol: String,
    params: ParameterStore,
    history: PriceHistory,
    cache: Option<Arc<CacheRegion>>,

    //state
    last_fast_sma: Option<f64>,
    last_slow_sma: Option<f64>,
}

impl SmaCrossoverStrategy {
    pub fn new(
        symbol: impl Into<String>,
        fast_window: usize,
        slow_window: usize,
    ) -> Result<Self, StrategyError> {
        let mut params = ParamSet::new();
        params.insert(FAST_WINDOW.to_string(), fast_window as f64);
        params.insert(SLOW_WINDOW.to_string(), slow_window as f64);
        Self::from_parameters(symbol, &params, None)
    }

    //defaults overridden by `parameters`
    pub fn from_parameters(
        symbol: impl Into<String>,
        parameters: &ParamSet,
        cache: Option<Arc<CacheRegion>>,
    ) -> Result<Self, StrategyError> {
        let mut strategy = SmaCrossoverStrategy {
            symbol: symbol.into(),
            params: ParameterStore::new(&[(FAST_WINDOW, 20.0), (SLOW_WINDOW, 50.0)]),
            history: PriceHistory::new(50),
            cache,
            last_fast_sma: None,
            last_slow_sma: None,
        };
        for (name, &value) in parameters {
            strategy.set_parameter(name, value)?;
        }
        strategy.windows()?;
        Ok(strategy)
    }

    fn windows(&self) -> Result<(usize, usize), StrategyError> {
        let fast = self.params.get_period(FAST_WINDOW)?;
        let slow = self.params.get_period(SLOW_WINDOW)?;
        if fast >= slow {
            return Err(StrategyError::InvalidParameter {
                name: FAST_WINDOW.to_string(),
                value: fast as f64,
                reason: format!("must be below slow_window ({})", slow),
            });
        }
        Ok((fast, slow))
    }

    //returns some(buy) for a bullish crossover, some(sell) for a bearish one
    fn check_crossover(&self, fast_sma: f64, slow_sma: f64) -> Option<SignalType> {
        if let (Some(prev_fast), Some(prev_slow)) = (self.last_fast_sma, self.last_slow_sma) {
            if prev_fast <= prev_slow && fast_sma > slow_sma {
                return Some(SignalType::Buy);
            }
            if prev_fast >= prev_slow && fast_sma < slow_sma {
                return Some(SignalType::Sell);
            }
        }
        None
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn initialize(&mut self) -> Result<(), StrategyError> {
        let (_, slow) = self.windows()?;
        self.history.resize(slow);
        self.reset();
        Ok(())
    }

    fn on_bar(&mut self, bar: &BarEvent) -> Result<Vec<SignalEvent>, StrategyError> {
        if bar.symbol != self.symbol {
            return Ok(Vec::new());
        }

        let (fast, slow) = self.windows()?;
        self.history.push(bar.close);

        //need at least slow_window bars to calculate
        if self.history.len() < slow {
            return Ok(Vec::new());
        }

        let cache = self.cache.as_deref();
        let closes = self.history.as_slice();
        let fast_sma = cached_indicator(cache, "sma", closes, fast, |s| sma(&s[s.len() - fast..]));
        let slow_sma = cached_indicator(cache, "sma", closes, slow, |s| sma(&s[s.len() - slow..]));

        let (Some(fast_sma), Some(slow_sma)) = (fast_sma, slow_sma) else {
            return Err(StrategyError::Computation(format!(
                "moving averages unavailable with {} bars",
                self.history.len()
            )));
        };

        let crossover = self.check_crossover(fast_sma, slow_sma);

        //update state
        self.last_fast_sma = Some(fast_sma);
        self.last_slow_sma = Some(slow_sma);

        let Some(signal_type) = crossover else {
            return Ok(Vec::new());
        };

        let spread = (fast_sma - slow_sma).abs() / slow_sma;
        let strength = (spread * 20.0).clamp(0.1, 1.0);
        let direction = if signal_type == SignalType::Buy {
            "above"
        } else {
            "below"
        };

        let signal = SignalEvent::new(
            self.symbol.clone(),
            signal_type,
            strength,
            self.name(),
            bar.timestamp(),
        )?
        .with_comment(format!(
            "fast sma {:.4} crossed {} slow sma {:.4}",
            fast_sma, direction, slow_sma
        ));

        Ok(vec![signal])
    }

    fn reset(&mut self) {
        self.history.clear();
        self.last_fast_sma = None;
        self.last_slow_sma = None;
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), StrategyError> {
        self.params.set_period(name, value)
    }

    fn parameters(&self) -> ParamSet {
        self.params.to_param_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegionConfig;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<BarEvent> {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                BarEvent::new("ES", start + Duration::days(i as i64), c, c, c, c, 100.0, None)
                    .unwrap()
            })
            .collect()
    }

    fn run(strategy: &mut SmaCrossoverStrategy, closes: &[f64]) -> Vec<SignalEvent> {
        strategy.initialize().unwrap();
        bars(closes)
            .iter()
            .flat_map(|bar| strategy.on_bar(bar).unwrap())
            .collect()
    }

    const PRICES: [f64; 10] = [10.0, 10.0, 10.0, 9.0, 8.0, 9.0, 11.0, 12.0, 10.0, 7.0];

    #[test]
    fn emits_buy_then_sell_on_crossovers() {
        let mut strategy = SmaCrossoverStrategy::new("ES", 2, 4).unwrap();
        let signals = run(&mut strategy, &PRICES);

        let kinds: Vec<SignalType> = signals.iter().map(|s| s.signal_type()).collect();
        assert_eq!(kinds, vec![SignalType::Buy, SignalType::Sell]);
        assert!(signals.iter().all(|s| s.strategy_name() == "SMA Crossover"));
        assert!(signals.iter().all(|s| (0.1..=1.0).contains(&s.strength())));
    }

    #[test]
    fn cache_does_not_change_signals() {
        let region = Arc::new(
            CacheRegion::new(&CacheRegionConfig::new(
                "indicators",
                1000,
                std::time::Duration::from_secs(60),
            ))
            .unwrap(),
        );
        let mut params = ParamSet::new();
        params.insert(FAST_WINDOW.to_string(), 2.0);
        params.insert(SLOW_WINDOW.to_string(), 4.0);

        let mut plain = SmaCrossoverStrategy::from_parameters("ES", &params, None).unwrap();
        let mut cached =
            SmaCrossoverStrategy::from_parameters("ES", &params, Some(Arc::clone(&region)))
                .unwrap();

        let expected: Vec<SignalType> =
            run(&mut plain, &PRICES).iter().map(|s| s.signal_type()).collect();
        let first: Vec<SignalType> =
            run(&mut cached, &PRICES).iter().map(|s| s.signal_type()).collect();
        let computed = region.stats().computations;
        let second: Vec<SignalType> =
            run(&mut cached, &PRICES).iter().map(|s| s.signal_type()).collect();

        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert!(computed > 0);
        //second pass over the same prices is served entirely from the cache
        assert_eq!(region.stats().computations, computed);
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        assert!(matches!(
            SmaCrossoverStrategy::new("ES", 5, 5),
            Err(StrategyError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn ignores_other_symbols() {
        let mut strategy = SmaCrossoverStrategy::new("NQ", 2, 4).unwrap();
        assert!(run(&mut strategy, &PRICES).is_empty());
    }

    #[test]
    fn set_parameter_validates_values() {
        let mut strategy = SmaCrossoverStrategy::new("ES", 2, 4).unwrap();
        assert!(strategy.set_parameter(FAST_WINDOW, 2.5).is_err());
        assert!(strategy.set_parameter("lookback", 3.0).is_err());
        strategy.set_parameter(SLOW_WINDOW, 8.0).unwrap();
        assert_eq!(strategy.parameters().get(SLOW_WINDOW), Some(&8.0));
    }
}
