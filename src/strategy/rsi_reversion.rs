use crate::cache::CacheRegion;
use crate::events::{BarEvent, SignalCategory, SignalEnhancement, SignalEvent, SignalType};
use crate::strategy::{
    cached_indicator, rsi, ParamSet, ParameterStore, PriceHistory, Strategy, StrategyError,
};
use std::sync::Arc;

const LOOKBACK: &str = "lookback";
const OVERSOLD: &str = "oversold";
const OVERBOUGHT: &str = "overbought";

//rsi mean reversion strategy
//buys when rsi drops below oversold threshold
//sells when rsi rises above overbought threshold, closes once rsi is back at the midline
#[derive(Debug, Clone)]
pub struct RsiReversionStrategy {
    symbol: String,
    params: ParameterStore,
    history: PriceHistory,
    cache: Option<Arc<CacheRegion>>,

    //whether the last entry has not been exited yet
    long: bool,
}

impl RsiReversionStrategy {
    pub fn new(
        symbol: impl Into<String>,
        lookback: usize,
        oversold: f64,
        overbought: f64,
    ) -> Result<Self, StrategyError> {
        let mut params = ParamSet::new();
        params.insert(LOOKBACK.to_string(), lookback as f64);
        params.insert(OVERSOLD.to_string(), oversold);
        params.insert(OVERBOUGHT.to_string(), overbought);
        Self::from_parameters(symbol, &params, None)
    }

    //defaults overridden by `parameters`
    pub fn from_parameters(
        symbol: impl Into<String>,
        parameters: &ParamSet,
        cache: Option<Arc<CacheRegion>>,
    ) -> Result<Self, StrategyError> {
        let mut strategy = RsiReversionStrategy {
            symbol: symbol.into(),
            params: ParameterStore::new(&[
                (LOOKBACK, 14.0),
                (OVERSOLD, 30.0),
                (OVERBOUGHT, 70.0),
            ]),
            history: PriceHistory::new(15),
            cache,
            long: false,
        };
        for (name, &value) in parameters {
            strategy.set_parameter(name, value)?;
        }
        strategy.thresholds()?;
        Ok(strategy)
    }

    fn thresholds(&self) -> Result<(usize, f64, f64), StrategyError> {
        let lookback = self.params.get_period(LOOKBACK)?;
        let oversold = self.params.get(OVERSOLD);
        let overbought = self.params.get(OVERBOUGHT);
        if oversold >= overbought {
            return Err(StrategyError::InvalidParameter {
                name: OVERSOLD.to_string(),
                value: oversold,
                reason: format!("must be below overbought ({})", overbought),
            });
        }
        Ok((lookback, oversold, overbought))
    }

    fn signal(
        &self,
        bar: &BarEvent,
        signal_type: SignalType,
        strength: f64,
        rsi_value: f64,
    ) -> Result<SignalEvent, StrategyError> {
        let category = if signal_type == SignalType::Buy {
            SignalCategory::Entry
        } else {
            SignalCategory::Exit
        };

        let signal = SignalEvent::new(
            self.symbol.clone(),
            signal_type,
            strength.clamp(0.0, 1.0),
            self.name(),
            bar.timestamp(),
        )?
        .with_comment(format!("rsi {:.2}", rsi_value))
        .with_enhancement(SignalEnhancement {
            category: Some(category),
            ..Default::default()
        })?;

        Ok(signal)
    }
}

impl Strategy for RsiReversionStrategy {
    fn name(&self) -> &str {
        "RSI Reversion"
    }

    fn initialize(&mut self) -> Result<(), StrategyError> {
        let (lookback, _, _) = self.thresholds()?;
        self.history.resize(lookback + 1);
        self.reset();
        Ok(())
    }

    fn on_bar(&mut self, bar: &BarEvent) -> Result<Vec<SignalEvent>, StrategyError> {
        if bar.symbol != self.symbol {
            return Ok(Vec::new());
        }

        let (lookback, oversold, overbought) = self.thresholds()?;
        self.history.push(bar.close);

        //need at least lookback + 1 bars for rsi calculation
        if self.history.len() < lookback + 1 {
            return Ok(Vec::new());
        }

        let cache = self.cache.as_deref();
        let closes = self.history.as_slice();
        let Some(rsi_value) = cached_indicator(cache, "rsi", closes, lookback, |s| rsi(s, lookback))
        else {
            return Err(StrategyError::Computation(format!(
                "rsi unavailable with {} bars",
                self.history.len()
            )));
        };

        let signal = if rsi_value < oversold && !self.long {
            self.long = true;
            Some(self.signal(bar, SignalType::Buy, (oversold - rsi_value) / oversold, rsi_value)?)
        } else if rsi_value > overbought && self.long {
            self.long = false;
            let strength = (rsi_value - overbought) / (100.0 - overbought);
            Some(self.signal(bar, SignalType::Sell, strength, rsi_value)?)
        } else if self.long && rsi_value >= 50.0 {
            //back in the neutral zone
            self.long = false;
            Some(self.signal(bar, SignalType::Close, 0.5, rsi_value)?)
        } else {
            None
        };

        Ok(signal.into_iter().collect())
    }

    fn reset(&mut self) {
        self.history.clear();
        self.long = false;
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), StrategyError> {
        match name {
            LOOKBACK => self.params.set_period(name, value),
            OVERSOLD | OVERBOUGHT if !(0.0..=100.0).contains(&value) => {
                Err(StrategyError::InvalidParameter {
                    name: name.to_string(),
                    value,
                    reason: "must lie in [0, 100]".to_string(),
                })
            }
            _ => self.params.set(name, value),
        }
    }

    fn parameters(&self) -> ParamSet {
        self.params.to_param_set()
    }
}
