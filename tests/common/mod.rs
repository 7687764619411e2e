#![allow(dead_code)]

use backtide::prelude::*;
use backtide::strategy::StrategyError;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(start: NaiveDate, offset: i64) -> DateTime<Utc> {
    Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0).unwrap()) + Duration::days(offset)
}

pub fn flat_bar(symbol: &str, ts: DateTime<Utc>, price: f64) -> BarEvent {
    BarEvent::new(symbol, ts, price, price, price, price, 1_000.0, None).unwrap()
}

//one bar per calendar day with a slow oscillation around 100
pub fn wave_bars(symbol: &str, start: NaiveDate, days: i64) -> Vec<BarEvent> {
    (0..days)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + 10.0 * (t / 15.0).sin() + 3.0 * (t / 4.0).cos();
            let open = close - 0.5 * (t / 3.0).sin();
            let high = open.max(close) + 0.75;
            let low = open.min(close) - 0.75;
            BarEvent::new(symbol, day(start, i), open, high, low, close, 5_000.0, None).unwrap()
        })
        .collect()
}

pub fn frictionless_config(symbol: &str, start: NaiveDate, end: NaiveDate) -> BacktestConfig {
    BacktestConfig::new(symbol, start, end, 100_000.0)
        .with_execution(ExecutionConfig::frictionless())
        .with_sizing(SizingRule::FixedQuantity { quantity: 10 })
}

//emits a fixed signal type on chosen bar indices
pub struct ScriptedStrategy {
    script: Vec<(usize, SignalType)>,
    index: usize,
    pub seen: Vec<DateTime<Utc>>,
}

impl ScriptedStrategy {
    pub fn new(script: Vec<(usize, SignalType)>) -> Self {
        ScriptedStrategy {
            script,
            index: 0,
            seen: Vec::new(),
        }
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn on_bar(&mut self, bar: &BarEvent) -> Result<Vec<SignalEvent>, StrategyError> {
        let index = self.index;
        self.index += 1;
        self.seen.push(bar.timestamp());

        let mut signals = Vec::new();
        for (at, kind) in &self.script {
            if *at == index {
                signals.push(SignalEvent::new(
                    bar.symbol.clone(),
                    *kind,
                    1.0,
                    "scripted",
                    bar.timestamp(),
                )?);
            }
        }
        Ok(signals)
    }

    fn reset(&mut self) {
        self.index = 0;
        self.seen.clear();
    }

    fn set_parameter(&mut self, name: &str, _value: f64) -> Result<(), StrategyError> {
        Err(StrategyError::UnknownParameter(name.to_string()))
    }

    fn parameters(&self) -> ParamSet {
        ParamSet::new()
    }
}
