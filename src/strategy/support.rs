use crate::cache::{indicator_key, CacheRegion, CacheValue};
use crate::strategy::{ParamSet, StrategyError};
use std::collections::VecDeque;

//bounded close-price history
#[derive(Debug, Clone)]
pub struct PriceHistory {
    closes: VecDeque<f64>,
    capacity: usize,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        PriceHistory {
            closes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, close: f64) {
        if self.closes.len() >= self.capacity {
            self.closes.pop_front();
        }
        self.closes.push_back(close);
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<f64> {
        self.closes.back().copied()
    }

    //oldest first
    pub fn as_slice(&mut self) -> &[f64] {
        self.closes.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.closes.clear();
    }

    //changes the bound, keeping the newest values
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.closes.len() > self.capacity {
            self.closes.pop_front();
        }
    }
}

//declared parameters with their current values
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore {
    values: ParamSet,
}

impl ParameterStore {
    //the declared names are fixed by the defaults
    pub fn new(defaults: &[(&str, f64)]) -> Self {
        ParameterStore {
            values: defaults
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<(), StrategyError> {
        if !value.is_finite() {
            return Err(StrategyError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: "must be finite".to_string(),
            });
        }
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StrategyError::UnknownParameter(name.to_string())),
        }
    }

    //sets a parameter that must be a positive whole number
    pub fn set_period(&mut self, name: &str, value: f64) -> Result<(), StrategyError> {
        if value < 1.0 || value.fract() != 0.0 {
            return Err(StrategyError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: "must be a positive whole number".to_string(),
            });
        }
        self.set(name, value)
    }

    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    //reads a parameter that must be a positive whole number
    pub fn get_period(&self, name: &str) -> Result<usize, StrategyError> {
        let value = self.get(name);
        if value < 1.0 || value.fract() != 0.0 {
            return Err(StrategyError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: "must be a positive whole number".to_string(),
            });
        }
        Ok(value as usize)
    }

    pub fn apply(&mut self, parameters: &ParamSet) -> Result<(), StrategyError> {
        for (name, &value) in parameters {
            self.set(name, value)?;
        }
        Ok(())
    }

    pub fn to_param_set(&self) -> ParamSet {
        self.values.clone()
    }
}

struct InsufficientData;

//computes an indicator through the cache region when one is supplied
//None results are never cached
pub fn cached_indicator<F>(
    cache: Option<&CacheRegion>,
    name: &str,
    series: &[f64],
    period: usize,
    compute: F,
) -> Option<f64>
where
    F: FnOnce(&[f64]) -> Option<f64>,
{
    let Some(region) = cache else {
        return compute(series);
    };

    let key = indicator_key(name, series, period, &[]);
    region
        .get_or_compute(&key, || {
            compute(series)
                .map(CacheValue::Scalar)
                .ok_or(InsufficientData)
        })
        .ok()
        .and_then(|value| value.as_scalar())
}
