use crate::optimizer::OptimizerError;
use crate::strategy::ParamSet;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

//float tolerance when enumerating stepped ranges
const STEP_EPSILON: f64 = 1e-9;

//legal values for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterDomain {
    Discrete { values: Vec<f64> },
    Integer { min: i64, max: i64, step: i64 },
    Continuous { min: f64, max: f64, step: f64 },
}

impl ParameterDomain {
    pub fn validate(&self, name: &str) -> Result<(), OptimizerError> {
        let invalid = |reason: &str| OptimizerError::InvalidDomain {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        match self {
            ParameterDomain::Discrete { values } => {
                if values.is_empty() {
                    return Err(invalid("no values"));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(invalid("values must be finite"));
                }
            }
            ParameterDomain::Integer { min, max, step } => {
                if min > max {
                    return Err(invalid("min above max"));
                }
                if *step <= 0 {
                    return Err(invalid("step must be positive"));
                }
            }
            ParameterDomain::Continuous { min, max, step } => {
                if !min.is_finite() || !max.is_finite() || min > max {
                    return Err(invalid("bounds must be finite with min <= max"));
                }
                if !(*step > 0.0) {
                    return Err(invalid("step must be positive"));
                }
            }
        }
        Ok(())
    }

    //every value a grid search visits, in ascending order for ranges
    pub fn grid_values(&self) -> Vec<f64> {
        match self {
            ParameterDomain::Discrete { values } => values.clone(),
            ParameterDomain::Integer { min, max, step } => {
                let mut values = Vec::new();
                let mut current = *min;
                while current <= *max {
                    values.push(current as f64);
                    current += step;
                }
                values
            }
            ParameterDomain::Continuous { min, max, step } => {
                //index-based to avoid accumulating float error
                let count = ((max - min) / step + STEP_EPSILON).floor() as usize + 1;
                (0..count).map(|i| min + i as f64 * step).collect()
            }
        }
    }

    pub fn grid_len(&self) -> usize {
        match self {
            ParameterDomain::Discrete { values } => values.len(),
            ParameterDomain::Integer { min, max, step } => ((max - min) / step + 1) as usize,
            ParameterDomain::Continuous { min, max, step } => {
                ((max - min) / step + STEP_EPSILON).floor() as usize + 1
            }
        }
    }

    //uniform draw; integer draws land on the step lattice
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            ParameterDomain::Discrete { values } => values.choose(rng).copied().unwrap_or(0.0),
            ParameterDomain::Integer { min, max, step } => {
                let slots = (max - min) / step;
                (min + rng.gen_range(0..=slots) * step) as f64
            }
            ParameterDomain::Continuous { min, max, .. } => {
                if min == max {
                    *min
                } else {
                    rng.gen_range(*min..=*max)
                }
            }
        }
    }
}

//ordered map from parameter name to domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    domains: IndexMap<String, ParameterDomain>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        ParameterSpace::default()
    }

    pub fn with(mut self, name: impl Into<String>, domain: ParameterDomain) -> Self {
        self.insert(name, domain);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, domain: ParameterDomain) {
        self.domains.insert(name.into(), domain);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn validate(&self) -> Result<(), OptimizerError> {
        if self.domains.is_empty() {
            return Err(OptimizerError::EmptySpace);
        }
        for (name, domain) in &self.domains {
            domain.validate(name)?;
        }
        Ok(())
    }

    //number of grid combinations; assumes a validated space
    pub fn grid_size(&self) -> usize {
        self.domains
            .values()
            .map(ParameterDomain::grid_len)
            .fold(1usize, |acc, n| acc.saturating_mul(n))
    }

    //cartesian product of every domain's grid values, first parameter varying slowest
    pub fn grid(&self) -> Result<Vec<ParamSet>, OptimizerError> {
        self.validate()?;

        let mut combinations = vec![ParamSet::new()];
        for (name, domain) in &self.domains {
            let values = domain.grid_values();
            combinations = combinations
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |&value| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), value);
                        next
                    })
                })
                .collect();
        }

        Ok(combinations)
    }

    //one uniform draw per domain; assumes a validated space
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamSet {
        self.domains
            .iter()
            .map(|(name, domain)| (name.clone(), domain.sample(rng)))
            .collect()
    }
}
